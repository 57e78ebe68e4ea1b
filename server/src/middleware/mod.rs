pub mod auth;

pub use auth::{AdminOnly, Authenticated, BearerToken, UserOnly};
