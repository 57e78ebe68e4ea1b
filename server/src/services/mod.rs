pub mod auth;
pub mod booking;
pub mod catalog;
pub mod gate;
pub mod reports;
pub mod users;

pub use auth::{AuthSessionManager, Claims, Session, TokenCodec};
pub use booking::BookingEngine;
pub use catalog::EventCatalog;
pub use gate::AuthorizationGate;
pub use reports::{ReportAggregator, SalesReport};
pub use users::UserDirectory;
