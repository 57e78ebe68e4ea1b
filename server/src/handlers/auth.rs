use axum::{extract::State, response::Response, Json};
use serde::Deserialize;

use crate::middleware::Authenticated;
use crate::models::{Role, UserProfile};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, empty_success, success};

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Self-service sign up. New accounts are always `User`.
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<Credentials>,
) -> Result<Response, AppError> {
    let user = state
        .users
        .register(&body.username, &body.password, Role::User)
        .await?;
    Ok(created(UserProfile::from(user), "User registered successfully"))
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<Credentials>,
) -> Result<Response, AppError> {
    let session = state.auth.login(&body.username, &body.password).await?;
    Ok(success(session, "Login successful"))
}

/// Revokes the presented token for the rest of its own lifetime.
pub async fn logout(
    State(state): State<AppState>,
    caller: Authenticated,
) -> Result<Response, AppError> {
    state
        .auth
        .logout(&caller.token, caller.claims.expires_at())
        .await?;
    Ok(empty_success("Logged out successfully"))
}
