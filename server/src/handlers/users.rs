use axum::{
    extract::{Path, State},
    response::Response,
    Json,
};
use serde::Deserialize;

use crate::middleware::AdminOnly;
use crate::models::{Role, UserProfile};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: String,
}

pub async fn get_user(
    State(state): State<AppState>,
    _admin: AdminOnly,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let user = state.users.get(id).await?;
    Ok(success(UserProfile::from(user), "User retrieved successfully"))
}

pub async fn update_user_role(
    State(state): State<AppState>,
    _admin: AdminOnly,
    Path(id): Path<i64>,
    Json(body): Json<RoleRequest>,
) -> Result<Response, AppError> {
    let role: Role = body.role.parse()?;
    let user = state.users.update_role(id, role).await?;
    Ok(success(UserProfile::from(user), "User role updated successfully"))
}
