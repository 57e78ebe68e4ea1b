use std::sync::Arc;

use tracing::info;

use crate::models::{NewUser, Role, User};
use crate::services::auth::normalize_username;
use crate::store::UserStore;
use crate::utils::error::AppError;

/// Account registration and role management.
pub struct UserDirectory {
    users: Arc<dyn UserStore>,
    bcrypt_cost: u32,
}

impl UserDirectory {
    pub fn new(users: Arc<dyn UserStore>, bcrypt_cost: u32) -> Self {
        Self { users, bcrypt_cost }
    }

    pub async fn register(&self, username: &str, password: &str, role: Role) -> Result<User, AppError> {
        let username = normalize_username(username);
        if username.is_empty() {
            return Err(AppError::ValidationError("username is required".to_string()));
        }
        if password.is_empty() {
            return Err(AppError::ValidationError("password is required".to_string()));
        }

        let password = password.to_string();
        let cost = self.bcrypt_cost;
        let password_hash =
            tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;

        let user = self
            .users
            .insert(NewUser {
                username: username.to_string(),
                password_hash,
                role,
            })
            .await?;
        info!(user_id = user.id, username = %user.username, role = %user.role, "user registered");
        Ok(user)
    }

    pub async fn get(&self, id: i64) -> Result<User, AppError> {
        self.users
            .find(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {id} not found")))
    }

    pub async fn update_role(&self, id: i64, role: Role) -> Result<User, AppError> {
        let user = self
            .users
            .update_role(id, role)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {id} not found")))?;
        info!(user_id = id, role = %role, "user role changed");
        Ok(user)
    }

    /// Creates the configured admin account unless the username exists.
    pub async fn ensure_admin(&self, username: &str, password: &str) -> Result<(), AppError> {
        if self
            .users
            .find_by_username(normalize_username(username))
            .await?
            .is_some()
        {
            return Ok(());
        }
        self.register(username, password, Role::Admin).await?;
        Ok(())
    }
}
