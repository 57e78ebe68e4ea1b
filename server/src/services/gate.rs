use tracing::warn;

use crate::models::Role;
use crate::services::auth::Claims;
use crate::utils::error::AppError;

/// Role check over already validated claims. Exact match only: an `Admin`
/// token is not accepted where `User` is required.
pub struct AuthorizationGate;

impl AuthorizationGate {
    pub fn authorize(claims: &Claims, required: Role) -> Result<(), AppError> {
        if claims.role == required {
            Ok(())
        } else {
            warn!(
                user_id = claims.user_id,
                role = %claims.role,
                required = %required,
                "role mismatch"
            );
            Err(AppError::Forbidden("insufficient permissions".to_string()))
        }
    }
}
