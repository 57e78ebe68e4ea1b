//! Credential checks, session tokens and logout.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::Role;
use crate::store::{RevocationStore, UserStore};
use crate::utils::error::AppError;

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
    /// Unique per mint so two logins in the same second get distinct tokens.
    pub jti: Uuid,
}

impl Claims {
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// HS256 signer/verifier over a shared secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn mint(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AppError::InternalServerError(format!("failed to sign token: {e}")))
    }

    /// Signature, algorithm and expiry. Revocation is the caller's concern.
    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(reason = %e, "token rejected by codec");
                AppError::invalid_token()
            })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub user_id: i64,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

pub struct AuthSessionManager {
    users: Arc<dyn UserStore>,
    revocations: Arc<dyn RevocationStore>,
    codec: TokenCodec,
    token_ttl: Duration,
    bcrypt_cost: u32,
    decoy_hash: OnceCell<String>,
}

impl AuthSessionManager {
    pub fn new(
        users: Arc<dyn UserStore>,
        revocations: Arc<dyn RevocationStore>,
        codec: TokenCodec,
        token_ttl: Duration,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            users,
            revocations,
            codec,
            token_ttl,
            bcrypt_cost,
            decoy_hash: OnceCell::new(),
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Session, AppError> {
        let username = normalize_username(username);
        let Some(user) = self.users.find_by_username(username).await? else {
            debug!(%username, "login for unknown user");
            // same bcrypt cost as a real mismatch
            let decoy = self.decoy_hash().await?.to_string();
            verify_password(password, decoy).await?;
            return Err(AppError::invalid_credentials());
        };

        if !verify_password(password, user.password_hash.clone()).await? {
            debug!(user_id = user.id, "login with wrong password");
            return Err(AppError::invalid_credentials());
        }

        let issued_at = Utc::now();
        let expires_at = issued_at + self.token_ttl;
        let claims = Claims {
            user_id: user.id,
            role: user.role,
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4(),
        };
        let token = self.codec.mint(&claims)?;

        info!(user_id = user.id, role = %user.role, "user logged in");
        Ok(Session {
            token,
            user_id: user.id,
            role: user.role,
            expires_at: claims.expires_at(),
        })
    }

    async fn decoy_hash(&self) -> Result<&str, AppError> {
        let cost = self.bcrypt_cost;
        let hash = self
            .decoy_hash
            .get_or_try_init(|| async move {
                let hash =
                    tokio::task::spawn_blocking(move || bcrypt::hash("decoy-password", cost))
                        .await??;
                Ok::<_, AppError>(hash)
            })
            .await?;
        Ok(hash.as_str())
    }

    /// Revokes `token` until `expires_at`, which should be the token's own
    /// `exp` so the entry does not outlive it.
    pub async fn logout(&self, token: &str, expires_at: DateTime<Utc>) -> Result<(), AppError> {
        self.revocations.revoke(token, expires_at).await?;
        info!(%expires_at, "token revoked");
        Ok(())
    }

    /// Full inbound check: signature, expiry, then the revocation list.
    /// Every failure looks the same to the caller.
    pub async fn validate(&self, token: &str) -> Result<Claims, AppError> {
        let claims = self.codec.verify(token)?;
        if self.revocations.is_revoked(token, Utc::now()).await? {
            debug!(user_id = claims.user_id, "revoked token presented");
            return Err(AppError::invalid_token());
        }
        Ok(claims)
    }
}

/// Usernames are stored and looked up trimmed.
pub fn normalize_username(username: &str) -> &str {
    username.trim()
}

/// bcrypt compares in constant time and is CPU bound.
async fn verify_password(password: &str, hash: String) -> Result<bool, AppError> {
    let candidate = password.to_string();
    let matches = tokio::task::spawn_blocking(move || bcrypt::verify(candidate, &hash))
        .await?
        .unwrap_or(false);
    Ok(matches)
}
