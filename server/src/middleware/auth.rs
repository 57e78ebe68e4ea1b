//! Request extractors for the bearer token, the validated caller and
//! role-gated callers.
//!
//! ```rust,ignore
//! async fn book(caller: UserOnly, ...) -> Result<Response, AppError> {
//!     let user_id = caller.user_id();
//!     ...
//! }
//! ```

use std::marker::PhantomData;
use std::ops::Deref;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::models::Role;
use crate::services::{AuthorizationGate, Claims};
use crate::state::AppState;
use crate::utils::error::AppError;

const BEARER_PREFIX: &str = "Bearer ";

/// Raw token from `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::AuthError("missing authorization header".to_string()))?;

        let token = header
            .strip_prefix(BEARER_PREFIX)
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AppError::AuthError("invalid authorization header format".to_string()))?;

        Ok(Self(token.to_string()))
    }
}

/// A caller whose token passed signature, expiry and revocation checks.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub token: String,
    pub claims: Claims,
}

impl Authenticated {
    pub fn user_id(&self) -> i64 {
        self.claims.user_id
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Authenticated {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let BearerToken(token) = BearerToken::from_request_parts(parts, state).await?;
        let claims = state.auth.validate(&token).await?;
        Ok(Self { token, claims })
    }
}

pub trait RequiredRole: Send + Sync + 'static {
    const ROLE: Role;
}

pub struct AdminRole;
pub struct UserRole;

impl RequiredRole for AdminRole {
    const ROLE: Role = Role::Admin;
}

impl RequiredRole for UserRole {
    const ROLE: Role = Role::User;
}

/// An authenticated caller whose role is exactly `R::ROLE`.
pub struct Required<R: RequiredRole> {
    pub caller: Authenticated,
    role: PhantomData<R>,
}

pub type AdminOnly = Required<AdminRole>;
pub type UserOnly = Required<UserRole>;

impl<R: RequiredRole> Deref for Required<R> {
    type Target = Authenticated;

    fn deref(&self) -> &Self::Target {
        &self.caller
    }
}

#[async_trait]
impl<R: RequiredRole> FromRequestParts<AppState> for Required<R> {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let caller = Authenticated::from_request_parts(parts, state).await?;
        AuthorizationGate::authorize(&caller.claims, R::ROLE)?;
        Ok(Self {
            caller,
            role: PhantomData,
        })
    }
}
