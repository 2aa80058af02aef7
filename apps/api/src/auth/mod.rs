//! Bearer-token authentication.
//!
//! Handlers take `CurrentUser` (any valid token) or `PremiumUser` (role `premium` or
//! `admin`) as extractors. Token checks are delegated to the `TokenVerifier` in `AppState`.

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::errors::AppError;
use crate::state::AppState;

pub mod clerk;

pub use clerk::ClerkVerifier;

const PREMIUM_ROLES: &[&str] = &["premium", "admin"];

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Token has expired")]
    Expired,

    #[error("Invalid claims")]
    InvalidClaims,

    #[error("Invalid token signing key")]
    UnknownKey,

    #[error("Invalid authentication credentials")]
    InvalidToken,

    #[error("Could not fetch signing keys: {0}")]
    KeyFetch(String),
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::KeyFetch(msg) => {
                tracing::error!("JWKS fetch failed: {msg}");
                AppError::Unauthorized("Authentication failed".to_string())
            }
            other => AppError::Unauthorized(other.to_string()),
        }
    }
}

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub user_id: String,
    pub email: Option<String>,
    pub roles: Vec<String>,
    pub metadata: Value,
}

impl CurrentUser {
    pub fn has_any_role(&self, roles: &[&str]) -> bool {
        self.roles.iter().any(|r| roles.contains(&r.as_str()))
    }

    pub fn is_premium(&self) -> bool {
        self.has_any_role(PREMIUM_ROLES)
    }
}

/// Verifies a raw bearer token and returns the caller it belongs to.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<CurrentUser, AuthError>;
}

/// Pulls the token out of an `Authorization: Bearer <token>` header value.
fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|val| val.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing credentials".to_string()))?;

        let token = bearer_token(header)
            .ok_or_else(|| AppError::Unauthorized("Invalid authorization header".to_string()))?;

        let user = state.auth.verify(token).await?;
        if user.user_id.is_empty() {
            return Err(AppError::Unauthorized("Could not validate user".to_string()));
        }
        Ok(user)
    }
}

/// A caller holding the `premium` or `admin` role.
#[derive(Debug, Clone)]
pub struct PremiumUser(pub CurrentUser);

#[async_trait]
impl FromRequestParts<AppState> for PremiumUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_premium() {
            tracing::warn!("User {} lacks a premium role", user.user_id);
            return Err(AppError::Forbidden);
        }
        Ok(PremiumUser(user))
    }
}
