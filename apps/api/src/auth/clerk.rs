//! Clerk session-token verification against the instance's JWKS.

use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::auth::{AuthError, CurrentUser, TokenVerifier};

const JWKS_TIMEOUT_SECS: u64 = 10;
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct ClerkClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default)]
    user_metadata: Value,
}

/// RS256 verifier with an in-memory JWKS cache.
///
/// The key set is fetched on first use and refetched once whenever a token names a `kid`
/// the cache does not know (key rotation). Refetches are at most one per minimum interval.
pub struct ClerkVerifier {
    client: Client,
    jwks_url: String,
    validation: Validation,
    jwks: RwLock<Option<JwkSet>>,
    last_refresh: Mutex<Option<Instant>>,
    min_refresh_interval: Duration,
}

impl ClerkVerifier {
    pub fn new(jwks_url: String, issuer: &str, audience: &str) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(JWKS_TIMEOUT_SECS))
            .build()
            .map_err(|e| AuthError::KeyFetch(e.to_string()))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[audience]);

        Ok(Self {
            client,
            jwks_url,
            validation,
            jwks: RwLock::new(None),
            last_refresh: Mutex::new(None),
            min_refresh_interval: MIN_REFRESH_INTERVAL,
        })
    }

    /// Seeds the cache, skipping the first fetch.
    pub fn with_jwks(mut self, jwks: JwkSet) -> Self {
        self.jwks = RwLock::new(Some(jwks));
        self
    }

    #[cfg(test)]
    fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Records a refresh attempt. False when the previous one is too recent.
    fn claim_refresh(&self) -> bool {
        let mut last = self.last_refresh.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        if let Some(prev) = *last {
            if now.duration_since(prev) < self.min_refresh_interval {
                return false;
            }
        }
        *last = Some(now);
        true
    }

    async fn fetch_jwks(&self) -> Result<JwkSet, AuthError> {
        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AuthError::KeyFetch(e.to_string()))?;

        let jwks: JwkSet = response
            .json()
            .await
            .map_err(|e| AuthError::KeyFetch(e.to_string()))?;
        info!("Fetched {} signing keys from JWKS", jwks.keys.len());
        Ok(jwks)
    }

    async fn cached_key(&self, kid: &str) -> Result<Option<DecodingKey>, AuthError> {
        let guard = self.jwks.read().await;
        match guard.as_ref().and_then(|set| set.find(kid)) {
            Some(jwk) => DecodingKey::from_jwk(jwk)
                .map(Some)
                .map_err(|_| AuthError::UnknownKey),
            None => Ok(None),
        }
    }

    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        if let Some(key) = self.cached_key(kid).await? {
            return Ok(key);
        }

        let had_cache = self.jwks.read().await.is_some();
        if !self.claim_refresh() && had_cache {
            debug!("Signing key {kid} not cached, JWKS refreshed too recently");
            return Err(AuthError::UnknownKey);
        }
        debug!("Signing key {kid} not cached, refreshing JWKS");
        match self.fetch_jwks().await {
            Ok(fresh) => *self.jwks.write().await = Some(fresh),
            Err(e) if had_cache => {
                warn!("JWKS refresh failed, keeping cached keys: {e}");
                return Err(AuthError::UnknownKey);
            }
            Err(e) => return Err(e),
        }

        self.cached_key(kid).await?.ok_or(AuthError::UnknownKey)
    }
}

#[async_trait]
impl TokenVerifier for ClerkVerifier {
    async fn verify(&self, token: &str) -> Result<CurrentUser, AuthError> {
        let header = decode_header(token).map_err(|_| AuthError::InvalidToken)?;
        let kid = header.kid.ok_or(AuthError::UnknownKey)?;
        let key = self.decoding_key(&kid).await?;

        let data = decode::<ClerkClaims>(token, &key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                ErrorKind::InvalidAudience
                | ErrorKind::InvalidIssuer
                | ErrorKind::ImmatureSignature
                | ErrorKind::MissingRequiredClaim(_) => AuthError::InvalidClaims,
                _ => AuthError::InvalidToken,
            }
        })?;

        let claims = data.claims;
        Ok(CurrentUser {
            user_id: claims.sub,
            email: claims.email,
            roles: claims.roles,
            metadata: claims.user_metadata,
        })
    }
}
