use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::TokenVerifier;
use crate::config::Config;
use crate::optimizer::ResumeOptimizer;
use crate::storage::BlobStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Resume file storage. S3/MinIO in production.
    pub storage: Arc<dyn BlobStore>,
    pub optimizer: ResumeOptimizer,
    /// Bearer token verifier. Clerk JWKS in production.
    pub auth: Arc<dyn TokenVerifier>,
    pub config: Config,
}
