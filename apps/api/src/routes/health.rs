use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::routes::API_PREFIX;
use crate::state::AppState;

/// GET /health
/// Returns a simple status object with service version.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "app_name": state.config.app_name,
        "version": env!("CARGO_PKG_VERSION"),
        "api_version": API_PREFIX,
    }))
}
