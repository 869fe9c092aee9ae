// handlers/public/health.rs - GET /health
use axum::Json;
use serde_json::{json, Value};

/// Liveness check. Never touches the secret store.
pub async fn health_get() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
