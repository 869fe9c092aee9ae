// handlers/public/hook.rs - POST /api/hook/user
use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::keys;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UserHookRequest {
    pub user: Value,
    #[serde(default)]
    pub secret: Option<String>,
}

/// Relay an identity-provider user hook to the backend. The backend checks the shared secret.
pub async fn hook_user_post(
    State(state): State<AppState>,
    payload: Result<Json<UserHookRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(payload) = payload?;

    let config = state.live.snapshot().await;
    let api_url = config.require_url(keys::API_URL)?;

    let body = json!({
        "user": payload.user,
        "secret": payload.secret,
    });

    let data = state.backend.post_json(api_url, "/hook/user", &body).await?;
    Ok(Json(data))
}
