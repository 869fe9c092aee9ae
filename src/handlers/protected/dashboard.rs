// handlers/protected/dashboard.rs - Backend data proxied on behalf of the caller
//
// GET /api/user                 → GET {API_URL}/api/user
// GET /api/invoices?search=...  → GET {API_URL}/api/invoices
use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::config::keys;
use crate::error::ApiError;
use crate::middleware::AuthSession;
use crate::state::AppState;

pub async fn user_get(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
) -> Result<Json<Value>, ApiError> {
    let config = state.live.snapshot().await;
    let api_url = config.require_url(keys::API_URL)?;

    let data = state
        .backend
        .get_json(api_url, "/api/user", &[], &session.access_token)
        .await?;
    Ok(Json(data))
}

#[derive(Debug, Default, Deserialize)]
pub struct InvoiceQuery {
    pub search: Option<String>,
}

/// The search term is forwarded only when non-empty.
pub async fn invoices_get(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
    Query(query): Query<InvoiceQuery>,
) -> Result<Json<Value>, ApiError> {
    let config = state.live.snapshot().await;
    let api_url = config.require_url(keys::API_URL)?;
    let search = query.search.unwrap_or_default();

    let data = state
        .backend
        .get_json(api_url, "/api/invoices", &[("search", search.as_str())], &session.access_token)
        .await?;
    Ok(Json(data))
}
