// handlers/public/verification.rs - Email verification endpoints
//
// POST /api/verify-token         decode a verification link token
// POST /api/resend-verification  ask the identity provider to resend the email
use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::auth::{
    verify_and_decode_token, IdentityRef, ManagementCredentials, RequestScope, VerificationClaims,
    VerificationEmailJob,
};
use crate::config::keys;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct VerifyTokenRequest {
    #[serde(default)]
    pub token: Option<String>,
}

/// POST /api/verify-token
///
/// Returns the decoded claims on success. A missing or empty token is a 400;
/// any verification failure is a 401 carrying the verifier's message.
pub async fn verify_token_post(
    State(state): State<AppState>,
    payload: Result<Json<VerifyTokenRequest>, JsonRejection>,
) -> Result<Json<VerificationClaims>, ApiError> {
    let Json(payload) = payload?;
    let token = payload
        .token
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Token is required"))?;

    let config = state.live.snapshot().await;
    let claims = verify_and_decode_token(&token, &config)?;

    tracing::info!("Verification token accepted for {}", claims.sub);
    Ok(Json(claims))
}

#[derive(Debug, Deserialize)]
pub struct ResendVerificationRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub identity: Option<IdentityRef>,
}

/// POST /api/resend-verification
///
/// Creates a verification-email job on the identity provider's management API.
/// Provider rejections are relayed with their status and message.
pub async fn resend_verification_post(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
    payload: Result<Json<ResendVerificationRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(payload) = payload?;

    let user_id = payload
        .user_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("User ID is required"))?;
    let identity = payload
        .identity
        .filter(|identity| identity.provider.as_deref().is_some_and(|p| !p.is_empty()))
        .ok_or_else(|| ApiError::bad_request("Identity provider is required"))?;

    let config = state.live.snapshot().await;
    let credentials = ManagementCredentials::from_live(&config)?;
    let job = VerificationEmailJob {
        user_id,
        client_id: config.require(keys::AUTH0_CLIENT_ID)?.to_string(),
        identity,
    };

    let token = scope.management_token(&state.management, &credentials).await?;
    let body = state
        .management_api
        .send_verification_email(&credentials, &token, &job)
        .await?;

    Ok(Json(body))
}
