// handlers/protected/session.rs - GET /api/auth/me
use axum::{Extension, Json};

use crate::auth::SessionUser;
use crate::error::ApiError;
use crate::middleware::AuthSession;

/// Profile of the signed-in user. Bearer-only callers carry no profile and get a 401.
pub async fn me_get(
    Extension(session): Extension<AuthSession>,
) -> Result<Json<SessionUser>, ApiError> {
    session
        .user
        .map(Json)
        .ok_or_else(|| ApiError::unauthorized("Not authenticated"))
}
