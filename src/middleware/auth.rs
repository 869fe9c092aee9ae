use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{CookieJar, PrivateCookieJar};

use crate::auth::session::{self, SessionClaims, SessionError, SessionUser, SESSION_COOKIE};
use crate::config::keys;
use crate::error::ApiError;
use crate::state::AppState;

/// Authenticated caller, extracted from the session cookie or a bearer header
#[derive(Clone, Debug)]
pub struct AuthSession {
    pub access_token: String,
    /// Present only for cookie sessions
    pub user: Option<SessionUser>,
}

impl From<SessionClaims> for AuthSession {
    fn from(claims: SessionClaims) -> Self {
        Self {
            access_token: claims.access_token,
            user: Some(claims.user),
        }
    }
}

/// Session middleware for protected routes
pub async fn session_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let has_session_cookie = CookieJar::from_headers(request.headers())
        .get(SESSION_COOKIE)
        .is_some();

    let session = if has_session_cookie {
        let config = state.live.snapshot().await;
        let secret = config.get(keys::AUTH0_SECRET).ok_or(SessionError::MissingSecret)?;
        let jar = PrivateCookieJar::from_headers(request.headers(), session::cookie_key(secret)?);
        let cookie = jar.get(SESSION_COOKIE).ok_or_else(|| {
            SessionError::Invalid("session cookie could not be decrypted".to_string())
        })?;

        let claims: SessionClaims = session::open(cookie.value(), secret)?;
        if claims.access_token_expired() {
            return Err(SessionError::AccessTokenExpired.into());
        }
        AuthSession::from(claims)
    } else {
        let token =
            extract_bearer_from_headers(request.headers()).map_err(ApiError::unauthorized)?;
        AuthSession {
            access_token: token,
            user: None,
        }
    };

    tracing::debug!(
        "Session resolved for {}",
        session.user.as_ref().map(|u| u.sub.as_str()).unwrap_or("bearer client")
    );
    request.extensions_mut().insert(session);

    Ok(next.run(request).await)
}

/// Extract bearer token from Authorization header
fn extract_bearer_from_headers(headers: &HeaderMap) -> Result<String, String> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| SessionError::Missing.to_string())?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    if let Some(token) = auth_str.strip_prefix("Bearer ") {
        if token.trim().is_empty() {
            return Err("Empty bearer token".to_string());
        }
        Ok(token.trim().to_string())
    } else {
        Err("Authorization header must use Bearer token format".to_string())
    }
}
