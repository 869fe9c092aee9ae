// handlers/public/auth.rs - Hosted login flow
//
// GET /api/auth/login     start authorization-code + PKCE login
// GET /api/auth/callback  finish login and set the session cookie
// GET /api/auth/logout    clear the session and leave via the provider
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::Redirect,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, PrivateCookieJar, SameSite};
use serde::Deserialize;

use crate::auth::oidc::{self, OidcSettings, Pkce};
use crate::auth::session::{self, LoginTransaction, SESSION_COOKIE, TRANSACTION_COOKIE};
use crate::auth::{SessionClaims, SessionError};
use crate::config::keys;
use crate::error::ApiError;
use crate::state::AppState;

fn http_only_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

fn removal(name: &'static str) -> Cookie<'static> {
    Cookie::build(name).path("/").build()
}

/// GET /api/auth/login
pub async fn login_get(
    State(state): State<AppState>,
) -> Result<(PrivateCookieJar, Redirect), ApiError> {
    let config = state.live.snapshot().await;
    let settings = OidcSettings::from_live(&config)?;
    let secret = config.get(keys::AUTH0_SECRET).ok_or(SessionError::MissingSecret)?;

    let pkce = Pkce::generate();
    let login_state = oidc::new_state();
    let authorize_url = settings.authorize_url(&login_state, &pkce.challenge)?;

    let transaction = LoginTransaction::new(login_state, pkce.verifier);
    let sealed = session::seal(&transaction, secret)?;

    let jar = PrivateCookieJar::new(session::cookie_key(secret)?).add(http_only_cookie(
        TRANSACTION_COOKIE,
        sealed,
        state.config.security.secure_cookies,
    ));

    Ok((jar, Redirect::to(authorize_url.as_str())))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// GET /api/auth/callback
pub async fn callback_get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> Result<(PrivateCookieJar, Redirect), ApiError> {
    if let Some(error) = query.error {
        tracing::warn!("Identity provider returned login error: {}", error);
        return Err(ApiError::unauthorized(query.error_description.unwrap_or(error)));
    }

    let code = query
        .code
        .ok_or_else(|| ApiError::bad_request("Missing authorization code"))?;
    let returned_state = query
        .state
        .ok_or_else(|| ApiError::bad_request("Missing state parameter"))?;

    let config = state.live.snapshot().await;
    let settings = OidcSettings::from_live(&config)?;
    let secret = config.get(keys::AUTH0_SECRET).ok_or(SessionError::MissingSecret)?;
    let jar = PrivateCookieJar::from_headers(&headers, session::cookie_key(secret)?);

    // Tampered or foreign cookies fail to decrypt and read as absent
    let transaction: LoginTransaction = match jar.get(TRANSACTION_COOKIE) {
        Some(cookie) => session::open(cookie.value(), secret)?,
        None => return Err(ApiError::unauthorized("Login session not found")),
    };

    if transaction.state != returned_state {
        tracing::warn!("Login callback state mismatch");
        return Err(ApiError::unauthorized("Invalid login state"));
    }

    let exchange =
        oidc::exchange_code(&state.http, &settings, &code, &transaction.code_verifier).await?;
    let user = oidc::fetch_userinfo(&state.http, &settings, &exchange.access_token).await?;

    let claims = SessionClaims::new(
        user,
        exchange.access_token,
        exchange.expires_in,
        state.config.security.session_ttl_hours,
    )?;
    let sealed = session::seal(&claims, secret)?;

    tracing::info!("Login completed for {}", claims.user.sub);

    let jar = jar.remove(removal(TRANSACTION_COOKIE)).add(http_only_cookie(
        SESSION_COOKIE,
        sealed,
        state.config.security.secure_cookies,
    ));

    Ok((jar, Redirect::to("/")))
}

/// GET /api/auth/logout
pub async fn logout_get(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), ApiError> {
    let config = state.live.snapshot().await;
    let settings = OidcSettings::from_live(&config)?;
    let logout_url = settings.logout_url()?;

    Ok((jar.remove(removal(SESSION_COOKIE)), Redirect::to(logout_url.as_str())))
}
