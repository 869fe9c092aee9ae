use axum_extra::extract::cookie::Key;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use thiserror::Error;

/// Cookie holding the signed login session
pub const SESSION_COOKIE: &str = "app_session";
/// Cookie holding state + PKCE verifier between login and callback
pub const TRANSACTION_COOKIE: &str = "auth_txn";
/// Login transactions older than this are rejected at callback
pub const TRANSACTION_TTL_MINUTES: i64 = 10;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Not authenticated")]
    Missing,

    #[error("Session secret is not configured")]
    MissingSecret,

    #[error("Session expired")]
    Expired,

    #[error("Access token expired, please log in again")]
    AccessTokenExpired,

    #[error("Invalid session: {0}")]
    Invalid(String),

    #[error("Failed to sign session: {0}")]
    Signing(String),

    #[error("Session lifetime is out of range")]
    Lifetime,
}

/// User details exposed to the dashboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    #[serde(flatten)]
    pub user: SessionUser,
    pub access_token: String,
    pub access_token_expires_at: i64,
    pub iat: i64,
    pub exp: i64,
}

impl SessionClaims {
    pub fn new(
        user: SessionUser,
        access_token: String,
        access_token_ttl_secs: i64,
        session_ttl_hours: u64,
    ) -> Result<Self, SessionError> {
        let now = Utc::now();
        let session_ttl = i64::try_from(session_ttl_hours)
            .ok()
            .and_then(Duration::try_hours);

        Ok(Self {
            user,
            access_token,
            access_token_expires_at: expiry(now, Duration::try_seconds(access_token_ttl_secs))?,
            iat: now.timestamp(),
            exp: expiry(now, session_ttl)?,
        })
    }

    pub fn access_token_expired(&self) -> bool {
        Utc::now().timestamp() >= self.access_token_expires_at
    }
}

/// State carried from `/api/auth/login` to `/api/auth/callback`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginTransaction {
    pub state: String,
    pub code_verifier: String,
    pub exp: i64,
}

impl LoginTransaction {
    pub fn new(state: String, code_verifier: String) -> Self {
        Self {
            state,
            code_verifier,
            exp: (Utc::now() + Duration::minutes(TRANSACTION_TTL_MINUTES)).timestamp(),
        }
    }
}

fn expiry(now: DateTime<Utc>, ttl: Option<Duration>) -> Result<i64, SessionError> {
    ttl.and_then(|ttl| now.checked_add_signed(ttl))
        .map(|at| at.timestamp())
        .ok_or(SessionError::Lifetime)
}

/// Encryption key for the session cookies, derived from the session secret.
///
/// Cookie values are sealed JWTs wrapped in an encrypted private cookie, so the
/// provider's access token never reaches the browser in readable form.
pub fn cookie_key(secret: &str) -> Result<Key, SessionError> {
    if secret.is_empty() {
        return Err(SessionError::MissingSecret);
    }
    Key::try_from(Sha512::digest(secret.as_bytes()).as_slice())
        .map_err(|e| SessionError::Signing(e.to_string()))
}

/// Sign `claims` into a cookie value. `claims` must carry `exp`.
pub fn seal<T: Serialize>(claims: &T, secret: &str) -> Result<String, SessionError> {
    if secret.is_empty() {
        return Err(SessionError::MissingSecret);
    }
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| SessionError::Signing(e.to_string()))
}

pub fn open<T: DeserializeOwned>(value: &str, secret: &str) -> Result<T, SessionError> {
    if secret.is_empty() {
        return Err(SessionError::MissingSecret);
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    decode::<T>(value, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => SessionError::Expired,
            _ => SessionError::Invalid(e.to_string()),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "session-secret";

    fn user() -> SessionUser {
        SessionUser {
            sub: "auth0|worker-1".to_string(),
            email: Some("worker@example.com".to_string()),
            name: Some("Worker One".to_string()),
        }
    }

    #[test]
    fn session_round_trip() {
        let claims = SessionClaims::new(user(), "at-1".to_string(), 3600, 24).unwrap();
        let sealed = seal(&claims, SECRET).unwrap();
        let opened: SessionClaims = open(&sealed, SECRET).unwrap();
        assert_eq!(opened, claims);
        assert!(!opened.access_token_expired());
    }

    #[test]
    fn session_with_wrong_secret_is_invalid() {
        let claims = SessionClaims::new(user(), "at-1".to_string(), 3600, 24).unwrap();
        let sealed = seal(&claims, SECRET).unwrap();
        let result: Result<SessionClaims, _> = open(&sealed, "other");
        assert!(matches!(result, Err(SessionError::Invalid(_))));
    }

    #[test]
    fn expired_session_is_rejected() {
        let mut claims = SessionClaims::new(user(), "at-1".to_string(), 3600, 24).unwrap();
        claims.exp = Utc::now().timestamp() - 10;
        let sealed = seal(&claims, SECRET).unwrap();
        let result: Result<SessionClaims, _> = open(&sealed, SECRET);
        assert!(matches!(result, Err(SessionError::Expired)));
    }

    #[test]
    fn access_token_expiry_is_tracked_separately() {
        let claims = SessionClaims::new(user(), "at-1".to_string(), -1, 24).unwrap();
        assert!(claims.access_token_expired());
    }

    #[test]
    fn transaction_round_trip() {
        let txn = LoginTransaction::new("state-1".to_string(), "verifier-1".to_string());
        let sealed = seal(&txn, SECRET).unwrap();
        assert_eq!(open::<LoginTransaction>(&sealed, SECRET).unwrap(), txn);
    }

    #[test]
    fn missing_secret_is_reported() {
        let claims = SessionClaims::new(user(), "at-1".to_string(), 3600, 24).unwrap();
        assert!(matches!(seal(&claims, ""), Err(SessionError::MissingSecret)));
        assert!(matches!(open::<SessionClaims>("x.y.z", ""), Err(SessionError::MissingSecret)));
    }

    #[test]
    fn out_of_range_lifetimes_are_errors() {
        let huge_access = SessionClaims::new(user(), "at-1".to_string(), 1_000_000_000_000_000, 24);
        assert!(matches!(huge_access, Err(SessionError::Lifetime)));

        let huge_session = SessionClaims::new(user(), "at-1".to_string(), 3600, u64::MAX);
        assert!(matches!(huge_session, Err(SessionError::Lifetime)));
    }

    #[test]
    fn cookie_key_is_stable_per_secret() {
        let a = cookie_key(SECRET).unwrap();
        let b = cookie_key(SECRET).unwrap();
        let other = cookie_key("other").unwrap();
        assert_eq!(a.master(), b.master());
        assert_ne!(a.master(), other.master());
        assert!(matches!(cookie_key(""), Err(SessionError::MissingSecret)));
    }
}
