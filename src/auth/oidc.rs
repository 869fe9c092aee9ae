// Authorization-code login against the identity provider.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::config::{keys, LiveSnapshot, MissingConfig};

use super::session::SessionUser;

const DEFAULT_SCOPE: &str = "openid profile email";

#[derive(Debug, Error)]
pub enum OidcError {
    #[error(transparent)]
    MissingConfig(#[from] MissingConfig),

    #[error("Invalid identity provider URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Identity provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Identity provider rejected the request with status {0}")]
    Rejected(u16),

    #[error("Identity provider returned an invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone)]
pub struct OidcSettings {
    pub issuer: String,
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub audience: Option<String>,
    pub scope: String,
}

impl OidcSettings {
    pub fn from_live(config: &LiveSnapshot) -> Result<Self, MissingConfig> {
        Ok(Self {
            issuer: config.require_url(keys::AUTH0_ISSUER_BASE_URL)?.to_string(),
            base_url: config.require_url(keys::AUTH0_BASE_URL)?.to_string(),
            client_id: config.require(keys::AUTH0_CLIENT_ID)?.to_string(),
            client_secret: config.require(keys::AUTH0_CLIENT_SECRET)?.to_string(),
            audience: config.get(keys::AUTH0_AUDIENCE).map(str::to_string),
            scope: config.get(keys::AUTH0_SCOPE).unwrap_or(DEFAULT_SCOPE).to_string(),
        })
    }

    pub fn redirect_uri(&self) -> String {
        format!("{}/api/auth/callback", self.base_url)
    }

    pub fn authorize_url(&self, state: &str, code_challenge: &str) -> Result<Url, OidcError> {
        let mut url = Url::parse(&format!("{}/authorize", self.issuer))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.client_id)
                .append_pair("redirect_uri", &self.redirect_uri())
                .append_pair("scope", &self.scope)
                .append_pair("state", state)
                .append_pair("code_challenge", code_challenge)
                .append_pair("code_challenge_method", "S256");
            if let Some(audience) = &self.audience {
                query.append_pair("audience", audience);
            }
        }
        Ok(url)
    }

    pub fn logout_url(&self) -> Result<Url, OidcError> {
        let mut url = Url::parse(&format!("{}/v2/logout", self.issuer))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("returnTo", &self.base_url);
        Ok(url)
    }
}

/// PKCE verifier/challenge pair (S256)
#[derive(Debug, Clone)]
pub struct Pkce {
    pub verifier: String,
    pub challenge: String,
}

impl Pkce {
    pub fn generate() -> Self {
        let verifier = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        let challenge = challenge_for(&verifier);
        Self { verifier, challenge }
    }
}

pub fn challenge_for(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

pub fn new_state() -> String {
    Uuid::new_v4().simple().to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CodeExchange {
    pub access_token: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
}

fn default_expires_in() -> i64 {
    86_400
}

/// Trade an authorization code for tokens
pub async fn exchange_code(
    http: &reqwest::Client,
    settings: &OidcSettings,
    code: &str,
    code_verifier: &str,
) -> Result<CodeExchange, OidcError> {
    let redirect_uri = settings.redirect_uri();
    let response = http
        .post(format!("{}/oauth/token", settings.issuer))
        .form(&[
            ("grant_type", "authorization_code"),
            ("client_id", settings.client_id.as_str()),
            ("client_secret", settings.client_secret.as_str()),
            ("code", code),
            ("code_verifier", code_verifier),
            ("redirect_uri", redirect_uri.as_str()),
        ])
        .send()
        .await?;

    if !response.status().is_success() {
        tracing::warn!("Authorization code exchange rejected with status {}", response.status());
        return Err(OidcError::Rejected(response.status().as_u16()));
    }

    let exchange: CodeExchange = response
        .json()
        .await
        .map_err(|e| OidcError::InvalidResponse(e.to_string()))?;

    let in_range = Duration::try_seconds(exchange.expires_in)
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .is_some();
    if !in_range {
        return Err(OidcError::InvalidResponse(format!(
            "expires_in out of range: {}",
            exchange.expires_in
        )));
    }

    Ok(exchange)
}

pub async fn fetch_userinfo(
    http: &reqwest::Client,
    settings: &OidcSettings,
    access_token: &str,
) -> Result<SessionUser, OidcError> {
    let response = http
        .get(format!("{}/userinfo", settings.issuer))
        .bearer_auth(access_token)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(OidcError::Rejected(response.status().as_u16()));
    }

    response
        .json()
        .await
        .map_err(|e| OidcError::InvalidResponse(e.to_string()))
}
