use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

use crate::config::{keys, LiveSnapshot, MissingConfig};

use super::verifier::IdentityRef;

/// Tokens are refreshed once they are within this many seconds of expiry.
pub const SAFETY_MARGIN_SECS: i64 = 300;

#[derive(Debug, Error)]
pub enum TokenRefreshError {
    #[error(transparent)]
    MissingConfig(#[from] MissingConfig),

    #[error("Failed to fetch management token: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to fetch management token: issuer responded with status {0}")]
    Status(u16),

    #[error("Failed to fetch management token: invalid response: {0}")]
    InvalidResponse(String),
}

/// Bearer token for the identity provider's management API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagementToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl ManagementToken {
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(SAFETY_MARGIN_SECS) < self.expires_at
    }
}

#[derive(Debug, Clone)]
pub struct ManagementCredentials {
    pub issuer: String,
    pub client_id: String,
    pub client_secret: String,
}

impl ManagementCredentials {
    pub fn from_live(config: &LiveSnapshot) -> Result<Self, MissingConfig> {
        Ok(Self {
            issuer: config.require_url(keys::AUTH0_ISSUER_BASE_URL)?.to_string(),
            client_id: config.require(keys::AUTH0_MANAGEMENT_CLIENT_ID)?.to_string(),
            client_secret: config.require(keys::AUTH0_MANAGEMENT_CLIENT_SECRET)?.to_string(),
        })
    }

    pub fn token_url(&self) -> String {
        format!("{}/oauth/token", self.issuer)
    }

    pub fn audience(&self) -> String {
        format!("{}/api/v2/", self.issuer)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Process-wide cache for the management token.
///
/// The lock is held across a refresh, so callers racing on an expired token
/// wait for the one in-flight request instead of issuing their own.
pub struct ManagementTokenCache {
    http: reqwest::Client,
    cached: Mutex<Option<ManagementToken>>,
}

impl ManagementTokenCache {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            cached: Mutex::new(None),
        }
    }

    pub async fn get_token(
        &self,
        credentials: &ManagementCredentials,
    ) -> Result<String, TokenRefreshError> {
        self.get_token_at(credentials, Utc::now()).await
    }

    /// Same as `get_token` with an explicit clock reading
    pub async fn get_token_at(
        &self,
        credentials: &ManagementCredentials,
        now: DateTime<Utc>,
    ) -> Result<String, TokenRefreshError> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref().filter(|t| t.is_usable_at(now)) {
            debug!("Using cached management token (expires {})", token.expires_at);
            return Ok(token.token.clone());
        }

        // On failure the stale entry stays put
        let fresh = self.request_token(credentials, now).await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    #[cfg(test)]
    async fn current(&self) -> Option<ManagementToken> {
        self.cached.lock().await.clone()
    }

    async fn request_token(
        &self,
        credentials: &ManagementCredentials,
        now: DateTime<Utc>,
    ) -> Result<ManagementToken, TokenRefreshError> {
        let response = self
            .http
            .post(credentials.token_url())
            .json(&json!({
                "grant_type": "client_credentials",
                "client_id": credentials.client_id,
                "client_secret": credentials.client_secret,
                "audience": credentials.audience(),
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("Management token request rejected with status {}", status);
            return Err(TokenRefreshError::Status(status.as_u16()));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| TokenRefreshError::InvalidResponse(e.to_string()))?;

        let expires_at = Duration::try_seconds(body.expires_in)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                let message = format!("expires_in out of range: {}", body.expires_in);
                TokenRefreshError::InvalidResponse(message)
            })?;
        info!("Obtained management token valid until {}", expires_at);

        Ok(ManagementToken {
            token: body.access_token,
            expires_at,
        })
    }
}

/// Per-request memo over the process cache.
///
/// Every consumer in one request sees the same token and at most one lookup
/// reaches `ManagementTokenCache`.
#[derive(Clone, Default)]
pub struct RequestScope {
    management_token: Arc<OnceCell<String>>,
}

impl RequestScope {
    pub async fn management_token(
        &self,
        cache: &ManagementTokenCache,
        credentials: &ManagementCredentials,
    ) -> Result<String, TokenRefreshError> {
        self.management_token
            .get_or_try_init(|| cache.get_token(credentials))
            .await
            .cloned()
    }
}

#[derive(Debug, Error)]
pub enum ManagementApiError {
    #[error("Management API request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Management API responded with status {status}: {message}")]
    Rejected { status: u16, message: String },
}

/// Body of a verification-email job
#[derive(Debug, Clone, Serialize)]
pub struct VerificationEmailJob {
    pub user_id: String,
    pub client_id: String,
    pub identity: IdentityRef,
}

/// Calls against the identity provider's management API
#[derive(Clone)]
pub struct ManagementApi {
    http: reqwest::Client,
}

impl ManagementApi {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Queue a verification email. A rejection carries the provider's status and message.
    pub async fn send_verification_email(
        &self,
        credentials: &ManagementCredentials,
        token: &str,
        job: &VerificationEmailJob,
    ) -> Result<Value, ManagementApiError> {
        let response = self
            .http
            .post(format!("{}/api/v2/jobs/verification-email", credentials.issuer))
            .bearer_auth(token)
            .json(job)
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);

        if !status.is_success() {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Failed to resend verification email")
                .to_string();
            warn!("Verification email for {} rejected: {} {}", job.user_id, status, message);
            return Err(ManagementApiError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        info!("Verification email queued for {}", job.user_id);
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn credentials(issuer: &str) -> ManagementCredentials {
        ManagementCredentials {
            issuer: issuer.to_string(),
            client_id: "mgmt-client".to_string(),
            client_secret: "mgmt-secret".to_string(),
        }
    }

    fn token_body(token: &str, expires_in: i64) -> String {
        json!({
            "access_token": token,
            "expires_in": expires_in,
            "scope": "update:users",
            "token_type": "Bearer"
        })
        .to_string()
    }

    #[test]
    fn token_usable_until_safety_margin() {
        let t = Utc::now();
        let token = ManagementToken {
            token: "tok".to_string(),
            expires_at: t + Duration::seconds(3600),
        };
        assert!(token.is_usable_at(t));
        assert!(token.is_usable_at(t + Duration::seconds(3299)));
        assert!(!token.is_usable_at(t + Duration::seconds(3300)));
        assert!(!token.is_usable_at(t + Duration::seconds(4000)));
    }

    #[tokio::test]
    async fn requests_client_credentials_grant() {
        let mut server = Server::new_async().await;
        let issuer = server.url();
        let mock = server
            .mock("POST", "/oauth/token")
            .match_body(Matcher::Json(json!({
                "grant_type": "client_credentials",
                "client_id": "mgmt-client",
                "client_secret": "mgmt-secret",
                "audience": format!("{}/api/v2/", issuer),
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(token_body("tok123", 3600))
            .expect(1)
            .create_async()
            .await;

        let cache = ManagementTokenCache::new(reqwest::Client::new());
        assert_eq!(cache.get_token(&credentials(&issuer)).await.unwrap(), "tok123");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn cached_token_reused_until_margin_then_refreshed() {
        let mut server = Server::new_async().await;
        let creds = credentials(&server.url());
        let first = server
            .mock("POST", "/oauth/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(token_body("tok123", 3600))
            .expect(1)
            .create_async()
            .await;

        let cache = ManagementTokenCache::new(reqwest::Client::new());
        let t = Utc::now();

        assert_eq!(cache.get_token_at(&creds, t).await.unwrap(), "tok123");
        assert_eq!(cache.get_token_at(&creds, t + Duration::seconds(60)).await.unwrap(), "tok123");
        let near_margin = cache.get_token_at(&creds, t + Duration::seconds(3299)).await;
        assert_eq!(near_margin.unwrap(), "tok123");
        first.assert_async().await;
        first.remove_async().await;

        let second = server
            .mock("POST", "/oauth/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(token_body("tok456", 3600))
            .expect(1)
            .create_async()
            .await;

        let at_margin = cache.get_token_at(&creds, t + Duration::seconds(3300)).await;
        assert_eq!(at_margin.unwrap(), "tok456");
        second.assert_async().await;
    }

    #[tokio::test]
    async fn failed_refresh_keeps_stale_token() {
        let mut server = Server::new_async().await;
        let creds = credentials(&server.url());
        let ok = server
            .mock("POST", "/oauth/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(token_body("tok123", 600))
            .create_async()
            .await;

        let cache = ManagementTokenCache::new(reqwest::Client::new());
        let t = Utc::now();
        cache.get_token_at(&creds, t).await.unwrap();
        ok.remove_async().await;

        let _unavailable = server
            .mock("POST", "/oauth/token")
            .with_status(503)
            .create_async()
            .await;

        let err = cache.get_token_at(&creds, t + Duration::seconds(400)).await.unwrap_err();
        assert!(matches!(err, TokenRefreshError::Status(503)));

        let stale = cache.current().await.unwrap();
        assert_eq!(stale.token, "tok123");
        assert_eq!(stale.expires_at, t + Duration::seconds(600));
    }

    #[tokio::test]
    async fn malformed_issuer_response_is_a_refresh_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/oauth/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"token_type":"Bearer"}"#)
            .create_async()
            .await;

        let cache = ManagementTokenCache::new(reqwest::Client::new());
        let err = cache.get_token(&credentials(&server.url())).await.unwrap_err();
        assert!(matches!(err, TokenRefreshError::InvalidResponse(_)));
        assert!(cache.current().await.is_none());
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_refresh() {
        let mut server = Server::new_async().await;
        let creds = credentials(&server.url());
        let mock = server
            .mock("POST", "/oauth/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(token_body("tok123", 3600))
            .expect(1)
            .create_async()
            .await;

        let cache = Arc::new(ManagementTokenCache::new(reqwest::Client::new()));
        let tasks: Vec<_> = (0..6)
            .map(|_| {
                let cache = cache.clone();
                let creds = creds.clone();
                tokio::spawn(async move { cache.get_token(&creds).await })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), "tok123");
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn request_scope_memoizes_within_a_request() {
        let mut server = Server::new_async().await;
        let creds = credentials(&server.url());
        let mock = server
            .mock("POST", "/oauth/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(token_body("tok123", 3600))
            .expect(1)
            .create_async()
            .await;

        let cache = ManagementTokenCache::new(reqwest::Client::new());
        let scope = RequestScope::default();
        let (a, b) = tokio::join!(
            scope.management_token(&cache, &creds),
            scope.management_token(&cache, &creds)
        );
        assert_eq!(a.unwrap(), "tok123");
        assert_eq!(b.unwrap(), "tok123");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn credentials_come_from_live_config() {
        let live = crate::config::LiveConfig::from_map(
            [
                ("AUTH0_ISSUER_BASE_URL", "https://tenant.example.com/"),
                ("AUTH0_MANAGEMENT_CLIENT_ID", "id"),
                ("AUTH0_MANAGEMENT_CLIENT_SECRET", "secret"),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        );
        let creds = ManagementCredentials::from_live(&live.snapshot().await).unwrap();
        assert_eq!(creds.token_url(), "https://tenant.example.com/oauth/token");
        assert_eq!(creds.audience(), "https://tenant.example.com/api/v2/");

        let empty = crate::config::LiveConfig::default().snapshot().await;
        assert!(ManagementCredentials::from_live(&empty).is_err());
    }

    #[tokio::test]
    async fn huge_token_lifetime_is_rejected_without_caching() {
        let mut server = Server::new_async().await;
        let creds = credentials(&server.url());
        let huge = server
            .mock("POST", "/oauth/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(token_body("tok", 1_000_000_000_000_000))
            .create_async()
            .await;

        let cache = Arc::new(ManagementTokenCache::new(reqwest::Client::new()));
        let task = {
            let cache = cache.clone();
            let creds = creds.clone();
            tokio::spawn(async move { cache.get_token(&creds).await })
        };
        let err = task.await.expect("refresh task panicked").unwrap_err();
        assert!(matches!(err, TokenRefreshError::InvalidResponse(_)));
        assert!(cache.current().await.is_none());
        huge.remove_async().await;

        // The lock is free again and a sane response is cached
        let _ok = server
            .mock("POST", "/oauth/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(token_body("tok123", 3600))
            .create_async()
            .await;
        assert_eq!(cache.get_token(&creds).await.unwrap(), "tok123");
    }

    fn job() -> VerificationEmailJob {
        VerificationEmailJob {
            user_id: "google-oauth2|1234".to_string(),
            client_id: "web-client".to_string(),
            identity: IdentityRef {
                user_id: Some("1234".to_string()),
                provider: Some("google-oauth2".to_string()),
            },
        }
    }

    #[tokio::test]
    async fn verification_email_job_is_posted_with_token() {
        let mut server = Server::new_async().await;
        let creds = credentials(&server.url());
        let mock = server
            .mock("POST", "/api/v2/jobs/verification-email")
            .match_header("authorization", "Bearer mgmt-token")
            .match_body(Matcher::Json(json!({
                "user_id": "google-oauth2|1234",
                "client_id": "web-client",
                "identity": { "user_id": "1234", "provider": "google-oauth2" }
            })))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"pending","id":"job_1"}"#)
            .create_async()
            .await;

        let api = ManagementApi::new(reqwest::Client::new());
        let body = api.send_verification_email(&creds, "mgmt-token", &job()).await.unwrap();
        assert_eq!(body["id"], "job_1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn verification_email_rejection_keeps_status_and_message() {
        let mut server = Server::new_async().await;
        let creds = credentials(&server.url());
        let _not_found = server
            .mock("POST", "/api/v2/jobs/verification-email")
            .with_status(404)
            .with_header("content-type", "application/json")
            .with_body(r#"{"statusCode":404,"message":"The user does not exist."}"#)
            .create_async()
            .await;

        let api = ManagementApi::new(reqwest::Client::new());
        let err = api.send_verification_email(&creds, "t", &job()).await.unwrap_err();
        match err {
            ManagementApiError::Rejected { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "The user does not exist.");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn verification_email_rejection_without_body_has_default_message() {
        let mut server = Server::new_async().await;
        let creds = credentials(&server.url());
        let _bad_gateway = server
            .mock("POST", "/api/v2/jobs/verification-email")
            .with_status(502)
            .create_async()
            .await;

        let api = ManagementApi::new(reqwest::Client::new());
        let err = api.send_verification_email(&creds, "t", &job()).await.unwrap_err();
        match err {
            ManagementApiError::Rejected { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "Failed to resend verification email");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
