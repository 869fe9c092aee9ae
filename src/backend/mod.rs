use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum BackendUnavailableError {
    #[error("Backend responded with status: {0}")]
    Status(u16),

    #[error("Backend request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Backend returned an invalid body: {0}")]
    InvalidBody(String),

    #[error("Invalid backend URL: {0}")]
    Url(#[from] url::ParseError),
}

impl BackendUnavailableError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, BackendUnavailableError::Status(401))
    }
}

/// Thin JSON pass-through to the dashboard backend
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
}

impl BackendClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// GET `{base}{path}` with the caller's bearer token. Empty query values are dropped.
    pub async fn get_json(
        &self,
        base: &str,
        path: &str,
        query: &[(&str, &str)],
        bearer: &str,
    ) -> Result<Value, BackendUnavailableError> {
        let mut url = endpoint(base, path)?;
        let pairs: Vec<_> = query.iter().filter(|(_, v)| !v.is_empty()).collect();
        if !pairs.is_empty() {
            let mut serializer = url.query_pairs_mut();
            for (k, v) in pairs {
                serializer.append_pair(k, v);
            }
        }

        tracing::debug!("Proxying GET {}", url.path());
        let response = self.http.get(url).bearer_auth(bearer).send().await?;
        relay(response).await
    }

    /// POST `{base}{path}` without credentials. Used for hooks the backend authenticates itself.
    pub async fn post_json(
        &self,
        base: &str,
        path: &str,
        body: &Value,
    ) -> Result<Value, BackendUnavailableError> {
        let url = endpoint(base, path)?;
        tracing::debug!("Proxying POST {}", url.path());

        let response = self.http.post(url).json(body).send().await?;
        relay(response).await
    }
}

fn endpoint(base: &str, path: &str) -> Result<Url, url::ParseError> {
    Url::parse(&format!("{}{}", base.trim_end_matches('/'), path))
}

async fn relay(response: reqwest::Response) -> Result<Value, BackendUnavailableError> {
    let status = response.status();
    if !status.is_success() {
        if status == StatusCode::UNAUTHORIZED {
            tracing::debug!("Backend rejected bearer token");
        } else {
            tracing::warn!("Backend responded with status {}", status);
        }
        return Err(BackendUnavailableError::Status(status.as_u16()));
    }

    response
        .json()
        .await
        .map_err(|e| BackendUnavailableError::InvalidBody(e.to_string()))
}
