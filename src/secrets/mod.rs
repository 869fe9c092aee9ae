// Secret bundle bootstrap.
//
// A named bundle is pulled from the secret store at most once per process and
// layered over the live configuration. Later calls replay the cached bundle
// without touching the network.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{error, info};

use crate::config::LiveConfig;

pub mod aws;

pub use aws::AwsSecretStore;

/// Flat configuration bundle as stored in the secret store
pub type SecretBundle = HashMap<String, String>;

#[derive(Debug, Error)]
pub enum ConfigFetchError {
    #[error("secret store request for '{name}' failed: {message}")]
    Store { name: String, message: String },

    #[error("secret '{0}' has no string value")]
    MissingSecret(String),

    #[error("secret '{name}' is not a flat JSON object of strings: {message}")]
    Malformed { name: String, message: String },

    #[error("secret store did not answer within {0:?}")]
    Timeout(Duration),

    #[error("no secret store is configured")]
    Disabled,
}

/// Source of named secret strings
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn fetch_secret_string(&self, name: &str) -> Result<String, ConfigFetchError>;
}

/// Store used when no remote source is configured. Every fetch fails.
pub struct DisabledSecretStore;

#[async_trait]
impl SecretStore for DisabledSecretStore {
    async fn fetch_secret_string(&self, _name: &str) -> Result<String, ConfigFetchError> {
        Err(ConfigFetchError::Disabled)
    }
}

/// Parse a secret string into a flat key/value bundle.
pub fn parse_bundle(name: &str, raw: &str) -> Result<SecretBundle, ConfigFetchError> {
    let malformed = |message: String| ConfigFetchError::Malformed {
        name: name.to_string(),
        message,
    };

    let value: Value = serde_json::from_str(raw).map_err(|e| malformed(e.to_string()))?;
    let Value::Object(object) = value else {
        return Err(malformed("expected a JSON object".to_string()));
    };

    object
        .into_iter()
        .map(|(key, value)| match value {
            Value::String(s) => Ok((key, s)),
            other => Err(malformed(format!("value for '{}' is not a string: {}", key, other))),
        })
        .collect()
}

/// Process-wide cache of the configuration bundle
pub struct SecretsCache {
    store: Arc<dyn SecretStore>,
    secret_name: String,
    required_key: String,
    timeout: Duration,
    cached: OnceCell<Arc<SecretBundle>>,
}

impl SecretsCache {
    pub fn new(
        store: Arc<dyn SecretStore>,
        secret_name: impl Into<String>,
        required_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            secret_name: secret_name.into(),
            required_key: required_key.into(),
            timeout,
            cached: OnceCell::new(),
        }
    }

    pub fn secret_name(&self) -> &str {
        &self.secret_name
    }

    pub fn cached(&self) -> Option<&SecretBundle> {
        self.cached.get().map(|bundle| bundle.as_ref())
    }

    /// Make sure live configuration carries the secret bundle.
    ///
    /// Safe to call at the top of every request. Concurrent first calls share
    /// one fetch; a failed fetch leaves the cache empty so the next call retries.
    pub async fn ensure_environment_initialized(
        &self,
        live: &LiveConfig,
    ) -> Result<(), ConfigFetchError> {
        if let Some(bundle) = self.cached.get() {
            live.apply(bundle).await;
            return Ok(());
        }

        if live.contains(&self.required_key).await {
            return Ok(());
        }

        let bundle = self.cached.get_or_try_init(|| self.fetch()).await?;
        live.apply(bundle).await;
        Ok(())
    }

    async fn fetch(&self) -> Result<Arc<SecretBundle>, ConfigFetchError> {
        info!("Fetching configuration bundle '{}'", self.secret_name);

        let fetch = self.store.fetch_secret_string(&self.secret_name);
        let raw = tokio::time::timeout(self.timeout, fetch)
            .await
            .map_err(|_| ConfigFetchError::Timeout(self.timeout))?
            .map_err(|e| {
                error!("Failed to fetch configuration bundle: {}", e);
                e
            })?;

        let bundle = parse_bundle(&self.secret_name, &raw)?;
        info!("Loaded {} configuration keys from '{}'", bundle.len(), self.secret_name);
        Ok(Arc::new(bundle))
    }
}
