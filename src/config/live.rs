// Live configuration: process environment plus any secret bundle layered on top.
//
// Values are never mutated in place. Applying a bundle builds a new map and
// swaps it in, so readers always see a complete snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;

/// Configuration keys read at request time.
pub mod keys {
    pub const AUTH0_SECRET: &str = "AUTH0_SECRET";
    pub const AUTH0_ISSUER_BASE_URL: &str = "AUTH0_ISSUER_BASE_URL";
    pub const AUTH0_BASE_URL: &str = "AUTH0_BASE_URL";
    pub const AUTH0_CLIENT_ID: &str = "AUTH0_CLIENT_ID";
    pub const AUTH0_CLIENT_SECRET: &str = "AUTH0_CLIENT_SECRET";
    pub const AUTH0_AUDIENCE: &str = "AUTH0_AUDIENCE";
    pub const AUTH0_SCOPE: &str = "AUTH0_SCOPE";
    pub const AUTH0_MANAGEMENT_CLIENT_ID: &str = "AUTH0_MANAGEMENT_CLIENT_ID";
    pub const AUTH0_MANAGEMENT_CLIENT_SECRET: &str = "AUTH0_MANAGEMENT_CLIENT_SECRET";
    pub const MY_REDIRECT_SECRET: &str = "MY_REDIRECT_SECRET";
    pub const API_URL: &str = "API_URL";
}

#[derive(Debug, Error)]
#[error("Missing configuration: {0}")]
pub struct MissingConfig(pub &'static str);

#[derive(Debug, Clone, Default)]
pub struct LiveConfig {
    values: Arc<RwLock<Arc<HashMap<String, String>>>>,
}

/// Immutable view of the live configuration at one point in time
#[derive(Debug, Clone)]
pub struct LiveSnapshot(Arc<HashMap<String, String>>);

impl LiveConfig {
    /// Seed from the current process environment
    pub fn from_env() -> Self {
        Self::from_map(std::env::vars().collect())
    }

    pub fn from_map(values: HashMap<String, String>) -> Self {
        Self {
            values: Arc::new(RwLock::new(Arc::new(values))),
        }
    }

    pub async fn snapshot(&self) -> LiveSnapshot {
        LiveSnapshot(self.values.read().await.clone())
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.snapshot().await.get(key).map(str::to_string)
    }

    /// Empty values count as absent.
    pub async fn contains(&self, key: &str) -> bool {
        self.snapshot().await.get(key).is_some()
    }

    /// Copy every entry of `bundle` over the current values.
    pub async fn apply(&self, bundle: &HashMap<String, String>) {
        {
            let current = self.values.read().await;
            if bundle.iter().all(|(k, v)| current.get(k) == Some(v)) {
                return;
            }
        }

        let mut guard = self.values.write().await;
        let mut next = (**guard).clone();
        next.extend(bundle.iter().map(|(k, v)| (k.clone(), v.clone())));
        *guard = Arc::new(next);
        tracing::debug!("Applied {} configuration keys", bundle.len());
    }
}

impl LiveSnapshot {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    pub fn require(&self, key: &'static str) -> Result<&str, MissingConfig> {
        self.get(key).ok_or(MissingConfig(key))
    }

    /// Like `require`, minus any trailing slash. Used for base URLs.
    pub fn require_url(&self, key: &'static str) -> Result<&str, MissingConfig> {
        self.require(key).map(|v| v.trim_end_matches('/'))
    }
}
