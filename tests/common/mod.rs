#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use portal_gateway::config::{AppConfig, LiveConfig};
use portal_gateway::secrets::{ConfigFetchError, SecretStore};
use portal_gateway::server;
use portal_gateway::state::AppState;

/// Gateway running in-process on its own port
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub state: AppState,
}

impl TestServer {
    pub async fn spawn(live: &[(&str, &str)], store: Arc<dyn SecretStore>) -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let mut config = AppConfig::development();
        config.server.port = port;

        let live = LiveConfig::from_map(
            live.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        );
        let state = AppState::new(config, live, store)?;

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .with_context(|| format!("failed to bind {}", base_url))?;
        let app = server::app(state.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self { port, base_url, state })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Client that leaves redirects and cookies for the test to inspect
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("failed to build test client")
}

/// `name=value` pair from the response's Set-Cookie headers
pub fn cookie_pair(response: &reqwest::Response, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&prefix))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

/// In-memory secret store that counts fetches
pub struct StaticStore {
    payload: Option<String>,
    calls: AtomicUsize,
}

impl StaticStore {
    pub fn with_bundle(bundle: serde_json::Value) -> Arc<Self> {
        Arc::new(Self {
            payload: Some(bundle.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            payload: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretStore for StaticStore {
    async fn fetch_secret_string(&self, name: &str) -> Result<String, ConfigFetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.payload.clone().ok_or_else(|| ConfigFetchError::Store {
            name: name.to_string(),
            message: "store unavailable".to_string(),
        })
    }
}
