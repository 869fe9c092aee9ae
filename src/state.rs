use std::sync::Arc;

use crate::auth::{ManagementApi, ManagementTokenCache};
use crate::backend::BackendClient;
use crate::config::{AppConfig, LiveConfig, SecretsSource};
use crate::secrets::{AwsSecretStore, DisabledSecretStore, SecretStore, SecretsCache};

/// Everything a handler needs, created once at start-up and shared by reference
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub live: LiveConfig,
    pub secrets: Arc<SecretsCache>,
    pub management: Arc<ManagementTokenCache>,
    pub management_api: ManagementApi,
    pub backend: BackendClient,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        live: LiveConfig,
        store: Arc<dyn SecretStore>,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.server.http_timeout())
            .build()?;

        let secrets = SecretsCache::new(
            store,
            config.secret_name(),
            config.secrets.required_key.clone(),
            config.server.http_timeout(),
        );

        Ok(Self {
            config: Arc::new(config),
            live,
            secrets: Arc::new(secrets),
            management: Arc::new(ManagementTokenCache::new(http.clone())),
            management_api: ManagementApi::new(http.clone()),
            backend: BackendClient::new(http.clone()),
            http,
        })
    }

    /// Build state from the process environment, choosing the configured secret store
    pub async fn from_env(config: AppConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn SecretStore> = match config.secrets.source {
            SecretsSource::Aws => {
                Arc::new(AwsSecretStore::from_env(config.secrets.region.clone()).await)
            }
            SecretsSource::None => Arc::new(DisabledSecretStore),
        };

        tracing::info!(
            "Secret store: {:?} (bundle '{}')",
            config.secrets.source,
            config.secret_name()
        );

        Ok(Self::new(config, LiveConfig::from_env(), store)?)
    }
}
