use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use aws_sdk_secretsmanager::Client;
use tracing::debug;

use super::{ConfigFetchError, SecretStore};

/// AWS Secrets Manager backed store
pub struct AwsSecretStore {
    client: Client,
}

impl AwsSecretStore {
    /// Build a client from the standard AWS credential chain
    pub async fn from_env(region: Option<String>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }
        let config = loader.load().await;
        Self {
            client: Client::new(&config),
        }
    }
}

#[async_trait]
impl SecretStore for AwsSecretStore {
    async fn fetch_secret_string(&self, name: &str) -> Result<String, ConfigFetchError> {
        debug!("GetSecretValue {}", name);

        let response = self
            .client
            .get_secret_value()
            .secret_id(name)
            .send()
            .await
            .map_err(|e| ConfigFetchError::Store {
                name: name.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        response
            .secret_string()
            .map(str::to_string)
            .ok_or_else(|| ConfigFetchError::MissingSecret(name.to_string()))
    }
}
