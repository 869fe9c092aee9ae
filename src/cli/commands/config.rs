use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::output_details;
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::state::AppState;

#[derive(Subcommand)]
pub enum ConfigCommands {
    #[command(about = "Print the configuration resolved from the environment")]
    Show,

    #[command(about = "Load the secret bundle and list its keys (values are never printed)")]
    Keys,
}

pub async fn handle(cmd: ConfigCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = AppConfig::from_env();

    match cmd {
        ConfigCommands::Show => {
            let details = json!({
                "environment": config.environment.label(),
                "port": config.server.port,
                "http_timeout_secs": config.server.http_timeout_secs,
                "secret_source": format!("{:?}", config.secrets.source),
                "secret_name": config.secret_name(),
                "required_key": config.secrets.required_key,
                "region": config.secrets.region,
                "cors_origins": config.security.cors_origins,
                "secure_cookies": config.security.secure_cookies,
                "session_ttl_hours": config.security.session_ttl_hours,
            });
            output_details(&output_format, "Resolved configuration", &details)
        }
        ConfigCommands::Keys => {
            let state = AppState::from_env(config).await?;
            state.secrets.ensure_environment_initialized(&state.live).await?;

            let mut keys: Vec<&str> = state
                .secrets
                .cached()
                .map(|bundle| bundle.keys().map(String::as_str).collect())
                .unwrap_or_default();
            keys.sort_unstable();

            let details = json!({
                "secret_name": state.secrets.secret_name(),
                "fetched": state.secrets.cached().is_some(),
                "keys": keys,
            });
            output_details(&output_format, "Secret bundle", &details)
        }
    }
}
