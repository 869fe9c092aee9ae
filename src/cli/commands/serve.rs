use clap::Args;

use crate::config::AppConfig;
use crate::server;
use crate::state::AppState;

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[arg(long, short, help = "Port to listen on (overrides GATEWAY_PORT)")]
    pub port: Option<u16>,
}

pub async fn handle(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = AppConfig::from_env();
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let state = AppState::from_env(config).await?;
    server::serve(state).await
}
