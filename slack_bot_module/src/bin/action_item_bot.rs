use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use slack_bot_module::logging::init_tracing;
use slack_bot_module::server::serve;
use slack_bot_module::{AppState, ServiceConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = ServiceConfig::from_env()?;
    init_tracing(&config.log_path)?;

    info!(
        "action item bot config host={}, port={}, alert_channel=#{}, thread_replies={}, log={}",
        config.host,
        config.port,
        config.alert_channel_name,
        config.thread_replies_enabled,
        config.log_path.display()
    );

    let state = Arc::new(AppState::from_config(&config).await);
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    serve(state, addr).await?;

    info!("action item bot stopped");
    Ok(())
}
