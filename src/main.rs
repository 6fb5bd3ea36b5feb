use chat_relay::config::AppConfig;
use chat_relay::supervisor::{shutdown_signal, Supervisor};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config = AppConfig::from_env().map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;

    info!(
        http = %config.http_addr,
        relay = %config.relay_addr,
        database = %config.store.database,
        "Starting chat-relay"
    );

    let supervisor = Supervisor::connect(config).await.map_err(|e| {
        error!(error = %e, "Startup failed");
        e
    })?;

    supervisor.run(shutdown_signal()).await?;

    info!("Shut down cleanly");
    Ok(())
}
