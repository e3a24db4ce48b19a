use anyhow::Result;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use replicated_counter::{
    cli::{Cli, Command},
    config::{HubConfig, ReplicaConfig},
    hub::Hub,
    replica::Replica,
};

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Hub(args) => {
            let config = HubConfig::try_from(args)?;
            let listener = TcpListener::bind(config.listen).await?;
            let hub = Hub::new(listener, config)?;
            info!(
                nodes = hub.state().registry().len(),
                "hub listening on {}",
                hub.local_addr()?
            );
            if let Err(err) = hub.run_until_ctrl_c().await {
                warn!("hub exited with error: {err:?}");
                return Err(err);
            }
        }
        Command::Replica(args) => {
            let config = ReplicaConfig::try_from(args)?;
            let listener = TcpListener::bind(config.listen).await?;
            let replica = Replica::register(listener, config).await?;
            info!(
                node_id = %replica.agent().node_id(),
                "replica listening on {}",
                replica.local_addr()?
            );
            if let Err(err) = replica.run_until_ctrl_c().await {
                warn!("replica exited with error: {err:?}");
                return Err(err);
            }
        }
    }

    Ok(())
}
