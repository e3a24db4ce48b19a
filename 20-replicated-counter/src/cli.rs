use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the hub: keeps the replica registry and relays every delta.
    Hub(HubArgs),
    /// Run a replica: registers with the hub, then serves client updates.
    Replica(ReplicaArgs),
}

#[derive(Args, Debug, Clone)]
pub struct HubArgs {
    /// Socket address the hub should bind to. Use port 0 for an ephemeral port.
    #[arg(long, default_value = "127.0.0.1:8000")]
    pub listen: SocketAddr,

    /// Comma-separated replica endpoints to register at startup,
    /// e.g. http://localhost:9001,http://localhost:9002
    #[arg(long, value_delimiter = ',')]
    pub nodes: Vec<String>,

    /// Upper bound on each call to a replica. Unbounded when omitted.
    #[arg(long)]
    pub peer_timeout_ms: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct ReplicaArgs {
    /// Port to serve client and hub traffic on.
    #[arg(long)]
    pub port: u16,

    /// Unique identity of this replica within the cluster.
    #[arg(long)]
    pub node_id: String,

    /// Interface to bind to.
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub bind: IpAddr,

    /// Base URL of the hub.
    #[arg(long, default_value = "http://localhost:8000")]
    pub hub: String,

    /// URL the hub should use to reach this replica. Defaults to
    /// http://<bound address>.
    #[arg(long)]
    pub advertise: Option<String>,

    /// Upper bound on each call to the hub. Unbounded when omitted.
    #[arg(long)]
    pub peer_timeout_ms: Option<u64>,
}
