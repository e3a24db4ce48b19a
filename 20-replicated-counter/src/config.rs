//! Validated runtime configuration for both roles.
//!
//! CLI arguments are checked once here; anything rejected is a startup
//! failure and the process never begins serving.

use std::{net::SocketAddr, time::Duration};

use anyhow::{ensure, Context, Result};
use reqwest::Url;

use crate::cli::{HubArgs, ReplicaArgs};

#[derive(Debug, Clone)]
pub struct HubConfig {
    pub listen: SocketAddr,
    /// Replicas known before any of them registers.
    pub initial_nodes: Vec<String>,
    pub peer_timeout: Option<Duration>,
}

impl HubConfig {
    pub fn new(listen: SocketAddr) -> Self {
        Self {
            listen,
            initial_nodes: Vec::new(),
            peer_timeout: None,
        }
    }
}

impl TryFrom<HubArgs> for HubConfig {
    type Error = anyhow::Error;

    fn try_from(args: HubArgs) -> Result<Self> {
        let initial_nodes = args
            .nodes
            .iter()
            .map(|node| node.trim())
            .filter(|node| !node.is_empty())
            .map(validate_endpoint)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            listen: args.listen,
            initial_nodes,
            peer_timeout: peer_timeout(args.peer_timeout_ms)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ReplicaConfig {
    pub node_id: String,
    pub listen: SocketAddr,
    pub hub: String,
    /// Endpoint registered with the hub; derived from the bound address when
    /// unset.
    pub advertise: Option<String>,
    pub peer_timeout: Option<Duration>,
}

impl ReplicaConfig {
    pub fn new(node_id: impl Into<String>, listen: SocketAddr, hub: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            listen,
            hub: hub.into(),
            advertise: None,
            peer_timeout: None,
        }
    }

    pub fn validate(self) -> Result<Self> {
        let node_id = self.node_id.trim().to_string();
        ensure!(!node_id.is_empty(), "node id must not be empty");
        let hub = validate_endpoint(&self.hub).context("invalid hub url")?;
        let advertise = self
            .advertise
            .as_deref()
            .map(validate_endpoint)
            .transpose()
            .context("invalid advertise url")?;

        Ok(Self {
            node_id,
            hub,
            advertise,
            ..self
        })
    }
}

impl TryFrom<ReplicaArgs> for ReplicaConfig {
    type Error = anyhow::Error;

    fn try_from(args: ReplicaArgs) -> Result<Self> {
        ReplicaConfig {
            node_id: args.node_id,
            listen: SocketAddr::new(args.bind, args.port),
            hub: args.hub,
            advertise: args.advertise,
            peer_timeout: peer_timeout(args.peer_timeout_ms)?,
        }
        .validate()
    }
}

/// Accepts absolute http URLs and returns them without a trailing slash.
/// Peers speak plain http to each other; there is no TLS client.
fn validate_endpoint(endpoint: &str) -> Result<String> {
    let url = Url::parse(endpoint).with_context(|| format!("'{endpoint}' is not a url"))?;
    ensure!(url.scheme() == "http", "'{endpoint}' must use http");
    ensure!(url.has_host(), "'{endpoint}' has no host");
    Ok(endpoint.trim_end_matches('/').to_string())
}

fn peer_timeout(millis: Option<u64>) -> Result<Option<Duration>> {
    match millis {
        Some(0) => anyhow::bail!("peer timeout must be greater than zero"),
        Some(millis) => Ok(Some(Duration::from_millis(millis))),
        None => Ok(None),
    }
}
