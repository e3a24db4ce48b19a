//! Replica role: local counter copy plus the HTTP surface clients and the hub
//! talk to.
//!
//! Client updates are applied locally first and then forwarded to the hub
//! tagged with this replica's id, so the hub leaves this replica out of the
//! fan-out and the delta is counted here exactly once. A failed forward is
//! logged and not retried; the update stays local until an operator resyncs
//! the cluster.
//!
//! Deltas and snapshots pushed by the hub are applied as they arrive, with no
//! origin check: the hub is trusted to have excluded us where needed.

use std::{future::Future, net::SocketAddr, sync::Arc};

use anyhow::Result;
use axum::{
    Json, Router,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{
    config::ReplicaConfig,
    error::{self, CounterError},
    message::{CounterMessage, DeltaMessage, NodeRecord, Snapshot, Status},
    peer::PeerClient,
    store::CounterStore,
};

pub struct ReplicaAgent {
    node_id: String,
    endpoint: String,
    hub: String,
    store: Arc<CounterStore>,
    peers: PeerClient,
}

impl ReplicaAgent {
    pub fn new(
        node_id: impl Into<String>,
        endpoint: impl Into<String>,
        hub: impl Into<String>,
        store: Arc<CounterStore>,
        peers: PeerClient,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            endpoint: endpoint.into(),
            hub: hub.into(),
            store,
            peers,
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn store(&self) -> &Arc<CounterStore> {
        &self.store
    }

    pub fn record(&self) -> NodeRecord {
        NodeRecord {
            id: self.node_id.clone(),
            endpoint: self.endpoint.clone(),
        }
    }

    /// Applies a client update locally, then forwards it to the hub.
    ///
    /// Returns the local total right after the local apply, whether or not
    /// the forward succeeded.
    pub async fn local_update(&self, id: &str, delta: i64) -> i64 {
        let total = self.store.apply_delta(id, delta);

        let message = DeltaMessage::from_source(id, delta, self.node_id.as_str());
        if let Err(err) = self.peers.forward_update(&self.hub, &message).await {
            warn!(
                node_id = %self.node_id,
                hub = %self.hub,
                id,
                delta,
                error = %err,
                "forward to hub failed; update is local only"
            );
        }
        total
    }

    /// Adds a delta relayed by the hub.
    pub fn apply_remote_delta(&self, id: &str, delta: i64) -> i64 {
        self.store.apply_delta(id, delta)
    }

    /// Replaces local state with a snapshot pushed by the hub.
    pub fn apply_snapshot(&self, snapshot: Snapshot) {
        info!(node_id = %self.node_id, counters = snapshot.len(), "installing snapshot");
        self.store.replace_all(snapshot);
    }

    /// Announces this replica to the hub. Any failure is a startup error.
    pub async fn register(&self) -> error::Result<()> {
        self.peers
            .register(&self.hub, &self.record())
            .await
            .map_err(|err| {
                CounterError::Startup(format!(
                    "registration of '{}' with hub {} failed: {err}",
                    self.node_id, self.hub
                ))
            })?;
        info!(node_id = %self.node_id, endpoint = %self.endpoint, hub = %self.hub, "registered with hub");
        Ok(())
    }

    pub async fn deregister(&self) -> error::Result<()> {
        self.peers.deregister(&self.hub, &self.record()).await
    }
}

pub fn router(agent: Arc<ReplicaAgent>) -> Router {
    Router::new()
        .route("/items", post(update_count).get(list_counts))
        .route("/items/:id/count", get(get_count))
        .route("/sync/:id/:count", post(sync_count))
        .route("/syncall", post(sync_all))
        .route("/ping", get(ping))
        .layer(TraceLayer::new_for_http())
        .with_state(agent)
}

/// A replica that has bound its listener and registered with the hub.
pub struct Replica {
    listener: TcpListener,
    agent: Arc<ReplicaAgent>,
}

impl Replica {
    /// Registers with the hub using `listener`'s address (or
    /// `config.advertise`) as this replica's endpoint.
    ///
    /// Nothing is served until registration succeeds; a rejected or failed
    /// registration is returned as [`CounterError::Startup`].
    pub async fn register(listener: TcpListener, config: ReplicaConfig) -> error::Result<Self> {
        let endpoint = match config.advertise {
            Some(endpoint) => endpoint,
            None => {
                let addr = listener.local_addr().map_err(|err| {
                    CounterError::Startup(format!("listener has no local address: {err}"))
                })?;
                format!("http://{addr}")
            }
        };

        let peers = PeerClient::new(config.peer_timeout)?;
        let agent = Arc::new(ReplicaAgent::new(
            config.node_id,
            endpoint,
            config.hub,
            Arc::new(CounterStore::new()),
            peers,
        ));
        agent.register().await?;

        Ok(Self { listener, agent })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn agent(&self) -> &Arc<ReplicaAgent> {
        &self.agent
    }

    /// Serves until `shutdown` resolves, then deregisters from the hub.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Replica { listener, agent } = self;

        axum::serve(listener, router(Arc::clone(&agent)))
            .with_graceful_shutdown(shutdown)
            .await?;

        info!(node_id = %agent.node_id(), "replica shutting down");
        if let Err(err) = agent.deregister().await {
            warn!(node_id = %agent.node_id(), error = %err, "failed to deregister from hub");
        }
        Ok(())
    }

    pub async fn run_until_ctrl_c(self) -> Result<()> {
        self.run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = ?err, "failed to install ctrl-c handler");
            }
        })
        .await
    }
}

async fn update_count(
    State(agent): State<Arc<ReplicaAgent>>,
    payload: Result<Json<CounterMessage>, JsonRejection>,
) -> error::Result<Json<CounterMessage>> {
    let Json(CounterMessage { id, count }) = payload?;
    let total = agent.local_update(&id, count).await;
    Ok(Json(CounterMessage { id, count: total }))
}

async fn get_count(
    State(agent): State<Arc<ReplicaAgent>>,
    Path(id): Path<String>,
) -> Json<CounterMessage> {
    let count = agent.store().read(&id);
    Json(CounterMessage { id, count })
}

async fn list_counts(State(agent): State<Arc<ReplicaAgent>>) -> Json<Snapshot> {
    Json(agent.store().snapshot())
}

async fn sync_count(
    State(agent): State<Arc<ReplicaAgent>>,
    params: Result<Path<(String, String)>, PathRejection>,
) -> error::Result<StatusCode> {
    let Path((id, count)) = params?;
    let delta: i64 = count
        .parse()
        .map_err(|_| CounterError::MalformedRequest(format!("count '{count}' is not an integer")))?;
    agent.apply_remote_delta(&id, delta);
    Ok(StatusCode::OK)
}

async fn sync_all(
    State(agent): State<Arc<ReplicaAgent>>,
    payload: Result<Json<Snapshot>, JsonRejection>,
) -> error::Result<StatusCode> {
    let Json(snapshot) = payload?;
    agent.apply_snapshot(snapshot);
    Ok(StatusCode::OK)
}

async fn ping() -> Json<Status> {
    Json(Status::alive())
}
