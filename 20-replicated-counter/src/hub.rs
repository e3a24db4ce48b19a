//! Hub role: registry of replicas, fan-out of every accepted delta, and the
//! operator-facing resync endpoints.

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
    broadcast::Broadcaster,
    config::HubConfig,
    error::{self, CounterError},
    message::{CounterMessage, DeltaMessage, NodeRecord, PointRepair, Snapshot, Status},
    peer::PeerClient,
    registry::NodeRegistry,
    store::CounterStore,
};

pub struct Hub {
    listener: TcpListener,
    state: HubState,
}

impl Hub {
    pub fn new(listener: TcpListener, config: HubConfig) -> error::Result<Self> {
        Ok(Self {
            listener,
            state: HubState::new(config)?,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn state(&self) -> &HubState {
        &self.state
    }

    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Hub { listener, state } = self;
        axum::serve(listener, router(state))
            .with_graceful_shutdown(shutdown)
            .await?;
        info!("hub shutting down");
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

/// Everything the hub's handlers share. Cloning is cheap.
#[derive(Clone)]
pub struct HubState {
    store: Arc<CounterStore>,
    registry: Arc<NodeRegistry>,
    broadcaster: Arc<Broadcaster>,
}

impl HubState {
    pub fn new(config: HubConfig) -> error::Result<Self> {
        let store = Arc::new(CounterStore::new());
        let registry = Arc::new(NodeRegistry::with_endpoints(config.initial_nodes));
        let peers = PeerClient::new(config.peer_timeout)?;
        let broadcaster = Arc::new(Broadcaster::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            peers,
        ));
        Ok(Self {
            store,
            registry,
            broadcaster,
        })
    }

    pub fn store(&self) -> &Arc<CounterStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }
}

pub fn router(state: HubState) -> Router {
    Router::new()
        .route("/items", post(update_count).get(list_counts))
        .route("/items/:id/count", get(get_count))
        .route("/addnode", post(add_node))
        .route("/removenode", post(remove_node))
        .route("/nodes", get(list_nodes))
        .route("/syncnode/:node_id", post(sync_node))
        .route("/syncdelta", post(sync_delta))
        .route("/ping", get(ping))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn update_count(
    State(state): State<HubState>,
    payload: Result<Json<DeltaMessage>, JsonRejection>,
) -> error::Result<Json<CounterMessage>> {
    let Json(message) = payload?;
    // Relays keep running after the response is sent.
    let (total, _fan_out) = state.broadcaster.accept(&message);
    Ok(Json(CounterMessage {
        id: message.id,
        count: total,
    }))
}

async fn get_count(State(state): State<HubState>, Path(id): Path<String>) -> Json<CounterMessage> {
    let count = state.store.read(&id);
    Json(CounterMessage { id, count })
}

async fn list_counts(State(state): State<HubState>) -> Json<Snapshot> {
    Json(state.store.snapshot())
}

async fn add_node(
    State(state): State<HubState>,
    payload: Result<Json<NodeRecord>, JsonRejection>,
) -> error::Result<StatusCode> {
    let Json(node) = payload?;
    let node = validate_record(node)?;
    if let Err(err) = state.registry.add_node(&node.endpoint, &node.id) {
        warn!(node_id = %node.id, endpoint = %node.endpoint, error = %err, "registration rejected");
        return Err(err);
    }
    Ok(StatusCode::OK)
}

async fn remove_node(
    State(state): State<HubState>,
    payload: Result<Json<NodeRecord>, JsonRejection>,
) -> error::Result<StatusCode> {
    let Json(node) = payload?;
    // Same normalization as /addnode, or the stored endpoint never matches.
    let node = validate_record(node)?;
    state.registry.remove_node(&node.endpoint, &node.id);
    Ok(StatusCode::OK)
}

async fn list_nodes(State(state): State<HubState>) -> Json<Vec<NodeRecord>> {
    Json(state.registry.nodes())
}

/// Pushes the hub's full state to one replica. An unknown node id is a
/// logged no-op; a failed push is reported as 502 so the operator can retry.
async fn sync_node(
    State(state): State<HubState>,
    params: Result<Path<String>, PathRejection>,
) -> error::Result<StatusCode> {
    let Path(node_id) = params?;
    match state.broadcaster.sync().sync_full(&node_id).await {
        Ok(()) => Ok(StatusCode::OK),
        Err(CounterError::NodeNotFound(node_id)) => {
            warn!(%node_id, "sync requested for unknown node; nothing to do");
            Ok(StatusCode::OK)
        }
        Err(err) => Err(err),
    }
}

async fn sync_delta(
    State(state): State<HubState>,
    payload: Result<Json<PointRepair>, JsonRejection>,
) -> error::Result<StatusCode> {
    let Json(repair) = payload?;
    info!(endpoint = %repair.endpoint, id = %repair.id, delta = repair.count, "point repair");
    state
        .broadcaster
        .sync()
        .sync_delta(&repair.endpoint, &repair.id, repair.count)
        .await?;
    Ok(StatusCode::OK)
}

async fn ping() -> Json<Status> {
    Json(Status::alive())
}

fn validate_record(node: NodeRecord) -> error::Result<NodeRecord> {
    let id = node.id.trim();
    let endpoint = node.endpoint.trim().trim_end_matches('/');
    if id.is_empty() || endpoint.is_empty() {
        return Err(CounterError::MalformedRequest(
            "node id and endpoint are required".to_string(),
        ));
    }
    Ok(NodeRecord {
        id: id.to_string(),
        endpoint: endpoint.to_string(),
    })
}
