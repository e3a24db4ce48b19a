//! Point repair and full-state resync pushed from the hub.

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    error::{CounterError, Result},
    peer::PeerClient,
    registry::NodeRegistry,
    store::CounterStore,
};

pub struct SyncCoordinator {
    store: Arc<CounterStore>,
    registry: Arc<NodeRegistry>,
    peers: PeerClient,
}

impl SyncCoordinator {
    pub fn new(store: Arc<CounterStore>, registry: Arc<NodeRegistry>, peers: PeerClient) -> Self {
        Self {
            store,
            registry,
            peers,
        }
    }

    /// Sends one delta to one endpoint. The receiving replica adds it to its
    /// current value.
    pub async fn sync_delta(&self, endpoint: &str, id: &str, delta: i64) -> Result<()> {
        self.peers.push_delta(endpoint, id, delta).await
    }

    /// Replaces the whole store of `node_id` with a copy of the hub's.
    ///
    /// The copy is taken before the push starts. A delta the hub accepts in
    /// between reaches the replica through ordinary fan-out only if it was
    /// registered at the time; a delta already relayed before the snapshot
    /// lands is overwritten by it.
    pub async fn sync_full(&self, node_id: &str) -> Result<()> {
        let endpoint = self
            .registry
            .lookup_endpoint(node_id)
            .ok_or_else(|| CounterError::NodeNotFound(node_id.to_string()))?;

        let snapshot = self.store.snapshot();
        info!(node_id, %endpoint, counters = snapshot.len(), "pushing full snapshot");

        if let Err(err) = self.peers.push_snapshot(&endpoint, &snapshot).await {
            warn!(node_id, %endpoint, error = %err, "snapshot push failed");
            return Err(err);
        }
        Ok(())
    }
}
