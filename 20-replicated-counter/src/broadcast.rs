//! Hub-side replication of accepted deltas.
//!
//! The hub applies every delta to its own store first, then relays the same
//! delta to each registered replica except the originator. Relays run as
//! detached tasks, one per destination: the caller gets its answer as soon as
//! the hub store is updated.
//!
//! A replica that cannot be reached is logged and left behind. Nothing is
//! retried, because a retried delta without an idempotency key would be
//! counted twice; the repair path is a full snapshot via
//! [`crate::sync::SyncCoordinator::sync_full`].

use std::sync::Arc;

use futures_util::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{
    message::DeltaMessage, peer::PeerClient, registry::NodeRegistry, store::CounterStore,
    sync::SyncCoordinator,
};

pub struct Broadcaster {
    store: Arc<CounterStore>,
    registry: Arc<NodeRegistry>,
    sync: Arc<SyncCoordinator>,
}

impl Broadcaster {
    pub fn new(
        store: Arc<CounterStore>,
        registry: Arc<NodeRegistry>,
        peers: PeerClient,
    ) -> Self {
        let sync = Arc::new(SyncCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            peers,
        ));
        Self {
            store,
            registry,
            sync,
        }
    }

    pub fn sync(&self) -> &Arc<SyncCoordinator> {
        &self.sync
    }

    /// Applies `message` to the hub store and starts the fan-out.
    ///
    /// Returns the hub's new total for the counter plus a handle on the
    /// in-flight relays. Dropping the handle leaves them running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn accept(&self, message: &DeltaMessage) -> (i64, FanOut) {
        let total = self.store.apply_delta(&message.id, message.count);
        let targets = self
            .registry
            .endpoints_excluding(message.source_id.as_deref());

        debug!(
            id = %message.id,
            delta = message.count,
            source = message.source_id.as_deref().unwrap_or("-"),
            targets = targets.len(),
            "fanning out delta"
        );

        let tasks = targets
            .iter()
            .map(|endpoint| self.spawn_relay(endpoint.clone(), message))
            .collect();

        (total, FanOut { targets, tasks })
    }

    fn spawn_relay(&self, endpoint: String, message: &DeltaMessage) -> JoinHandle<bool> {
        let sync = Arc::clone(&self.sync);
        let id = message.id.clone();
        let delta = message.count;
        tokio::spawn(async move {
            match sync.sync_delta(&endpoint, &id, delta).await {
                Ok(()) => true,
                Err(err) => {
                    warn!(%endpoint, %id, delta, error = %err, "replica missed delta; resync required");
                    false
                }
            }
        })
    }
}

/// Relays started by one [`Broadcaster::accept`] call.
#[derive(Debug)]
pub struct FanOut {
    targets: Vec<String>,
    tasks: Vec<JoinHandle<bool>>,
}

impl FanOut {
    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    /// Waits for every relay and returns how many were delivered.
    pub async fn join(self) -> usize {
        join_all(self.tasks)
            .await
            .into_iter()
            .filter(|outcome| matches!(outcome, Ok(true)))
            .count()
    }
}
