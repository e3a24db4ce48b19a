//! Hub-side registry of known replicas.
//!
//! Records are keyed by endpoint, but identity is the node id: two live
//! records can never share one. A replica restarting on the same endpoint
//! under a new id simply takes over that endpoint's record.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::{
    error::{CounterError, Result},
    message::NodeRecord,
};

#[derive(Debug, Default)]
pub struct NodeRegistry {
    // endpoint -> node id
    nodes: RwLock<BTreeMap<String, String>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the registry from a list of endpoints, naming each node by its
    /// zero-based position. Repeated endpoints keep their first id.
    pub fn with_endpoints<I, S>(endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut nodes = BTreeMap::new();
        for (index, endpoint) in endpoints.into_iter().enumerate() {
            nodes.entry(endpoint.into()).or_insert_with(|| index.to_string());
        }
        Self {
            nodes: RwLock::new(nodes),
        }
    }

    /// Registers `node_id` at `endpoint`.
    ///
    /// Rejected with [`CounterError::DuplicateNode`] when any record already
    /// carries `node_id`, whatever its endpoint.
    pub fn add_node(&self, endpoint: &str, node_id: &str) -> Result<()> {
        let mut nodes = self.nodes.write();
        if let Some((existing, _)) = nodes.iter().find(|(_, id)| id.as_str() == node_id) {
            return Err(CounterError::DuplicateNode {
                node_id: node_id.to_string(),
                endpoint: existing.clone(),
            });
        }

        if let Some(previous) = nodes.insert(endpoint.to_string(), node_id.to_string()) {
            debug!(endpoint, previous = %previous, node_id, "endpoint re-registered under a new id");
        }
        info!(endpoint, node_id, "node added");
        Ok(())
    }

    /// Drops the record for `endpoint`. Removing an unknown endpoint is fine.
    ///
    /// Returns whether a record was actually removed.
    pub fn remove_node(&self, endpoint: &str, node_id: &str) -> bool {
        let removed = self.nodes.write().remove(endpoint);
        match &removed {
            Some(registered) => info!(endpoint, node_id, registered = %registered, "node removed"),
            None => debug!(endpoint, node_id, "remove for unknown endpoint ignored"),
        }
        removed.is_some()
    }

    /// Every endpoint except the one registered under `excluding`.
    pub fn endpoints_excluding(&self, excluding: Option<&str>) -> Vec<String> {
        self.nodes
            .read()
            .iter()
            .filter(|(_, id)| Some(id.as_str()) != excluding)
            .map(|(endpoint, _)| endpoint.clone())
            .collect()
    }

    pub fn lookup_endpoint(&self, node_id: &str) -> Option<String> {
        self.nodes
            .read()
            .iter()
            .find(|(_, id)| id.as_str() == node_id)
            .map(|(endpoint, _)| endpoint.clone())
    }

    pub fn nodes(&self) -> Vec<NodeRecord> {
        self.nodes
            .read()
            .iter()
            .map(|(endpoint, id)| NodeRecord {
                id: id.clone(),
                endpoint: endpoint.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }
}
