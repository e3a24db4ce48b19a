//! Star-topology replicated counters over HTTP.
//!
//! One hub relays increments to any number of replicas. Each node keeps its
//! own copy of every named counter; copies converge because every delta is
//! applied exactly once per node and addition commutes.
//!
//! - [`store`] holds a node's counters behind one store-wide read/write lock.
//! - [`registry`] tracks which replicas the hub knows, keyed by endpoint and
//!   unique by node id.
//! - [`broadcast`] applies a delta at the hub and relays it to every replica
//!   except its originator, in detached tasks.
//! - [`sync`] pushes single deltas or a full snapshot to one replica.
//! - [`replica`] applies client updates locally, forwards them to the hub and
//!   accepts the hub's pushes.
//! - [`hub`] wires the registry, broadcaster and sync coordinator to HTTP.
//! - [`peer`] is the outbound HTTP client; [`message`] the JSON bodies.
//! - [`cli`] and [`config`] parse and validate startup parameters.
//!
//! Delivery is best effort. A replica that misses a delta, or joins after
//! updates were made, stays behind until the hub's `/syncnode/{id}` pushes it
//! a snapshot.

pub mod broadcast;
pub mod cli;
pub mod config;
pub mod error;
pub mod hub;
pub mod message;
pub mod peer;
pub mod registry;
pub mod replica;
pub mod store;
pub mod sync;
