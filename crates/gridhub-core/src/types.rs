//! Domain types for the GridHub liveness subsystem.
//!
//! A node's id is its probe address (`host:port`), the same identity
//! the allocation engine uses. Monitoring parameters are fixed at
//! registration time; the mutable liveness view lives in the node
//! table, owned by that node's monitor task.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unique identifier for a worker node. By convention this is the
/// node's reachable address (`host:port`).
pub type NodeId = String;

/// Key of an active session as tracked by the session pool.
pub type SessionKey = String;

// ── Liveness ───────────────────────────────────────────────────────

/// Liveness classification of a node, driven by consecutive probe
/// failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LivenessState {
    /// Reachable; the last probe succeeded.
    Up,
    /// One or more consecutive failures, below the down limit.
    Suspect,
    /// Failure count reached the down limit; excluded from allocation.
    Down,
}

/// Kind of liveness transition worth telling the rest of the system
/// about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LivenessEventKind {
    /// The node just crossed the down limit and was marked down.
    NotReachable,
    /// The node stayed down past the unregister delay and must be
    /// removed from the pool.
    Unregister,
}

/// Immutable record of a liveness transition. Pure observability
/// output: transitions are decided by the monitor's counters, never by
/// replaying these records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessEvent {
    pub node_id: NodeId,
    pub kind: LivenessEventKind,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    pub detail: String,
}

// ── Node configuration ─────────────────────────────────────────────

/// Per-node monitoring parameters, immutable after registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Delay between probe completion and the next probe start.
    #[serde(default = "default_polling_interval_ms")]
    pub polling_interval_ms: u64,
    /// How long a node may stay down before it is unregistered.
    #[serde(default = "default_unregister_delay_ms")]
    pub unregister_delay_ms: u64,
    /// Consecutive failed probes before the node is marked down.
    #[serde(default = "default_down_polling_limit")]
    pub down_polling_limit: u32,
}

fn default_polling_interval_ms() -> u64 {
    10_000
}

fn default_unregister_delay_ms() -> u64 {
    60_000
}

fn default_down_polling_limit() -> u32 {
    20
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            polling_interval_ms: default_polling_interval_ms(),
            unregister_delay_ms: default_unregister_delay_ms(),
            down_polling_limit: default_down_polling_limit(),
        }
    }
}

/// Everything the hub needs to start monitoring a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRegistration {
    pub node_id: NodeId,
    #[serde(default)]
    pub config: NodeConfig,
    /// Capability labels reported by the node (e.g. `platform`,
    /// `device_class`). Surfaced by the admin API and consulted by the
    /// session-completion restart policy.
    #[serde(default)]
    pub labels: HashMap<String, String>,
    /// Node-side command endpoint to hit when this node's automation
    /// service needs a restart.
    #[serde(default)]
    pub restart_url: Option<String>,
}

impl NodeRegistration {
    pub fn new(node_id: impl Into<NodeId>) -> Self {
        Self {
            node_id: node_id.into(),
            config: NodeConfig::default(),
            labels: HashMap::new(),
            restart_url: None,
        }
    }
}
