//! The shared node table.
//!
//! One entry per registered node. Each entry carries the node's
//! immutable registration (config, labels, restart endpoint), the
//! liveness view published by its monitor task, and the intake flag.
//!
//! Write discipline: the liveness view has a single writer — the
//! monitor task bound to the node. The intake flag has several writers
//! (coordinator, drain workflow, admin API) and is therefore an
//! `AtomicBool`. The table map itself only changes on registration and
//! removal.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use tracing::debug;

use gridhub_core::{LivenessState, NodeId, NodeRegistration};

use crate::error::{RegistryError, RegistryResult};

/// Snapshot of a node's liveness as last published by its monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LivenessView {
    pub state: LivenessState,
    pub consecutive_failures: u32,
    /// Set iff `state == Down`, in milliseconds since the Unix epoch.
    pub down_since_ms: Option<u64>,
}

impl Default for LivenessView {
    fn default() -> Self {
        Self {
            state: LivenessState::Up,
            consecutive_failures: 0,
            down_since_ms: None,
        }
    }
}

struct NodeEntry {
    registration: NodeRegistration,
    liveness: RwLock<LivenessView>,
    intake_enabled: AtomicBool,
}

/// Admin-facing view of one node.
#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
    pub node_id: NodeId,
    #[serde(flatten)]
    pub liveness: LivenessView,
    pub intake_enabled: bool,
    pub labels: HashMap<String, String>,
    pub restart_url: Option<String>,
}

/// Shared table of registered nodes.
#[derive(Default)]
pub struct NodeTable {
    nodes: RwLock<HashMap<NodeId, Arc<NodeEntry>>>,
}

// Poisoning only happens if a writer panicked mid-update; the guarded
// values are plain copies, so recovering the inner value is safe.
fn read_map<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write_map<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

impl NodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node. New nodes start up with intake enabled.
    pub fn insert(&self, registration: NodeRegistration) -> RegistryResult<()> {
        let mut nodes = write_map(&self.nodes);
        if nodes.contains_key(&registration.node_id) {
            return Err(RegistryError::DuplicateNode(registration.node_id));
        }
        let node_id = registration.node_id.clone();
        nodes.insert(
            node_id.clone(),
            Arc::new(NodeEntry {
                registration,
                liveness: RwLock::new(LivenessView::default()),
                intake_enabled: AtomicBool::new(true),
            }),
        );
        debug!(%node_id, "node registered in table");
        Ok(())
    }

    /// Remove a node. Removing an absent node is a no-op.
    pub fn remove(&self, node_id: &str) -> bool {
        let removed = write_map(&self.nodes).remove(node_id).is_some();
        if removed {
            debug!(%node_id, "node removed from table");
        }
        removed
    }

    pub fn contains(&self, node_id: &str) -> bool {
        read_map(&self.nodes).contains_key(node_id)
    }

    pub fn registration(&self, node_id: &str) -> Option<NodeRegistration> {
        read_map(&self.nodes)
            .get(node_id)
            .map(|e| e.registration.clone())
    }

    /// Publish a new liveness view for a node. Returns `false` if the
    /// node is no longer registered (removed mid-poll).
    pub fn publish_liveness(&self, node_id: &str, view: LivenessView) -> bool {
        let entry = match read_map(&self.nodes).get(node_id) {
            Some(entry) => entry.clone(),
            None => return false,
        };
        *write_map(&entry.liveness) = view;
        true
    }

    pub fn liveness(&self, node_id: &str) -> Option<LivenessView> {
        let entry = read_map(&self.nodes).get(node_id)?.clone();
        Some(*read_map(&entry.liveness))
    }

    pub fn set_intake(&self, node_id: &str, enabled: bool) -> RegistryResult<()> {
        let nodes = read_map(&self.nodes);
        let entry = nodes
            .get(node_id)
            .ok_or_else(|| RegistryError::UnknownNode(node_id.to_string()))?;
        entry.intake_enabled.store(enabled, Ordering::SeqCst);
        debug!(%node_id, enabled, "intake flag set");
        Ok(())
    }

    pub fn intake_enabled(&self, node_id: &str) -> RegistryResult<bool> {
        let nodes = read_map(&self.nodes);
        let entry = nodes
            .get(node_id)
            .ok_or_else(|| RegistryError::UnknownNode(node_id.to_string()))?;
        Ok(entry.intake_enabled.load(Ordering::SeqCst))
    }

    /// The allocation predicate: a node accepts a new session iff it is
    /// registered, not down, and intake is enabled. The two gates are
    /// orthogonal: a down node with intake enabled and an up node with
    /// intake disabled are both excluded.
    pub fn can_accept_session(&self, node_id: &str) -> bool {
        let entry = match read_map(&self.nodes).get(node_id) {
            Some(entry) => entry.clone(),
            None => return false,
        };
        let state = read_map(&entry.liveness).state;
        state != LivenessState::Down && entry.intake_enabled.load(Ordering::SeqCst)
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        read_map(&self.nodes).keys().cloned().collect()
    }

    pub fn report(&self, node_id: &str) -> Option<NodeReport> {
        let entry = read_map(&self.nodes).get(node_id)?.clone();
        Some(Self::entry_report(node_id, &entry))
    }

    pub fn reports(&self) -> Vec<NodeReport> {
        read_map(&self.nodes)
            .iter()
            .map(|(id, entry)| Self::entry_report(id, entry))
            .collect()
    }

    fn entry_report(node_id: &str, entry: &NodeEntry) -> NodeReport {
        NodeReport {
            node_id: node_id.to_string(),
            liveness: *read_map(&entry.liveness),
            intake_enabled: entry.intake_enabled.load(Ordering::SeqCst),
            labels: entry.registration.labels.clone(),
            restart_url: entry.registration.restart_url.clone(),
        }
    }
}
