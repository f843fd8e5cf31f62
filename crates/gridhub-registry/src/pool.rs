//! The session pool surface.
//!
//! The real session-assignment engine lives outside this subsystem;
//! the hub only needs four operations from it. `InMemoryPool` backs
//! tests and the standalone daemon with the same contract.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use gridhub_core::{NodeId, SessionKey};

use crate::error::{RegistryError, RegistryResult};
use crate::table::NodeTable;

/// What the quarantine subsystem needs from the session-assignment
/// engine.
pub trait SessionPool: Send + Sync {
    /// Whether the allocation path may route a new session to the node.
    fn can_accept_session(&self, node_id: &str) -> bool;

    /// Remove a node from the pool. Idempotent; removing an absent
    /// node is a no-op.
    fn remove_node(&self, node_id: &str);

    /// The session currently running on the node, if any.
    fn active_session_for_node(&self, node_id: &str) -> Option<SessionKey>;

    /// All node ids known to the pool.
    fn list_nodes(&self) -> Vec<NodeId>;
}

/// In-process pool implementation over the shared node table, tracking
/// one active session per node.
pub struct InMemoryPool {
    nodes: Arc<NodeTable>,
    sessions: RwLock<HashMap<NodeId, SessionKey>>,
}

impl InMemoryPool {
    pub fn new(nodes: Arc<NodeTable>) -> Self {
        Self {
            nodes,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Assign a session to a node, enforcing the allocation predicate.
    pub fn assign_session(&self, node_id: &str, session_key: &str) -> RegistryResult<()> {
        if !self.nodes.contains(node_id) {
            return Err(RegistryError::UnknownNode(node_id.to_string()));
        }
        if !self.nodes.can_accept_session(node_id) {
            return Err(RegistryError::NotAccepting(node_id.to_string()));
        }
        self.sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(node_id.to_string(), session_key.to_string());
        debug!(%node_id, %session_key, "session assigned");
        Ok(())
    }

    /// Mark a node's session as finished.
    pub fn end_session(&self, node_id: &str) {
        if self
            .sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(node_id)
            .is_some()
        {
            debug!(%node_id, "session ended");
        }
    }
}

impl SessionPool for InMemoryPool {
    fn can_accept_session(&self, node_id: &str) -> bool {
        self.nodes.can_accept_session(node_id)
    }

    fn remove_node(&self, node_id: &str) {
        self.sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(node_id);
        self.nodes.remove(node_id);
    }

    fn active_session_for_node(&self, node_id: &str) -> Option<SessionKey> {
        self.sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(node_id)
            .cloned()
    }

    fn list_nodes(&self) -> Vec<NodeId> {
        self.nodes.node_ids()
    }
}
