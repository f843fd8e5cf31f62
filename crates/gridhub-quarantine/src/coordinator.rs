//! The quarantine coordinator.
//!
//! Sits between the liveness monitor and the pool. Down detection
//! (`NotReachable`) is a routing-affecting policy decision, not a
//! removal: the allocation predicate already declines down nodes.
//! Removal is reserved for `Unregister`, and is idempotent — the node
//! may already be gone, its monitor may already have stopped.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use gridhub_core::{LivenessEvent, LivenessEventKind};
use gridhub_health::{LivenessMonitor, MonitorError};
use gridhub_registry::{NodeTable, SessionPool};

use crate::error::QuarantineResult;

/// How many liveness events the observability ring keeps.
const EVENT_LOG_CAPACITY: usize = 256;

/// Reacts to liveness events and owns the intake surface.
pub struct QuarantineCoordinator {
    nodes: Arc<NodeTable>,
    pool: Arc<dyn SessionPool>,
    monitor: Arc<LivenessMonitor>,
    /// Bounded ring of recent events. Pure output for the admin
    /// surface; transitions are never decided from this log.
    recent_events: Mutex<VecDeque<LivenessEvent>>,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl QuarantineCoordinator {
    pub fn new(
        nodes: Arc<NodeTable>,
        pool: Arc<dyn SessionPool>,
        monitor: Arc<LivenessMonitor>,
    ) -> Self {
        Self {
            nodes,
            pool,
            monitor,
            recent_events: Mutex::new(VecDeque::with_capacity(EVENT_LOG_CAPACITY)),
        }
    }

    /// Consume the liveness event stream until it closes or shutdown
    /// is signaled.
    pub async fn run(
        &self,
        mut events: mpsc::Receiver<LivenessEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        debug!("quarantine coordinator running");
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => {
                        debug!("liveness event stream closed");
                        break;
                    }
                },
                _ = shutdown.changed() => {
                    debug!("quarantine coordinator shutting down");
                    break;
                }
            }
        }
    }

    async fn handle_event(&self, event: LivenessEvent) {
        self.record_event(event.clone());
        match event.kind {
            LivenessEventKind::NotReachable => {
                // Quarantine only: the node stays registered, the
                // allocation predicate stops routing to it.
                info!(node_id = %event.node_id, detail = %event.detail, "node down, quarantined");
            }
            LivenessEventKind::Unregister => {
                info!(node_id = %event.node_id, detail = %event.detail, "node unregistered");
                self.remove_node(&event.node_id).await;
            }
        }
    }

    /// Remove a node from the pool and stop its monitor. Safe to call
    /// for nodes that are partially or fully gone already.
    pub async fn remove_node(&self, node_id: &str) {
        match self.monitor.stop_monitor(node_id).await {
            Ok(()) => {}
            Err(MonitorError::UnknownNode(_)) => {
                debug!(%node_id, "monitor already stopped");
            }
            Err(e) => warn!(%node_id, error = %e, "failed to stop monitor"),
        }
        self.pool.remove_node(node_id);
        self.nodes.remove(node_id);
        info!(%node_id, "node removed from pool");
    }

    // ── Intake surface ─────────────────────────────────────────────

    /// Allow new sessions on the node again.
    pub fn enable_intake(&self, node_id: &str) -> QuarantineResult<()> {
        Ok(self.nodes.set_intake(node_id, true)?)
    }

    /// Stop routing new sessions to the node. Liveness monitoring is
    /// unaffected.
    pub fn disable_intake(&self, node_id: &str) -> QuarantineResult<()> {
        Ok(self.nodes.set_intake(node_id, false)?)
    }

    pub fn is_intake_enabled(&self, node_id: &str) -> QuarantineResult<bool> {
        Ok(self.nodes.intake_enabled(node_id)?)
    }

    // ── Observability ──────────────────────────────────────────────

    fn record_event(&self, event: LivenessEvent) {
        let mut log = locked(&self.recent_events);
        if log.len() == EVENT_LOG_CAPACITY {
            log.pop_front();
        }
        log.push_back(event);
    }

    /// Recent liveness events, oldest first.
    pub fn recent_events(&self) -> Vec<LivenessEvent> {
        locked(&self.recent_events).iter().cloned().collect()
    }
}
