//! The drain-restart workflow.
//!
//! Recycling a node's automation service without losing sessions:
//!
//! 1. disable intake — no new session is routed there from this
//!    instant, liveness monitoring unaffected;
//! 2. wait (bounded) for the session being drained to vacate the pool;
//!    on budget exhaustion proceed anyway — the node side enforces its
//!    own session timeout;
//! 3. run the restart action, capturing success or failure;
//! 4. re-enable intake — unconditionally, on every exit path. A node
//!    whose intake stayed disabled would be quarantined forever.
//!
//! One cycle per node at a time; a duplicate trigger while a cycle is
//! in flight is rejected.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use gridhub_core::config::{DrainConfig, RestartPolicyConfig};
use gridhub_core::{NodeId, SessionKey, epoch_millis, wait_until};
use gridhub_registry::{NodeTable, SessionPool};

use crate::action::{HttpRestartAction, RestartAction};
use crate::error::{QuarantineError, QuarantineResult};

/// Outcome of a finished restart job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "detail", rename_all = "snake_case")]
pub enum RestartOutcome {
    Success,
    Failed(String),
}

/// Record of one completed drain-restart cycle. The latest job per
/// node is retained for the admin surface.
#[derive(Debug, Clone, Serialize)]
pub struct RestartJob {
    pub node_id: NodeId,
    pub session_key: SessionKey,
    pub started_at_ms: u64,
    pub finished_at_ms: u64,
    /// Whether the session vacated within the wait budget.
    pub drained: bool,
    pub outcome: RestartOutcome,
}

/// Orchestrates drain-restart cycles across nodes.
pub struct DrainAndRestartWorkflow {
    nodes: Arc<NodeTable>,
    pool: Arc<dyn SessionPool>,
    drain_interval: Duration,
    drain_max_attempts: u32,
    policy: RestartPolicyConfig,
    /// Nodes with a cycle currently in flight.
    in_flight: Arc<Mutex<HashSet<NodeId>>>,
    /// Latest finished job per node.
    jobs: Arc<Mutex<HashMap<NodeId, RestartJob>>>,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl DrainAndRestartWorkflow {
    pub fn new(
        nodes: Arc<NodeTable>,
        pool: Arc<dyn SessionPool>,
        drain: DrainConfig,
        policy: RestartPolicyConfig,
    ) -> Self {
        Self {
            nodes,
            pool,
            drain_interval: Duration::from_millis(drain.poll_interval_ms),
            drain_max_attempts: drain.max_attempts,
            policy,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            jobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start a drain-restart cycle for a node. Fire-and-forget: the
    /// cycle runs on its own task; the caller only learns about
    /// admission (unknown node, duplicate trigger).
    pub fn trigger_drain_restart(
        &self,
        node_id: &str,
        session_key: &str,
        action: Arc<dyn RestartAction>,
    ) -> QuarantineResult<()> {
        if !locked(&self.in_flight).insert(node_id.to_string()) {
            return Err(QuarantineError::DrainInProgress(node_id.to_string()));
        }

        // Step 1 happens before the cycle task is spawned, so intake is
        // closed from the instant the trigger is accepted.
        if let Err(e) = self.nodes.set_intake(node_id, false) {
            locked(&self.in_flight).remove(node_id);
            return Err(e.into());
        }
        info!(%node_id, %session_key, "drain-restart cycle started, intake disabled");

        tokio::spawn(run_drain_cycle(
            self.nodes.clone(),
            self.pool.clone(),
            self.jobs.clone(),
            self.in_flight.clone(),
            self.drain_interval,
            self.drain_max_attempts,
            node_id.to_string(),
            session_key.to_string(),
            action,
        ));
        Ok(())
    }

    /// Session-completion hook: if the session's device class is under
    /// restart policy and the node has a restart endpoint, trigger a
    /// drain-restart cycle for it. Never fails the caller; a duplicate
    /// trigger is dropped.
    pub fn on_session_completed(&self, node_id: &str, session_key: &str, device_class: &str) {
        if !self
            .policy
            .device_classes
            .iter()
            .any(|c| c == device_class)
        {
            debug!(%node_id, %device_class, "device class not under restart policy");
            return;
        }
        let Some(registration) = self.nodes.registration(node_id) else {
            warn!(%node_id, "session completed on unknown node");
            return;
        };
        let Some(url) = registration.restart_url else {
            debug!(%node_id, "no restart endpoint configured, skipping restart");
            return;
        };

        match self.trigger_drain_restart(node_id, session_key, Arc::new(HttpRestartAction::new(url)))
        {
            Ok(()) => {}
            Err(QuarantineError::DrainInProgress(_)) => {
                debug!(%node_id, "drain-restart already in flight, ignoring duplicate trigger");
            }
            Err(e) => warn!(%node_id, error = %e, "could not start drain-restart cycle"),
        }
    }

    /// Whether a cycle is currently in flight for the node.
    pub fn is_draining(&self, node_id: &str) -> bool {
        locked(&self.in_flight).contains(node_id)
    }

    /// The most recently finished job for the node, if any.
    pub fn last_job(&self, node_id: &str) -> Option<RestartJob> {
        locked(&self.jobs).get(node_id).cloned()
    }
}

/// One drain cycle. Between the intake disable in the trigger and the
/// re-enable at the bottom there is no early return: the wait result
/// and the action result are both captured, never propagated.
#[allow(clippy::too_many_arguments)]
async fn run_drain_cycle(
    nodes: Arc<NodeTable>,
    pool: Arc<dyn SessionPool>,
    jobs: Arc<Mutex<HashMap<NodeId, RestartJob>>>,
    in_flight: Arc<Mutex<HashSet<NodeId>>>,
    drain_interval: Duration,
    drain_max_attempts: u32,
    node_id: NodeId,
    session_key: SessionKey,
    action: Arc<dyn RestartAction>,
) {
    let started_at_ms = epoch_millis();

    // Step 2: wait for the session to vacate the pool.
    let drained = wait_until(drain_interval, drain_max_attempts, || {
        let pool = pool.clone();
        let node_id = node_id.clone();
        let session_key = session_key.clone();
        async move { pool.active_session_for_node(&node_id).as_deref() != Some(session_key.as_str()) }
    })
    .await;
    if !drained {
        warn!(%node_id, %session_key, "drain budget exhausted, restarting anyway");
    }

    // Step 3: the restart itself. Failure is recorded, not propagated.
    let outcome = match action.run().await {
        Ok(()) => {
            info!(%node_id, "restart action succeeded");
            RestartOutcome::Success
        }
        Err(e) => {
            warn!(%node_id, error = %e, "restart action failed");
            RestartOutcome::Failed(e.to_string())
        }
    };

    // Step 4: intake always comes back, whatever happened above. The
    // only way this can fail is the node having been unregistered
    // mid-cycle, in which case there is no intake left to restore.
    if let Err(e) = nodes.set_intake(&node_id, true) {
        warn!(%node_id, error = %e, "could not re-enable intake after restart");
    } else {
        info!(%node_id, "intake re-enabled after restart");
    }

    locked(&jobs).insert(
        node_id.clone(),
        RestartJob {
            node_id: node_id.clone(),
            session_key,
            started_at_ms,
            finished_at_ms: epoch_millis(),
            drained,
            outcome,
        },
    );
    locked(&in_flight).remove(&node_id);
}
