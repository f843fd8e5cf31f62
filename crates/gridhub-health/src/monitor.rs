//! Per-node liveness monitor tasks.
//!
//! One background task per registered node. The task owns that node's
//! `LivenessTracker` exclusively and publishes snapshots into the
//! shared `NodeTable` after every poll; nothing else ever writes a
//! node's liveness. Transitions worth acting on go out as
//! `LivenessEvent`s over the mpsc channel handed in at construction.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use gridhub_core::{
    LivenessEvent, LivenessEventKind, NodeConfig, NodeId, NodeRegistration, epoch_millis,
};
use gridhub_registry::NodeTable;

use crate::error::{MonitorError, MonitorResult};
use crate::probe::HealthProbe;
use crate::tracker::{LivenessTracker, Transition};

/// Per-node monitor bookkeeping.
struct MonitorSlot {
    handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

/// Manages the poll loop of every registered node.
pub struct LivenessMonitor {
    nodes: Arc<NodeTable>,
    probe: Arc<dyn HealthProbe>,
    events: mpsc::Sender<LivenessEvent>,
    /// Active monitors: node id → slot.
    monitors: RwLock<HashMap<NodeId, MonitorSlot>>,
}

impl LivenessMonitor {
    pub fn new(
        nodes: Arc<NodeTable>,
        probe: Arc<dyn HealthProbe>,
        events: mpsc::Sender<LivenessEvent>,
    ) -> Self {
        Self {
            nodes,
            probe,
            events,
            monitors: RwLock::new(HashMap::new()),
        }
    }

    /// Register a node and start its poll loop.
    ///
    /// Registering a node that already has a running monitor is a
    /// caller error, not a silent replacement.
    pub async fn register_node(&self, registration: NodeRegistration) -> MonitorResult<()> {
        let node_id = registration.node_id.clone();
        let config = registration.config.clone();

        let mut monitors = self.monitors.write().await;
        if monitors.contains_key(&node_id) {
            return Err(MonitorError::AlreadyRegistered(node_id));
        }
        self.nodes.insert(registration)?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_liveness_loop(
            node_id.clone(),
            config,
            self.nodes.clone(),
            self.probe.clone(),
            self.events.clone(),
            shutdown_rx,
        ));
        monitors.insert(
            node_id.clone(),
            MonitorSlot {
                handle,
                shutdown_tx,
            },
        );

        info!(%node_id, "liveness monitor started");
        Ok(())
    }

    /// Stop a node's monitor, blocking until the loop has exited.
    ///
    /// After this returns, zero further liveness writes happen for the
    /// node.
    pub async fn stop_monitor(&self, node_id: &str) -> MonitorResult<()> {
        let slot = {
            let mut monitors = self.monitors.write().await;
            monitors
                .remove(node_id)
                .ok_or_else(|| MonitorError::UnknownNode(node_id.to_string()))?
        };
        let _ = slot.shutdown_tx.send(true);
        let _ = slot.handle.await;
        info!(%node_id, "liveness monitor stopped");
        Ok(())
    }

    /// Stop every monitor (for graceful shutdown), awaiting each loop.
    pub async fn stop_all(&self) {
        let slots: Vec<(NodeId, MonitorSlot)> = {
            let mut monitors = self.monitors.write().await;
            monitors.drain().collect()
        };
        for (node_id, slot) in slots {
            let _ = slot.shutdown_tx.send(true);
            let _ = slot.handle.await;
            debug!(%node_id, "liveness monitor stopped");
        }
        info!("all liveness monitors stopped");
    }

    pub async fn is_monitoring(&self, node_id: &str) -> bool {
        self.monitors.read().await.contains_key(node_id)
    }

    pub async fn active_monitors(&self) -> Vec<NodeId> {
        self.monitors.read().await.keys().cloned().collect()
    }
}

/// The poll loop for a single node.
///
/// Cadence is measured from probe completion to next probe start. The
/// shutdown signal is honored both during the sleep and between the
/// probe and any write, so a cancelled loop never mutates state again.
async fn run_liveness_loop(
    node_id: NodeId,
    config: NodeConfig,
    nodes: Arc<NodeTable>,
    probe: Arc<dyn HealthProbe>,
    events: mpsc::Sender<LivenessEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let interval = Duration::from_millis(config.polling_interval_ms);
    let mut tracker = LivenessTracker::new(&config);

    debug!(%node_id, ?interval, "liveness loop starting");

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.changed() => {
                debug!(%node_id, "liveness loop shutting down");
                return;
            }
        }

        let outcome = probe.probe(&node_id).await;
        if *shutdown.borrow() {
            debug!(%node_id, "liveness loop cancelled mid-probe");
            return;
        }

        let now_ms = epoch_millis();
        let transition = tracker.record(outcome, now_ms);
        if !nodes.publish_liveness(&node_id, tracker.view()) {
            // Node was removed out from under the loop.
            debug!(%node_id, "node gone from table, liveness loop exiting");
            return;
        }

        match transition {
            Some(Transition::MarkedDown) => {
                let detail = format!(
                    "marking node {node_id} down: cannot reach it after {} tries",
                    tracker.consecutive_failures()
                );
                warn!(%node_id, failures = tracker.consecutive_failures(), "node marked down");
                emit(&events, &node_id, LivenessEventKind::NotReachable, now_ms, detail).await;
            }
            Some(Transition::UnregisterDue) => {
                let down_for = now_ms.saturating_sub(tracker.down_since_ms().unwrap_or(now_ms));
                let detail =
                    format!("unregistering node {node_id}: down for {down_for} milliseconds");
                warn!(%node_id, down_for_ms = down_for, "node due for unregistration");
                emit(&events, &node_id, LivenessEventKind::Unregister, now_ms, detail).await;
                return;
            }
            Some(Transition::Recovered) => {
                info!(%node_id, "node recovered");
            }
            None => {}
        }
    }
}

async fn emit(
    events: &mpsc::Sender<LivenessEvent>,
    node_id: &str,
    kind: LivenessEventKind,
    timestamp_ms: u64,
    detail: String,
) {
    let event = LivenessEvent {
        node_id: node_id.to_string(),
        kind,
        timestamp_ms,
        detail,
    };
    if events.send(event).await.is_err() {
        debug!(%node_id, "liveness event channel closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{ProbeFuture, ProbeOutcome};
    use gridhub_core::LivenessState;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Probe that replays a fixed script, then repeats a default.
    struct ScriptedProbe {
        script: Mutex<VecDeque<ProbeOutcome>>,
        default: ProbeOutcome,
    }

    impl ScriptedProbe {
        fn new(script: Vec<ProbeOutcome>, default: ProbeOutcome) -> Self {
            Self {
                script: Mutex::new(script.into()),
                default,
            }
        }

        fn always(default: ProbeOutcome) -> Self {
            Self::new(Vec::new(), default)
        }
    }

    impl HealthProbe for ScriptedProbe {
        fn probe(&self, _address: &str) -> ProbeFuture {
            let next = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(self.default);
            Box::pin(async move { next })
        }
    }

    fn registration(node_id: &str, limit: u32, delay_ms: u64) -> NodeRegistration {
        let mut reg = NodeRegistration::new(node_id);
        reg.config = NodeConfig {
            polling_interval_ms: 5,
            unregister_delay_ms: delay_ms,
            down_polling_limit: limit,
        };
        reg
    }

    fn setup(probe: ScriptedProbe) -> (Arc<NodeTable>, LivenessMonitor, mpsc::Receiver<LivenessEvent>) {
        let nodes = Arc::new(NodeTable::new());
        let (tx, rx) = mpsc::channel(64);
        let monitor = LivenessMonitor::new(nodes.clone(), Arc::new(probe), tx);
        (nodes, monitor, rx)
    }

    async fn recv(rx: &mut mpsc::Receiver<LivenessEvent>) -> LivenessEvent {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for liveness event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn marks_down_once_and_emits_single_not_reachable() {
        let (nodes, monitor, mut rx) =
            setup(ScriptedProbe::always(ProbeOutcome::Unreachable));
        monitor
            .register_node(registration("n1", 3, 60_000))
            .await
            .unwrap();

        let event = recv(&mut rx).await;
        assert_eq!(event.kind, LivenessEventKind::NotReachable);
        assert_eq!(event.node_id, "n1");

        let view = nodes.liveness("n1").unwrap();
        assert_eq!(view.state, LivenessState::Down);
        assert_eq!(view.consecutive_failures, 3);
        assert!(view.down_since_ms.is_some());

        // Still down, still inside the delay window: no further events.
        let extra = tokio::time::timeout(Duration::from_millis(80), rx.recv()).await;
        assert!(extra.is_err(), "DOWN must be edge-triggered");

        monitor.stop_all().await;
    }

    #[tokio::test]
    async fn unregister_emitted_after_delay_and_loop_terminates() {
        let (_nodes, monitor, mut rx) =
            setup(ScriptedProbe::always(ProbeOutcome::Unreachable));
        monitor
            .register_node(registration("n1", 1, 30))
            .await
            .unwrap();

        assert_eq!(recv(&mut rx).await.kind, LivenessEventKind::NotReachable);
        let event = recv(&mut rx).await;
        assert_eq!(event.kind, LivenessEventKind::Unregister);

        // The loop has terminated on its own; stop still cleans up the
        // slot without hanging.
        monitor.stop_monitor("n1").await.unwrap();
        assert!(!monitor.is_monitoring("n1").await);
    }

    #[tokio::test]
    async fn recovery_before_delay_prevents_unregister() {
        let probe = ScriptedProbe::new(
            vec![
                ProbeOutcome::Unreachable,
                ProbeOutcome::Unreachable,
                ProbeOutcome::Alive,
            ],
            ProbeOutcome::Alive,
        );
        let (nodes, monitor, mut rx) = setup(probe);
        monitor
            .register_node(registration("n1", 2, 60_000))
            .await
            .unwrap();

        assert_eq!(recv(&mut rx).await.kind, LivenessEventKind::NotReachable);

        // Give the loop time to process the alive probe and more.
        tokio::time::sleep(Duration::from_millis(100)).await;
        let view = nodes.liveness("n1").unwrap();
        assert_eq!(view.state, LivenessState::Up);
        assert_eq!(view.consecutive_failures, 0);
        assert_eq!(view.down_since_ms, None);

        // No Unregister ever fires.
        assert!(rx.try_recv().is_err());

        monitor.stop_all().await;
    }

    #[tokio::test]
    async fn stopped_monitor_performs_no_further_writes() {
        let (nodes, monitor, _rx) =
            setup(ScriptedProbe::always(ProbeOutcome::Unreachable));
        monitor
            .register_node(registration("n1", 1_000, 60_000))
            .await
            .unwrap();

        // Let a few polls land, then stop and snapshot.
        tokio::time::sleep(Duration::from_millis(30)).await;
        monitor.stop_monitor("n1").await.unwrap();
        let frozen = nodes.liveness("n1").unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(nodes.liveness("n1").unwrap(), frozen);
        assert!(!monitor.is_monitoring("n1").await);
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let (_nodes, monitor, _rx) = setup(ScriptedProbe::always(ProbeOutcome::Alive));
        monitor
            .register_node(registration("n1", 3, 60_000))
            .await
            .unwrap();

        let err = monitor
            .register_node(registration("n1", 3, 60_000))
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::AlreadyRegistered(_)));

        // The failed registration must not kill the running monitor.
        assert!(monitor.is_monitoring("n1").await);
        monitor.stop_all().await;
    }

    #[tokio::test]
    async fn stop_of_unknown_node_is_an_error() {
        let (_nodes, monitor, _rx) = setup(ScriptedProbe::always(ProbeOutcome::Alive));
        let err = monitor.stop_monitor("nope").await.unwrap_err();
        assert!(matches!(err, MonitorError::UnknownNode(_)));
    }

    #[tokio::test]
    async fn stop_all_stops_every_monitor() {
        let (_nodes, monitor, _rx) = setup(ScriptedProbe::always(ProbeOutcome::Alive));
        monitor
            .register_node(registration("n1", 3, 60_000))
            .await
            .unwrap();
        monitor
            .register_node(registration("n2", 3, 60_000))
            .await
            .unwrap();
        assert_eq!(monitor.active_monitors().await.len(), 2);

        monitor.stop_all().await;
        assert!(monitor.active_monitors().await.is_empty());
    }
}
