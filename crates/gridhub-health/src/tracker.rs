//! The per-node liveness state machine.
//!
//! Pure: the tracker is fed probe outcomes with an explicit clock and
//! returns the transition, if any, that the caller must act on. One
//! tracker is owned by one monitor task, so no field here needs
//! synchronization.

use gridhub_core::{LivenessState, NodeConfig};
use gridhub_registry::LivenessView;

use crate::probe::ProbeOutcome;

/// A state change the monitor loop must react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Returned to UP from SUSPECT or DOWN. Counters and the down
    /// timer are already cleared.
    Recovered,
    /// Consecutive failures just reached the down limit. Emitted
    /// exactly once per incident.
    MarkedDown,
    /// Continuously down for longer than the unregister delay. The
    /// node must be removed and its loop terminated.
    UnregisterDue,
}

/// Tracks consecutive probe failures for a single node.
#[derive(Debug)]
pub struct LivenessTracker {
    state: LivenessState,
    consecutive_failures: u32,
    /// Epoch millis at the moment the node went down.
    down_since_ms: Option<u64>,
    down_polling_limit: u32,
    unregister_delay_ms: u64,
}

impl LivenessTracker {
    pub fn new(config: &NodeConfig) -> Self {
        Self {
            state: LivenessState::Up,
            consecutive_failures: 0,
            down_since_ms: None,
            down_polling_limit: config.down_polling_limit,
            unregister_delay_ms: config.unregister_delay_ms,
        }
    }

    /// Record one probe outcome at time `now_ms`.
    pub fn record(&mut self, outcome: ProbeOutcome, now_ms: u64) -> Option<Transition> {
        match outcome {
            ProbeOutcome::Alive => {
                let recovered = self.state != LivenessState::Up;
                self.state = LivenessState::Up;
                self.consecutive_failures = 0;
                self.down_since_ms = None;
                recovered.then_some(Transition::Recovered)
            }
            ProbeOutcome::Unreachable => match self.state {
                LivenessState::Down => {
                    // Already down: failures stop counting; only the
                    // unregister timer matters now.
                    let down_since = self.down_since_ms.unwrap_or(now_ms);
                    (now_ms.saturating_sub(down_since) > self.unregister_delay_ms)
                        .then_some(Transition::UnregisterDue)
                }
                LivenessState::Up | LivenessState::Suspect => {
                    self.consecutive_failures += 1;
                    if self.consecutive_failures >= self.down_polling_limit {
                        self.state = LivenessState::Down;
                        self.down_since_ms = Some(now_ms);
                        Some(Transition::MarkedDown)
                    } else {
                        self.state = LivenessState::Suspect;
                        None
                    }
                }
            },
        }
    }

    pub fn state(&self) -> LivenessState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn down_since_ms(&self) -> Option<u64> {
        self.down_since_ms
    }

    /// The publishable view of this tracker.
    pub fn view(&self) -> LivenessView {
        LivenessView {
            state: self.state,
            consecutive_failures: self.consecutive_failures,
            down_since_ms: self.down_since_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(limit: u32, delay_ms: u64) -> NodeConfig {
        NodeConfig {
            polling_interval_ms: 10,
            unregister_delay_ms: delay_ms,
            down_polling_limit: limit,
        }
    }

    #[test]
    fn starts_up_with_zero_failures() {
        let tracker = LivenessTracker::new(&config(3, 60_000));
        assert_eq!(tracker.state(), LivenessState::Up);
        assert_eq!(tracker.consecutive_failures(), 0);
        assert_eq!(tracker.down_since_ms(), None);
    }

    #[test]
    fn suspect_below_limit_emits_nothing() {
        let mut tracker = LivenessTracker::new(&config(3, 60_000));
        assert_eq!(tracker.record(ProbeOutcome::Unreachable, 0), None);
        assert_eq!(tracker.record(ProbeOutcome::Unreachable, 10), None);
        assert_eq!(tracker.state(), LivenessState::Suspect);
        assert_eq!(tracker.consecutive_failures(), 2);
    }

    #[test]
    fn down_exactly_at_limit_with_down_since_set() {
        // Three consecutive failures with limit 3: one MarkedDown, on
        // the third poll.
        let mut tracker = LivenessTracker::new(&config(3, 60_000));
        assert_eq!(tracker.record(ProbeOutcome::Unreachable, 0), None);
        assert_eq!(tracker.record(ProbeOutcome::Unreachable, 10), None);
        assert_eq!(
            tracker.record(ProbeOutcome::Unreachable, 20),
            Some(Transition::MarkedDown)
        );
        assert_eq!(tracker.state(), LivenessState::Down);
        assert_eq!(tracker.down_since_ms(), Some(20));
    }

    #[test]
    fn down_is_edge_triggered_not_repeated() {
        let mut tracker = LivenessTracker::new(&config(2, 60_000));
        tracker.record(ProbeOutcome::Unreachable, 0);
        assert_eq!(
            tracker.record(ProbeOutcome::Unreachable, 10),
            Some(Transition::MarkedDown)
        );
        // Further failures inside the delay window emit nothing.
        assert_eq!(tracker.record(ProbeOutcome::Unreachable, 20), None);
        assert_eq!(tracker.record(ProbeOutcome::Unreachable, 30), None);
        assert_eq!(tracker.state(), LivenessState::Down);
    }

    #[test]
    fn unregister_fires_after_delay_elapses() {
        let mut tracker = LivenessTracker::new(&config(1, 60_000));
        assert_eq!(
            tracker.record(ProbeOutcome::Unreachable, 1_000),
            Some(Transition::MarkedDown)
        );
        // At exactly the delay boundary, nothing yet (strictly greater).
        assert_eq!(tracker.record(ProbeOutcome::Unreachable, 61_000), None);
        assert_eq!(
            tracker.record(ProbeOutcome::Unreachable, 61_001),
            Some(Transition::UnregisterDue)
        );
    }

    #[test]
    fn recovery_mid_delay_prevents_unregister_and_resets_counters() {
        // Down for 40s of a 60s delay, then one alive probe.
        let mut tracker = LivenessTracker::new(&config(1, 60_000));
        tracker.record(ProbeOutcome::Unreachable, 0);
        assert_eq!(tracker.record(ProbeOutcome::Unreachable, 40_000), None);

        assert_eq!(
            tracker.record(ProbeOutcome::Alive, 41_000),
            Some(Transition::Recovered)
        );
        assert_eq!(tracker.state(), LivenessState::Up);
        assert_eq!(tracker.consecutive_failures(), 0);
        assert_eq!(tracker.down_since_ms(), None);

        // A fresh incident gets a fresh timer: going down again at
        // 50_000 must not inherit the old down_since.
        assert_eq!(
            tracker.record(ProbeOutcome::Unreachable, 50_000),
            Some(Transition::MarkedDown)
        );
        assert_eq!(tracker.down_since_ms(), Some(50_000));
        assert_eq!(tracker.record(ProbeOutcome::Unreachable, 70_000), None);
    }

    #[test]
    fn alive_resets_failures_from_suspect() {
        let mut tracker = LivenessTracker::new(&config(5, 60_000));
        tracker.record(ProbeOutcome::Unreachable, 0);
        tracker.record(ProbeOutcome::Unreachable, 10);
        assert_eq!(
            tracker.record(ProbeOutcome::Alive, 20),
            Some(Transition::Recovered)
        );
        assert_eq!(tracker.consecutive_failures(), 0);
        assert_eq!(tracker.state(), LivenessState::Up);
    }

    #[test]
    fn alive_while_up_emits_nothing() {
        let mut tracker = LivenessTracker::new(&config(3, 60_000));
        assert_eq!(tracker.record(ProbeOutcome::Alive, 0), None);
        assert_eq!(tracker.record(ProbeOutcome::Alive, 10), None);
    }

    #[test]
    fn view_mirrors_tracker_fields() {
        let mut tracker = LivenessTracker::new(&config(1, 60_000));
        tracker.record(ProbeOutcome::Unreachable, 500);
        let view = tracker.view();
        assert_eq!(view.state, LivenessState::Down);
        assert_eq!(view.consecutive_failures, 1);
        assert_eq!(view.down_since_ms, Some(500));
    }
}
