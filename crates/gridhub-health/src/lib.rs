//! gridhub-health — liveness monitoring for GridHub nodes.
//!
//! One background task per registered node polls the node's status
//! endpoint and drives a small state machine:
//!
//! ```text
//! LivenessMonitor
//!   └── Per-node background task
//!       ├── HealthProbe → Alive | Unreachable
//!       ├── LivenessTracker (UP / SUSPECT / DOWN, unregister timer)
//!       ├── Publish LivenessView into the NodeTable
//!       └── Emit LivenessEvent (NotReachable / Unregister) over mpsc
//! ```
//!
//! Probe failures are the signal, never an error: a node that crosses
//! `down_polling_limit` consecutive failures is marked down (once), and
//! one that stays down past `unregister_delay_ms` gets an `Unregister`
//! event, after which its loop terminates. A single successful probe at
//! any point returns the node to UP and forgets the incident entirely.
//!
//! Stopping a monitor is awaited: `stop_monitor` does not return until
//! the loop has observed the signal and exited, so a stopped node can
//! never be resurrected by a stale in-flight probe.

pub mod error;
pub mod monitor;
pub mod probe;
pub mod tracker;

pub use error::{MonitorError, MonitorResult};
pub use monitor::LivenessMonitor;
pub use probe::{HealthProbe, HttpHealthProbe, ProbeFuture, ProbeOutcome};
pub use tracker::{LivenessTracker, Transition};
