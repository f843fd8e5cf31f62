//! gridhub-core — shared domain types for GridHub.
//!
//! GridHub is the hub-side liveness and quarantine subsystem of a
//! distributed test-execution grid: the hub polls registered worker
//! nodes, marks unreachable ones down, unregisters nodes that stay
//! down too long, and coordinates drain-restart cycles against live
//! nodes.
//!
//! This crate holds the types every other member needs: node identity
//! and per-node monitoring parameters, the liveness state and event
//! model, the `gridhub.toml` daemon configuration, and the bounded
//! polling helper used wherever the system has to wait for an external
//! condition without hanging forever.

pub mod config;
pub mod types;
pub mod wait;

pub use config::GridConfig;
pub use types::*;
pub use wait::wait_until;

/// Current time as milliseconds since the Unix epoch.
pub fn epoch_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
