//! gridhub-registry — shared node state and the session-pool surface.
//!
//! The `NodeTable` is the one place where a node's observable state
//! lives: the liveness view published by that node's monitor task and
//! the intake flag flipped by the quarantine coordinator, the drain
//! workflow, and the admin API. The allocation predicate reads both:
//! a node accepts a new session iff it is not down *and* intake is
//! enabled.
//!
//! The session-assignment engine itself is an external collaborator,
//! modeled by the `SessionPool` trait. `InMemoryPool` is the reference
//! implementation used by tests and by the standalone daemon.

pub mod error;
pub mod pool;
pub mod table;

pub use error::{RegistryError, RegistryResult};
pub use pool::{InMemoryPool, SessionPool};
pub use table::{LivenessView, NodeReport, NodeTable};
