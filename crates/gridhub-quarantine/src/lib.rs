//! gridhub-quarantine — what happens after the monitor speaks.
//!
//! Two cooperating pieces:
//!
//! - `QuarantineCoordinator` consumes the monitor's `LivenessEvent`
//!   stream. A `NotReachable` event is recorded and logged — routing
//!   already excludes down nodes through the allocation predicate. An
//!   `Unregister` event removes the node from the pool (idempotently)
//!   and stops its monitor. The coordinator also owns the intake
//!   enable/disable surface.
//! - `DrainAndRestartWorkflow` recycles a live node out of band:
//!   disable intake, wait (bounded) for the in-flight session to
//!   vacate, run the restart action, and re-enable intake on every
//!   exit path. One cycle per node at a time.

pub mod action;
pub mod coordinator;
pub mod drain;
pub mod error;

pub use action::{HttpRestartAction, RestartAction, RestartError, ScriptRestartAction};
pub use coordinator::QuarantineCoordinator;
pub use drain::{DrainAndRestartWorkflow, RestartJob, RestartOutcome};
pub use error::{QuarantineError, QuarantineResult};
