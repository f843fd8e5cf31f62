//! gridhub-api — admin and observability REST surface for GridHub.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/nodes` | List nodes with liveness and intake state |
//! | POST | `/api/v1/nodes` | Register a node and start its monitor |
//! | GET | `/api/v1/nodes/:id` | Node detail incl. last restart job |
//! | DELETE | `/api/v1/nodes/:id` | Remove a node and stop its monitor |
//! | POST | `/api/v1/nodes/:id/intake` | Enable/disable session intake |
//! | POST | `/api/v1/nodes/:id/drain-restart` | Trigger a drain-restart cycle |
//! | GET | `/api/v1/events` | Recent liveness events |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use gridhub_health::LivenessMonitor;
use gridhub_quarantine::{DrainAndRestartWorkflow, QuarantineCoordinator};
use gridhub_registry::NodeTable;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub nodes: Arc<NodeTable>,
    pub monitor: Arc<LivenessMonitor>,
    pub coordinator: Arc<QuarantineCoordinator>,
    pub workflow: Arc<DrainAndRestartWorkflow>,
}

/// Build the admin API router.
pub fn build_router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route("/nodes", get(handlers::list_nodes).post(handlers::register_node))
        .route("/nodes/{id}", get(handlers::get_node).delete(handlers::remove_node))
        .route("/nodes/{id}/intake", post(handlers::set_intake))
        .route("/nodes/{id}/drain-restart", post(handlers::trigger_drain_restart))
        .route("/events", get(handlers::list_events))
        .with_state(state);

    Router::new().nest("/api/v1", api_routes)
}
