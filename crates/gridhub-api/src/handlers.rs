//! Admin API handlers.
//!
//! Each handler reads node state from the shared table and drives the
//! monitor, coordinator, or workflow. JSON in, JSON out.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::info;

use gridhub_core::NodeRegistration;
use gridhub_health::MonitorError;
use gridhub_quarantine::{HttpRestartAction, QuarantineError, RestartJob};
use gridhub_registry::{NodeReport, RegistryError};

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

// ── Nodes ──────────────────────────────────────────────────────────

/// GET /api/v1/nodes
pub async fn list_nodes(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.nodes.reports())
}

/// Node detail: the report plus restart-cycle status.
#[derive(serde::Serialize)]
pub struct NodeDetail {
    #[serde(flatten)]
    report: NodeReport,
    draining: bool,
    last_restart: Option<RestartJob>,
}

/// GET /api/v1/nodes/:id
pub async fn get_node(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.nodes.report(&id) {
        Some(report) => ApiResponse::ok(NodeDetail {
            report,
            draining: state.workflow.is_draining(&id),
            last_restart: state.workflow.last_job(&id),
        })
        .into_response(),
        None => error_response("node not found", StatusCode::NOT_FOUND).into_response(),
    }
}

/// POST /api/v1/nodes
pub async fn register_node(
    State(state): State<ApiState>,
    Json(registration): Json<NodeRegistration>,
) -> impl IntoResponse {
    let node_id = registration.node_id.clone();
    match state.monitor.register_node(registration).await {
        Ok(()) => {
            info!(%node_id, "node registered via admin api");
            (StatusCode::CREATED, ApiResponse::ok(node_id)).into_response()
        }
        Err(MonitorError::AlreadyRegistered(_))
        | Err(MonitorError::Registry(RegistryError::DuplicateNode(_))) => {
            error_response("node already registered", StatusCode::CONFLICT).into_response()
        }
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// DELETE /api/v1/nodes/:id
pub async fn remove_node(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if !state.nodes.contains(&id) {
        return error_response("node not found", StatusCode::NOT_FOUND).into_response();
    }
    state.coordinator.remove_node(&id).await;
    info!(node_id = %id, "node removed via admin api");
    ApiResponse::ok("removed").into_response()
}

// ── Intake ─────────────────────────────────────────────────────────

#[derive(serde::Deserialize)]
pub struct IntakeRequest {
    pub enabled: bool,
}

/// POST /api/v1/nodes/:id/intake
pub async fn set_intake(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(req): Json<IntakeRequest>,
) -> impl IntoResponse {
    let result = if req.enabled {
        state.coordinator.enable_intake(&id)
    } else {
        state.coordinator.disable_intake(&id)
    };
    match result {
        Ok(()) => ApiResponse::ok(req.enabled).into_response(),
        Err(QuarantineError::Registry(RegistryError::UnknownNode(_))) => {
            error_response("node not found", StatusCode::NOT_FOUND).into_response()
        }
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

// ── Drain-restart ──────────────────────────────────────────────────

#[derive(serde::Deserialize)]
pub struct DrainRestartRequest {
    pub session_key: String,
    /// Overrides the node's registered restart endpoint.
    #[serde(default)]
    pub restart_url: Option<String>,
}

/// POST /api/v1/nodes/:id/drain-restart
pub async fn trigger_drain_restart(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(req): Json<DrainRestartRequest>,
) -> impl IntoResponse {
    let url = req
        .restart_url
        .or_else(|| state.nodes.registration(&id).and_then(|r| r.restart_url));
    let Some(url) = url else {
        if !state.nodes.contains(&id) {
            return error_response("node not found", StatusCode::NOT_FOUND).into_response();
        }
        return error_response(
            "node has no restart endpoint and none was supplied",
            StatusCode::BAD_REQUEST,
        )
        .into_response();
    };

    let action = Arc::new(HttpRestartAction::new(url));
    match state
        .workflow
        .trigger_drain_restart(&id, &req.session_key, action)
    {
        Ok(()) => {
            info!(node_id = %id, session_key = %req.session_key, "drain-restart triggered via admin api");
            (StatusCode::ACCEPTED, ApiResponse::ok("draining")).into_response()
        }
        Err(QuarantineError::DrainInProgress(_)) => {
            error_response("drain-restart already in progress", StatusCode::CONFLICT)
                .into_response()
        }
        Err(QuarantineError::Registry(RegistryError::UnknownNode(_))) => {
            error_response("node not found", StatusCode::NOT_FOUND).into_response()
        }
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

// ── Events ─────────────────────────────────────────────────────────

/// GET /api/v1/events
pub async fn list_events(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.coordinator.recent_events())
}
