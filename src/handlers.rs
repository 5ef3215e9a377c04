//! HTTP request handlers — the thin marshaling layer between the wire and
//! the core components (allocator, heartbeat, drain checker).

use crate::registry::Bucket;
use crate::response::{
    DrainedResponse, HealthResponse, HeartbeatRequest, ReadyResponse, SessionFailure,
    SessionResponse,
};
use crate::state::AppState;
use crate::{allocator, drain, heartbeat, metrics::Metrics};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info};

/// `POST /session` — request a game session, reserving one slot.
pub async fn request_game_session(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    Metrics::inc(&state.metrics.allocator_attempts);

    match allocator::request_game_session(state.registry.as_ref(), &state.metrics).await {
        Ok(assignment) => {
            Metrics::inc(&state.metrics.allocator_successes);
            info!(public_ip = %assignment.public_ip, port = %assignment.port, "session assigned");
            (
                StatusCode::OK,
                Json(SessionResponse {
                    public_ip: assignment.public_ip,
                    port: assignment.port,
                }),
            )
                .into_response()
        }
        Err(e) => {
            Metrics::inc(&state.metrics.allocator_no_capacity);
            error!(error = %e, "allocator exhausted all capacity");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(SessionFailure::default())).into_response()
        }
    }
}

/// `POST /heartbeat` — apply a server status update.
pub async fn update_redis(
    State(state): State<Arc<AppState>>,
    Json(req): Json<HeartbeatRequest>,
) -> impl IntoResponse {
    let event = heartbeat::HeartbeatEvent {
        container_id: req.task_arn,
        server_in_use: req.server_in_use,
        current_players: req.current_players,
        max_players: req.max_players,
        ready: req.ready,
        public_ip: req.public_ip,
        port: req.port,
        server_terminated: req.server_terminated,
    };

    match heartbeat::update_redis(state.registry.as_ref(), &event).await {
        Ok(target) => {
            match target {
                Some(Bucket::Full) => Metrics::inc(&state.metrics.heartbeat_to_full),
                Some(Bucket::Active) => Metrics::inc(&state.metrics.heartbeat_to_active),
                Some(Bucket::Available) => Metrics::inc(&state.metrics.heartbeat_to_available),
                Some(Bucket::AvailablePriority) => {
                    Metrics::inc(&state.metrics.heartbeat_to_available_priority)
                }
                None => {}
            }
            StatusCode::NO_CONTENT
        }
        Err(e) => {
            error!(error = %e, cid = %event.container_id, "heartbeat handling failed");
            StatusCode::OK
        }
    }
}

/// `GET /tasks/{taskArn}/drained` — report whether a task has no live servers.
pub async fn check_task_status(
    State(state): State<Arc<AppState>>,
    Path(task_arn): Path<String>,
) -> impl IntoResponse {
    match drain::is_drained(state.registry.as_ref(), &task_arn).await {
        Ok(drained) => (StatusCode::OK, Json(DrainedResponse { drained })).into_response(),
        Err(e) => {
            error!(error = %e, task_arn = %task_arn, "drain check failed");
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}

/// `GET /health` — process liveness.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.start_time.elapsed().as_secs(),
        requests: state.request_count.load(Ordering::Relaxed),
    })
}

/// `GET /ready` — whether the process has a working registry connection.
pub async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let ready = state.ready.load(Ordering::Relaxed);
    let status = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(ReadyResponse { ready }))
}

/// `GET /metrics` — Prometheus text exposition.
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.metrics.render()
}
