//! Error taxonomy for the control plane.
//!
//! Kinds, not identifiers: each variant maps to one of the recovery policies
//! described alongside the component that raises it (registry retry budget,
//! per-tick swallow in the autoscaler, or a user-visible HTTP failure).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::fmt;

/// Control-plane error type.
#[derive(Debug)]
pub enum Error {
    /// Configuration missing or invalid at startup.
    Config(String),
    /// Registry connectivity or watch-conflict error. Retried locally with a
    /// bounded budget by the caller; this variant is what's left after the
    /// budget is exhausted.
    RegistryTransient(String),
    /// Orchestrator API throttling or paging failure.
    OrchestratorTransient(String),
    /// `expected_game_servers > 3 * total_registered`: the server build is
    /// almost certainly broken and not registering with the registry.
    IntegrityFailure { expected: u32, total: u32 },
    /// Both allocator phases exhausted their retry budgets.
    NoCapacity,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "config error: {msg}"),
            Error::RegistryTransient(msg) => write!(f, "registry error: {msg}"),
            Error::OrchestratorTransient(msg) => write!(f, "orchestrator error: {msg}"),
            Error::IntegrityFailure { expected, total } => write!(
                f,
                "integrity brake: expected {expected} game servers but only {total} are registered"
            ),
            Error::NoCapacity => write!(f, "couldnt find a free server spot"),
        }
    }
}

impl std::error::Error for Error {}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::RegistryTransient(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::OrchestratorTransient(_) => StatusCode::BAD_GATEWAY,
            Error::IntegrityFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::NoCapacity => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // `requestGameSession` is the only invocation with a user-visible
        // failure body; it is this literal shape regardless of which kind
        // caused it, matching the source system's one failure body.
        let body = serde_json::json!({ "failed": "couldnt find a free server spot" });
        (status, Json(body)).into_response()
    }
}

impl From<redis::RedisError> for Error {
    fn from(e: redis::RedisError) -> Self {
        Error::RegistryTransient(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
