//! HTTP response bodies for the invocation shims.

use serde::{Deserialize, Serialize};

/// Success body for `POST /session`.
#[derive(Serialize)]
pub struct SessionResponse {
    #[serde(rename = "publicIP")]
    pub public_ip: String,
    pub port: String,
}

/// Failure body for `POST /session` — the literal wire-compatible shape
/// the allocator returns when both phases exhaust their retry budget.
#[derive(Serialize)]
pub struct SessionFailure {
    pub failed: &'static str,
}

impl Default for SessionFailure {
    fn default() -> Self {
        Self {
            failed: "couldnt find a free server spot",
        }
    }
}

/// Request body for `POST /heartbeat`.
#[derive(Deserialize)]
pub struct HeartbeatRequest {
    #[serde(rename = "serverInUse")]
    pub server_in_use: bool,
    #[serde(rename = "taskArn")]
    pub task_arn: String,
    #[serde(rename = "currentPlayers")]
    pub current_players: u32,
    #[serde(rename = "maxPlayers")]
    pub max_players: u32,
    pub ready: bool,
    #[serde(rename = "publicIP")]
    pub public_ip: Option<String>,
    pub port: Option<String>,
    #[serde(rename = "serverTerminated")]
    pub server_terminated: bool,
}

#[derive(Serialize)]
pub struct DrainedResponse {
    pub drained: bool,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_secs: u64,
    pub requests: u64,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
}
