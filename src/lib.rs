//! Control plane for an ephemeral game-server fleet: a shared registry, a
//! matchmaking allocator, a heartbeat/state-transition handler, an
//! autoscaler, and a drain checker, fronted by a thin HTTP shim.

pub mod allocator;
pub mod autoscaler;
pub mod config;
pub mod drain;
pub mod error;
pub mod handlers;
pub mod heartbeat;
pub mod metrics;
pub mod middleware;
pub mod orchestrator;
pub mod registry;
pub mod response;
pub mod router;
pub mod state;

pub use config::Config;
pub use error::{Error, Result};
pub use router::create as create_router;
pub use state::AppState;
