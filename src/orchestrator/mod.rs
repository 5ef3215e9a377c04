//! Orchestrator adapter (component B) — lists running container groups and
//! launches new ones. Behind a small trait so the allocator and autoscaler
//! tests can substitute an in-memory fake instead of talking to a real
//! cluster.

pub mod ecs;

use async_trait::async_trait;

/// One container group ("Task") the orchestrator launched, as reported back
/// from a `run_tasks` call.
#[derive(Debug, Clone)]
pub struct LaunchedTask {
    pub task_arn: String,
    /// Number of containers the orchestrator actually started in this task
    /// (normally equal to the task definition's container count).
    pub container_count: u32,
}

/// Client-side contract for the external container orchestrator (§6).
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Count of running tasks in the target cluster, paginating internally.
    async fn count_running_tasks(&self) -> crate::Result<u32>;

    /// Launch `count` tasks from the configured task definition in one
    /// batch. The orchestrator's own soft API cap (10 per call) is enforced
    /// by the autoscaler, not here — this method launches exactly `count`.
    async fn run_tasks(&self, count: u32) -> crate::Result<Vec<LaunchedTask>>;
}
