//! Drain checker (component F) — reports whether a task has any live
//! servers left, so the orchestrator's pre-stop hook knows when it is safe
//! to recycle the container group.

use crate::registry::keys::any_bucket_for_task_pattern;
use crate::registry::Registry;

/// True iff no bucket key remains for any container of `task_arn`.
pub async fn is_drained(registry: &dyn Registry, task_arn: &str) -> crate::Result<bool> {
    let pattern = any_bucket_for_task_pattern(task_arn);
    let keys = registry.scan(&pattern).await?;
    Ok(keys.is_empty())
}
