//! Matchmaking allocator (component D) — picks a server for a client and
//! atomically reserves one slot on it.

use crate::metrics::Metrics;
use crate::registry::{Bucket, ClaimOutcome, Registry};
use crate::Error;
use rand::seq::SliceRandom;
use tracing::{debug, warn};

/// Address of the server a client was matched to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub public_ip: String,
    pub port: String,
}

const JOIN_IN_PROGRESS_ATTEMPTS: u32 = 25;
const COLD_START_ATTEMPTS: u32 = 30;
const COLD_START_PRIORITY_WINDOW: u32 = 20;

/// Find a server with a free slot and reserve it for this request.
///
/// Phase 1 races against servers that already have a session in progress;
/// phase 2 falls back to cold-starting an idle server, preferring ones that
/// have hosted a session before. Both phases are bounded retry loops over
/// optimistic claims — there is no global view or ordering, just uniform
/// random picks against `try_claim_slot`. A transient registry error
/// consumes one attempt of the loop's budget rather than aborting the
/// whole request (§7): only budget exhaustion surfaces as [`Error::NoCapacity`].
pub async fn request_game_session(
    registry: &dyn Registry,
    metrics: &Metrics,
) -> crate::Result<Assignment> {
    if let Some(assignment) = join_in_progress(registry, metrics).await? {
        return Ok(assignment);
    }
    if let Some(assignment) = cold_start(registry, metrics).await? {
        return Ok(assignment);
    }
    warn!("allocator exhausted both phases with no capacity");
    Err(Error::NoCapacity)
}

async fn join_in_progress(
    registry: &dyn Registry,
    metrics: &Metrics,
) -> crate::Result<Option<Assignment>> {
    let active = scan_tolerant(registry, metrics, &Bucket::Active.scan_pattern()).await?;
    if active.is_empty() {
        return Ok(None);
    }

    for attempt in 0..JOIN_IN_PROGRESS_ATTEMPTS {
        let Some(key) = active.choose(&mut rand::thread_rng()) else {
            break;
        };
        match claim_tolerant(registry, metrics, key).await? {
            ClaimOutcome::Claimed { public_ip, port } => {
                debug!(attempt, bucket = "active", "allocator claimed a join-in-progress slot");
                return Ok(Some(Assignment { public_ip, port }));
            }
            ClaimOutcome::Retry | ClaimOutcome::Full | ClaimOutcome::NotReady => continue,
        }
    }
    Ok(None)
}

async fn cold_start(
    registry: &dyn Registry,
    metrics: &Metrics,
) -> crate::Result<Option<Assignment>> {
    for attempt in 0..COLD_START_ATTEMPTS {
        let pattern = if attempt < COLD_START_PRIORITY_WINDOW {
            Bucket::AvailablePriority.scan_pattern()
        } else {
            Bucket::Available.scan_pattern()
        };

        let mut candidates = scan_tolerant(registry, metrics, &pattern).await?;
        if candidates.is_empty() && attempt < COLD_START_PRIORITY_WINDOW {
            // Priority pool empty this round; fall back to the plain pool.
            candidates = scan_tolerant(registry, metrics, &Bucket::Available.scan_pattern()).await?;
        }

        let Some(key) = candidates.choose(&mut rand::thread_rng()) else {
            continue;
        };
        match claim_tolerant(registry, metrics, key).await? {
            ClaimOutcome::Claimed { public_ip, port } => {
                debug!(attempt, "allocator claimed a cold-start slot");
                return Ok(Some(Assignment { public_ip, port }));
            }
            ClaimOutcome::Retry | ClaimOutcome::Full | ClaimOutcome::NotReady => continue,
        }
    }
    Ok(None)
}

/// `scan`, but a [`Error::RegistryTransient`] counts as "no candidates this
/// round" instead of aborting the caller's whole retry budget.
async fn scan_tolerant(
    registry: &dyn Registry,
    metrics: &Metrics,
    pattern: &str,
) -> crate::Result<Vec<String>> {
    match registry.scan(pattern).await {
        Ok(keys) => Ok(keys),
        Err(Error::RegistryTransient(msg)) => {
            Metrics::inc(&metrics.registry_retries);
            warn!(error = %msg, pattern, "registry scan failed transiently, treating as empty this attempt");
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}

/// `try_claim_slot`, but a [`Error::RegistryTransient`] counts as one
/// retryable attempt instead of aborting the caller's whole retry budget.
async fn claim_tolerant(
    registry: &dyn Registry,
    metrics: &Metrics,
    key: &str,
) -> crate::Result<ClaimOutcome> {
    match registry.try_claim_slot(key).await {
        Ok(outcome) => Ok(outcome),
        Err(Error::RegistryTransient(msg)) => {
            Metrics::inc(&metrics.registry_retries);
            warn!(error = %msg, key, "transient registry error during claim, retrying");
            Ok(ClaimOutcome::Retry)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::fake::FakeRegistry;
    use crate::registry::ServerFields;

    #[test]
    fn attempt_budgets_match_the_documented_phase_split() {
        assert_eq!(JOIN_IN_PROGRESS_ATTEMPTS, 25);
        assert_eq!(COLD_START_ATTEMPTS, 30);
        assert_eq!(COLD_START_PRIORITY_WINDOW, 20);
    }

    fn ready_server(max_players: u32) -> Vec<(&'static str, String)> {
        let mut f = ServerFields::seed("t1-container0".into(), max_players);
        f.ready = true;
        f.public_ip = Some("1.2.3.4".into());
        f.port = Some("7777".into());
        f.to_hash_fields()
    }

    #[tokio::test]
    async fn cold_start_claims_an_available_server() {
        let registry = FakeRegistry::new();
        registry.seed_hash("available-gameserver-t1-container0", &ready_server(2));
        let metrics = Metrics::new();

        let assignment = request_game_session(&registry, &metrics).await.unwrap();
        assert_eq!(assignment.public_ip, "1.2.3.4");
        assert_eq!(assignment.port, "7777");

        let hash = registry.hash("available-gameserver-t1-container0").unwrap();
        assert_eq!(hash.get("reserved-player-slots").unwrap(), "1");
    }

    #[tokio::test]
    async fn cold_start_prefers_the_priority_pool_in_the_first_twenty_attempts() {
        let registry = FakeRegistry::new();
        registry.seed_hash(
            "available-priority-gameserver-t1-container0",
            &ready_server(2),
        );
        let metrics = Metrics::new();

        let assignment = request_game_session(&registry, &metrics).await.unwrap();
        assert_eq!(assignment.public_ip, "1.2.3.4");
    }

    #[tokio::test]
    async fn no_capacity_when_every_server_is_full() {
        let registry = FakeRegistry::new();
        let mut full = ready_server(1);
        full.push(("reserved-player-slots", "1".to_string()));
        registry.seed_hash("available-gameserver-t1-container0", &full);
        let metrics = Metrics::new();

        let err = request_game_session(&registry, &metrics).await.unwrap_err();
        assert!(matches!(err, Error::NoCapacity));
    }
}
