//! Heartbeat / state-transition handler (component C) — moves a server
//! between lifecycle buckets as its status changes and expires stale slot
//! reservations.

use crate::registry::keys::{any_bucket_for_task_pattern, only_task_arn, prioritize_key, RESERVATION_STALE_AFTER};
use crate::registry::{Bucket, Registry, ServerFields};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// One inbound heartbeat report from a running game-server container.
#[derive(Debug, Clone)]
pub struct HeartbeatEvent {
    pub container_id: String,
    pub server_in_use: bool,
    pub current_players: u32,
    pub max_players: u32,
    pub ready: bool,
    pub public_ip: Option<String>,
    pub port: Option<String>,
    pub server_terminated: bool,
}

/// Carried-forward reservation state found during the sweep, to be written
/// onto whichever bucket the server lands in.
#[derive(Debug, Clone, Copy, Default)]
struct Reservation {
    reserved_player_slots: Option<u32>,
    last_reservation_time: Option<f64>,
}

/// Apply one heartbeat, migrating `event.container_id` to its derived
/// target bucket and sweeping any stale reservation along the way.
///
/// Returns the bucket the server was written into, or `None` when the
/// heartbeat only removed keys (termination) or couldn't be applied yet
/// (missing `publicIP`) — callers use this to attribute per-bucket metrics
/// to the bucket actually chosen rather than to the raw request fields.
pub async fn update_redis(registry: &dyn Registry, event: &HeartbeatEvent) -> crate::Result<Option<Bucket>> {
    let cid = event.container_id.as_str();
    let only_task = only_task_arn(cid).to_string();

    let reservation = sweep_reservation(registry, cid, event.current_players).await?;

    if event.server_terminated {
        for bucket in Bucket::ALL {
            registry.delete(&bucket.key(cid)).await?;
        }
        info!(cid, "heartbeat: server terminated, bucket keys removed");
        return Ok(None);
    }

    let public_ip = match &event.public_ip {
        Some(ip) if !ip.is_empty() => ip.clone(),
        _ => {
            debug!(cid, "heartbeat: missing publicIP, server not yet reachable");
            return Ok(None);
        }
    };
    let port = event.port.clone().unwrap_or_default();

    let target = select_target_bucket(registry, &only_task, event).await?;

    // Refresh the `prioritize-<onlyTaskArn>` sticky marker whenever this
    // task is in (or re-entering) a bucket that marks it for rotation
    // preference: full, active, or idle-but-already-prioritized. Skipping
    // the idle/priority case here would let the marker's TTL lapse on a
    // task that keeps sending heartbeats, same as `updateredis.py`'s
    // idle/priority branch refreshing it on every such heartbeat.
    if matches!(target, Bucket::Full | Bucket::Active | Bucket::AvailablePriority) {
        mark_priority(registry, &only_task).await?;
    }

    for bucket in Bucket::ALL {
        if bucket != target {
            registry.delete(&bucket.key(cid)).await?;
        }
    }

    let mut fields = ServerFields {
        server_id: cid.to_string(),
        current_players: event.current_players,
        max_players: event.max_players,
        ready: event.ready,
        public_ip: Some(public_ip),
        port: Some(port),
        reserved_player_slots: None,
        last_reservation_time: None,
    };

    if matches!(target, Bucket::Active | Bucket::Available | Bucket::AvailablePriority) {
        fields.reserved_player_slots = reservation.reserved_player_slots;
        fields.last_reservation_time = reservation.last_reservation_time;
    }

    registry
        .hset_all(&target.key(cid), &fields, crate::registry::keys::GAMESERVERDATA_TTL)
        .await?;

    debug!(cid, bucket = ?target, "heartbeat: target bucket written");
    Ok(Some(target))
}

/// Probe `available`, `available-priority`, `active` in that order for a
/// `last-reservation-time`; the first hit wins. If it is stale (older than
/// [`RESERVATION_STALE_AFTER`]) and over-reserved relative to the reported
/// player count, clamp the carried-forward reservation down to that count.
async fn sweep_reservation(
    registry: &dyn Registry,
    cid: &str,
    current_players: u32,
) -> crate::Result<Reservation> {
    for bucket in [Bucket::Available, Bucket::AvailablePriority, Bucket::Active] {
        let map = registry.hgetall(&bucket.key(cid)).await?;
        let Some(fields) = ServerFields::from_hash_map(&map) else {
            continue;
        };
        let Some(last) = fields.last_reservation_time else {
            continue;
        };

        let mut reserved = fields.reserved_player_slots;
        if now_secs_f64() - last > RESERVATION_STALE_AFTER.as_secs_f64() {
            if let Some(r) = reserved {
                if r > current_players {
                    debug!(cid, stale_for = now_secs_f64() - last, "clamping stale reservation");
                    reserved = Some(current_players);
                }
            }
        }

        return Ok(Reservation {
            reserved_player_slots: reserved,
            last_reservation_time: Some(last),
        });
    }
    Ok(Reservation::default())
}

async fn select_target_bucket(
    registry: &dyn Registry,
    only_task: &str,
    event: &HeartbeatEvent,
) -> crate::Result<Bucket> {
    if event.server_in_use {
        return Ok(Bucket::Full);
    }
    if event.current_players > 0 {
        return Ok(Bucket::Active);
    }

    let prioritized = registry.exists(&prioritize_key(only_task)).await?;
    if prioritized {
        // Drop any lingering plain `available` entry for this cid — the
        // server is moving to the priority pool instead.
        registry.delete(&Bucket::Available.key(&event.container_id)).await?;
        Ok(Bucket::AvailablePriority)
    } else {
        Ok(Bucket::Available)
    }
}

async fn mark_priority(registry: &dyn Registry, only_task: &str) -> crate::Result<()> {
    let key = prioritize_key(only_task);
    registry.set(&key, "yes").await?;
    registry
        .expire(&key, crate::registry::keys::GAMESERVERDATA_TTL)
        .await?;
    Ok(())
}

/// Sanity helper for tests and the drain checker's documentation: the glob
/// every bucket key for a task matches.
pub fn drain_pattern(task_arn: &str) -> String {
    any_bucket_for_task_pattern(task_arn)
}

fn now_secs_f64() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::fake::FakeRegistry;

    fn event(container_id: &str) -> HeartbeatEvent {
        HeartbeatEvent {
            container_id: container_id.to_string(),
            server_in_use: false,
            current_players: 0,
            max_players: 2,
            ready: true,
            public_ip: Some("1.2.3.4".into()),
            port: Some("7777".into()),
            server_terminated: false,
        }
    }

    #[test]
    fn missing_public_ip_is_detected_before_any_registry_call() {
        let mut e = event("arn-container0");
        e.public_ip = None;
        assert!(e.public_ip.is_none());
    }

    #[test]
    fn drain_pattern_matches_the_registry_key_helper() {
        assert_eq!(drain_pattern("arn"), any_bucket_for_task_pattern("arn"));
    }

    #[tokio::test]
    async fn idle_heartbeat_goes_to_available_when_not_prioritized() {
        let registry = FakeRegistry::new();
        let target = update_redis(&registry, &event("arn-container0")).await.unwrap();
        assert_eq!(target, Some(Bucket::Available));
    }

    #[tokio::test]
    async fn idle_heartbeat_sticks_to_the_priority_pool_and_refreshes_the_marker() {
        let registry = FakeRegistry::new();
        registry.seed_hash(&prioritize_key("arn"), &[]);

        let target = update_redis(&registry, &event("arn-container0")).await.unwrap();
        assert_eq!(target, Some(Bucket::AvailablePriority));

        // The marker must still exist — this is the behavior a prioritized
        // task that only ever sends idle heartbeats depends on to avoid
        // losing its rotation preference after the marker's TTL.
        assert!(registry.contains_key(&prioritize_key("arn")));
        assert!(registry.hash("available-priority-gameserver-arn-container0").is_some());
    }

    #[tokio::test]
    async fn active_heartbeat_moves_server_and_marks_priority() {
        let registry = FakeRegistry::new();
        let mut e = event("arn-container0");
        e.current_players = 1;

        let target = update_redis(&registry, &e).await.unwrap();
        assert_eq!(target, Some(Bucket::Active));
        assert!(registry.contains_key(&prioritize_key("arn")));
        assert!(!registry.contains_key(&Bucket::Available.key("arn-container0")));
    }

    #[tokio::test]
    async fn stale_reservation_is_clamped_to_current_players() {
        let registry = FakeRegistry::new();
        let stale = now_secs_f64() - (RESERVATION_STALE_AFTER.as_secs_f64() + 1.0);
        registry.seed_hash(
            "available-gameserver-arn-container0",
            &[
                ("server-id", "arn-container0".to_string()),
                ("current-players", "0".to_string()),
                ("max-players", "2".to_string()),
                ("ready", "1".to_string()),
                ("reserved-player-slots", "2".to_string()),
                ("last-reservation-time", stale.to_string()),
            ],
        );

        let mut e = event("arn-container0");
        e.current_players = 0;
        update_redis(&registry, &e).await.unwrap();

        let hash = registry.hash("available-gameserver-arn-container0").unwrap();
        assert_eq!(hash.get("reserved-player-slots").unwrap(), "0");
    }

    #[tokio::test]
    async fn fresh_reservation_is_carried_forward_unclamped() {
        let registry = FakeRegistry::new();
        let fresh = now_secs_f64() - 5.0;
        registry.seed_hash(
            "available-gameserver-arn-container0",
            &[
                ("server-id", "arn-container0".to_string()),
                ("current-players", "0".to_string()),
                ("max-players", "2".to_string()),
                ("ready", "1".to_string()),
                ("reserved-player-slots", "2".to_string()),
                ("last-reservation-time", fresh.to_string()),
            ],
        );

        let mut e = event("arn-container0");
        e.current_players = 0;
        update_redis(&registry, &e).await.unwrap();

        let hash = registry.hash("available-gameserver-arn-container0").unwrap();
        assert_eq!(hash.get("reserved-player-slots").unwrap(), "2");
    }

    #[tokio::test]
    async fn terminated_server_removes_every_bucket_key_and_returns_none() {
        let registry = FakeRegistry::new();
        registry.seed_hash("active-gameserver-arn-container0", &[]);
        registry.seed_hash("full-gameserver-arn-container0", &[]);

        let mut e = event("arn-container0");
        e.server_terminated = true;
        let target = update_redis(&registry, &e).await.unwrap();

        assert_eq!(target, None);
        assert!(!registry.contains_key("active-gameserver-arn-container0"));
        assert!(!registry.contains_key("full-gameserver-arn-container0"));
    }
}
