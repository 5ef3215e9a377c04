//! The atomic slot-claim primitive (§4.A) — the one concurrency-critical
//! registry operation everything else (the allocator) is built on top of.

use super::keys::{lock_key, LOCK_TTL};
use redis::aio::Connection;
use redis::AsyncCommands;

/// Outcome of a single [`try_claim_slot`] attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// Reserved one slot; here is where to send the client.
    Claimed { public_ip: String, port: String },
    /// `reserved-player-slots >= max-players` already.
    Full,
    /// `ready` is `0` — the server hasn't finished starting up.
    NotReady,
    /// The lock sentinel changed between the read and the commit; the
    /// caller should pick a different key and try again.
    Retry,
}

/// Atomically reserve one slot on `bucket_key`, or report why not.
///
/// Implements watch-multi-exec on the key's lock sentinel: watch, read
/// `ready`/`reserved-player-slots`/`max-players`, then in one transactional
/// batch bump the reservation, stamp `last-reservation-time`, and rewrite
/// the sentinel with a fresh TTL. If the sentinel changed under us the
/// transaction aborts and the caller gets [`ClaimOutcome::Retry`].
///
/// `conn` must be a connection opened fresh for this call and dropped
/// afterward — never a handle shared with other concurrent callers. A
/// watch/multi/exec sequence is scoped to whatever physical connection it
/// runs on; interleaving another caller's commands into that window (which
/// a shared multiplexed connection would allow) breaks the optimistic lock
/// this function depends on.
pub async fn try_claim_slot(
    conn: &mut Connection,
    bucket_key: &str,
) -> crate::Result<ClaimOutcome> {
    let lock = lock_key(bucket_key);

    let ready: Option<String> = conn.hget(bucket_key, "ready").await?;
    match ready.as_deref() {
        Some("1") => {}
        _ => return Ok(ClaimOutcome::NotReady),
    }

    let _: () = redis::cmd("WATCH").arg(&lock).query_async(conn).await?;

    let reserved: Option<String> = conn.hget(bucket_key, "reserved-player-slots").await?;
    let max_players: Option<String> = conn.hget(bucket_key, "max-players").await?;

    let reserved: u32 = reserved.and_then(|v| v.parse().ok()).unwrap_or(0);
    let max_players: u32 = match max_players.and_then(|v| v.parse().ok()) {
        Some(m) => m,
        None => {
            // Hash vanished (TTL race) between the ready check and here.
            let _: () = redis::cmd("UNWATCH").query_async(conn).await?;
            return Ok(ClaimOutcome::Retry);
        }
    };

    if reserved >= max_players {
        let _: () = redis::cmd("UNWATCH").query_async(conn).await?;
        return Ok(ClaimOutcome::Full);
    }

    let now = now_secs_f64();
    let next_reserved = reserved + 1;

    let mut pipe = redis::pipe();
    pipe.atomic()
        .hset(bucket_key, "reserved-player-slots", next_reserved)
        .ignore()
        .hset(bucket_key, "last-reservation-time", format!("{now}"))
        .ignore()
        .set(&lock, "")
        .ignore()
        .expire(&lock, LOCK_TTL.as_secs() as i64)
        .ignore();

    let committed: Option<()> = pipe.query_async(conn).await?;
    if committed.is_none() {
        return Ok(ClaimOutcome::Retry);
    }

    let public_ip: Option<String> = conn.hget(bucket_key, "publicIP").await?;
    let port: Option<String> = conn.hget(bucket_key, "port").await?;
    match (public_ip, port) {
        (Some(public_ip), Some(port)) => Ok(ClaimOutcome::Claimed { public_ip, port }),
        // The hash was deleted out from under a just-committed reservation
        // (heartbeat race, §5) — treat as a retry against a different key.
        _ => Ok(ClaimOutcome::Retry),
    }
}

fn now_secs_f64() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
