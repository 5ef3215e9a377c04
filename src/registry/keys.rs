//! Key schema for the fleet registry: bucket prefixes, key builders, and the
//! TTLs each class of key carries.

use std::time::Duration;

/// One of the four lifecycle buckets a server can occupy (I1: exactly one
/// at a time, barring the brief transitional window during a heartbeat).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    /// Zero players, task never hosted a session.
    Available,
    /// Zero players, task has hosted a session before (preferred rotation target).
    AvailablePriority,
    /// At least one player, not yet full.
    Active,
    /// Marked in-use / at capacity by the server itself.
    Full,
}

impl Bucket {
    pub const ALL: [Bucket; 4] = [
        Bucket::Available,
        Bucket::AvailablePriority,
        Bucket::Active,
        Bucket::Full,
    ];

    fn prefix(self) -> &'static str {
        match self {
            Bucket::Available => "available-gameserver-",
            Bucket::AvailablePriority => "available-priority-gameserver-",
            Bucket::Active => "active-gameserver-",
            Bucket::Full => "full-gameserver-",
        }
    }

    /// The bucket's key for a given container id.
    pub fn key(self, cid: &str) -> String {
        format!("{}{}", self.prefix(), cid)
    }

    /// Glob pattern matching every key in this bucket.
    pub fn scan_pattern(self) -> String {
        format!("{}*", self.prefix())
    }
}

/// Heartbeat-maintained server hashes expire after this long without a
/// refreshing heartbeat (heartbeats arrive every ~15s; two missed beats and
/// the entry is gone).
pub const GAMESERVERDATA_TTL: Duration = Duration::from_secs(20);

/// Window during which a reservation is honored without a confirming
/// heartbeat before the sweep clamps it back down.
pub const RESERVATION_STALE_AFTER: Duration = Duration::from_secs(30);

/// TTL on the best-effort lock sentinel written by a successful slot claim.
pub const LOCK_TTL: Duration = Duration::from_secs(3);

/// Key of the `prioritize-<onlyTaskArn>` sticky marker.
pub fn prioritize_key(only_task_arn: &str) -> String {
    format!("prioritize-{only_task_arn}")
}

/// Key of the best-effort lock sentinel watched during a slot claim.
pub fn lock_key(bucket_key: &str) -> String {
    format!("-lock{bucket_key}")
}

/// Glob pattern matching every bucket key for a given task (all containers,
/// any bucket) — used by the drain checker.
pub fn any_bucket_for_task_pattern(task_arn: &str) -> String {
    format!("*-gameserver-{task_arn}*")
}

/// Container id of the Nth container in a task: `<taskArn>-container<N>`.
pub fn container_id(task_arn: &str, n: u32) -> String {
    format!("{task_arn}-container{n}")
}

/// Strip the `-container<N>` suffix from a container id to recover the
/// owning task's arn.
pub fn only_task_arn(cid: &str) -> &str {
    match cid.rfind("-container") {
        Some(idx) => &cid[..idx],
        None => cid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_keys_carry_the_right_prefix() {
        assert_eq!(Bucket::Available.key("t1-container0"), "available-gameserver-t1-container0");
        assert_eq!(
            Bucket::AvailablePriority.key("t1-container0"),
            "available-priority-gameserver-t1-container0"
        );
        assert_eq!(Bucket::Active.key("t1-container0"), "active-gameserver-t1-container0");
        assert_eq!(Bucket::Full.key("t1-container0"), "full-gameserver-t1-container0");
    }

    #[test]
    fn only_task_arn_strips_container_suffix() {
        assert_eq!(only_task_arn("arn:aws:ecs:task/abc-container3"), "arn:aws:ecs:task/abc");
        assert_eq!(only_task_arn("no-container-suffix-here"), "no-container-suffix-here");
    }

    #[test]
    fn container_id_roundtrips_through_only_task_arn() {
        let cid = container_id("arn:aws:ecs:task/abc", 7);
        assert_eq!(cid, "arn:aws:ecs:task/abc-container7");
        assert_eq!(only_task_arn(&cid), "arn:aws:ecs:task/abc");
    }

    #[test]
    fn drain_pattern_matches_any_bucket() {
        let pattern = any_bucket_for_task_pattern("arn:aws:ecs:task/abc");
        assert_eq!(pattern, "*-gameserver-arn:aws:ecs:task/abc*");
    }
}
