//! In-memory [`Registry`] used only by tests, mirroring how
//! [`crate::orchestrator::Orchestrator`] gets a fake in the autoscaler
//! tests. Single-process, no TTL expiry (tests stamp `last-reservation-time`
//! directly rather than waiting out a real clock) — enough to exercise the
//! allocator's and heartbeat handler's decision logic without a live Redis.

use super::{ClaimOutcome, Registry, ServerFields};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// A hash or a plain string value, keyed by registry key.
#[derive(Debug, Clone)]
enum Entry {
    Hash(HashMap<String, String>),
    Value(String),
}

#[derive(Default)]
pub struct FakeRegistry {
    store: Mutex<HashMap<String, Entry>>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a hash key directly with field/value pairs, as if written by a
    /// prior `hset_all`.
    pub fn seed_hash(&self, key: &str, fields: &[(&str, String)]) {
        let map = fields.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
        self.store.lock().unwrap().insert(key.to_string(), Entry::Hash(map));
    }

    /// Read back a hash key's fields, for assertions.
    pub fn hash(&self, key: &str) -> Option<HashMap<String, String>> {
        match self.store.lock().unwrap().get(key) {
            Some(Entry::Hash(map)) => Some(map.clone()),
            _ => None,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.store.lock().unwrap().contains_key(key)
    }
}

fn matches_glob(key: &str, pattern: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => key == pattern,
    }
}

#[async_trait]
impl Registry for FakeRegistry {
    async fn scan(&self, pattern: &str) -> crate::Result<Vec<String>> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .keys()
            .filter(|k| matches_glob(k, pattern))
            .cloned()
            .collect())
    }

    async fn hset_all(&self, key: &str, fields: &ServerFields, _ttl: std::time::Duration) -> crate::Result<()> {
        let map = fields
            .to_hash_fields()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        self.store.lock().unwrap().insert(key.to_string(), Entry::Hash(map));
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> crate::Result<HashMap<String, String>> {
        match self.store.lock().unwrap().get(key) {
            Some(Entry::Hash(map)) => Ok(map.clone()),
            _ => Ok(HashMap::new()),
        }
    }

    async fn delete(&self, key: &str) -> crate::Result<()> {
        self.store.lock().unwrap().remove(key);
        Ok(())
    }

    async fn expire(&self, _key: &str, _ttl: std::time::Duration) -> crate::Result<()> {
        Ok(())
    }

    async fn set(&self, key: &str, value: &str) -> crate::Result<()> {
        self.store.lock().unwrap().insert(key.to_string(), Entry::Value(value.to_string()));
        Ok(())
    }

    async fn exists(&self, key: &str) -> crate::Result<bool> {
        Ok(self.store.lock().unwrap().contains_key(key))
    }

    async fn try_claim_slot(&self, bucket_key: &str) -> crate::Result<ClaimOutcome> {
        let mut guard = self.store.lock().unwrap();
        let Some(Entry::Hash(hash)) = guard.get_mut(bucket_key) else {
            return Ok(ClaimOutcome::Retry);
        };
        if hash.get("ready").map(String::as_str) != Some("1") {
            return Ok(ClaimOutcome::NotReady);
        }
        let reserved: u32 = hash.get("reserved-player-slots").and_then(|v| v.parse().ok()).unwrap_or(0);
        let max_players: u32 = match hash.get("max-players").and_then(|v| v.parse().ok()) {
            Some(m) => m,
            None => return Ok(ClaimOutcome::Retry),
        };
        if reserved >= max_players {
            return Ok(ClaimOutcome::Full);
        }
        hash.insert("reserved-player-slots".to_string(), (reserved + 1).to_string());
        match (hash.get("publicIP").cloned(), hash.get("port").cloned()) {
            (Some(public_ip), Some(port)) => Ok(ClaimOutcome::Claimed { public_ip, port }),
            _ => Ok(ClaimOutcome::Retry),
        }
    }
}
