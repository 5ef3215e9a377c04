//! Typed wrapper around the shared fleet registry (component A).
//!
//! Most operations share one multiplexed asynchronous connection, cloned
//! cheaply per call site — the underlying protocol pipelines requests over
//! one socket, and reconnection/backoff is handled by the driver's own
//! `ConnectionManager`, not hand-rolled here. The slot-claim transaction is
//! the one exception: `WATCH`/`MULTI`/`EXEC` is a stateful sequence scoped
//! to whatever physical connection it runs on, so sharing the multiplexed
//! connection across concurrent claims would let one caller's commands land
//! inside another's watch window. Each claim attempt instead checks out a
//! dedicated, exclusive connection for the whole sequence, mirroring how
//! the source system checked a pipeline object out of a connection pool
//! per call (`with redis_client.pipeline() as pipe:`).

mod claim;
pub mod fields;
pub mod keys;

#[cfg(test)]
pub mod fake;

pub use claim::ClaimOutcome;
pub use fields::ServerFields;
pub use keys::Bucket;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Registry operations every component above this layer depends on. Behind
/// a trait, the way [`crate::orchestrator::Orchestrator`] wraps the ECS
/// client, so the allocator/heartbeat/autoscaler/drain tests can substitute
/// an in-memory fake instead of a real store.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Cursored enumeration of keys matching a glob `pattern`. Callers may
    /// observe an approximate snapshot under concurrent mutation — SCAN
    /// offers no point-in-time consistency, by design (§4.A).
    async fn scan(&self, pattern: &str) -> crate::Result<Vec<String>>;

    /// Write every field of `fields` onto `key`'s hash and set its TTL.
    async fn hset_all(&self, key: &str, fields: &ServerFields, ttl: Duration) -> crate::Result<()>;

    /// Read the whole hash.
    async fn hgetall(&self, key: &str) -> crate::Result<HashMap<String, String>>;

    /// Delete an entire key (hash or string), a no-op if absent.
    async fn delete(&self, key: &str) -> crate::Result<()>;

    /// Set `key`'s TTL.
    async fn expire(&self, key: &str, ttl: Duration) -> crate::Result<()>;

    /// `SET key value`, used for the `prioritize-<taskArn>` sticky marker.
    async fn set(&self, key: &str, value: &str) -> crate::Result<()>;

    /// Whether `key` exists.
    async fn exists(&self, key: &str) -> crate::Result<bool>;

    /// Atomically reserve one slot on `bucket_key`. See [`claim::try_claim_slot`].
    async fn try_claim_slot(&self, bucket_key: &str) -> crate::Result<ClaimOutcome>;
}

/// Client for the shared fleet registry.
#[derive(Clone)]
pub struct RegistryClient {
    /// The multiplexed, auto-reconnecting connection used for every
    /// operation that tolerates interleaving with other callers.
    conn: ConnectionManager,
    /// Kept only to mint a dedicated, exclusive connection per slot-claim
    /// attempt. Never cloned into a handle shared across calls.
    client: redis::Client,
}

impl RegistryClient {
    /// Connect to the registry at `endpoint` (a `redis://host:port/db` URL).
    pub async fn connect(endpoint: &str) -> crate::Result<Self> {
        let client = redis::Client::open(endpoint).map_err(crate::Error::from)?;
        let conn = client.get_connection_manager().await.map_err(crate::Error::from)?;
        Ok(Self { conn, client })
    }

    fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

#[async_trait]
impl Registry for RegistryClient {
    async fn scan(&self, pattern: &str) -> crate::Result<Vec<String>> {
        let mut conn = self.conn();
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();
        loop {
            let (next_cursor, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(500)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }
        debug!(pattern, count = keys.len(), "registry scan");
        Ok(keys)
    }

    async fn hset_all(&self, key: &str, fields: &ServerFields, ttl: Duration) -> crate::Result<()> {
        let mut conn = self.conn();
        let pairs = fields.to_hash_fields();
        let _: () = conn.hset_multiple(key, &pairs).await?;
        let _: () = conn.expire(key, ttl.as_secs() as i64).await?;
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> crate::Result<HashMap<String, String>> {
        let mut conn = self.conn();
        Ok(conn.hgetall(key).await?)
    }

    async fn delete(&self, key: &str) -> crate::Result<()> {
        let mut conn = self.conn();
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> crate::Result<()> {
        let mut conn = self.conn();
        let _: () = conn.expire(key, ttl.as_secs() as i64).await?;
        Ok(())
    }

    async fn set(&self, key: &str, value: &str) -> crate::Result<()> {
        let mut conn = self.conn();
        let _: () = conn.set(key, value).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> crate::Result<bool> {
        let mut conn = self.conn();
        Ok(conn.exists(key).await?)
    }

    async fn try_claim_slot(&self, bucket_key: &str) -> crate::Result<ClaimOutcome> {
        // A dedicated connection for the whole watch/multi/exec sequence —
        // never the shared `ConnectionManager`, which would let another
        // caller's traffic land inside this one's watch window.
        let mut conn = self
            .client
            .get_async_connection()
            .await
            .map_err(crate::Error::from)?;
        claim::try_claim_slot(&mut conn, bucket_key).await
    }
}
