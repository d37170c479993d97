//! Redis Cache - Distributed Cache Backend
//!
//! Entries live under `value:<key>`; every tag is a redis set `tag:<tag>`
//! whose members are the value keys carrying that tag. Keys and tags are
//! sanitized so that anything outside `[A-Za-z0-9]` becomes `-`.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use deadpool_redis::{Config as PoolSettings, Connection, Pool, PoolConfig, Runtime, Timeouts};
use redis::{AsyncCommands, Value};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::RedisBackendConfig;
use crate::entry::{Entry, Meta};
use crate::error::{CacheError, Result};
use crate::metrics::{BackendMetrics, BackendStats};
use crate::registry::{EncodedPayload, PayloadRegistry};
use crate::traits::{CacheBackend, Capabilities};

const VALUE_PREFIX: &str = "value:";
const TAG_PREFIX: &str = "tag:";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

fn prefixed_key(prefix: &str, key: &str) -> String {
    let mut out = String::with_capacity(prefix.len() + key.len());
    out.push_str(prefix);
    out.extend(key.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '-' }));
    out
}

/// Redis key holding the entry for `key`
pub fn value_key(key: &str) -> String {
    prefixed_key(VALUE_PREFIX, key)
}

/// Redis set listing the value keys tagged with `tag`
pub fn tag_key(tag: &str) -> String {
    prefixed_key(TAG_PREFIX, tag)
}

/// Seconds until the grace deadline, rounded, at least one
fn expiry_seconds(meta: &Meta, now: SystemTime) -> u64 {
    let millis = meta.remaining_grace(now).as_millis();
    u64::try_from(millis.saturating_add(500) / 1000)
        .unwrap_or(u64::MAX)
        .max(1)
}

/// Build the connection pool; no connection is opened until the first borrow
///
/// `max_idle` caps the pooled connections, and recycled connections are
/// checked with `PING` by the pool manager.
fn build_pool(config: &RedisBackendConfig) -> Result<Pool> {
    let mut timeouts = Timeouts::new();
    timeouts.create = Some(CONNECT_TIMEOUT);
    timeouts.recycle = Some(CONNECT_TIMEOUT);

    let mut pool_config = PoolConfig::new(config.max_idle.max(1));
    pool_config.timeouts = timeouts;

    let mut settings = PoolSettings::from_url(config.url());
    settings.pool = Some(pool_config);
    settings
        .create_pool(Some(Runtime::Tokio1))
        .map_err(|e| CacheError::Config(format!("redis pool: {e}")))
}

/// Stored form of an entry; tags are kept in the tag sets only
#[derive(Serialize, Deserialize)]
struct RedisRecord {
    meta: RedisMeta,
    payload: EncodedPayload,
}

#[derive(Serialize, Deserialize)]
struct RedisMeta {
    lifetime: Duration,
    gracetime: Duration,
    lifetime_at: SystemTime,
    gracetime_at: SystemTime,
}

/// Redis cache backend
///
/// Failed reads are logged, counted by reason (`GetFailed`, `NilReply`,
/// `ByteConvertFailed`, `DecodeFailed`) and reported as a miss.
pub struct RedisBackend {
    pool: Pool,
    idle_timeout: Duration,
    registry: Arc<PayloadRegistry>,
    metrics: BackendMetrics,
}

impl RedisBackend {
    /// Create a new redis backend; connections are opened lazily
    ///
    /// # Errors
    ///
    /// Returns an error if the connection settings do not form a valid URL.
    pub fn new(config: &RedisBackendConfig, registry: Arc<PayloadRegistry>) -> Result<Self> {
        let pool = build_pool(config)?;

        info!(
            host = %config.host,
            port = %config.port,
            db = config.db,
            max_idle = config.max_idle,
            "Redis cache backend initialized"
        );

        Ok(Self {
            pool,
            idle_timeout: config.idle_timeout(),
            registry,
            metrics: BackendMetrics::new("redis"),
        })
    }

    /// Create a backend and verify the server answers `PING`
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot be reached.
    pub async fn connect(config: &RedisBackendConfig, registry: Arc<PayloadRegistry>) -> Result<Self> {
        let backend = Self::new(config, registry)?;
        backend.ping().await?;
        info!(host = %config.host, port = %config.port, "Redis cache backend connected");
        Ok(backend)
    }

    /// Tag metrics with the name of the frontend this backend serves
    #[must_use]
    pub fn with_frontend_name(mut self, frontend_name: &str) -> Self {
        self.metrics = self.metrics.with_frontend_name(frontend_name);
        self
    }

    /// Borrow a pooled connection, first dropping those idle for too long
    async fn connection(&self) -> Result<Connection> {
        let idle_timeout = self.idle_timeout;
        let swept = self
            .pool
            .retain(|_, metrics| metrics.last_used() < idle_timeout)
            .removed
            .len();
        if swept > 0 {
            debug!(swept, "[Redis] Dropped idle connections past their timeout");
        }
        Ok(self.pool.get().await?)
    }

    /// Round trip a `PING`
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot be reached.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    /// Release every pooled connection; later operations fail
    pub fn close(&self) {
        self.pool.close();
        info!("Redis cache backend closed");
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn stats(&self) -> BackendStats {
        self.metrics.stats()
    }

    fn encode(&self, entry: &Entry) -> Result<Vec<u8>> {
        let record = RedisRecord {
            meta: RedisMeta {
                lifetime: entry.meta.lifetime,
                gracetime: entry.meta.gracetime,
                lifetime_at: entry.meta.lifetime_at(),
                gracetime_at: entry.meta.gracetime_at(),
            },
            payload: self.registry.encode(&entry.data)?,
        };
        Ok(bincode::serialize(&record)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Entry> {
        let record: RedisRecord = bincode::deserialize(bytes)?;
        let data = self.registry.decode(&record.payload)?;
        let meta = Meta::from_parts(
            BTreeSet::new(),
            record.meta.lifetime,
            record.meta.gracetime,
            record.meta.lifetime_at,
            record.meta.gracetime_at,
        );
        Ok(Entry::new(data, meta))
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Option<Entry> {
        let reply: Result<Value> = async {
            let mut conn = self.connection().await?;
            let value: Value = redis::cmd("GET").arg(value_key(key)).query_async(&mut conn).await?;
            Ok(value)
        }
        .await;

        let bytes = match reply {
            Ok(Value::BulkString(bytes)) => bytes,
            Ok(Value::Nil) => {
                self.metrics.count_miss();
                self.metrics.count_error("NilReply");
                debug!(key = %key, "[Redis] Returned nil");
                return None;
            }
            Ok(other) => {
                self.metrics.count_error("ByteConvertFailed");
                error!(key = %key, reply = ?other, "[Redis] Reply is not a byte string");
                return None;
            }
            Err(e) => {
                self.metrics.count_miss();
                self.metrics.count_error("GetFailed");
                error!(key = %key, error = %e, "[Redis] Error getting key");
                return None;
            }
        };

        match self.decode(&bytes) {
            Ok(entry) => {
                self.metrics.count_hit();
                Some(entry)
            }
            Err(e) => {
                self.metrics.count_error("DecodeFailed");
                error!(key = %key, error = %e, "[Redis] Error decoding entry");
                None
            }
        }
    }

    async fn set(&self, key: &str, entry: Entry) -> Result<()> {
        let bytes = self.encode(&entry).inspect_err(|e| {
            self.metrics.count_error("EncodeFailed");
            error!(key = %key, error = %e, "[Redis] Error encoding entry");
        })?;

        let value_key = value_key(key);
        let ttl = expiry_seconds(&entry.meta, SystemTime::now());

        let mut pipe = redis::pipe();
        pipe.cmd("SETEX").arg(&value_key).arg(ttl).arg(bytes).ignore();
        for tag in &entry.meta.tags {
            pipe.cmd("SADD").arg(tag_key(tag)).arg(&value_key).ignore();
        }

        let result: Result<()> = async {
            let mut conn = self.connection().await?;
            let () = pipe.query_async(&mut conn).await?;
            Ok(())
        }
        .await;

        result.inspect_err(|e| {
            self.metrics.count_error("SetFailed");
            error!(key = %key, ttl_secs = ttl, error = %e, "[Redis] Error setting key");
        })?;

        debug!(key = %key, ttl_secs = ttl, tags = entry.meta.tags.len(), "[Redis] Cached key with TTL");
        Ok(())
    }

    async fn purge(&self, key: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        let _: () = conn.del(value_key(key)).await?;
        Ok(())
    }

    async fn purge_tags(&self, tags: &[String]) -> Result<()> {
        let mut conn = self.connection().await?;

        for tag in tags {
            let tag_key = tag_key(tag);
            let members: Vec<String> = match conn.smembers(&tag_key).await {
                Ok(members) => members,
                Err(e) => {
                    warn!(tag = %tag, error = %e, "[Redis] Failed SMEMBERS for tag");
                    Vec::new()
                }
            };

            for member in &members {
                let _: () = conn.del(member).await.inspect_err(|e| {
                    error!(key = %member, error = %e, "[Redis] Failed DEL for tagged key");
                })?;
            }

            let _: () = conn.del(&tag_key).await.inspect_err(|e| {
                error!(tag = %tag, error = %e, "[Redis] Failed DEL for tag set");
            })?;

            debug!(tag = %tag, purged = members.len(), "[Redis] Purged tag");
        }

        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        let mut conn = self.connection().await?;
        let _: () = redis::cmd("FLUSHALL")
            .query_async(&mut conn)
            .await
            .inspect_err(|e| error!(error = %e, "[Redis] Failed to flush"))?;
        Ok(())
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
