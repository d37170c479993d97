//! In-Memory Cache - Bounded 2Q Backend
//!
//! Process-local backend on top of [`TwoQueueCache`]. Capacity eviction is
//! left to the pool; expired entries are reclaimed by a periodic sweep.

use std::num::NonZeroUsize;
use std::sync::{Arc, Weak};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::two_queue::TwoQueueCache;
use crate::entry::Entry;
use crate::error::{CacheError, Result};
use crate::metrics::{BackendMetrics, BackendStats};
use crate::traits::{CacheBackend, Capabilities};

/// Default number of resident entries
pub const DEFAULT_SIZE: usize = 100;

/// Default interval between two sweep ticks
pub const DEFAULT_SWEEP_PERIOD: Duration = Duration::from_secs(60);

type Pool = TwoQueueCache<String, Entry>;

/// Configuration for `InMemoryBackend`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InMemoryBackendConfig {
    /// Max number of entries
    pub size: usize,
    /// Interval of the expiry sweep
    #[serde(skip, default = "default_sweep_period")]
    pub sweep_period: Duration,
}

fn default_sweep_period() -> Duration {
    DEFAULT_SWEEP_PERIOD
}

impl Default for InMemoryBackendConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_SIZE,
            sweep_period: DEFAULT_SWEEP_PERIOD,
        }
    }
}

/// Handle of a running sweep task; the task stops when the handle is dropped
#[derive(Debug)]
pub struct SweepHandle {
    task: JoinHandle<()>,
}

impl SweepHandle {
    fn spawn(pool: Weak<Pool>, period: Duration) -> Option<Self> {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No tokio runtime available, in-memory sweep disabled");
            return None;
        };

        let task = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(pool) = pool.upgrade() else {
                    break;
                };
                sweep_once(&pool, SystemTime::now());
            }
        });

        Some(Self { task })
    }

    /// Stop the sweep task
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for SweepHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Remove the first resident entry whose grace deadline has passed
fn sweep_once(pool: &Pool, now: SystemTime) -> Option<String> {
    for key in pool.keys() {
        let expired = pool
            .peek(&key)
            .is_some_and(|entry| entry.meta.gracetime_at() < now);
        if expired {
            pool.remove(&key);
            debug!(key = %key, "[InMemory] Swept expired entry");
            return Some(key);
        }
    }
    None
}

/// Bounded in-process cache backend
///
/// - 2Q LRU eviction at a fixed capacity
/// - A sweep task removing at most one expired entry per tick
/// - No tag index: `purge_tags` is unsupported
pub struct InMemoryBackend {
    pool: Arc<Pool>,
    metrics: BackendMetrics,
    sweeper: Mutex<Option<SweepHandle>>,
}

impl InMemoryBackend {
    /// Create a new in-memory backend and start its sweep task
    ///
    /// The sweep only starts when called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if `config.size` is zero.
    pub fn new(config: InMemoryBackendConfig) -> Result<Self> {
        let size = NonZeroUsize::new(config.size)
            .ok_or_else(|| CacheError::Config("in-memory backend size must be positive".into()))?;

        let pool = Arc::new(TwoQueueCache::new(size));
        let sweeper = SweepHandle::spawn(Arc::downgrade(&pool), config.sweep_period);

        info!(
            capacity = config.size,
            sweep_period_secs = config.sweep_period.as_secs(),
            "In-memory cache backend initialized"
        );

        Ok(Self {
            pool,
            metrics: BackendMetrics::new("inmemory"),
            sweeper: Mutex::new(sweeper),
        })
    }

    /// Tag metrics with the name of the frontend this backend serves
    #[must_use]
    pub fn with_frontend_name(mut self, frontend_name: &str) -> Self {
        self.metrics = self.metrics.with_frontend_name(frontend_name);
        self
    }

    /// Stop the background sweep; entries are still evicted by capacity
    pub fn stop_sweeper(&self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.stop();
        }
    }

    /// `true` while the sweep task is running
    pub fn is_sweeping(&self) -> bool {
        self.sweeper
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.task.is_finished())
    }

    /// Run one sweep step now, returning the removed key
    pub fn sweep(&self) -> Option<String> {
        sweep_once(&self.pool, SystemTime::now())
    }

    /// Number of resident entries
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    pub fn stats(&self) -> BackendStats {
        self.metrics.stats()
    }
}

#[async_trait]
impl CacheBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Option<Entry> {
        let entry = self.pool.get(&key.to_string());
        if entry.is_some() {
            self.metrics.count_hit();
        } else {
            self.metrics.count_miss();
        }
        entry
    }

    async fn set(&self, key: &str, entry: Entry) -> Result<()> {
        self.pool.add(key.to_string(), entry);
        Ok(())
    }

    async fn purge(&self, key: &str) -> Result<()> {
        self.pool.remove(&key.to_string());
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        self.pool.purge();
        Ok(())
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::FLUSH
    }

    fn name(&self) -> &'static str {
        "inmemory"
    }
}
