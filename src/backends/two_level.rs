//! Two-Level Cache - Fast Tier in Front of a Slow Tier
//!
//! A hit in the second tier is returned right away and copied into the first
//! tier by a detached task, so later reads are served by the fast tier.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::multi_level::{all_succeeded, fan_out, set_all};
use crate::entry::Entry;
use crate::error::{CacheError, Result};
use crate::traits::{CacheBackend, Capabilities};

/// Backend combining a first (fast) and a second (slow) tier
pub struct TwoLevelBackend {
    /// `[first, second]`
    tiers: [Arc<dyn CacheBackend>; 2],
    promotions: Arc<AtomicU64>,
}

impl TwoLevelBackend {
    pub fn new(first: Arc<dyn CacheBackend>, second: Arc<dyn CacheBackend>) -> Self {
        info!(
            first = first.name(),
            second = second.name(),
            "Two-level cache backend initialized"
        );
        Self {
            tiers: [first, second],
            promotions: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn first(&self) -> &Arc<dyn CacheBackend> {
        let [first, _] = &self.tiers;
        first
    }

    pub fn second(&self) -> &Arc<dyn CacheBackend> {
        let [_, second] = &self.tiers;
        second
    }

    /// Entries copied from the second into the first tier so far
    pub fn promotions(&self) -> u64 {
        self.promotions.load(Ordering::Relaxed)
    }

    /// `true` if both tiers can flush
    pub fn flush_support(&self) -> bool {
        self.capabilities().flush
    }

    /// `true` if both tiers can purge by tag
    pub fn tag_support(&self) -> bool {
        self.capabilities().tags
    }

    fn promote(&self, key: &str, entry: Entry) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(key = %key, "[TwoLevel] No tokio runtime, skipping promotion");
            return;
        };

        let first = Arc::clone(self.first());
        let promotions = Arc::clone(&self.promotions);
        let key = key.to_string();

        runtime.spawn(async move {
            match first.set(&key, entry).await {
                Ok(()) => {
                    promotions.fetch_add(1, Ordering::Relaxed);
                    debug!(key = %key, "[TwoLevel] Promoted entry to first tier");
                }
                Err(e) => warn!(key = %key, error = %e, "[TwoLevel] Failed to promote entry"),
            }
        });
    }
}

#[async_trait]
impl CacheBackend for TwoLevelBackend {
    async fn get(&self, key: &str) -> Option<Entry> {
        if let Some(entry) = self.first().get(key).await {
            return Some(entry);
        }

        let entry = self.second().get(key).await?;
        self.promote(key, entry.clone());
        Some(entry)
    }

    async fn set(&self, key: &str, entry: Entry) -> Result<()> {
        set_all("twoLevelBackend", &self.tiers, key, &entry).await
    }

    async fn purge(&self, key: &str) -> Result<()> {
        let failures = fan_out(&self.tiers, |backend| backend.purge(key)).await;
        all_succeeded("twoLevelBackend", "purge", failures)
    }

    async fn purge_tags(&self, tags: &[String]) -> Result<()> {
        if !self.tag_support() {
            return Err(CacheError::Unsupported {
                backend: self.name(),
                operation: "purge_tags",
            });
        }
        let failures = fan_out(&self.tiers, |backend| backend.purge_tags(tags)).await;
        all_succeeded("twoLevelBackend", "purge_tags", failures)
    }

    async fn flush(&self) -> Result<()> {
        if !self.flush_support() {
            return Err(CacheError::Unsupported {
                backend: self.name(),
                operation: "flush",
            });
        }
        let failures = fan_out(&self.tiers, |backend| backend.flush()).await;
        all_succeeded("twoLevelBackend", "flush", failures)
    }

    fn capabilities(&self) -> Capabilities {
        let [first, second] = &self.tiers;
        first.capabilities().intersect(second.capabilities())
    }

    fn name(&self) -> &'static str {
        "twolevel"
    }
}
