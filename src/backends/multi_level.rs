//! Multi-Level Cache - Ordered Tiers
//!
//! Reads walk the tiers in order and return the first hit. Writes go to every
//! tier; a write only fails when no tier accepted it, while invalidations must
//! succeed everywhere.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use tracing::{debug, error, info};

use crate::entry::Entry;
use crate::error::{CacheError, Result};
use crate::traits::{CacheBackend, Capabilities};

/// Run `op` on every backend concurrently and collect the failures
pub(crate) async fn fan_out<'a, F, Fut>(
    backends: &'a [Arc<dyn CacheBackend>],
    op: F,
) -> Vec<(&'static str, CacheError)>
where
    F: FnMut(&'a Arc<dyn CacheBackend>) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let results = join_all(backends.iter().map(op)).await;
    backends
        .iter()
        .zip(results)
        .filter_map(|(backend, result)| result.err().map(|e| (backend.name(), e)))
        .collect()
}

/// Write to all tiers, failing only if every tier failed
pub(crate) async fn set_all(
    category: &'static str,
    backends: &[Arc<dyn CacheBackend>],
    key: &str,
    entry: &Entry,
) -> Result<()> {
    let failures = fan_out(backends, |backend| backend.set(key, entry.clone())).await;
    for (backend, e) in &failures {
        error!(category, backend, key = %key, error = %e, "Failed to set key");
    }

    if failures.len() == backends.len() {
        return Err(CacheError::AllFailed {
            operation: "set",
            key: key.to_string(),
            count: backends.len(),
            errors: failures.into_iter().map(|(_, e)| e).collect(),
        });
    }
    Ok(())
}

/// Run an invalidation on all tiers, failing if any tier failed
pub(crate) fn all_succeeded(
    category: &'static str,
    operation: &'static str,
    failures: Vec<(&'static str, CacheError)>,
) -> Result<()> {
    if failures.is_empty() {
        return Ok(());
    }
    for (backend, e) in &failures {
        error!(category, backend, operation, error = %e, "Invalidation failed");
    }
    Err(CacheError::Partial {
        operation,
        errors: failures.into_iter().map(|(_, e)| e).collect(),
    })
}

fn combined_capabilities(backends: &[Arc<dyn CacheBackend>]) -> Capabilities {
    backends
        .iter()
        .fold(Capabilities::ALL, |caps, backend| caps.intersect(backend.capabilities()))
}

/// Backend spreading entries over an ordered list of tiers
///
/// Tiers are usually ordered fastest first. Any tier may itself be a
/// composite.
pub struct MultiLevelBackend {
    backends: Vec<Arc<dyn CacheBackend>>,
}

impl MultiLevelBackend {
    pub fn new(backends: Vec<Arc<dyn CacheBackend>>) -> Self {
        info!(
            tiers = backends.len(),
            names = ?backends.iter().map(|b| b.name()).collect::<Vec<_>>(),
            "Multi-level cache backend initialized"
        );
        Self { backends }
    }

    /// Create a backend that guarantees the `required` capabilities
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::MissingCapability`] if any tier lacks one of them.
    pub fn with_required(backends: Vec<Arc<dyn CacheBackend>>, required: Capabilities) -> Result<Self> {
        let available = combined_capabilities(&backends);
        if required.tags && !available.tags {
            return Err(CacheError::MissingCapability("purge_tags"));
        }
        if required.flush && !available.flush {
            return Err(CacheError::MissingCapability("flush"));
        }
        Ok(Self::new(backends))
    }

    /// `true` if every tier can flush
    pub fn flush_support(&self) -> bool {
        combined_capabilities(&self.backends).flush
    }

    /// `true` if every tier can purge by tag
    pub fn tag_support(&self) -> bool {
        combined_capabilities(&self.backends).tags
    }

    pub fn backends(&self) -> &[Arc<dyn CacheBackend>] {
        &self.backends
    }
}

#[async_trait]
impl CacheBackend for MultiLevelBackend {
    async fn get(&self, key: &str) -> Option<Entry> {
        for (level, backend) in self.backends.iter().enumerate() {
            if let Some(entry) = backend.get(key).await {
                debug!(key = %key, level, backend = backend.name(), "[MultiLevel] Hit");
                return Some(entry);
            }
        }
        None
    }

    async fn set(&self, key: &str, entry: Entry) -> Result<()> {
        set_all("multiLevelBackend", &self.backends, key, &entry).await
    }

    async fn purge(&self, key: &str) -> Result<()> {
        let failures = fan_out(&self.backends, |backend| backend.purge(key)).await;
        all_succeeded("multiLevelBackend", "purge", failures)
    }

    async fn purge_tags(&self, tags: &[String]) -> Result<()> {
        if !self.tag_support() {
            return Err(CacheError::Unsupported {
                backend: self.name(),
                operation: "purge_tags",
            });
        }
        let failures = fan_out(&self.backends, |backend| backend.purge_tags(tags)).await;
        all_succeeded("multiLevelBackend", "purge_tags", failures)
    }

    async fn flush(&self) -> Result<()> {
        if !self.flush_support() {
            return Err(CacheError::Unsupported {
                backend: self.name(),
                operation: "flush",
            });
        }
        let failures = fan_out(&self.backends, |backend| backend.flush()).await;
        all_succeeded("multiLevelBackend", "flush", failures)
    }

    fn capabilities(&self) -> Capabilities {
        combined_capabilities(&self.backends)
    }

    fn name(&self) -> &'static str {
        "multilevel"
    }
}
