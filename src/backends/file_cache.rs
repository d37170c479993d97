//! File Cache - Local Disk Backend
//!
//! Stores one file per key directly under a base directory. The file holds
//! the whole entry (tags, lifetimes, deadlines and the encoded payload).

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::entry::{Entry, Meta};
use crate::error::Result;
use crate::metrics::{BackendMetrics, BackendStats};
use crate::registry::{EncodedPayload, PayloadRegistry};
use crate::traits::{CacheBackend, Capabilities};

/// Directory used when none is configured
pub const DEFAULT_BASE_DIR: &str = "/tmp/cache";

/// Configuration for `FileBackend`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileBackendConfig {
    pub base_dir: PathBuf,
}

impl Default for FileBackendConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from(DEFAULT_BASE_DIR),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct FileRecord {
    tags: BTreeSet<String>,
    lifetime: Duration,
    gracetime: Duration,
    lifetime_at: SystemTime,
    gracetime_at: SystemTime,
    payload: EncodedPayload,
}

/// Map a key to a file name: everything outside `[a-zA-Z0-9.]` becomes `.`
pub fn file_name_for(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '.' })
        .collect()
}

/// Cache backend writing entries to local files
///
/// Tag purging and flushing are not supported and silently do nothing;
/// composites see this through [`capabilities`](CacheBackend::capabilities).
pub struct FileBackend {
    base_dir: PathBuf,
    registry: Arc<PayloadRegistry>,
    metrics: BackendMetrics,
}

impl FileBackend {
    /// Create a file backend rooted at `base_dir` (default `/tmp/cache` when empty)
    pub fn new(base_dir: impl Into<PathBuf>, registry: Arc<PayloadRegistry>) -> Self {
        let mut base_dir = base_dir.into();
        if base_dir.as_os_str().is_empty() {
            base_dir = PathBuf::from(DEFAULT_BASE_DIR);
        }

        info!(base_dir = %base_dir.display(), "File cache backend initialized");

        Self {
            base_dir,
            registry,
            metrics: BackendMetrics::new("file"),
        }
    }

    pub fn from_config(config: &FileBackendConfig, registry: Arc<PayloadRegistry>) -> Self {
        Self::new(config.base_dir.clone(), registry)
    }

    /// Tag metrics with the name of the frontend this backend serves
    #[must_use]
    pub fn with_frontend_name(mut self, frontend_name: &str) -> Self {
        self.metrics = self.metrics.with_frontend_name(frontend_name);
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn stats(&self) -> BackendStats {
        self.metrics.stats()
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base_dir.join(file_name_for(key))
    }

    fn encode(&self, entry: &Entry) -> Result<Vec<u8>> {
        let record = FileRecord {
            tags: entry.meta.tags.clone(),
            lifetime: entry.meta.lifetime,
            gracetime: entry.meta.gracetime,
            lifetime_at: entry.meta.lifetime_at(),
            gracetime_at: entry.meta.gracetime_at(),
            payload: self.registry.encode(&entry.data)?,
        };
        Ok(bincode::serialize(&record)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Entry> {
        let record: FileRecord = bincode::deserialize(bytes)?;
        let data = self.registry.decode(&record.payload)?;
        let meta = Meta::from_parts(
            record.tags,
            record.lifetime,
            record.gracetime,
            record.lifetime_at,
            record.gracetime_at,
        );
        Ok(Entry::new(data, meta))
    }
}

#[async_trait]
impl CacheBackend for FileBackend {
    async fn get(&self, key: &str) -> Option<Entry> {
        let path = self.path_for(key);

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                if e.kind() != ErrorKind::NotFound {
                    self.metrics.count_error("ReadFailed");
                    warn!(key = %key, error = %e, "[File] Failed to read cache file");
                }
                self.metrics.count_miss();
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
                warn!(key = %key, error = %e, "[File] Failed to decode cache file");
                None
            }
        }
    }

    async fn set(&self, key: &str, entry: Entry) -> Result<()> {
        let bytes = self.encode(&entry).inspect_err(|e| {
            self.metrics.count_error("EncodeFailed");
            warn!(key = %key, error = %e, "[File] Failed to encode entry");
        })?;

        tokio::fs::create_dir_all(&self.base_dir).await?;
        tokio::fs::write(self.path_for(key), bytes)
            .await
            .inspect_err(|e| {
                self.metrics.count_error("WriteFailed");
                warn!(key = %key, error = %e, "[File] Failed to write cache file");
            })?;

        debug!(key = %key, "[File] Cached key");
        Ok(())
    }

    async fn purge(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    async fn purge_tags(&self, _tags: &[String]) -> Result<()> {
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
