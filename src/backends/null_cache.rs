//! Null Cache - Disabled Backend
//!
//! Accepts every write and never returns anything. Used for disabled caches
//! and in tests where only the loader behavior matters.

use async_trait::async_trait;
use tracing::trace;

use crate::entry::Entry;
use crate::error::Result;
use crate::traits::{CacheBackend, Capabilities};

/// Backend that stores nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBackend;

impl NullBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CacheBackend for NullBackend {
    async fn get(&self, _key: &str) -> Option<Entry> {
        None
    }

    async fn set(&self, key: &str, _entry: Entry) -> Result<()> {
        trace!(key = %key, "[Null] Discarding entry");
        Ok(())
    }

    async fn purge(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    async fn purge_tags(&self, _tags: &[String]) -> Result<()> {
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    fn name(&self) -> &'static str {
        "null"
    }
}
