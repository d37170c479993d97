//! Common utilities for integration tests
//!
//! This module provides shared test infrastructure including:
//! - Tracing setup
//! - A recording backend for observing frontend writes
//! - A tag-indexing backend and an always-failing backend
//! - Entry and response builders
//! - A conformance check every backend must pass

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use parking_lot::Mutex;
use dashmap::DashMap;
use tiered_cache::error::Result;
use tiered_cache::{CacheBackend, CacheError, Capabilities, Entry, Meta, Payload, async_trait};
use tokio::sync::Notify;

/// Install a test subscriber once; honours `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Create a test key with unique suffix
pub fn test_key(name: &str) -> String {
    format!("test_{}_{}", name, rand::random::<u32>())
}

/// Entry holding a string, with explicit deadlines
pub fn string_entry(value: &str, lifetime_at: SystemTime, gracetime_at: SystemTime) -> Entry {
    Entry::new(
        Payload::new(value.to_string()),
        Meta::with_deadlines(lifetime_at, gracetime_at),
    )
}

/// Entry holding a string, fresh for a minute
pub fn fresh_entry(value: &str, tags: &[&str]) -> Entry {
    let meta = Meta::new(Duration::from_secs(60), Duration::from_secs(600))
        .with_tags(tags.iter().copied())
        .stamped_at(SystemTime::now());
    Entry::new(Payload::new(value.to_string()), meta)
}

pub fn string_of(entry: &Entry) -> Option<&str> {
    entry.data.downcast_ref::<String>().map(String::as_str)
}

pub fn body_response(body: &'static str) -> http::Response<Bytes> {
    http::Response::new(Bytes::from_static(body.as_bytes()))
}

/// In-memory backend recording every `set`
#[derive(Default)]
pub struct RecordingBackend {
    entries: DashMap<String, Entry>,
    sets: Mutex<Vec<(String, Entry)>>,
    set_notify: Notify,
}

impl RecordingBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Store without recording a `set`
    pub fn preload(&self, key: &str, entry: Entry) {
        self.entries.insert(key.to_string(), entry);
    }

    pub fn set_count(&self) -> usize {
        self.sets.lock().len()
    }

    pub fn sets(&self) -> Vec<(String, Entry)> {
        self.sets.lock().clone()
    }

    pub fn last_set(&self) -> Option<(String, Entry)> {
        self.sets.lock().last().cloned()
    }

    /// Wait until at least `count` sets happened
    pub async fn wait_for_sets(&self, count: usize, timeout: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.set_notify.notified();
                if self.set_count() >= count {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }
}

#[async_trait]
impl CacheBackend for RecordingBackend {
    async fn get(&self, key: &str) -> Option<Entry> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    async fn set(&self, key: &str, entry: Entry) -> Result<()> {
        self.entries.insert(key.to_string(), entry.clone());
        self.sets.lock().push((key.to_string(), entry));
        self.set_notify.notify_waiters();
        Ok(())
    }

    async fn purge(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::FLUSH
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// In-memory backend with a tag index, supporting every operation
#[derive(Default)]
pub struct TaggingBackend {
    entries: DashMap<String, Entry>,
    /// tag -> keys carrying it
    tags: DashMap<String, BTreeSet<String>>,
}

impl TaggingBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Keys currently indexed under `tag`
    pub fn tagged(&self, tag: &str) -> BTreeSet<String> {
        self.tags.get(tag).map(|keys| keys.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CacheBackend for TaggingBackend {
    async fn get(&self, key: &str) -> Option<Entry> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    async fn set(&self, key: &str, entry: Entry) -> Result<()> {
        for tag in &entry.meta.tags {
            self.tags.entry(tag.clone()).or_default().insert(key.to_string());
        }
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn purge(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn purge_tags(&self, tags: &[String]) -> Result<()> {
        for tag in tags {
            if let Some((_, keys)) = self.tags.remove(tag) {
                for key in keys {
                    self.entries.remove(&key);
                }
            }
        }
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        self.entries.clear();
        self.tags.clear();
        Ok(())
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    fn name(&self) -> &'static str {
        "tagging"
    }
}

/// Backend claiming every capability whose operations all fail
pub struct FailingBackend;

#[async_trait]
impl CacheBackend for FailingBackend {
    async fn get(&self, _key: &str) -> Option<Entry> {
        None
    }

    async fn set(&self, _key: &str, _entry: Entry) -> Result<()> {
        Err(CacheError::UnavailableBackend("failing"))
    }

    async fn purge(&self, _key: &str) -> Result<()> {
        Err(CacheError::UnavailableBackend("failing"))
    }

    async fn purge_tags(&self, _tags: &[String]) -> Result<()> {
        Err(CacheError::UnavailableBackend("failing"))
    }

    async fn flush(&self) -> Result<()> {
        Err(CacheError::UnavailableBackend("failing"))
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Behavior every backend shares: round trip, purge isolation, flush
/// totality and, for tag-capable backends, tag purge selectivity
pub async fn assert_backend_conformance(backend: &dyn CacheBackend) {
    let one = test_key("one");
    let two = test_key("two");
    let three = test_key("three");

    // Round trip
    backend
        .set(&one, fresh_entry("first", &["eins", "zwei"]))
        .await
        .unwrap_or_else(|e| panic!("set failed: {e}"));
    let found = backend.get(&one).await.unwrap_or_else(|| panic!("missing {one}"));
    assert_eq!(string_of(&found), Some("first"));

    // Purge isolation
    backend
        .set(&two, fresh_entry("second", &["eins", "zwei"]))
        .await
        .unwrap_or_else(|e| panic!("set failed: {e}"));
    backend.purge(&one).await.unwrap_or_else(|e| panic!("purge failed: {e}"));
    assert!(backend.get(&one).await.is_none());
    assert!(backend.get(&two).await.is_some());
    backend.purge(&one).await.unwrap_or_else(|e| panic!("second purge failed: {e}"));

    // Tag purge selectivity
    if backend.capabilities().tags {
        backend
            .set(&one, fresh_entry("first", &["eins", "zwei"]))
            .await
            .unwrap_or_else(|e| panic!("set failed: {e}"));
        backend
            .set(&three, fresh_entry("third", &[]))
            .await
            .unwrap_or_else(|e| panic!("set failed: {e}"));

        backend
            .purge_tags(&["eins".to_string()])
            .await
            .unwrap_or_else(|e| panic!("purge_tags failed: {e}"));

        assert!(backend.get(&one).await.is_none());
        assert!(backend.get(&two).await.is_none());
        assert!(backend.get(&three).await.is_some());
    }

    // Flush totality
    if backend.capabilities().flush {
        backend
            .set(&three, fresh_entry("third", &[]))
            .await
            .unwrap_or_else(|e| panic!("set failed: {e}"));
        backend.flush().await.unwrap_or_else(|e| panic!("flush failed: {e}"));
        assert!(backend.get(&two).await.is_none());
        assert!(backend.get(&three).await.is_none());
    }
}
