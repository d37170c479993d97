//! String Frontend
//!
//! Stale-while-revalidate cache for string values. Unlike the HTTP frontend
//! a failed load is returned to the callers but never stored.

use std::future::Future;
use std::sync::Arc;
use std::time::SystemTime;

use tracing::debug;

use super::singleflight::SingleFlight;
use super::{call_loader, resolve_meta, store};
use crate::entry::{Entry, Freshness, Meta, Payload};
use crate::error::{CacheError, Result};
use crate::traits::CacheBackend;

const CATEGORY: &str = "stringFrontendCache";

struct Inner {
    backend: Arc<dyn CacheBackend>,
    flights: SingleFlight<String>,
}

/// String cache with per-key load coalescing
#[derive(Clone)]
pub struct StringFrontend {
    inner: Arc<Inner>,
}

fn string_of(key: &str, entry: &Entry) -> Result<String> {
    entry
        .data
        .downcast_ref::<String>()
        .cloned()
        .ok_or_else(|| CacheError::PayloadType {
            key: key.to_string(),
            found: entry.data.type_name(),
        })
}

impl StringFrontend {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                flights: SingleFlight::new(),
            }),
        }
    }

    pub fn backend(&self) -> &Arc<dyn CacheBackend> {
        &self.inner.backend
    }

    /// Get a string, loading it with `loader` when needed
    ///
    /// # Errors
    ///
    /// Returns the loader's error, shared with concurrent callers.
    pub async fn get<F, Fut>(&self, key: &str, loader: F, tags: &[&str]) -> Result<String>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<(String, Option<Meta>)>> + Send + 'static,
    {
        let tags: Vec<String> = tags.iter().map(ToString::to_string).collect();

        if let Some(entry) = self.inner.backend.get(key).await {
            match entry.meta.freshness() {
                Freshness::Fresh => return string_of(key, &entry),
                Freshness::Stale => {
                    let value = string_of(key, &entry)?;
                    let this = self.clone();
                    let key = key.to_string();
                    tokio::spawn(async move {
                        if let Err(e) = this.load(&key, loader, tags).await {
                            debug!(category = CATEGORY, key = %key, error = %e, "Background refresh failed");
                        }
                    });
                    return Ok(value);
                }
                Freshness::Expired => {}
            }
        }

        self.load(key, loader, tags).await
    }

    async fn load<F, Fut>(&self, key: &str, loader: F, tags: Vec<String>) -> Result<String>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<(String, Option<Meta>)>> + Send + 'static,
    {
        let backend = Arc::clone(&self.inner.backend);
        let owned_key = key.to_string();

        self.inner
            .flights
            .run(key, move || async move {
                let (value, meta) = call_loader(loader, None).await?;
                let meta = resolve_meta(meta, &tags, SystemTime::now());
                store(
                    backend.as_ref(),
                    CATEGORY,
                    &owned_key,
                    Payload::new(value.clone()),
                    meta,
                )
                .await;
                Ok(value)
            })
            .await
    }
}
