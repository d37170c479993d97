//! HTTP Response Frontend
//!
//! Caches whole HTTP responses. Loader failures are cached as well, so a
//! failing origin is not hammered by every request while the entry is alive.
//! A loader picks the failure's windows by returning a
//! [`LoadFailure`](crate::error::LoadFailure); otherwise the defaults apply.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;
use http::Response;
use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;
use tokio::time::Instant;
use tracing::debug;

use super::singleflight::SingleFlight;
use super::{call_loader, resolve_meta, store};
use crate::backends::NullBackend;
use crate::entry::{Entry, Freshness, Meta, Payload};
use crate::error::{CacheError, LoadFailure, Result};
use crate::traits::CacheBackend;

const CATEGORY: &str = "httpFrontendCache";

/// Owned copy of a response: status, headers and the fully read body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, ByteBuf)>,
    #[serde(with = "serde_bytes")]
    pub body: Vec<u8>,
}

impl CachedResponse {
    /// Copy a response into owned buffers
    pub fn from_response(response: &Response<Bytes>) -> Self {
        Self {
            status: response.status().as_u16(),
            headers: response
                .headers()
                .iter()
                .map(|(name, value)| (name.as_str().to_string(), ByteBuf::from(value.as_bytes())))
                .collect(),
            body: response.body().to_vec(),
        }
    }

    /// Build a new response over a fresh copy of the body
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Codec`] if the stored status or headers are invalid.
    pub fn to_response(&self) -> Result<Response<Bytes>> {
        let mut builder = Response::builder().status(self.status);
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_slice());
        }
        builder
            .body(Bytes::copy_from_slice(&self.body))
            .map_err(|e| CacheError::Codec(e.to_string()))
    }
}

/// What the HTTP frontend stores: a response or the loader failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpRecord {
    Ok(CachedResponse),
    Failed(String),
}

impl HttpRecord {
    fn from_entry(key: &str, entry: &Entry) -> Result<Self> {
        entry
            .data
            .downcast_ref::<Self>()
            .cloned()
            .ok_or_else(|| CacheError::PayloadType {
                key: key.to_string(),
                found: entry.data.type_name(),
            })
    }

    fn into_response(self) -> Result<Response<Bytes>> {
        match self {
            Self::Ok(cached) => cached.to_response(),
            Self::Failed(message) => Err(CacheError::CachedFailure(message)),
        }
    }
}

struct Inner {
    backend: Arc<dyn CacheBackend>,
    flights: SingleFlight<CachedResponse>,
}

/// Stale-while-revalidate cache for HTTP responses
///
/// Cheap to clone; clones share the backend and the in-flight loads.
///
/// ```rust,no_run
/// use bytes::Bytes;
/// use tiered_cache::HttpFrontend;
///
/// # async fn example() -> tiered_cache::error::Result<()> {
/// let cache = HttpFrontend::with_null_backend();
/// let response = cache
///     .get(
///         "https://example.com/",
///         || async {
///             let response = http::Response::builder().status(200).body(Bytes::from("hello"))?;
///             Ok((response, None))
///         },
///         &["home"],
///     )
///     .await?;
/// assert_eq!(response.body().as_ref(), b"hello");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct HttpFrontend {
    inner: Arc<Inner>,
}

impl HttpFrontend {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                flights: SingleFlight::new(),
            }),
        }
    }

    /// Frontend that never caches; every call runs the loader
    pub fn with_null_backend() -> Self {
        Self::new(Arc::new(NullBackend))
    }

    pub fn backend(&self) -> &Arc<dyn CacheBackend> {
        &self.inner.backend
    }

    /// Calls that were served by a load another call started
    pub fn coalesced_loads(&self) -> u64 {
        self.inner.flights.coalesced()
    }

    /// Get a response, loading it with `loader` when needed
    ///
    /// `tags` are attached to the stored entry in addition to any tags of the
    /// loader's meta.
    ///
    /// # Errors
    ///
    /// Returns the loader's error, shared with concurrent callers, or a
    /// [`CacheError::CachedFailure`] while a failed load is cached.
    pub async fn get<F, Fut>(&self, key: &str, loader: F, tags: &[&str]) -> Result<Response<Bytes>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<(Response<Bytes>, Option<Meta>)>> + Send + 'static,
    {
        self.get_inner(key, loader, tags, None).await
    }

    /// Like [`get`](Self::get), but a load started by this call is abandoned
    /// at `deadline`
    ///
    /// An elapsed deadline is handed to every caller sharing the load and
    /// cached like any other loader failure.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::DeadlineExceeded`] when the loader is too slow.
    pub async fn get_with_deadline<F, Fut>(
        &self,
        key: &str,
        loader: F,
        tags: &[&str],
        deadline: Instant,
    ) -> Result<Response<Bytes>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<(Response<Bytes>, Option<Meta>)>> + Send + 'static,
    {
        self.get_inner(key, loader, tags, Some(deadline)).await
    }

    async fn get_inner<F, Fut>(
        &self,
        key: &str,
        loader: F,
        tags: &[&str],
        deadline: Option<Instant>,
    ) -> Result<Response<Bytes>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<(Response<Bytes>, Option<Meta>)>> + Send + 'static,
    {
        let tags: Vec<String> = tags.iter().map(ToString::to_string).collect();

        if let Some(entry) = self.inner.backend.get(key).await {
            match entry.meta.freshness() {
                Freshness::Fresh => {
                    debug!(category = CATEGORY, key = %key, "Serving from cache");
                    return HttpRecord::from_entry(key, &entry)?.into_response();
                }
                Freshness::Stale => {
                    debug!(category = CATEGORY, key = %key, "Gracetime! Serving from cache");
                    let record = HttpRecord::from_entry(key, &entry)?;
                    self.spawn_refresh(key, loader, tags);
                    return record.into_response();
                }
                Freshness::Expired => {}
            }
        }

        debug!(category = CATEGORY, key = %key, "No cache entry");
        self.load(key, loader, tags, false, deadline).await?.to_response()
    }

    fn spawn_refresh<F, Fut>(&self, key: &str, loader: F, tags: Vec<String>)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<(Response<Bytes>, Option<Meta>)>> + Send + 'static,
    {
        let this = self.clone();
        let key = key.to_string();
        tokio::spawn(async move {
            if let Err(e) = this.load(&key, loader, tags, true, None).await {
                debug!(category = CATEGORY, key = %key, error = %e, "Background refresh failed");
            }
        });
    }

    /// Run the (coalesced) load and store its outcome
    ///
    /// With `keep_existing` a failed load leaves the current entry alone.
    async fn load<F, Fut>(
        &self,
        key: &str,
        loader: F,
        tags: Vec<String>,
        keep_existing: bool,
        deadline: Option<Instant>,
    ) -> Result<CachedResponse>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<(Response<Bytes>, Option<Meta>)>> + Send + 'static,
    {
        let backend = Arc::clone(&self.inner.backend);
        let owned_key = key.to_string();

        self.inner
            .flights
            .run(key, move || async move {
                let outcome = call_loader(loader, deadline).await;
                let now = SystemTime::now();

                match outcome {
                    Ok((response, meta)) => {
                        let cached = CachedResponse::from_response(&response);
                        let meta = resolve_meta(meta, &tags, now);
                        debug!(category = CATEGORY, key = %owned_key, meta = ?meta, "Store in cache");
                        store(
                            backend.as_ref(),
                            CATEGORY,
                            &owned_key,
                            Payload::new(HttpRecord::Ok(cached.clone())),
                            meta,
                        )
                        .await;
                        Ok(cached)
                    }
                    Err(err) if keep_existing => {
                        debug!(
                            category = CATEGORY,
                            key = %owned_key,
                            error = %err,
                            "No store/overwrite in cache because we couldn't fetch new data"
                        );
                        Err(err)
                    }
                    Err(err) => {
                        let meta = resolve_meta(LoadFailure::meta_of(&err), &tags, now);
                        debug!(category = CATEGORY, key = %owned_key, error = %err, "Store failure in cache");
                        store(
                            backend.as_ref(),
                            CATEGORY,
                            &owned_key,
                            Payload::new(HttpRecord::Failed(err.to_string())),
                            meta,
                        )
                        .await;
                        Err(err)
                    }
                }
            })
            .await
    }
}

impl fmt::Debug for HttpFrontend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpFrontend")
            .field("backend", &self.inner.backend.name())
            .field("in_flight", &self.inner.flights.in_flight())
            .finish()
    }
}
