//! Tiered Cache
//!
//! A pluggable caching library with freshness policies:
//! - **Backends**: bounded in-memory 2Q LRU, local files, Redis, and a null sink
//! - **Composites**: ordered multi-level tiers and two-level tiers with promotion
//! - **Frontends**: stale-while-revalidate for HTTP responses and strings
//! - **Stampede Protection**: at most one load per key in flight
//! - **Factory**: backend trees built from declarative configuration
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tiered_cache::backends::{InMemoryBackend, InMemoryBackendConfig};
//! use tiered_cache::{Meta, StringFrontend};
//!
//! #[tokio::main]
//! async fn main() -> tiered_cache::error::Result<()> {
//!     let backend = InMemoryBackend::new(InMemoryBackendConfig::default())?;
//!     let cache = StringFrontend::new(Arc::new(backend));
//!
//!     let greeting = cache
//!         .get(
//!             "greeting",
//!             || async {
//!                 let meta = Meta::new(Duration::from_secs(60), Duration::from_secs(600));
//!                 Ok(("hello".to_string(), Some(meta)))
//!             },
//!             &["greetings"],
//!         )
//!         .await?;
//!
//!     tracing::info!(%greeting, "Loaded");
//!     Ok(())
//! }
//! ```
//!
//! # Freshness
//!
//! ```text
//! stored ──lifetime──▶ stale ──gracetime──▶ expired
//!  Fresh: serve       Stale: serve + refresh   Expired: load, store, serve
//! ```

pub mod backends;
pub mod builder;
pub mod codecs;
pub mod config;
pub mod entry;
pub mod error;
pub mod frontends;
pub mod metrics;
pub mod registry;
pub mod traits;

pub use backends::{
    FileBackend, FileBackendConfig, InMemoryBackend, InMemoryBackendConfig, MultiLevelBackend,
    NullBackend, TwoLevelBackend,
};

#[cfg(feature = "redis")]
pub use backends::RedisBackend;

pub use builder::BackendFactory;
pub use config::{BackendConfig, BackendType, FactoryConfig, RedisBackendConfig};
pub use entry::{DEFAULT_GRACETIME, DEFAULT_LIFETIME, Entry, Freshness, MAX_WINDOW, Meta, Payload};
pub use error::{CacheError, LoadFailure};
pub use frontends::{CachedResponse, HttpFrontend, HttpRecord, SingleFlight, StringFrontend};
pub use metrics::{BackendMetrics, BackendStats};
pub use registry::{EncodedPayload, PayloadRegistry};
pub use traits::{CacheBackend, CacheCodec, Capabilities};

// Re-export async_trait for user convenience
pub use async_trait::async_trait;
