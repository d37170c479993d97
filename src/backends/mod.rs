//! Cache Backend Implementations
//!
//! This module contains every storage tier and the composites that combine
//! them.
//!
//! # Available Backends
//!
//! ## Leaf Backends
//! - **`InMemoryBackend`** - Bounded 2Q LRU with a periodic expiry sweep
//! - **`FileBackend`** - One file per key on local disk
//! - **`RedisBackend`** - Distributed cache with tag sets (feature: `redis`)
//! - **`NullBackend`** - Stores nothing, always misses
//!
//! ## Composites
//! - **`MultiLevelBackend`** - Ordered list of tiers, first hit wins
//! - **`TwoLevelBackend`** - Fast tier in front of a slow tier with promotion
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tiered_cache::backends::{InMemoryBackend, InMemoryBackendConfig, RedisBackend, TwoLevelBackend};
//! use tiered_cache::{PayloadRegistry, RedisBackendConfig};
//!
//! # async fn example() -> tiered_cache::error::Result<()> {
//! let registry = Arc::new(PayloadRegistry::default());
//! let memory = InMemoryBackend::new(InMemoryBackendConfig::default())?;
//! let redis = RedisBackend::connect(&RedisBackendConfig::default(), registry).await?;
//!
//! let backend = TwoLevelBackend::new(Arc::new(memory), Arc::new(redis));
//! # Ok(())
//! # }
//! ```

pub mod file_cache;
pub mod in_memory;
pub mod multi_level;
pub mod null_cache;
pub mod two_level;
pub mod two_queue;

#[cfg(feature = "redis")]
pub mod redis_cache;

pub use file_cache::{FileBackend, FileBackendConfig};
pub use in_memory::{InMemoryBackend, InMemoryBackendConfig, SweepHandle};
pub use multi_level::MultiLevelBackend;
pub use null_cache::NullBackend;
pub use two_level::TwoLevelBackend;
pub use two_queue::TwoQueueCache;

#[cfg(feature = "redis")]
pub use redis_cache::RedisBackend;
