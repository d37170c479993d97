//! Cache Backend Traits
//!
//! This module defines the trait abstractions that allow users to implement
//! custom cache backends and serialization codecs.
//!
//! # Architecture
//!
//! - `CacheCodec`: Trait for pluggable serialization of payloads
//! - `CacheBackend`: Core trait for every storage tier
//! - `Capabilities`: Optional features a backend offers (flush, tag purging)
//!
//! # Example: Custom Backend
//!
//! ```rust,ignore
//! use tiered_cache::{CacheBackend, Capabilities, Entry, async_trait};
//! use tiered_cache::error::Result;
//!
//! struct MyCustomCache {
//!     // Your implementation
//! }
//!
//! #[async_trait]
//! impl CacheBackend for MyCustomCache {
//!     async fn get(&self, key: &str) -> Option<Entry> {
//!         // Your implementation
//!     }
//!
//!     async fn set(&self, key: &str, entry: Entry) -> Result<()> {
//!         // Your implementation
//!     }
//!
//!     async fn purge(&self, key: &str) -> Result<()> {
//!         // Your implementation
//!     }
//!
//!     async fn flush(&self) -> Result<()> {
//!         // Your implementation
//!     }
//!
//!     fn capabilities(&self) -> Capabilities {
//!         Capabilities::FLUSH
//!     }
//! }
//! ```

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;

use crate::entry::Entry;
use crate::error::{CacheError, Result};

/// Trait for cache value serialization/deserialization
///
/// Used by the [`PayloadRegistry`](crate::PayloadRegistry) to turn registered
/// payload types into bytes for the file and redis backends.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync + Debug` to support concurrent access across async tasks
/// and provide debugging capabilities.
pub trait CacheCodec: Send + Sync + Debug {
    /// Serialize a value to bytes
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be represented by this codec.
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>>;

    /// Deserialize bytes to a value
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid encoding of `T`.
    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T>;

    /// Get the name of the codec
    ///
    /// This is used for logging and debugging purposes.
    fn name(&self) -> &'static str;
}

/// Optional operations a backend supports
///
/// Composites combine the capabilities of their members, so callers can
/// decide up front whether to offer flush or tag purging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// `flush` removes every entry
    pub flush: bool,
    /// `purge_tags` removes tagged entries
    pub tags: bool,
}

impl Capabilities {
    pub const NONE: Self = Self {
        flush: false,
        tags: false,
    };
    pub const FLUSH: Self = Self {
        flush: true,
        tags: false,
    };
    pub const ALL: Self = Self {
        flush: true,
        tags: true,
    };

    /// Capabilities shared by both
    #[must_use]
    pub fn intersect(self, other: Self) -> Self {
        Self {
            flush: self.flush && other.flush,
            tags: self.tags && other.tags,
        }
    }

    /// `true` if every capability in `required` is present
    #[must_use]
    pub fn covers(self, required: Self) -> bool {
        (self.flush || !required.flush) && (self.tags || !required.tags)
    }
}

/// Core cache backend trait implemented by every storage tier
///
/// # Required Operations
///
/// - `get`: Retrieve an entry by key
/// - `set`: Store an entry
/// - `purge`: Delete a single key
/// - `flush`: Delete everything
///
/// `purge_tags` is optional: backends that index entries by tag override it
/// and report `tags` in [`capabilities`](CacheBackend::capabilities).
///
/// # Error Policy
///
/// `get` never reports an error: transport or decode failures are logged,
/// counted and turned into a miss. Write and invalidation failures are
/// returned to the immediate caller.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to support concurrent access across async tasks.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Get an entry by key
    ///
    /// # Returns
    ///
    /// * `Some(entry)` - Entry found
    /// * `None` - Key not found, expired, or unreadable
    async fn get(&self, key: &str) -> Option<Entry>;

    /// Store an entry, replacing any previous one
    ///
    /// # Errors
    ///
    /// Returns an error if the entry could not be written.
    async fn set(&self, key: &str, entry: Entry) -> Result<()>;

    /// Remove an entry; removing a missing key is not an error
    ///
    /// # Errors
    ///
    /// Returns an error if the storage could not be reached.
    async fn purge(&self, key: &str) -> Result<()>;

    /// Remove every entry carrying at least one of `tags`
    ///
    /// # Errors
    ///
    /// The default implementation returns [`CacheError::Unsupported`].
    async fn purge_tags(&self, tags: &[String]) -> Result<()> {
        let _ = tags;
        Err(CacheError::Unsupported {
            backend: self.name(),
            operation: "purge_tags",
        })
    }

    /// Remove every entry
    ///
    /// # Errors
    ///
    /// Returns an error if the storage could not be cleared.
    async fn flush(&self) -> Result<()>;

    /// Optional operations this backend supports
    fn capabilities(&self) -> Capabilities;

    /// Get the name of this cache backend
    ///
    /// This is used for logging and metrics tagging.
    fn name(&self) -> &'static str {
        "unknown"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersect_keeps_only_shared_capabilities() {
        assert_eq!(Capabilities::ALL.intersect(Capabilities::FLUSH), Capabilities::FLUSH);
        assert_eq!(Capabilities::FLUSH.intersect(Capabilities::NONE), Capabilities::NONE);
    }

    #[test]
    fn covers_checks_each_required_flag() {
        assert!(Capabilities::ALL.covers(Capabilities::ALL));
        assert!(Capabilities::FLUSH.covers(Capabilities::FLUSH));
        assert!(!Capabilities::FLUSH.covers(Capabilities::ALL));
        assert!(Capabilities::NONE.covers(Capabilities::NONE));
    }
}
