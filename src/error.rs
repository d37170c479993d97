//! Cache Errors
//!
//! A single error type is shared by backends, composites, the factory and the
//! frontends. It is `Clone` because one loader outcome is handed to every
//! coalesced waiter, so wrapped sources live behind an `Arc`.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::entry::Meta;

/// Errors returned by cache operations
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// Local filesystem failure (file backend)
    #[error("io error: {0}")]
    Io(Arc<std::io::Error>),

    /// Remote store failure (redis backend)
    #[cfg(feature = "redis")]
    #[error("redis error: {0}")]
    Redis(Arc<redis::RedisError>),

    /// Encoding or decoding of an entry failed
    #[error("codec error: {0}")]
    Codec(String),

    /// The payload type was never registered with the backend's registry
    #[error("payload type `{0}` is not registered")]
    UnregisteredPayload(String),

    /// A capability was requested from a backend that does not provide it
    #[error("{operation} is not supported by the {backend} backend")]
    Unsupported {
        backend: &'static str,
        operation: &'static str,
    },

    /// A composite was asked to guarantee a capability its members lack
    #[error("composite backend cannot guarantee {0} support")]
    MissingCapability(&'static str),

    /// Every tier of a composite failed a write
    #[error("all {count} backends failed to {operation} key '{key}'")]
    AllFailed {
        operation: &'static str,
        key: String,
        count: usize,
        errors: Vec<CacheError>,
    },

    /// At least one tier of a composite failed an invalidation
    #[error("not all backends succeeded to {operation}: {}", join_errors(.errors))]
    Partial {
        operation: &'static str,
        errors: Vec<CacheError>,
    },

    /// The loader failed
    #[error("loader failed: {0}")]
    Loader(Arc<anyhow::Error>),

    /// A previously cached loader failure was served
    #[error("cached loader failure: {0}")]
    CachedFailure(String),

    /// The loader did not finish before the caller's deadline
    #[error("loader deadline exceeded after {0:?}")]
    DeadlineExceeded(Duration),

    /// A cached payload did not have the type the frontend expects
    #[error("cached payload for key '{key}' has unexpected type `{found}`")]
    PayloadType { key: String, found: &'static str },

    /// Required sub-configuration missing for the chosen backend type
    #[error("no {field} config provided")]
    MissingConfig { field: &'static str },

    /// No configuration exists for the requested cache name
    #[error("cannot find config for {0}")]
    UnknownCache(String),

    /// Backend type is compiled out or otherwise unavailable
    #[error("backend type `{0}` is not available")]
    UnavailableBackend(&'static str),

    /// Configuration could not be parsed
    #[error("invalid cache configuration: {0}")]
    Config(String),
}

fn join_errors(errors: &[CacheError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl CacheError {
    /// Wraps a loader error so it can be shared between waiters
    pub fn loader(err: anyhow::Error) -> Self {
        Self::Loader(Arc::new(err))
    }

    /// `true` for errors produced by the loader rather than by the cache
    #[must_use]
    pub fn is_loader_error(&self) -> bool {
        matches!(
            self,
            Self::Loader(_) | Self::CachedFailure(_) | Self::DeadlineExceeded(_)
        )
    }
}

/// Loader error that also says how long its cached copy should live
///
/// Frontends that cache failures use `meta` instead of the defaults when a
/// loader fails with this error.
///
/// ```rust
/// use std::time::Duration;
/// use tiered_cache::Meta;
/// use tiered_cache::error::LoadFailure;
///
/// let meta = Meta::new(Duration::from_secs(1), Duration::ZERO);
/// let err: anyhow::Error = LoadFailure::new(anyhow::anyhow!("origin down"), meta).into();
/// assert_eq!(err.to_string(), "origin down");
/// ```
#[derive(Debug, Error)]
#[error("{error}")]
pub struct LoadFailure {
    error: anyhow::Error,
    meta: Meta,
}

impl LoadFailure {
    pub fn new(error: impl Into<anyhow::Error>, meta: Meta) -> Self {
        Self {
            error: error.into(),
            meta,
        }
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    /// The metadata attached to a loader error, if any
    pub(crate) fn meta_of(err: &CacheError) -> Option<Meta> {
        match err {
            CacheError::Loader(inner) => inner
                .downcast_ref::<Self>()
                .map(|failure| failure.meta.clone()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        Self::Redis(Arc::new(err))
    }
}

#[cfg(feature = "redis")]
impl From<deadpool_redis::PoolError> for CacheError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        match err {
            deadpool_redis::PoolError::Backend(e) => e.into(),
            _ => Self::UnavailableBackend("redis"),
        }
    }
}

impl From<bincode::Error> for CacheError {
    fn from(err: bincode::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

/// Result alias used throughout the crate
pub type Result<T, E = CacheError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_error_lists_every_failure() {
        let err = CacheError::Partial {
            operation: "purge",
            errors: vec![
                CacheError::Codec("first".into()),
                CacheError::Codec("second".into()),
            ],
        };
        let message = err.to_string();
        assert!(message.contains("first"));
        assert!(message.contains("second"));
    }

    #[test]
    fn loader_errors_are_classified() {
        assert!(CacheError::loader(anyhow::anyhow!("boom")).is_loader_error());
        assert!(CacheError::CachedFailure("boom".into()).is_loader_error());
        assert!(!CacheError::Codec("boom".into()).is_loader_error());
    }

    #[test]
    fn failure_meta_is_found_behind_the_loader_error() {
        let meta = Meta::new(Duration::from_secs(1), Duration::from_secs(2));
        let err = CacheError::loader(LoadFailure::new(anyhow::anyhow!("boom"), meta).into());

        let found = LoadFailure::meta_of(&err).unwrap_or_else(|| panic!("meta missing"));
        assert_eq!(found.lifetime, Duration::from_secs(1));
        assert_eq!(err.to_string(), "loader failed: boom");

        assert!(LoadFailure::meta_of(&CacheError::loader(anyhow::anyhow!("boom"))).is_none());
        assert!(LoadFailure::meta_of(&CacheError::CachedFailure("boom".into())).is_none());
    }
}
