//! Cache Entry Model
//!
//! An [`Entry`] is an opaque [`Payload`] plus the caching [`Meta`] that drives
//! the frontends' freshness decisions.

use std::any::{Any, TypeId};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Lifetime used when a loader does not supply metadata
pub const DEFAULT_LIFETIME: Duration = Duration::from_secs(30);

/// Gracetime used when a loader does not supply metadata
pub const DEFAULT_GRACETIME: Duration = Duration::from_secs(600);

/// Longest lifetime or gracetime honoured when stamping deadlines
pub const MAX_WINDOW: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

fn deadline_after(from: SystemTime, window: Duration) -> SystemTime {
    from.checked_add(window.min(MAX_WINDOW)).unwrap_or(from)
}

/// Type-erased, cheaply clonable cache payload
///
/// In-process backends keep the value as is. Backends that leave the process
/// encode it through a [`PayloadRegistry`](crate::PayloadRegistry), which must
/// know the concrete type.
#[derive(Clone)]
pub struct Payload {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Payload {
    /// Wrap a value
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Borrow the value if it is a `T`
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// `true` if the value is a `T`
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    /// Rust type name of the wrapped value
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn value_type_id(&self) -> TypeId {
        (*self.value).type_id()
    }

    pub(crate) fn as_any(&self) -> &(dyn Any + Send + Sync) {
        &*self.value
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload")
            .field("type", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Freshness of an entry at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Within the lifetime window
    Fresh,
    /// Lifetime passed, still inside the grace window
    Stale,
    /// Past the grace window, equivalent to a miss
    Expired,
}

/// Caching metadata
///
/// `lifetime` and `gracetime` are relative durations supplied by the loader.
/// `lifetime_at` and `gracetime_at` are the absolute deadlines stamped when
/// the entry is written: the grace window starts where the fresh window ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meta {
    /// Labels used for group invalidation
    pub tags: BTreeSet<String>,
    /// How long a written entry is fresh
    pub lifetime: Duration,
    /// How much longer it may be served stale
    pub gracetime: Duration,
    lifetime_at: SystemTime,
    gracetime_at: SystemTime,
}

impl Default for Meta {
    fn default() -> Self {
        Self::new(DEFAULT_LIFETIME, DEFAULT_GRACETIME)
    }
}

impl Meta {
    /// Unstamped metadata with the given relative windows
    #[must_use]
    pub fn new(lifetime: Duration, gracetime: Duration) -> Self {
        Self {
            tags: BTreeSet::new(),
            lifetime,
            gracetime,
            lifetime_at: SystemTime::UNIX_EPOCH,
            gracetime_at: SystemTime::UNIX_EPOCH,
        }
    }

    /// Metadata with explicit absolute deadlines
    #[must_use]
    pub fn with_deadlines(lifetime_at: SystemTime, gracetime_at: SystemTime) -> Self {
        Self {
            lifetime_at,
            gracetime_at,
            ..Self::new(Duration::ZERO, Duration::ZERO)
        }
    }

    pub(crate) fn from_parts(
        tags: BTreeSet<String>,
        lifetime: Duration,
        gracetime: Duration,
        lifetime_at: SystemTime,
        gracetime_at: SystemTime,
    ) -> Self {
        Self {
            tags,
            lifetime,
            gracetime,
            lifetime_at,
            gracetime_at,
        }
    }

    /// Add tags
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Compute the absolute deadlines relative to `now`
    ///
    /// Windows longer than [`MAX_WINDOW`] are clamped to it.
    #[must_use]
    pub fn stamped_at(mut self, now: SystemTime) -> Self {
        self.lifetime_at = deadline_after(now, self.lifetime);
        self.gracetime_at = deadline_after(self.lifetime_at, self.gracetime);
        self
    }

    /// End of the fresh window
    #[must_use]
    pub fn lifetime_at(&self) -> SystemTime {
        self.lifetime_at
    }

    /// End of the grace window
    #[must_use]
    pub fn gracetime_at(&self) -> SystemTime {
        self.gracetime_at
    }

    /// Freshness state at `now`
    #[must_use]
    pub fn freshness_at(&self, now: SystemTime) -> Freshness {
        if now < self.lifetime_at {
            Freshness::Fresh
        } else if now < self.gracetime_at {
            Freshness::Stale
        } else {
            Freshness::Expired
        }
    }

    /// Freshness state right now
    #[must_use]
    pub fn freshness(&self) -> Freshness {
        self.freshness_at(SystemTime::now())
    }

    /// `true` once the grace deadline has passed
    #[must_use]
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        self.freshness_at(now) == Freshness::Expired
    }

    /// Time until the grace deadline, zero if it already passed
    #[must_use]
    pub fn remaining_grace(&self, now: SystemTime) -> Duration {
        self.gracetime_at.duration_since(now).unwrap_or(Duration::ZERO)
    }

    /// `true` if any of `tags` is attached to this entry
    #[must_use]
    pub fn has_any_tag(&self, tags: &[String]) -> bool {
        tags.iter().any(|tag| self.tags.contains(tag))
    }
}

/// A cached value and its metadata
#[derive(Debug, Clone)]
pub struct Entry {
    pub data: Payload,
    pub meta: Meta,
}

impl Entry {
    pub fn new(data: Payload, meta: Meta) -> Self {
        Self { data, meta }
    }
}
