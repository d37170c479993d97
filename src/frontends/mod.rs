//! Cache Frontends
//!
//! Frontends put freshness policy on top of any [`CacheBackend`]:
//!
//! - **Fresh** entries are served directly
//! - **Stale** entries are served while a detached task reloads them
//! - **Missing or expired** entries are loaded synchronously and stored
//!
//! Loads are coalesced per key, so a burst of requests for the same missing
//! key runs the loader once.
//!
//! [`CacheBackend`]: crate::CacheBackend

mod http;
mod singleflight;
mod string;

pub use self::http::{CachedResponse, HttpFrontend, HttpRecord};
pub use self::singleflight::SingleFlight;
pub use self::string::StringFrontend;

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::SystemTime;

use futures_util::FutureExt;
use tokio::time::Instant;

use crate::entry::{Entry, Meta, Payload};
use crate::error::{CacheError, Result};
use crate::traits::CacheBackend;

/// Metadata for a freshly loaded value: loader meta (or the defaults), the
/// request tags merged in, deadlines stamped at `now`
pub(crate) fn resolve_meta(meta: Option<Meta>, tags: &[String], now: SystemTime) -> Meta {
    meta.unwrap_or_default()
        .with_tags(tags.iter().cloned())
        .stamped_at(now)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Run a loader, turning panics and an elapsed deadline into errors
pub(crate) async fn call_loader<T, F, Fut>(
    loader: F,
    deadline: Option<Instant>,
) -> Result<(T, Option<Meta>)>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = anyhow::Result<(T, Option<Meta>)>>,
{
    let started = Instant::now();
    let guarded = AssertUnwindSafe(async move { loader().await }).catch_unwind();

    let outcome = match deadline {
        Some(deadline) => match tokio::time::timeout_at(deadline, guarded).await {
            Ok(outcome) => outcome,
            Err(_) => {
                return Err(CacheError::DeadlineExceeded(
                    deadline.saturating_duration_since(started),
                ));
            }
        },
        None => guarded.await,
    };

    match outcome {
        Ok(result) => result.map_err(CacheError::loader),
        Err(panic) => Err(CacheError::loader(anyhow::anyhow!(
            "loader panicked: {}",
            panic_message(panic.as_ref())
        ))),
    }
}

/// Write through the backend; failures are logged and swallowed
pub(crate) async fn store(
    backend: &dyn CacheBackend,
    category: &'static str,
    key: &str,
    data: Payload,
    meta: Meta,
) {
    if let Err(e) = backend.set(key, Entry::new(data, meta)).await {
        tracing::warn!(category, key = %key, error = %e, "Failed to store loaded value");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::entry::{DEFAULT_GRACETIME, DEFAULT_LIFETIME};

    #[test]
    fn default_meta_and_merged_tags() {
        let now = SystemTime::now();
        let meta = resolve_meta(None, &["page".to_string()], now);

        assert_eq!(meta.lifetime, DEFAULT_LIFETIME);
        assert_eq!(meta.gracetime, DEFAULT_GRACETIME);
        assert_eq!(meta.lifetime_at(), now + DEFAULT_LIFETIME);
        assert!(meta.tags.contains("page"));

        let custom = Meta::new(Duration::from_secs(1), Duration::from_secs(2)).with_tags(["own"]);
        let meta = resolve_meta(Some(custom), &["page".to_string()], now);
        assert_eq!(meta.tags.len(), 2);
        assert_eq!(meta.gracetime_at(), now + Duration::from_secs(3));
    }

    #[tokio::test]
    async fn panicking_loader_becomes_an_error() {
        let result: Result<(String, Option<Meta>)> =
            call_loader(|| async { panic!("exploded") }, None).await;

        match result {
            Err(e) => {
                assert!(e.is_loader_error());
                assert!(e.to_string().contains("exploded"));
            }
            Ok(_) => panic!("expected an error"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn loader_is_bounded_by_the_deadline() {
        let deadline = Instant::now() + Duration::from_millis(100);
        let result: Result<(String, Option<Meta>)> = call_loader(
            || async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(("late".to_string(), None))
            },
            Some(deadline),
        )
        .await;

        assert!(matches!(result, Err(CacheError::DeadlineExceeded(_))));
    }
}
