//! Duplicate Load Suppression
//!
//! At most one load runs per key. Callers arriving while a load is in flight
//! await the same shared future and receive a clone of its result, error
//! included.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tracing::debug;

use crate::error::Result;

type SharedLoad<T> = Shared<BoxFuture<'static, Result<T>>>;

struct Flight<T: Clone> {
    id: u64,
    future: SharedLoad<T>,
    waiters: usize,
}

/// Leaves a flight when dropped; the last waiter removes it
///
/// Covers early return, cancellation and panic of the awaiting task.
struct WaiterGuard<'a, T: Clone> {
    flights: &'a DashMap<String, Flight<T>>,
    key: &'a str,
    id: u64,
}

impl<T: Clone> Drop for WaiterGuard<'_, T> {
    fn drop(&mut self) {
        let abandoned = match self.flights.get_mut(self.key) {
            Some(mut flight) if flight.id == self.id => {
                flight.waiters = flight.waiters.saturating_sub(1);
                flight.waiters == 0
            }
            _ => false,
        };
        if abandoned {
            self.flights
                .remove_if(self.key, |_, flight| flight.id == self.id && flight.waiters == 0);
        }
    }
}

/// Per-key load coalescing
pub struct SingleFlight<T: Clone> {
    flights: Arc<DashMap<String, Flight<T>>>,
    next_id: AtomicU64,
    coalesced: AtomicU64,
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            flights: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
        }
    }

    /// Run the load produced by `start` unless one is already in flight for
    /// `key`, in which case its result is awaited instead
    ///
    /// `start` is only called when a new flight begins. The load keeps
    /// running while at least one caller awaits it.
    ///
    /// # Errors
    ///
    /// Returns the error of the shared load.
    pub async fn run<S, Fut>(&self, key: &str, start: S) -> Result<T>
    where
        S: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let (id, future) = {
            let mut flight = self.flights.entry(key.to_string()).or_insert_with(|| {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                Flight {
                    id,
                    future: self.launch(key, id, start()),
                    waiters: 0,
                }
            });
            flight.waiters += 1;
            if flight.waiters > 1 {
                self.coalesced.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, waiters = flight.waiters, "Joining in-flight load");
            }
            (flight.id, flight.future.clone())
        };

        let _guard = WaiterGuard {
            flights: &self.flights,
            key,
            id,
        };

        future.await
    }

    fn launch<Fut>(&self, key: &str, id: u64, load: Fut) -> SharedLoad<T>
    where
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let flights = Arc::clone(&self.flights);
        let key = key.to_string();
        async move {
            let result = load.await;
            // Later callers start a new load instead of reusing this result
            flights.remove_if(&key, |_, flight| flight.id == id);
            result
        }
        .boxed()
        .shared()
    }

    /// Number of keys with a load in flight
    pub fn in_flight(&self) -> usize {
        self.flights.len()
    }

    /// Calls that joined an existing load instead of starting one
    pub fn coalesced(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }
}

impl<T> Default for SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
