//! Backend Metrics
//!
//! Hit, miss and error counters for a single backend instance, tagged with the
//! backend type and, for factory-built backends, the name of the frontend the
//! backend serves. Each count is also emitted as a `trace` event so a tracing
//! subscriber can forward it to an external metrics sink.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::trace;

/// Counters for one backend
#[derive(Debug, Clone)]
pub struct BackendMetrics {
    backend_type: &'static str,
    frontend_name: Option<Arc<str>>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    errors: Arc<DashMap<&'static str, AtomicU64>>,
}

impl BackendMetrics {
    pub fn new(backend_type: &'static str) -> Self {
        Self {
            backend_type,
            frontend_name: None,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            errors: Arc::new(DashMap::new()),
        }
    }

    /// Tag the counters with the logical cache name
    #[must_use]
    pub fn with_frontend_name(mut self, frontend_name: impl Into<Arc<str>>) -> Self {
        self.frontend_name = Some(frontend_name.into());
        self
    }

    pub fn backend_type(&self) -> &'static str {
        self.backend_type
    }

    pub fn frontend_name(&self) -> Option<&str> {
        self.frontend_name.as_deref()
    }

    pub fn count_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        trace!(
            backend_type = self.backend_type,
            frontend_name = self.frontend_name.as_deref().unwrap_or(""),
            "cache backend hit"
        );
    }

    pub fn count_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        trace!(
            backend_type = self.backend_type,
            frontend_name = self.frontend_name.as_deref().unwrap_or(""),
            "cache backend miss"
        );
    }

    pub fn count_error(&self, reason: &'static str) {
        self.errors
            .entry(reason)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
        trace!(
            backend_type = self.backend_type,
            frontend_name = self.frontend_name.as_deref().unwrap_or(""),
            reason,
            "cache backend error"
        );
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> BackendStats {
        let mut errors: Vec<(&'static str, u64)> = self
            .errors
            .iter()
            .map(|entry| (*entry.key(), entry.value().load(Ordering::Relaxed)))
            .collect();
        errors.sort_unstable();

        BackendStats {
            backend_type: self.backend_type,
            frontend_name: self.frontend_name.as_deref().map(ToString::to_string),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            errors,
        }
    }
}

/// Backend statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendStats {
    pub backend_type: &'static str,
    pub frontend_name: Option<String>,
    pub hits: u64,
    pub misses: u64,
    /// Error counts by reason, sorted by reason
    pub errors: Vec<(&'static str, u64)>,
}

impl BackendStats {
    /// Errors recorded for `reason`
    pub fn error_count(&self, reason: &str) -> u64 {
        self.errors
            .iter()
            .find(|(r, _)| *r == reason)
            .map_or(0, |(_, count)| *count)
    }
}
