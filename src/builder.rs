//! Backend Factory
//!
//! Builds backend trees and HTTP frontends from a [`FactoryConfig`].
//!
//! # Example: Configured Caches
//!
//! ```rust,no_run
//! use tiered_cache::{BackendFactory, FactoryConfig};
//!
//! #[tokio::main]
//! async fn main() -> tiered_cache::error::Result<()> {
//!     let config = FactoryConfig::from_json_str(
//!         r#"{ "pages": { "backendType": "inmemory", "inMemoryBackend": { "size": 500 } } }"#,
//!     )?;
//!
//!     let pages = BackendFactory::new().with_config(config).build_configured_cache("pages")?;
//!     Ok(())
//! }
//! ```
//!
//! # Example: Custom Backend
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tiered_cache::BackendFactory;
//!
//! let frontend = BackendFactory::new().build_with_backend(Arc::new(MyCustomBackend::new()));
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::backends::{FileBackend, InMemoryBackend, TwoLevelBackend};
use crate::config::{BackendConfig, BackendType, FactoryConfig};
use crate::error::{CacheError, Result};
use crate::frontends::HttpFrontend;
use crate::registry::PayloadRegistry;
use crate::traits::CacheBackend;

/// Factory for configured backends and HTTP frontends
///
/// # Default Behavior
///
/// - No caches are configured
/// - Backends that serialize use [`PayloadRegistry::default`], which knows
///   the payload types of the built-in frontends
#[derive(Debug, Clone)]
pub struct BackendFactory {
    registry: Arc<PayloadRegistry>,
    config: FactoryConfig,
}

impl BackendFactory {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(PayloadRegistry::default()),
            config: FactoryConfig::default(),
        }
    }

    /// Use these named cache configurations
    #[must_use]
    pub fn with_config(mut self, config: FactoryConfig) -> Self {
        self.config = config;
        self
    }

    /// Use this registry for the file and redis backends
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<PayloadRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<PayloadRegistry> {
        &self.registry
    }

    /// Build the backend described by `config`, recursing into two-level tiers
    ///
    /// Metrics of leaf backends are tagged with `frontend_name`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::MissingConfig`] naming the sub-configuration the
    /// backend type needs but did not get.
    pub fn build_backend(&self, config: &BackendConfig, frontend_name: &str) -> Result<Arc<dyn CacheBackend>> {
        debug!(backend_type = %config.backend_type, frontend_name, "Building cache backend");

        match config.backend_type {
            BackendType::InMemory => {
                let options = config
                    .in_memory_backend
                    .ok_or(CacheError::MissingConfig { field: "inMemoryBackend" })?;
                Ok(Arc::new(InMemoryBackend::new(options)?.with_frontend_name(frontend_name)))
            }
            BackendType::Redis => {
                let options = config
                    .redis_backend
                    .as_ref()
                    .ok_or(CacheError::MissingConfig { field: "redisBackend" })?;
                self.redis_backend(options, frontend_name)
            }
            BackendType::File => {
                let options = config
                    .file_backend
                    .as_ref()
                    .ok_or(CacheError::MissingConfig { field: "fileBackend" })?;
                Ok(Arc::new(
                    FileBackend::from_config(options, Arc::clone(&self.registry))
                        .with_frontend_name(frontend_name),
                ))
            }
            BackendType::TwoLevel => {
                let first = config
                    .two_level_backend_first
                    .as_deref()
                    .ok_or(CacheError::MissingConfig { field: "twoLevelBackendFirst" })?;
                let second = config
                    .two_level_backend_second
                    .as_deref()
                    .ok_or(CacheError::MissingConfig { field: "twoLevelBackendSecond" })?;
                Ok(Arc::new(TwoLevelBackend::new(
                    self.build_backend(first, frontend_name)?,
                    self.build_backend(second, frontend_name)?,
                )))
            }
        }
    }

    #[cfg(feature = "redis")]
    fn redis_backend(
        &self,
        options: &crate::config::RedisBackendConfig,
        frontend_name: &str,
    ) -> Result<Arc<dyn CacheBackend>> {
        let backend = crate::backends::RedisBackend::new(options, Arc::clone(&self.registry))?;
        Ok(Arc::new(backend.with_frontend_name(frontend_name)))
    }

    #[cfg(not(feature = "redis"))]
    fn redis_backend(
        &self,
        _options: &crate::config::RedisBackendConfig,
        _frontend_name: &str,
    ) -> Result<Arc<dyn CacheBackend>> {
        Err(CacheError::UnavailableBackend("redis"))
    }

    /// Build the HTTP frontend configured under `name`
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::UnknownCache`] if `name` is not configured, or
    /// the error of [`build_backend`](Self::build_backend).
    pub fn build_configured_cache(&self, name: &str) -> Result<HttpFrontend> {
        let config = self
            .config
            .get(name)
            .ok_or_else(|| CacheError::UnknownCache(name.to_string()))?;
        let backend = self.build_backend(config, name)?;

        info!(cache = name, backend = backend.name(), "Configured cache built");
        Ok(self.build_with_backend(backend))
    }

    /// Build every configured cache, keyed by name
    ///
    /// # Errors
    ///
    /// Fails on the first cache that cannot be built.
    pub fn build_all(&self) -> Result<HashMap<String, HttpFrontend>> {
        self.config
            .names()
            .into_iter()
            .map(|name| Ok((name.to_string(), self.build_configured_cache(name)?)))
            .collect()
    }

    /// Wrap any backend in a new HTTP frontend
    pub fn build_with_backend(&self, backend: Arc<dyn CacheBackend>) -> HttpFrontend {
        HttpFrontend::new(backend)
    }
}

impl Default for BackendFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{FileBackendConfig, InMemoryBackendConfig};

    #[test]
    fn builds_in_memory_backend() {
        let factory = BackendFactory::new();
        let backend = factory
            .build_backend(&BackendConfig::in_memory(InMemoryBackendConfig::default()), "test")
            .unwrap_or_else(|e| panic!("build: {e}"));
        assert_eq!(backend.name(), "inmemory");
    }

    #[test]
    fn missing_sub_config_is_named() {
        let factory = BackendFactory::new();
        let mut config = BackendConfig::in_memory(InMemoryBackendConfig::default());
        config.in_memory_backend = None;

        let err = factory.build_backend(&config, "test").err();
        assert!(matches!(err, Some(CacheError::MissingConfig { field: "inMemoryBackend" })));
        assert_eq!(
            err.map(|e| e.to_string()).as_deref(),
            Some("no inMemoryBackend config provided")
        );
    }

    #[test]
    fn two_level_requires_both_tiers() {
        let factory = BackendFactory::new();
        let mut config = BackendConfig::two_level(
            BackendConfig::in_memory(InMemoryBackendConfig::default()),
            BackendConfig::file(FileBackendConfig::default()),
        );
        assert_eq!(
            factory
                .build_backend(&config, "test")
                .map(|b| b.name())
                .ok(),
            Some("twolevel")
        );

        config.two_level_backend_second = None;
        assert!(matches!(
            factory.build_backend(&config, "test"),
            Err(CacheError::MissingConfig { field: "twoLevelBackendSecond" })
        ));
    }

    #[test]
    fn unknown_cache_name() {
        let factory = BackendFactory::new();
        assert!(matches!(
            factory.build_configured_cache("nope"),
            Err(CacheError::UnknownCache(name)) if name == "nope"
        ));
    }
}
