//! Factory Configuration
//!
//! Declarative description of the backend trees the [`BackendFactory`]
//! builds. Field names follow the camelCase keys of the embedding
//! application's configuration:
//!
//! ```json
//! {
//!   "pages": {
//!     "backendType": "twolevel",
//!     "twoLevelBackendFirst": { "backendType": "inmemory", "inMemoryBackend": { "size": 200 } },
//!     "twoLevelBackendSecond": { "backendType": "redis", "redisBackend": { "host": "cache" } }
//!   }
//! }
//! ```
//!
//! [`BackendFactory`]: crate::BackendFactory

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::backends::{FileBackendConfig, InMemoryBackendConfig};
use crate::error::{CacheError, Result};

/// Backend kind selected by `backendType`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    InMemory,
    Redis,
    TwoLevel,
    File,
}

impl BackendType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InMemory => "inmemory",
            Self::Redis => "redis",
            Self::TwoLevel => "twolevel",
            Self::File => "file",
        }
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection settings for the redis backend
///
/// Empty or missing fields fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RedisBackendConfig {
    pub host: String,
    pub port: String,
    pub db: i64,
    pub password: Option<String>,
    /// Connections kept by the pool
    pub max_idle: usize,
    /// Connections unused for longer than this are discarded
    pub idle_timeout_seconds: u64,
}

impl Default for RedisBackendConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: "6379".to_string(),
            db: 0,
            password: None,
            max_idle: 8,
            idle_timeout_seconds: 30 * 60,
        }
    }
}

impl RedisBackendConfig {
    /// Connection URL understood by the redis client
    pub fn url(&self) -> String {
        let defaults = Self::default();
        let host = if self.host.is_empty() { &defaults.host } else { &self.host };
        let port = if self.port.is_empty() { &defaults.port } else { &self.port };

        match self.password.as_deref().filter(|p| !p.is_empty()) {
            Some(password) => format!("redis://:{password}@{host}:{port}/{}", self.db),
            None => format!("redis://{host}:{port}/{}", self.db),
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_seconds)
    }
}

/// Description of one backend, possibly a two-level tree
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    pub backend_type: BackendType,
    #[serde(default)]
    pub in_memory_backend: Option<InMemoryBackendConfig>,
    #[serde(default)]
    pub redis_backend: Option<RedisBackendConfig>,
    #[serde(default)]
    pub file_backend: Option<FileBackendConfig>,
    #[serde(default)]
    pub two_level_backend_first: Option<Box<BackendConfig>>,
    #[serde(default)]
    pub two_level_backend_second: Option<Box<BackendConfig>>,
}

impl BackendConfig {
    fn empty(backend_type: BackendType) -> Self {
        Self {
            backend_type,
            in_memory_backend: None,
            redis_backend: None,
            file_backend: None,
            two_level_backend_first: None,
            two_level_backend_second: None,
        }
    }

    pub fn in_memory(config: InMemoryBackendConfig) -> Self {
        Self {
            in_memory_backend: Some(config),
            ..Self::empty(BackendType::InMemory)
        }
    }

    pub fn redis(config: RedisBackendConfig) -> Self {
        Self {
            redis_backend: Some(config),
            ..Self::empty(BackendType::Redis)
        }
    }

    pub fn file(config: FileBackendConfig) -> Self {
        Self {
            file_backend: Some(config),
            ..Self::empty(BackendType::File)
        }
    }

    pub fn two_level(first: BackendConfig, second: BackendConfig) -> Self {
        Self {
            two_level_backend_first: Some(Box::new(first)),
            two_level_backend_second: Some(Box::new(second)),
            ..Self::empty(BackendType::TwoLevel)
        }
    }
}

/// Named backend configurations, one per logical cache
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct FactoryConfig(pub HashMap<String, BackendConfig>);

impl FactoryConfig {
    /// Parse from an already deserialized configuration tree
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Config`] if the value does not match the schema.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| CacheError::Config(e.to_string()))
    }

    /// Parse from a JSON document
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Config`] if the document does not match the schema.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| CacheError::Config(e.to_string()))
    }

    #[must_use]
    pub fn with_cache(mut self, name: impl Into<String>, config: BackendConfig) -> Self {
        self.0.insert(name.into(), config);
        self
    }

    pub fn get(&self, name: &str) -> Option<&BackendConfig> {
        self.0.get(name)
    }

    /// Configured cache names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.0.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
