//! Integration tests for building caches from configuration

mod common;

use common::*;
use serde_json::json;
use tiered_cache::{BackendFactory, BackendType, CacheError, FactoryConfig};

fn factory_for(config: serde_json::Value) -> BackendFactory {
    let config = FactoryConfig::from_value(config)
        .unwrap_or_else(|e| panic!("Failed to parse config: {e}"));
    BackendFactory::new().with_config(config)
}

#[tokio::test]
async fn test_configured_in_memory_cache_serves_responses() {
    init_tracing();
    let factory = factory_for(json!({
        "pages": { "backendType": "inmemory", "inMemoryBackend": { "size": 50 } }
    }));

    let cache = factory
        .build_configured_cache("pages")
        .unwrap_or_else(|e| panic!("Failed to build cache: {e}"));
    assert_eq!(cache.backend().name(), "inmemory");

    let first = cache
        .get("home", || async { Ok((body_response("home page"), None)) }, &[])
        .await
        .unwrap_or_else(|e| panic!("get failed: {e}"));
    let second = cache
        .get("home", || async { Ok((body_response("reloaded"), None)) }, &[])
        .await
        .unwrap_or_else(|e| panic!("get failed: {e}"));

    assert_eq!(first.body().as_ref(), b"home page");
    assert_eq!(second.body().as_ref(), b"home page");
}

#[tokio::test]
async fn test_nested_two_level_config() {
    let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let factory = factory_for(json!({
        "assets": {
            "backendType": "twolevel",
            "twoLevelBackendFirst": { "backendType": "inmemory", "inMemoryBackend": {} },
            "twoLevelBackendSecond": {
                "backendType": "file",
                "fileBackend": { "baseDir": dir.path() }
            }
        }
    }));

    let cache = factory
        .build_configured_cache("assets")
        .unwrap_or_else(|e| panic!("Failed to build cache: {e}"));
    assert_eq!(cache.backend().name(), "twolevel");

    cache
        .get("logo.png", || async { Ok((body_response("png"), None)) }, &[])
        .await
        .unwrap_or_else(|e| panic!("get failed: {e}"));

    // The file tier persisted the response under the sanitized key
    assert!(dir.path().join("logo.png").exists());
}

#[test]
fn test_missing_sub_configs_are_named() {
    let cases = [
        (json!({ "backendType": "inmemory" }), "no inMemoryBackend config provided"),
        (json!({ "backendType": "redis" }), "no redisBackend config provided"),
        (json!({ "backendType": "file" }), "no fileBackend config provided"),
        (
            json!({ "backendType": "twolevel" }),
            "no twoLevelBackendFirst config provided",
        ),
        (
            json!({
                "backendType": "twolevel",
                "twoLevelBackendFirst": { "backendType": "inmemory", "inMemoryBackend": {} }
            }),
            "no twoLevelBackendSecond config provided",
        ),
    ];

    for (cache, expected) in cases {
        let factory = factory_for(json!({ "broken": cache }));
        let err = factory
            .build_configured_cache("broken")
            .err()
            .unwrap_or_else(|| panic!("expected {expected}"));
        assert!(matches!(err, CacheError::MissingConfig { .. }));
        assert_eq!(err.to_string(), expected);
    }
}

#[test]
fn test_unknown_backend_type_is_a_config_error() {
    let result = FactoryConfig::from_value(json!({ "x": { "backendType": "memcached" } }));
    assert!(matches!(result, Err(CacheError::Config(_))));
}

#[test]
fn test_unknown_cache_name() {
    let factory = factory_for(json!({}));
    let err = factory
        .build_configured_cache("missing")
        .err()
        .unwrap_or_else(|| panic!("expected an error"));
    assert_eq!(err.to_string(), "cannot find config for missing");
}

#[tokio::test]
async fn test_build_all_builds_every_cache() {
    let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let factory = factory_for(json!({
        "memory": { "backendType": "inmemory", "inMemoryBackend": { "size": 10 } },
        "disk": { "backendType": "file", "fileBackend": { "baseDir": dir.path() } }
    }));

    let caches = factory.build_all().unwrap_or_else(|e| panic!("build_all failed: {e}"));
    assert_eq!(caches.len(), 2);
    assert_eq!(caches.get("memory").map(|c| c.backend().name()), Some("inmemory"));
    assert_eq!(caches.get("disk").map(|c| c.backend().name()), Some("file"));

    let config = factory.config().get("disk").unwrap_or_else(|| panic!("disk config missing"));
    assert_eq!(config.backend_type, BackendType::File);
}

#[tokio::test]
async fn test_build_all_fails_on_broken_cache() {
    let factory = factory_for(json!({
        "good": { "backendType": "inmemory", "inMemoryBackend": {} },
        "bad": { "backendType": "file" }
    }));

    assert!(matches!(
        factory.build_all(),
        Err(CacheError::MissingConfig { field: "fileBackend" })
    ));
}
