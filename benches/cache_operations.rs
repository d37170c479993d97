//! Benchmarks for basic cache operations
//!
//! This benchmark suite measures the performance of:
//! - In-memory backend reads and writes
//! - File backend writes for different payload sizes
//! - Two-level hits served by the first and by the second tier
//! - Frontend hits and loads on miss

use bytes::Bytes;
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tiered_cache::backends::{InMemoryBackend, InMemoryBackendConfig};
use tiered_cache::{
    CacheBackend, Entry, FileBackend, HttpFrontend, Meta, Payload, PayloadRegistry,
    StringFrontend, TwoLevelBackend,
};
use tokio::runtime::Runtime;

fn runtime() -> Runtime {
    Runtime::new().unwrap_or_else(|_| panic!("Failed to create runtime"))
}

fn memory(rt: &Runtime, size: usize) -> Arc<dyn CacheBackend> {
    let _guard = rt.enter();
    Arc::new(
        InMemoryBackend::new(InMemoryBackendConfig {
            size,
            ..InMemoryBackendConfig::default()
        })
        .unwrap_or_else(|_| panic!("Failed to create in-memory backend")),
    )
}

/// Entry of `size_bytes`, fresh for five minutes
fn test_entry(size_bytes: usize) -> Entry {
    let meta = Meta::new(Duration::from_secs(300), Duration::from_secs(600)).stamped_at(SystemTime::now());
    Entry::new(Payload::new("x".repeat(size_bytes)), meta)
}

/// Benchmark backend write operations
fn bench_backend_set(c: &mut Criterion) {
    let rt = runtime();
    let in_memory = memory(&rt, 10_000);
    let dir = tempfile::tempdir().unwrap_or_else(|_| panic!("Failed to create temp dir"));
    let file: Arc<dyn CacheBackend> =
        Arc::new(FileBackend::new(dir.path(), Arc::new(PayloadRegistry::default())));

    let mut group = c.benchmark_group("backend_set");
    group.measurement_time(Duration::from_secs(10));

    for size in &[100, 1024, 10240, 102_400] {
        let entry = test_entry(*size);

        group.bench_with_input(BenchmarkId::new("inmemory", size), size, |b, _| {
            b.iter(|| {
                rt.block_on(async {
                    let key = format!("bench:set:{}", rand::random::<u32>());
                    in_memory
                        .set(&key, black_box(entry.clone()))
                        .await
                        .unwrap_or_else(|_| panic!("Failed to set cache"));
                });
            });
        });

        group.bench_with_input(BenchmarkId::new("file", size), size, |b, _| {
            b.iter(|| {
                rt.block_on(async {
                    let key = format!("bench.set.{}", rand::random::<u8>());
                    file.set(&key, black_box(entry.clone()))
                        .await
                        .unwrap_or_else(|_| panic!("Failed to set cache"));
                });
            });
        });
    }

    group.finish();
}

/// Benchmark in-memory hit performance
fn bench_memory_hit(c: &mut Criterion) {
    let rt = runtime();
    let backend = memory(&rt, 1000);

    // Pre-populate cache
    rt.block_on(async {
        for i in 0..100 {
            backend
                .set(&format!("bench:memory:{i}"), test_entry(1024))
                .await
                .unwrap_or_else(|_| panic!("Failed to set cache"));
        }
    });

    c.bench_function("inmemory_hit", |b| {
        b.iter(|| {
            rt.block_on(async {
                let key = format!("bench:memory:{}", rand::random::<u8>() % 100);
                black_box(backend.get(&key).await);
            });
        });
    });
}

/// Benchmark two-level hits served by the second tier (first tier miss)
fn bench_second_tier_hit(c: &mut Criterion) {
    let rt = runtime();
    let first = memory(&rt, 1000);
    let second = memory(&rt, 1000);
    let backend = {
        let _guard = rt.enter();
        TwoLevelBackend::new(Arc::clone(&first), Arc::clone(&second))
    };

    // Pre-populate the second tier only
    rt.block_on(async {
        for i in 0..100 {
            second
                .set(&format!("bench:second:{i}"), test_entry(1024))
                .await
                .unwrap_or_else(|_| panic!("Failed to set cache"));
        }
    });

    c.bench_function("second_tier_hit", |b| {
        b.iter(|| {
            rt.block_on(async {
                let key = format!("bench:second:{}", rand::random::<u8>() % 100);
                // Clear the first tier to force a second tier read
                first
                    .purge(&key)
                    .await
                    .unwrap_or_else(|_| panic!("Failed to purge first tier"));
                black_box(backend.get(&key).await);
            });
        });
    });
}

/// Benchmark cache miss performance
fn bench_cache_miss(c: &mut Criterion) {
    let rt = runtime();
    let backend = memory(&rt, 1000);

    c.bench_function("cache_miss", |b| {
        b.iter(|| {
            rt.block_on(async {
                let key = format!("bench:miss:{}", rand::random::<u32>());
                black_box(backend.get(&key).await);
            });
        });
    });
}

/// Benchmark load-on-miss through the string frontend
fn bench_load_on_miss(c: &mut Criterion) {
    let rt = runtime();
    let cache = StringFrontend::new(memory(&rt, 10_000));

    let mut group = c.benchmark_group("load_on_miss");

    // Simulate different loader latencies
    for delay_ms in &[1, 10, 50] {
        let delay = Duration::from_millis(*delay_ms);

        group.bench_with_input(BenchmarkId::from_parameter(delay_ms), delay_ms, |b, _| {
            b.iter(|| {
                rt.block_on(async {
                    let key = format!("bench:load:{}", rand::random::<u32>());
                    cache
                        .get(
                            &key,
                            move || async move {
                                tokio::time::sleep(delay).await;
                                Ok(("x".repeat(1024), None))
                            },
                            &[],
                        )
                        .await
                        .unwrap_or_else(|_| panic!("Failed to load"));
                });
            });
        });
    }

    group.finish();
}

/// Benchmark HTTP frontend hits, including the response copy
fn bench_http_hit(c: &mut Criterion) {
    let rt = runtime();
    let cache = HttpFrontend::new(memory(&rt, 1000));
    let body = Bytes::from("x".repeat(10240));

    rt.block_on(async {
        cache
            .get(
                "bench:http",
                move || async move {
                    let meta = Meta::new(Duration::from_secs(3600), Duration::from_secs(3600));
                    Ok((http::Response::new(body), Some(meta)))
                },
                &[],
            )
            .await
            .unwrap_or_else(|_| panic!("Failed to load"));
    });

    c.bench_function("http_frontend_hit", |b| {
        b.iter(|| {
            rt.block_on(async {
                black_box(
                    cache
                        .get(
                            "bench:http",
                            || async { Err(anyhow::anyhow!("Should not load")) },
                            &[],
                        )
                        .await
                        .unwrap_or_else(|_| panic!("Failed to get cache")),
                );
            });
        });
    });
}

criterion_group!(
    benches,
    bench_backend_set,
    bench_memory_hit,
    bench_second_tier_hit,
    bench_cache_miss,
    bench_load_on_miss,
    bench_http_hit
);
criterion_main!(benches);
