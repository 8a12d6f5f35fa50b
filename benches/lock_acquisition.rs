//! Benchmarks for lock acquisition latency

use criterion::{Criterion, criterion_group, criterion_main};
use distributed_lock_core::prelude::*;
use distributed_lock_zookeeper::ZooKeeperLockProvider;
use distributed_lock_zookeeper::memory::InMemoryEnsemble;
use std::sync::Arc;
use std::time::Duration;

fn bench_zookeeper_lock_acquisition(c: &mut Criterion) {
    let ensemble = InMemoryEnsemble::new();
    let provider = ZooKeeperLockProvider::builder()
        .client(Arc::new(ensemble.connect()))
        .base_path("/bench")
        .build()
        .unwrap();

    let lock = provider.create_lock("bench-lock").unwrap();
    let cancellation = CancellationToken::new();

    let mut group = c.benchmark_group("zookeeper_lock");
    group.bench_function("acquire_release", |b| {
        b.to_async(tokio::runtime::Runtime::new().unwrap())
            .iter(|| async {
                if let Ok(handle) = lock.acquire(&cancellation).await {
                    let _ = handle.release().await;
                }
            });
    });

    group.bench_function("try_acquire_release", |b| {
        b.to_async(tokio::runtime::Runtime::new().unwrap())
            .iter(|| async {
                if let Ok(Some(handle)) = lock.try_acquire(Duration::from_secs(1), &cancellation).await {
                    let _ = handle.release().await;
                }
            });
    });

    group.finish();
}

fn bench_contended_handoff(c: &mut Criterion) {
    let ensemble = InMemoryEnsemble::new();
    let provider = Arc::new(
        ZooKeeperLockProvider::builder()
            .client(Arc::new(ensemble.connect()))
            .base_path("/bench")
            .node_data(None)
            .build()
            .unwrap(),
    );

    let mut group = c.benchmark_group("zookeeper_contention");
    group.sample_size(20);
    group.bench_function("four_contenders", |b| {
        b.to_async(tokio::runtime::Runtime::new().unwrap())
            .iter(|| {
                let provider = provider.clone();
                async move {
                    let tasks: Vec<_> = (0..4)
                        .map(|_| {
                            let provider = provider.clone();
                            tokio::spawn(async move {
                                let handle = provider
                                    .acquire_lock("contended", &CancellationToken::new())
                                    .await?;
                                handle.release().await
                            })
                        })
                        .collect();
                    for task in tasks {
                        let _ = task.await;
                    }
                }
            });
    });

    group.finish();
}

criterion_group!(benches, bench_zookeeper_lock_acquisition, bench_contended_handoff);
criterion_main!(benches);
