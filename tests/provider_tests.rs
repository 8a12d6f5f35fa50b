//! Tests for provider abstraction.

use distributed_lock_core::prelude::*;
use distributed_lock_zookeeper::ZooKeeperLockProvider;
use distributed_lock_zookeeper::memory::InMemoryEnsemble;
use std::sync::Arc;
use std::time::Duration;

mod common;
use common::mock_provider::MockLockProvider;

/// Tests that any provider can be used with the same code.
async fn test_provider_abstraction<P: LockProvider>(provider: &P, name: &str) {
    let cancellation = CancellationToken::new();

    // Create a lock using the provider
    let lock = provider.create_lock(name).unwrap();

    // Try to acquire the lock
    let handle = lock
        .try_acquire(Duration::from_secs(1), &cancellation)
        .await
        .unwrap();
    assert!(handle.is_some());

    // Release the lock
    handle.unwrap().release().await.unwrap();

    // Now we should be able to acquire it again
    let handle2 = lock
        .try_acquire(Duration::from_secs(1), &cancellation)
        .await
        .unwrap();
    assert!(handle2.is_some());
    handle2.unwrap().release().await.unwrap();
}

/// Tests provider extension methods work with any provider.
async fn test_provider_extensions<P: LockProvider + LockProviderExt>(provider: &P, name: &str) {
    let cancellation = CancellationToken::new();

    let handle = provider.acquire_lock(name, &cancellation).await.unwrap();
    assert!(handle.is_acquired());

    // Should be None because the lock is held
    let handle2 = provider
        .try_acquire_lock(name, Duration::from_millis(100), &cancellation)
        .await
        .unwrap();
    assert!(handle2.is_none());

    handle.release().await.unwrap();
}

fn zookeeper_provider() -> ZooKeeperLockProvider<distributed_lock_zookeeper::memory::InMemoryZooKeeper> {
    let ensemble = InMemoryEnsemble::new();
    ZooKeeperLockProvider::builder()
        .client(Arc::new(ensemble.connect()))
        .base_path("/provider-tests")
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_zookeeper_provider_abstraction() {
    test_provider_abstraction(&zookeeper_provider(), "test-resource-abstraction").await;
}

#[tokio::test]
async fn test_mock_provider_abstraction() {
    test_provider_abstraction(&MockLockProvider::new(), "test-resource").await;
}

#[tokio::test]
async fn test_zookeeper_provider_extensions() {
    test_provider_extensions(&zookeeper_provider(), "test-resource-extensions").await;
}

#[tokio::test]
async fn test_mock_provider_extensions() {
    test_provider_extensions(&MockLockProvider::new(), "test-resource").await;
}

#[tokio::test]
async fn test_provider_rejects_empty_names() {
    assert!(matches!(
        zookeeper_provider().create_lock(""),
        Err(LockError::InvalidName(_))
    ));
    assert!(matches!(
        MockLockProvider::new().create_lock(""),
        Err(LockError::InvalidName(_))
    ));
}

#[tokio::test]
async fn test_provider_swappability() {
    // Code written against the traits works with any provider
    async fn use_any_provider<P: LockProvider>(provider: &P) {
        let lock = provider.create_lock("shared-resource").unwrap();
        let handle = lock.acquire(&CancellationToken::new()).await.unwrap();
        handle.release().await.unwrap();
    }

    use_any_provider(&zookeeper_provider()).await;
    use_any_provider(&MockLockProvider::new()).await;
}

#[tokio::test]
async fn test_cancelled_acquire_reports_cancellation() {
    async fn cancelled_while_held<P: LockProvider>(provider: &P)
    where
        <P::Lock as DistributedLock>::Handle: std::fmt::Debug,
    {
        let lock = provider.create_lock("contended").unwrap();
        let held = lock.acquire(&CancellationToken::new()).await.unwrap();

        let cancellation = CancellationToken::new();
        let canceller = cancellation.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let result = lock.acquire(&cancellation).await;
        assert!(result.unwrap_err().is_cancelled());
        held.release().await.unwrap();
    }

    cancelled_while_held(&zookeeper_provider()).await;
    cancelled_while_held(&MockLockProvider::new()).await;
}
