//! Shared helpers for integration tests.

#![allow(dead_code)]

pub mod mock_provider;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use distributed_lock_zookeeper::memory::{InMemoryEnsemble, InMemoryZooKeeper};
use distributed_lock_zookeeper::{ZooKeeperDistributedLock, ZooKeeperLockSettings};

/// Generous bound for anything that should happen "soon".
pub const PATIENCE: Duration = Duration::from_secs(10);

pub type TestLock = ZooKeeperDistributedLock<InMemoryZooKeeper>;

/// A lock folder no other test uses.
pub fn unique_folder(test: &str) -> String {
    format!("/tests/{test}/{}", uuid::Uuid::new_v4().simple())
}

/// Connects a new client (with its own session) and builds a lock on it.
pub fn lock_on(ensemble: &InMemoryEnsemble, folder: &str) -> (Arc<InMemoryZooKeeper>, TestLock) {
    let client = Arc::new(ensemble.connect());
    let settings = ZooKeeperLockSettings::new(folder).unwrap();
    (client.clone(), ZooKeeperDistributedLock::new(client, settings))
}

/// Polls `condition` until it holds, panicking after [`PATIENCE`].
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(PATIENCE, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Awaits `future`, panicking after [`PATIENCE`].
pub async fn soon<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(PATIENCE, future)
        .await
        .expect("future did not complete in time")
}

/// Routes `tracing` output to the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
