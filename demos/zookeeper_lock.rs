//! Example: ZooKeeper lock with session loss detection
//!
//! Run with: `RUST_LOG=info cargo run --example zookeeper_lock`
//!
//! Three workers queue up for one lock on an in-memory ensemble. The first
//! holder's session is then killed to show how a handle reports loss.

use std::sync::Arc;
use std::time::Duration;

use distributed_lock_core::prelude::*;
use distributed_lock_zookeeper::memory::InMemoryEnsemble;
use distributed_lock_zookeeper::{ZooKeeperDistributedLock, ZooKeeperLockSettings};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let ensemble = InMemoryEnsemble::new();

    // Workers take turns, in the order they queued up
    let mut workers = Vec::new();
    for worker in 0..3 {
        let lock = ZooKeeperDistributedLock::new(
            Arc::new(ensemble.connect()),
            ZooKeeperLockSettings::new("/demo/locks/report")?,
        );
        workers.push(tokio::spawn(async move {
            let handle = lock.acquire(&CancellationToken::new()).await?;
            info!(worker, path = handle.path(), "working");
            tokio::time::sleep(Duration::from_millis(200)).await;
            handle.release().await
        }));
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    for worker in workers {
        worker.await??;
    }

    // A holder notices when its session dies
    let client = Arc::new(ensemble.connect());
    let lock = ZooKeeperDistributedLock::new(
        client.clone(),
        ZooKeeperLockSettings::new("/demo/locks/report")?,
    );
    let handle = lock.acquire(&CancellationToken::new()).await?;
    let mut lost = handle.lost_token().clone();

    ensemble.kill_session(&client);
    lost.wait_for(|lost| *lost).await?;
    info!(acquired = handle.is_acquired(), "session killed, lock lost");
    handle.release().await?;

    Ok(())
}
