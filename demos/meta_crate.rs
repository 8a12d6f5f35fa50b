//! Example: Using the meta-crate
//!
//! Run with: `cargo run --example meta_crate`
//!
//! This example shows how to use the meta-crate which re-exports the core
//! traits and the ZooKeeper backend.

use distributed_lock::memory::InMemoryEnsemble;
use distributed_lock::*;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();

    println!("Example: Using distributed-lock meta-crate\n");

    let ensemble = InMemoryEnsemble::new();
    let provider = ZooKeeperLockProvider::builder()
        .client(Arc::new(ensemble.connect()))
        .base_path("/example")
        .node_data(Some(NodeData::current().with_application("meta-crate-example")))
        .build()?;

    let cancellation = CancellationToken::new();
    let lock = provider.create_lock("example")?;
    if let Some(handle) = lock.try_acquire(Duration::from_secs(5), &cancellation).await? {
        println!("Lock acquired at {}", handle.path());

        // A second contender gives up after the timeout
        let busy = provider
            .try_acquire_lock("example", Duration::from_millis(100), &cancellation)
            .await?;
        println!("Second attempt while held: {}", if busy.is_some() { "acquired" } else { "busy" });

        handle.release().await?;
    }

    println!("\nAll examples completed!");
    Ok(())
}
