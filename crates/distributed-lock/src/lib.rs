//! Distributed locks for Rust on ZooKeeper-style coordination stores.
//!
//! Processes that share a coordination store agree on which one of them
//! holds a named lock, without a central arbiter. The holder learns promptly
//! when the lock is lost because its session died.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use distributed_lock::*;
//! use distributed_lock::memory::InMemoryEnsemble;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Any `ZooKeeperClient` works here
//!     let ensemble = InMemoryEnsemble::new();
//!     let provider = ZooKeeperLockProvider::builder()
//!         .client(Arc::new(ensemble.connect()))
//!         .base_path("/locks")
//!         .build()?;
//!
//!     let lock = provider.create_lock("my-resource")?;
//!
//!     let cancellation = CancellationToken::new();
//!     if let Some(handle) = lock.try_acquire(Duration::from_secs(5), &cancellation).await? {
//!         // Critical section - we have exclusive access
//!         println!("Doing critical work...");
//!         handle.release().await?;
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - **Fair**: contenders are served in the order they queued up
//! - **No herd effect**: each waiter watches only its predecessor
//! - **Loss detection**: handles notice when their node disappears
//! - **Failure tolerant**: lost acknowledgements never leak or duplicate nodes
//!
//! # Crate Organization
//!
//! This is a meta-crate that re-exports types from:
//! - `distributed-lock-core`: Core traits and types
//! - `distributed-lock-zookeeper`: ZooKeeper backend
//!
//! For fine-grained control, you can depend on individual crates instead.

// Re-export core types and traits
pub use distributed_lock_core::*;

// Re-export the zookeeper backend
pub use distributed_lock_zookeeper as zookeeper;
pub use distributed_lock_zookeeper::{
    NodeData, ZooKeeperClient, ZooKeeperDistributedLock, ZooKeeperError, ZooKeeperLockHandle,
    ZooKeeperLockProvider, ZooKeeperLockProviderBuilder, ZooKeeperLockSettings, memory,
};
