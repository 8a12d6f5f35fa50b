//! ZooKeeper backend for distributed locks.
//!
//! Contenders create protected ephemeral-sequential nodes in a lock folder.
//! The node with the smallest index holds the lock, and the others each wait
//! for their immediate predecessor to disappear. A holder loses the lock as
//! soon as its node does, for example when its session expires.
//!
//! The store is reached through the [`ZooKeeperClient`] trait. The
//! [`memory`] module provides an in-process implementation.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use distributed_lock_core::prelude::*;
//! use distributed_lock_zookeeper::memory::InMemoryEnsemble;
//! use distributed_lock_zookeeper::ZooKeeperLockProvider;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> LockResult<()> {
//! let ensemble = InMemoryEnsemble::new();
//! let provider = ZooKeeperLockProvider::builder()
//!     .client(Arc::new(ensemble.connect()))
//!     .base_path("/locks")
//!     .build()?;
//!
//! let lock = provider.create_lock("reports")?;
//! let handle = lock.acquire(&CancellationToken::new()).await?;
//! // Critical section
//! handle.release().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod delay;
pub mod election;
pub mod error;
pub mod handle;
pub mod lock;
pub mod memory;
pub mod node_data;
pub mod path;
pub mod protected;
pub mod provider;
pub mod settings;
mod status;
pub mod wait;

pub use client::{
    ConnectionState, CreateMode, CreateRequest, CreateResult, DeleteResult, ExistsResult,
    GetChildrenResult, NodeEvent, NodeWatcher, WatchedEvent, ZooKeeperClient, ZooKeeperResult,
    ZooKeeperStatus,
};
pub use election::wait_for_leadership;
pub use error::ZooKeeperError;
pub use handle::ZooKeeperLockHandle;
pub use lock::ZooKeeperDistributedLock;
pub use node_data::NodeData;
pub use protected::{create_protected, delete_protected};
pub use provider::{ZooKeeperLockProvider, ZooKeeperLockProviderBuilder};
pub use settings::ZooKeeperLockSettings;
pub use wait::wait_for_disappearance;
