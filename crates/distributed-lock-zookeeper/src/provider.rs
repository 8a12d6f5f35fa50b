//! ZooKeeper lock provider implementation.

use std::sync::Arc;

use distributed_lock_core::error::{LockError, LockResult};
use distributed_lock_core::traits::LockProvider;

use crate::client::ZooKeeperClient;
use crate::lock::ZooKeeperDistributedLock;
use crate::node_data::NodeData;
use crate::path;
use crate::settings::ZooKeeperLockSettings;

/// Default folder under which named locks are created.
pub const DEFAULT_BASE_PATH: &str = "/distributed-locks";

/// Builder for ZooKeeper lock provider configuration.
pub struct ZooKeeperLockProviderBuilder<C: ZooKeeperClient> {
    client: Option<Arc<C>>,
    base_path: String,
    node_data: Option<Option<NodeData>>,
}

impl<C: ZooKeeperClient> ZooKeeperLockProviderBuilder<C> {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self {
            client: None,
            base_path: DEFAULT_BASE_PATH.to_string(),
            node_data: None,
        }
    }

    /// Sets the store client shared by every lock of the provider.
    pub fn client(mut self, client: Arc<C>) -> Self {
        self.client = Some(client);
        self
    }

    /// Sets the folder that holds one sub-folder per lock name.
    pub fn base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// Sets the payload stored in contender nodes. `None` stores nothing.
    ///
    /// Defaults to a description of the current process.
    pub fn node_data(mut self, node_data: Option<NodeData>) -> Self {
        self.node_data = Some(node_data);
        self
    }

    /// Builds the provider.
    ///
    /// # Errors
    ///
    /// Returns an error if no client is set or the base path is malformed.
    pub fn build(self) -> LockResult<ZooKeeperLockProvider<C>> {
        let client = self
            .client
            .ok_or_else(|| LockError::InvalidName("client not specified".to_string()))?;

        let base_path = self.base_path.trim_end_matches(path::SEPARATOR);
        let base_path = if base_path.is_empty() {
            path::ROOT
        } else {
            base_path
        };
        if !path::is_valid(base_path) {
            return Err(LockError::InvalidName(format!(
                "base path '{}' is not an absolute path",
                self.base_path
            )));
        }

        Ok(ZooKeeperLockProvider {
            client,
            base_path: base_path.to_string(),
            node_data: self.node_data.unwrap_or_else(|| Some(NodeData::current())),
        })
    }
}

impl<C: ZooKeeperClient> Default for ZooKeeperLockProviderBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Provider for ZooKeeper-based distributed locks.
///
/// The lock named `name` uses the folder `<base path>/<name>`; names may
/// contain slashes to build deeper hierarchies.
pub struct ZooKeeperLockProvider<C: ZooKeeperClient> {
    client: Arc<C>,
    base_path: String,
    node_data: Option<NodeData>,
}

impl<C: ZooKeeperClient> ZooKeeperLockProvider<C> {
    /// Returns a new builder for configuring the provider.
    pub fn builder() -> ZooKeeperLockProviderBuilder<C> {
        ZooKeeperLockProviderBuilder::new()
    }

    /// Creates a provider with default settings.
    pub fn new(client: Arc<C>) -> LockResult<Self> {
        Self::builder().client(client).build()
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }
}

impl<C: ZooKeeperClient> LockProvider for ZooKeeperLockProvider<C> {
    type Lock = ZooKeeperDistributedLock<C>;

    fn create_lock(&self, name: &str) -> LockResult<Self::Lock> {
        if name.trim_matches(path::SEPARATOR).is_empty() {
            return Err(LockError::InvalidName("lock name cannot be empty".to_string()));
        }

        let settings = ZooKeeperLockSettings::new(path::combine(&self.base_path, name))?
            .with_node_data(self.node_data.clone());
        Ok(ZooKeeperDistributedLock::new(self.client.clone(), settings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryEnsemble, InMemoryZooKeeper};
    use distributed_lock_core::traits::DistributedLock;

    fn client() -> Arc<InMemoryZooKeeper> {
        Arc::new(InMemoryEnsemble::new().connect())
    }

    #[test]
    fn test_builder_requires_client() {
        let result = ZooKeeperLockProvider::<InMemoryZooKeeper>::builder().build();
        assert!(matches!(result, Err(LockError::InvalidName(_))));
    }

    #[test]
    fn test_builder_rejects_relative_base_path() {
        let result = ZooKeeperLockProvider::builder()
            .client(client())
            .base_path("locks")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_lock_folder_is_under_base_path() {
        let provider = ZooKeeperLockProvider::builder()
            .client(client())
            .base_path("/services/billing/")
            .node_data(None)
            .build()
            .unwrap();

        let lock = provider.create_lock("invoices").unwrap();
        assert_eq!(lock.name(), "/services/billing/invoices");
        assert!(lock.settings().node_data().is_none());
    }

    #[test]
    fn test_root_base_path() {
        let provider = ZooKeeperLockProvider::builder()
            .client(client())
            .base_path("/")
            .build()
            .unwrap();

        assert_eq!(provider.create_lock("jobs").unwrap().name(), "/jobs");
    }

    #[test]
    fn test_invalid_lock_names() {
        let provider = ZooKeeperLockProvider::new(client()).unwrap();
        assert!(provider.create_lock("").is_err());
        assert!(provider.create_lock("/").is_err());
        assert!(provider.create_lock("a//b").is_err());
    }
}
