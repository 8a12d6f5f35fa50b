//! Lock configuration.

use distributed_lock_core::error::{LockError, LockResult};

use crate::node_data::NodeData;
use crate::path;

/// Configuration of one ZooKeeper lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZooKeeperLockSettings {
    path: String,
    node_data: Option<NodeData>,
}

impl ZooKeeperLockSettings {
    /// Creates settings for the lock folder at `path`.
    ///
    /// The folder is where contenders create their nodes. It must be an
    /// absolute path other than the root; a trailing slash is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::InvalidName`] for the root and malformed paths.
    pub fn new(path: impl Into<String>) -> LockResult<Self> {
        let path = path.into();
        let trimmed = match path.strip_suffix(path::SEPARATOR) {
            Some(rest) if !rest.is_empty() => rest,
            _ => path.as_str(),
        };

        if trimmed == path::ROOT {
            return Err(LockError::InvalidName(
                "lock folder cannot be the root path".to_string(),
            ));
        }
        if !path::is_valid(trimmed) {
            return Err(LockError::InvalidName(format!(
                "lock folder '{path}' is not an absolute path without empty segments"
            )));
        }

        Ok(Self {
            path: trimmed.to_string(),
            node_data: Some(NodeData::current()),
        })
    }

    /// Sets the payload stored in contender nodes. `None` stores nothing.
    pub fn with_node_data(mut self, node_data: Option<NodeData>) -> Self {
        self.node_data = node_data;
        self
    }

    /// The lock folder.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn node_data(&self) -> Option<&NodeData> {
        self.node_data.as_ref()
    }
}
