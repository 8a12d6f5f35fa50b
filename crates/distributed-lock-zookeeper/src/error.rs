//! Structured store errors.

use std::sync::Arc;

use distributed_lock_core::error::LockError;
use thiserror::Error;

use crate::client::{Cause, ZooKeeperStatus};

/// A store operation finished with a status the recipes cannot recover from.
///
/// Cheap to clone, so one outcome can be handed to every waiter.
#[derive(Error, Debug, Clone)]
#[error("zookeeper operation on '{path}' failed with status {status}")]
pub struct ZooKeeperError {
    status: ZooKeeperStatus,
    path: String,
    #[source]
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl ZooKeeperError {
    pub fn new(status: ZooKeeperStatus, path: impl Into<String>) -> Self {
        Self {
            status,
            path: path.into(),
            source: None,
        }
    }

    pub fn with_cause(mut self, cause: Cause) -> Self {
        self.source = cause;
        self
    }

    pub fn status(&self) -> ZooKeeperStatus {
        self.status
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl From<ZooKeeperError> for LockError {
    fn from(error: ZooKeeperError) -> Self {
        match error.status {
            ZooKeeperStatus::Died => LockError::Connection(Box::new(error)),
            _ => LockError::Backend(Box::new(error)),
        }
    }
}
