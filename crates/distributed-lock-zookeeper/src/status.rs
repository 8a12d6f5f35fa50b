//! Classification of store statuses.

use crate::client::ZooKeeperStatus;

impl ZooKeeperStatus {
    /// Returns `true` for transient network and session conditions that are
    /// worth retrying: the operation may succeed once the client reconnects.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ZooKeeperStatus::UnknownError
                | ZooKeeperStatus::NotConnected
                | ZooKeeperStatus::ConnectionLoss
                | ZooKeeperStatus::SessionExpired
                | ZooKeeperStatus::SessionMoved
                | ZooKeeperStatus::Timeout
                | ZooKeeperStatus::NotReadonlyOperation
        )
    }
}
