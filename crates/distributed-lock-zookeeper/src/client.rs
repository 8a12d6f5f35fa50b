//! The coordination-store client interface consumed by the lock recipes.
//!
//! Connection management, session handling and the wire protocol belong to
//! the implementor. The recipes only need the small capability set below.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::error::ZooKeeperError;

/// How a node is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CreateMode {
    /// Survives the session that created it.
    Persistent,
    /// Persistent, with a store-assigned sequential suffix.
    PersistentSequential,
    /// Removed by the store when the creating session ends.
    Ephemeral,
    /// Ephemeral, with a store-assigned sequential suffix.
    EphemeralSequential,
}

impl CreateMode {
    pub fn is_sequential(self) -> bool {
        matches!(self, Self::PersistentSequential | Self::EphemeralSequential)
    }

    pub fn is_ephemeral(self) -> bool {
        matches!(self, Self::Ephemeral | Self::EphemeralSequential)
    }
}

/// Status of a store operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZooKeeperStatus {
    Ok,
    NodeNotFound,
    NodeAlreadyExists,
    BadArguments,
    NotEmpty,
    ChildrenForEphemeralsAreNotAllowed,
    VersionsMismatch,
    NotConnected,
    ConnectionLoss,
    SessionExpired,
    SessionMoved,
    Timeout,
    UnknownError,
    NotReadonlyOperation,
    /// The client has been closed and will never reconnect.
    Died,
}

impl fmt::Display for ZooKeeperStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Connection state reported by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    ConnectedReadonly,
    Expired,
    /// The client has been closed. Terminal.
    Died,
}

/// Kind of change reported to a node watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeEvent {
    Created,
    Deleted,
    DataChanged,
    ChildrenChanged,
}

/// A change notification delivered to a [`NodeWatcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedEvent {
    pub event: NodeEvent,
    pub path: String,
}

/// Receiving end of one-shot watches. Each registration fires at most once.
pub type NodeWatcher = mpsc::UnboundedSender<WatchedEvent>;

/// Node creation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRequest {
    pub path: String,
    pub mode: CreateMode,
    pub data: Vec<u8>,
    /// Create missing ancestors as persistent nodes.
    pub create_parents: bool,
}

impl CreateRequest {
    pub fn new(path: impl Into<String>, mode: CreateMode) -> Self {
        Self {
            path: path.into(),
            mode,
            data: Vec::new(),
            create_parents: true,
        }
    }

    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_create_parents(mut self, create_parents: bool) -> Self {
        self.create_parents = create_parents;
        self
    }
}

/// Underlying failure reported by the client, if any.
pub type Cause = Option<Arc<dyn std::error::Error + Send + Sync>>;

/// Common accessors of store operation results.
pub trait ZooKeeperResult {
    fn status(&self) -> ZooKeeperStatus;

    fn path(&self) -> &str;

    fn cause(&self) -> Cause;

    fn is_successful(&self) -> bool {
        self.status() == ZooKeeperStatus::Ok
    }

    /// Retryable errors are transient network or session conditions.
    fn is_retryable_error(&self) -> bool {
        self.status().is_retryable()
    }

    fn to_error(&self) -> ZooKeeperError {
        ZooKeeperError::new(self.status(), self.path()).with_cause(self.cause())
    }

    fn ensure_success(&self) -> Result<(), ZooKeeperError> {
        if self.is_successful() {
            Ok(())
        } else {
            Err(self.to_error())
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateResult {
    pub status: ZooKeeperStatus,
    /// The requested path.
    pub path: String,
    /// The path the store actually created (differs for sequential nodes).
    pub new_path: Option<String>,
    pub cause: Cause,
}

impl CreateResult {
    pub fn successful(path: impl Into<String>, new_path: impl Into<String>) -> Self {
        Self {
            status: ZooKeeperStatus::Ok,
            path: path.into(),
            new_path: Some(new_path.into()),
            cause: None,
        }
    }

    pub fn unsuccessful(status: ZooKeeperStatus, path: impl Into<String>, cause: Cause) -> Self {
        Self {
            status,
            path: path.into(),
            new_path: None,
            cause,
        }
    }
}

impl ZooKeeperResult for CreateResult {
    fn status(&self) -> ZooKeeperStatus {
        self.status
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn cause(&self) -> Cause {
        self.cause.clone()
    }
}

#[derive(Debug, Clone)]
pub struct DeleteResult {
    pub status: ZooKeeperStatus,
    pub path: String,
    pub cause: Cause,
}

impl DeleteResult {
    pub fn successful(path: impl Into<String>) -> Self {
        Self::unsuccessful(ZooKeeperStatus::Ok, path, None)
    }

    pub fn unsuccessful(status: ZooKeeperStatus, path: impl Into<String>, cause: Cause) -> Self {
        Self {
            status,
            path: path.into(),
            cause,
        }
    }
}

impl ZooKeeperResult for DeleteResult {
    fn status(&self) -> ZooKeeperStatus {
        self.status
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn cause(&self) -> Cause {
        self.cause.clone()
    }

    /// A node that is already gone counts as deleted.
    fn is_successful(&self) -> bool {
        matches!(
            self.status,
            ZooKeeperStatus::Ok | ZooKeeperStatus::NodeNotFound
        )
    }
}

#[derive(Debug, Clone)]
pub struct ExistsResult {
    pub status: ZooKeeperStatus,
    pub path: String,
    pub exists: bool,
    pub cause: Cause,
}

impl ExistsResult {
    pub fn found(path: impl Into<String>, exists: bool) -> Self {
        Self {
            status: ZooKeeperStatus::Ok,
            path: path.into(),
            exists,
            cause: None,
        }
    }

    pub fn unsuccessful(status: ZooKeeperStatus, path: impl Into<String>, cause: Cause) -> Self {
        Self {
            status,
            path: path.into(),
            exists: false,
            cause,
        }
    }
}

impl ZooKeeperResult for ExistsResult {
    fn status(&self) -> ZooKeeperStatus {
        self.status
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn cause(&self) -> Cause {
        self.cause.clone()
    }
}

#[derive(Debug, Clone)]
pub struct GetChildrenResult {
    pub status: ZooKeeperStatus,
    pub path: String,
    pub children: Vec<String>,
    pub cause: Cause,
}

impl GetChildrenResult {
    pub fn found(path: impl Into<String>, children: Vec<String>) -> Self {
        Self {
            status: ZooKeeperStatus::Ok,
            path: path.into(),
            children,
            cause: None,
        }
    }

    pub fn unsuccessful(status: ZooKeeperStatus, path: impl Into<String>, cause: Cause) -> Self {
        Self {
            status,
            path: path.into(),
            children: Vec::new(),
            cause,
        }
    }
}

impl ZooKeeperResult for GetChildrenResult {
    fn status(&self) -> ZooKeeperStatus {
        self.status
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn cause(&self) -> Cause {
        self.cause.clone()
    }
}

/// A client connected to a ZooKeeper-like coordination store.
///
/// Operations never fail with a Rust error: every outcome, including
/// connection trouble, is reported through the result's status.
pub trait ZooKeeperClient: Send + Sync + 'static {
    /// Creates a node. Sequential modes get a store-assigned suffix, reported
    /// in [`CreateResult::new_path`].
    fn create(&self, request: CreateRequest) -> impl Future<Output = CreateResult> + Send;

    /// Deletes a node regardless of its version.
    fn delete(&self, path: &str) -> impl Future<Output = DeleteResult> + Send;

    /// Checks whether a node exists. When `watcher` is given, a one-shot watch
    /// is registered before the check is answered, so no change that happens
    /// after the answer can be missed.
    fn exists(
        &self,
        path: &str,
        watcher: Option<NodeWatcher>,
    ) -> impl Future<Output = ExistsResult> + Send;

    /// Lists the names (not paths) of a node's children.
    fn get_children(&self, path: &str) -> impl Future<Output = GetChildrenResult> + Send;

    /// Subscribes to connection state. The receiver holds the current state
    /// and observes every later transition; [`ConnectionState::Died`] is
    /// published when the client is closed.
    fn connection_state(&self) -> watch::Receiver<ConnectionState>;
}
