//! ZooKeeper distributed lock implementation.
//!
//! Every acquisition attempt creates a protected ephemeral-sequential node in
//! the lock folder and waits until it has the smallest index. Contenders are
//! served in creation order, and each one only watches its predecessor.

use std::sync::Arc;
use std::time::Duration;

use distributed_lock_core::error::{LockError, LockResult};
use distributed_lock_core::traits::DistributedLock;
use tokio::runtime::Handle as RuntimeHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, info, info_span, instrument, warn};
use uuid::Uuid;

use crate::client::{CreateMode, CreateRequest, ZooKeeperClient, ZooKeeperResult, ZooKeeperStatus};
use crate::election::wait_for_leadership;
use crate::error::ZooKeeperError;
use crate::handle::ZooKeeperLockHandle;
use crate::path;
use crate::protected::{create_protected, delete_protected};
use crate::settings::ZooKeeperLockSettings;

/// Base name of contender nodes, before protection and the sequential suffix.
const CONTENDER_NAME: &str = "lock";

/// A ZooKeeper-based distributed lock.
///
/// One instance can serve any number of concurrent acquisitions; all state of
/// an attempt lives in the attempt itself or in the returned handle.
///
/// While the store is unreachable, `acquire` and `try_acquire` keep retrying
/// below this layer, so they may return well after the nominal timeout.
/// The same holds for cancellation: an attempt that stops waiting still
/// deletes its contender node, and that deletion waits for the store to come
/// back rather than for the caller's token.
pub struct ZooKeeperDistributedLock<C: ZooKeeperClient> {
    client: Arc<C>,
    settings: ZooKeeperLockSettings,
}

impl<C: ZooKeeperClient> ZooKeeperDistributedLock<C> {
    pub fn new(client: Arc<C>, settings: ZooKeeperLockSettings) -> Self {
        Self { client, settings }
    }

    pub fn settings(&self) -> &ZooKeeperLockSettings {
        &self.settings
    }

    /// Makes one attempt: create a contender node, wait for leadership and
    /// either hand out a handle or remove the node.
    ///
    /// `Ok(None)` means the node was lost before it won or `cancellation`
    /// fired; the caller decides whether to try again. The contender node
    /// is removed on every exit that does not produce a handle, including
    /// when this future is dropped midway.
    async fn acquire_once(
        &self,
        cancellation: &CancellationToken,
    ) -> LockResult<Option<ZooKeeperLockHandle<C>>> {
        let correlation_id = Uuid::new_v4();
        let attempt = format!("Lock-{}", &correlation_id.simple().to_string()[..8]);
        let span = info_span!("lock_attempt", attempt = %attempt, lock.folder = %self.settings.path());

        self.acquire_once_in(correlation_id, cancellation, span.clone())
            .instrument(span)
            .await
    }

    async fn acquire_once_in(
        &self,
        correlation_id: Uuid,
        cancellation: &CancellationToken,
        span: Span,
    ) -> LockResult<Option<ZooKeeperLockHandle<C>>> {
        let contender = path::combine(self.settings.path(), CONTENDER_NAME);
        let protected = path::build_protected_path(&contender, correlation_id).ok_or_else(|| {
            LockError::InvalidName(format!("'{contender}' cannot hold protected nodes"))
        })?;
        let guard = ContenderGuard::arm(self.client.clone(), protected, span.clone());

        let data = self
            .settings
            .node_data()
            .map(|d| d.serialize())
            .unwrap_or_default();
        let request = CreateRequest::new(contender, CreateMode::EphemeralSequential).with_data(data);

        debug!("creating a contender node");

        let created = tokio::select! {
            created = create_protected(self.client.as_ref(), request, Some(correlation_id)) => created,
            _ = cancellation.cancelled() => return Ok(None),
        };
        created.ensure_success()?;
        let new_path = created.new_path.ok_or_else(|| {
            ZooKeeperError::new(ZooKeeperStatus::UnknownError, created.path.clone())
        })?;

        if wait_for_leadership(self.client.as_ref(), &new_path, cancellation).await? {
            guard.disarm();
            info!(path = %new_path, "lock acquired");
            return Ok(Some(ZooKeeperLockHandle::new(
                self.client.clone(),
                new_path,
                span,
            )));
        }

        info!(path = %new_path, "lock not acquired, removing the contender node");
        let deleted = delete_protected(self.client.as_ref(), &new_path).await;
        guard.disarm();
        deleted.ensure_success()?;

        Ok(None)
    }
}

impl<C: ZooKeeperClient> DistributedLock for ZooKeeperDistributedLock<C> {
    type Handle = ZooKeeperLockHandle<C>;

    fn name(&self) -> &str {
        self.settings.path()
    }

    /// Blocks until the lock is held or `cancellation` fires.
    ///
    /// After cancellation the contender node is removed before returning,
    /// which during an outage lasts until the store is reachable again.
    #[instrument(skip(self, cancellation), fields(lock.folder = %self.settings.path(), backend = "zookeeper"))]
    async fn acquire(&self, cancellation: &CancellationToken) -> LockResult<Self::Handle> {
        info!("acquiring the lock");

        while !cancellation.is_cancelled() {
            if let Some(handle) = self.acquire_once(cancellation).await? {
                return Ok(handle);
            }
        }

        info!("lock acquisition cancelled");
        Err(LockError::Cancelled)
    }

    /// Like [`acquire`](Self::acquire), giving up with `Ok(None)` once
    /// `timeout` elapses. Cleanup of the contender node is not bounded by
    /// `timeout`.
    #[instrument(skip(self, cancellation), fields(lock.folder = %self.settings.path(), timeout = ?timeout, backend = "zookeeper", acquired = tracing::field::Empty))]
    async fn try_acquire(
        &self,
        timeout: Duration,
        cancellation: &CancellationToken,
    ) -> LockResult<Option<Self::Handle>> {
        // The caller's token and the timeout both cancel the linked token.
        let linked = cancellation.child_token();
        let timer = tokio::spawn({
            let linked = linked.clone();
            async move {
                tokio::time::sleep(timeout).await;
                linked.cancel();
            }
        });

        let result = self.acquire(&linked).await;
        timer.abort();

        match result {
            Ok(handle) => {
                Span::current().record("acquired", true);
                Ok(Some(handle))
            }
            Err(LockError::Cancelled) if !cancellation.is_cancelled() => {
                Span::current().record("acquired", false);
                info!("lock not acquired within the timeout");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

impl<C: ZooKeeperClient> std::fmt::Debug for ZooKeeperDistributedLock<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZooKeeperDistributedLock")
            .field("settings", &self.settings)
            .finish()
    }
}

/// Removes the contender node of an attempt that ends without a handle.
///
/// Armed with the protected path before the create is issued, so the node is
/// found whether or not the create was acknowledged.
struct ContenderGuard<C: ZooKeeperClient> {
    client: Arc<C>,
    path: Option<String>,
    span: Span,
}

impl<C: ZooKeeperClient> ContenderGuard<C> {
    fn arm(client: Arc<C>, path: String, span: Span) -> Self {
        Self {
            client,
            path: Some(path),
            span,
        }
    }

    fn disarm(mut self) {
        self.path = None;
    }
}

impl<C: ZooKeeperClient> Drop for ContenderGuard<C> {
    fn drop(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };
        let Ok(runtime) = RuntimeHandle::try_current() else {
            warn!(parent: &self.span, path = %path, "no async runtime to remove the contender node");
            return;
        };

        let client = self.client.clone();
        runtime.spawn(
            async move {
                debug!(path = %path, "removing the contender node of an abandoned attempt");
                let deleted = delete_protected(client.as_ref(), &path).await;
                if !deleted.is_successful() {
                    warn!(path = %path, status = %deleted.status, "failed to remove the contender node");
                }
            }
            .instrument(self.span.clone()),
        );
    }
}
