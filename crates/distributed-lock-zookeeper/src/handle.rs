//! ZooKeeper lock handle implementation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use distributed_lock_core::error::LockResult;
use distributed_lock_core::traits::LockHandle;
use tokio::runtime::Handle as RuntimeHandle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, info, instrument, warn};

use crate::client::{ZooKeeperClient, ZooKeeperResult};
use crate::error::ZooKeeperError;
use crate::protected::delete_protected;
use crate::wait::wait_for_disappearance;

type ReleaseOutcome = Option<Result<(), ZooKeeperError>>;

/// State shared between the handle, its background watch and the release task.
struct TokenState<C: ZooKeeperClient> {
    client: Arc<C>,
    /// Path of the contender node that won leadership.
    path: String,
    disposed: AtomicBool,
    cancellation: CancellationToken,
    lost_sender: watch::Sender<bool>,
    /// Result of the single deletion, published once it finishes.
    outcome: watch::Sender<ReleaseOutcome>,
    /// Logging context of the acquisition attempt.
    span: Span,
}

impl<C: ZooKeeperClient> TokenState<C> {
    /// Starts the release. Only the first caller gets `true` and issues the
    /// deletion; everyone else joins the published outcome.
    fn begin_release(self: &Arc<Self>) -> bool {
        if self
            .disposed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        self.cancellation.cancel();
        self.lost_sender.send_replace(true);

        let Ok(runtime) = RuntimeHandle::try_current() else {
            warn!(parent: &self.span, path = %self.path, "no async runtime to delete the lock node, it stays until the session ends");
            return true;
        };

        let state = Arc::clone(self);
        runtime.spawn(
            async move {
                info!(path = %state.path, "releasing the lock");

                let result = delete_protected(state.client.as_ref(), &state.path)
                    .await
                    .ensure_success();
                match &result {
                    Ok(()) => info!(path = %state.path, "lock released"),
                    Err(e) => warn!(path = %state.path, error = %e, "failed to delete the lock node"),
                }

                state.outcome.send_replace(Some(result));
            }
            .instrument(self.span.clone()),
        );

        true
    }
}

/// Handle for a held ZooKeeper lock.
///
/// A background task watches the lock node. If the node disappears (its
/// session died, someone deleted it) or the connection is lost, the handle
/// releases itself: [`lost_token`](LockHandle::lost_token) flips to `true`
/// and [`cancellation_token`](Self::cancellation_token) fires.
///
/// Releasing issues exactly one deletion no matter how many times or from
/// how many tasks it is requested; every caller of [`dispose`](Self::dispose)
/// observes the same outcome. Dropping an unreleased handle starts the
/// release in the background.
pub struct ZooKeeperLockHandle<C: ZooKeeperClient> {
    state: Arc<TokenState<C>>,
    lost_receiver: watch::Receiver<bool>,
    watch_task: JoinHandle<()>,
}

impl<C: ZooKeeperClient> ZooKeeperLockHandle<C> {
    pub(crate) fn new(client: Arc<C>, path: String, span: Span) -> Self {
        let (lost_sender, lost_receiver) = watch::channel(false);
        let (outcome, _) = watch::channel(None);

        let state = Arc::new(TokenState {
            client,
            path,
            disposed: AtomicBool::new(false),
            cancellation: CancellationToken::new(),
            lost_sender,
            outcome,
            span,
        });

        let watched = Arc::clone(&state);
        let watch_task = tokio::spawn(
            async move {
                wait_for_disappearance(
                    watched.client.as_ref(),
                    std::slice::from_ref(&watched.path),
                    &watched.cancellation,
                )
                .await;

                if !watched.disposed.load(Ordering::Acquire) {
                    info!(path = %watched.path, "lock node disappeared or connection lost, the lock is lost");
                    watched.begin_release();
                }
            }
            .instrument(state.span.clone()),
        );

        Self {
            state,
            lost_receiver,
            watch_task,
        }
    }

    /// Path of the node that holds the lock.
    pub fn path(&self) -> &str {
        &self.state.path
    }

    /// Fires as soon as the lock is released or lost.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.state.cancellation
    }

    /// Releases the lock and waits for the node deletion.
    ///
    /// Safe to call concurrently and repeatedly. Only the first call issues
    /// the deletion; a failed deletion is reported to every caller but
    /// does not bring the lock back.
    #[instrument(skip(self), fields(lock.path = %self.state.path, backend = "zookeeper"))]
    pub async fn dispose(&self) -> LockResult<()> {
        let mut outcome = self.state.outcome.subscribe();
        self.state.begin_release();

        let result = match outcome.wait_for(Option::is_some).await {
            Ok(published) => published.clone(),
            Err(_) => None,
        };

        match result {
            Some(Err(e)) => Err(e.into()),
            _ => Ok(()),
        }
    }
}

impl<C: ZooKeeperClient> LockHandle for ZooKeeperLockHandle<C> {
    fn lost_token(&self) -> &watch::Receiver<bool> {
        &self.lost_receiver
    }

    fn is_acquired(&self) -> bool {
        !self.state.disposed.load(Ordering::Acquire)
    }

    async fn release(self) -> LockResult<()> {
        self.dispose().await
    }
}

impl<C: ZooKeeperClient> Drop for ZooKeeperLockHandle<C> {
    fn drop(&mut self) {
        if self.state.begin_release() {
            info!(parent: &self.state.span, path = %self.state.path, "lock handle dropped without release, releasing in the background");
        }
        self.watch_task.abort();
    }
}

impl<C: ZooKeeperClient> std::fmt::Debug for ZooKeeperLockHandle<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZooKeeperLockHandle")
            .field("path", &self.state.path)
            .field("acquired", &self.is_acquired())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::client::{CreateMode, CreateRequest};
    use crate::memory::{InMemoryEnsemble, InMemoryZooKeeper, Operation};

    async fn held_node(ensemble: &InMemoryEnsemble) -> (Arc<InMemoryZooKeeper>, String) {
        let client = Arc::new(ensemble.connect());
        let created = client
            .create(CreateRequest::new("/locks/_c_00000000-0000-0000-0000-000000000000-lock", CreateMode::EphemeralSequential))
            .await;
        (client, created.new_path.unwrap())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_dispose_deletes_node_once() {
        let ensemble = InMemoryEnsemble::new();
        let (client, path) = held_node(&ensemble).await;
        let handle = Arc::new(ZooKeeperLockHandle::new(client, path.clone(), Span::none()));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let handle = handle.clone();
                tokio::spawn(async move { handle.dispose().await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert!(!handle.is_acquired());
        assert!(handle.cancellation_token().is_cancelled());
        assert!(*handle.lost_token().borrow());
        assert!(!ensemble.exists(&path));
        assert_eq!(ensemble.operation_count(Operation::Delete), 1);
    }

    #[tokio::test]
    async fn test_node_deletion_releases_handle() {
        let ensemble = InMemoryEnsemble::new();
        let (client, path) = held_node(&ensemble).await;
        let handle = ZooKeeperLockHandle::new(client, path.clone(), Span::none());
        assert!(handle.is_acquired());

        ensemble.delete_recursive(&path);

        tokio::time::timeout(Duration::from_secs(5), handle.cancellation_token().cancelled())
            .await
            .unwrap();
        assert!(!handle.is_acquired());
        handle.release().await.unwrap();
    }

    #[tokio::test]
    async fn test_dispose_reports_failure_to_every_caller() {
        let ensemble = InMemoryEnsemble::new();
        let (client, path) = held_node(&ensemble).await;
        let handle = ZooKeeperLockHandle::new(client.clone(), path, Span::none());

        client.close();
        // Closing the client also ends the background watch.
        tokio::time::timeout(Duration::from_secs(5), handle.cancellation_token().cancelled())
            .await
            .unwrap();

        assert!(handle.dispose().await.is_err());
        assert!(handle.dispose().await.is_err());
        assert!(!handle.is_acquired());
    }

    #[tokio::test]
    async fn test_drop_releases_in_background() {
        let ensemble = InMemoryEnsemble::new();
        let (client, path) = held_node(&ensemble).await;
        let handle = ZooKeeperLockHandle::new(client, path.clone(), Span::none());

        drop(handle);

        tokio::time::timeout(Duration::from_secs(5), async {
            while ensemble.exists(&path) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }
}
