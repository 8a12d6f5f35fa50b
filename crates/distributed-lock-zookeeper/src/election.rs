//! Leader election over sequential siblings.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::client::{ConnectionState, ZooKeeperClient, ZooKeeperResult, ZooKeeperStatus};
use crate::delay::{self, RETRY_DELAY};
use crate::error::ZooKeeperError;
use crate::path;
use crate::wait::wait_for_disappearance;

/// Waits until the sequential node at `path` has the smallest index among
/// its siblings.
///
/// Each round checks that the node still exists, lists its siblings and
/// waits for the nearest lower-indexed one (or the node itself) to go away.
/// Watching only the immediate predecessor keeps wakeups proportional to
/// the queue position instead of waking every contender on every release.
///
/// # Returns
///
/// * `Ok(true)` - The node is the leader
/// * `Ok(false)` - The node is gone, the store refused a query, or
///   `cancellation` fired; callers tell these apart themselves
/// * `Err(...)` - `path` is not a sequential node with a parent
#[instrument(skip(client, cancellation), fields(backend = "zookeeper"))]
pub async fn wait_for_leadership<C: ZooKeeperClient>(
    client: &C,
    path: &str,
    cancellation: &CancellationToken,
) -> Result<bool, ZooKeeperError> {
    let parent = path::parent(path)
        .ok_or_else(|| ZooKeeperError::new(ZooKeeperStatus::BadArguments, path))?;
    let index = path::sequential_index(path)
        .ok_or_else(|| ZooKeeperError::new(ZooKeeperStatus::BadArguments, path))?;

    info!(path, "waiting until the node becomes a leader");

    while !cancellation.is_cancelled() {
        let exists = client.exists(path, None).await;
        if exists.is_retryable_error() {
            delay::wait(RETRY_DELAY, cancellation).await;
            continue;
        }
        if !exists.is_successful() || !exists.exists {
            if !exists.is_successful() {
                warn!(path, status = %exists.status, "failed to check the node");
            }
            return Ok(false);
        }

        let children = client.get_children(parent).await;
        if children.is_retryable_error() {
            delay::wait(RETRY_DELAY, cancellation).await;
            continue;
        }
        if !children.is_successful() {
            warn!(path = parent, status = %children.status, "failed to list the contenders");
            return Ok(false);
        }

        let Some(predecessor) = predecessor(&children.children, index) else {
            return Ok(true);
        };
        let predecessor = path::combine(parent, predecessor);

        debug!(path, predecessor = %predecessor, "waiting for the predecessor");

        wait_for_disappearance(client, &[path.to_string(), predecessor], cancellation).await;

        // The wait ends at once off `Connected`, yet reads may still succeed
        // (read-only mode), so the next round has to be paced here.
        if *client.connection_state().borrow() != ConnectionState::Connected {
            debug!(path, "connection is not fully established, pausing before the next round");
            delay::wait(RETRY_DELAY, cancellation).await;
        }
    }

    Ok(false)
}

/// Picks the sibling with the largest sequential index below `index`.
fn predecessor(children: &[String], index: u64) -> Option<&str> {
    children
        .iter()
        .filter_map(|name| path::sequential_index(name).map(|i| (name.as_str(), i)))
        .filter(|&(_, i)| i < index)
        .max_by_key(|&(_, i)| i)
        .map(|(name, _)| name)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::watch;

    use super::*;
    use crate::client::{
        CreateMode, CreateRequest, CreateResult, DeleteResult, ExistsResult, GetChildrenResult,
        NodeWatcher,
    };
    use crate::memory::{InMemoryEnsemble, InMemoryZooKeeper, Operation};

    /// Serves reads from the in-memory store while reporting a read-only
    /// connection.
    struct ReadonlyClient {
        inner: InMemoryZooKeeper,
        state: watch::Sender<ConnectionState>,
    }

    impl ReadonlyClient {
        fn new(inner: InMemoryZooKeeper) -> Self {
            Self {
                inner,
                state: watch::channel(ConnectionState::ConnectedReadonly).0,
            }
        }
    }

    impl ZooKeeperClient for ReadonlyClient {
        async fn create(&self, request: CreateRequest) -> CreateResult {
            self.inner.create(request).await
        }

        async fn delete(&self, path: &str) -> DeleteResult {
            self.inner.delete(path).await
        }

        async fn exists(&self, path: &str, watcher: Option<NodeWatcher>) -> ExistsResult {
            self.inner.exists(path, watcher).await
        }

        async fn get_children(&self, path: &str) -> GetChildrenResult {
            self.inner.get_children(path).await
        }

        fn connection_state(&self) -> watch::Receiver<ConnectionState> {
            self.state.subscribe()
        }
    }

    #[tokio::test]
    async fn test_readonly_connection_does_not_spin() {
        let ensemble = InMemoryEnsemble::new();
        let holder = ensemble.connect();
        holder
            .create(CreateRequest::new("/p/l/a", CreateMode::EphemeralSequential))
            .await
            .ensure_success()
            .unwrap();

        let client = Arc::new(ReadonlyClient::new(ensemble.connect()));
        let contender = client
            .create(CreateRequest::new("/p/l/b", CreateMode::EphemeralSequential))
            .await
            .new_path
            .unwrap();

        let cancellation = CancellationToken::new();
        let timer = tokio::spawn({
            let cancellation = cancellation.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(300)).await;
                cancellation.cancel();
            }
        });

        let leader = wait_for_leadership(client.as_ref(), &contender, &cancellation)
            .await
            .unwrap();
        timer.await.unwrap();

        assert!(!leader);
        // About one round per retry pause; a tight loop makes thousands.
        let calls = ensemble.operation_count(Operation::Exists);
        assert!(calls <= 10, "{calls} existence checks in 300ms");
        drop(holder);
    }

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_predecessor_is_nearest_lower_index() {
        let children = names(&["a0000000001", "b0000000005", "c0000000003", "d0000000009"]);
        assert_eq!(predecessor(&children, 9), Some("b0000000005"));
        assert_eq!(predecessor(&children, 5), Some("c0000000003"));
        assert_eq!(predecessor(&children, 1), None);
    }

    #[test]
    fn test_predecessor_ignores_non_sequential_names() {
        let children = names(&["lock", "other-node", "x0000000002"]);
        assert_eq!(predecessor(&children, 2), None);
        assert_eq!(predecessor(&children, 3), Some("x0000000002"));
    }
}
