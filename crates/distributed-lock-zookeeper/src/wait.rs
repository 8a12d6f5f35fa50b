//! Waiting for nodes to disappear.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::client::{ConnectionState, NodeEvent, ZooKeeperClient, ZooKeeperResult};

/// Waits until any of `paths` disappears, the connection leaves the
/// `Connected` state, or `cancellation` fires.
///
/// The connection subscription and the node watches are registered before
/// the initial existence checks, so a deletion racing with registration
/// still wakes the waiter. A path that is already missing (or cannot be
/// checked) ends the wait immediately.
///
/// Nothing is returned about why the wait ended, and wakeups may be
/// spurious (a brief disconnect is enough). Callers re-validate the state
/// they care about afterwards.
#[instrument(skip(client, cancellation), fields(backend = "zookeeper"))]
pub async fn wait_for_disappearance<C: ZooKeeperClient>(
    client: &C,
    paths: &[String],
    cancellation: &CancellationToken,
) {
    if cancellation.is_cancelled() {
        return;
    }

    let mut connection = client.connection_state();
    if *connection.borrow_and_update() != ConnectionState::Connected {
        return;
    }

    let (watcher, mut events) = mpsc::unbounded_channel();
    for path in paths {
        let exists = client.exists(path, Some(watcher.clone())).await;
        if !exists.is_successful() || !exists.exists {
            return;
        }
    }
    // Only the store's registrations keep the channel open from here on.
    drop(watcher);

    debug!(?paths, "waiting until one of the nodes disappears");

    loop {
        tokio::select! {
            _ = cancellation.cancelled() => return,
            changed = connection.changed() => {
                if changed.is_err() || *connection.borrow_and_update() != ConnectionState::Connected {
                    return;
                }
            }
            event = events.recv() => match event {
                Some(event) if event.event != NodeEvent::Deleted => {}
                _ => return,
            },
        }
    }
}
