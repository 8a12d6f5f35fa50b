//! Protected node creation and deletion.
//!
//! A protected node embeds a client-chosen correlation id in its name. When
//! a create fails with a network error, the client cannot know whether the
//! node was created before the connection dropped. Instead of retrying the
//! create blindly (which would duplicate sequential nodes), it searches the
//! parent for a child carrying its correlation id, deletes it, and tries
//! again.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::client::{
    CreateRequest, CreateResult, DeleteResult, ZooKeeperClient, ZooKeeperResult, ZooKeeperStatus,
};
use crate::delay::{self, RETRY_DELAY};
use crate::path;

/// Creates the node described by `request` under a protected name.
///
/// The leaf of `request.path` is rewritten to `_c_<correlation id>-<leaf>`;
/// a fresh id is generated unless `correlation_id` is given. Retryable
/// failures are absorbed: the possibly-created node is deleted through
/// [`delete_protected`] and the create is issued again. The returned result
/// is the first non-retryable create outcome, or the failure of a cleanup
/// delete.
#[instrument(skip_all, fields(request.path = %request.path, mode = ?request.mode, backend = "zookeeper"))]
pub async fn create_protected<C: ZooKeeperClient>(
    client: &C,
    request: CreateRequest,
    correlation_id: Option<Uuid>,
) -> CreateResult {
    let correlation_id = correlation_id.unwrap_or_else(Uuid::new_v4);
    let Some(protected_path) = path::build_protected_path(&request.path, correlation_id) else {
        return CreateResult::unsuccessful(
            ZooKeeperStatus::BadArguments,
            request.path.clone(),
            Some(invalid_path(&request.path)),
        );
    };
    let request = request.with_path(protected_path);

    debug!(path = %request.path, "creating a protected node");

    loop {
        let result = client.create(request.clone()).await;
        if !result.is_retryable_error() {
            return result;
        }

        warn!(path = %request.path, status = %result.status, "protected node creation failed, cleaning up before retrying");

        let delete = delete_protected(client, &request.path).await;
        if !delete.is_successful() {
            return CreateResult::unsuccessful(delete.status, delete.path, delete.cause);
        }
    }
}

/// Deletes every child of `path`'s parent whose name starts with `path`'s leaf.
///
/// Passing the protected path of a sequential node before the store suffix
/// (`/folder/_c_<id>-lock`) removes whatever the attempt created. Returns a
/// [`ZooKeeperStatus::NodeNotFound`] result when nothing matches, which
/// [`DeleteResult::is_successful`] accepts.
#[instrument(skip(client), fields(backend = "zookeeper"))]
pub async fn delete_protected<C: ZooKeeperClient>(client: &C, path: &str) -> DeleteResult {
    let (Some(parent), Some(name)) = (path::parent(path), path::leaf_name(path)) else {
        return DeleteResult::unsuccessful(
            ZooKeeperStatus::BadArguments,
            path,
            Some(invalid_path(path)),
        );
    };

    debug!(path, "deleting a protected node");

    // Deletion must complete even when the surrounding attempt is cancelled.
    let never = CancellationToken::new();

    loop {
        let children = client.get_children(parent).await;
        if children.is_retryable_error() {
            delay::wait(RETRY_DELAY, &never).await;
            continue;
        }
        if children.status == ZooKeeperStatus::NodeNotFound {
            return DeleteResult::unsuccessful(ZooKeeperStatus::NodeNotFound, path, None);
        }
        if !children.is_successful() {
            return DeleteResult::unsuccessful(children.status, children.path, children.cause);
        }

        let found: Vec<&String> = children
            .children
            .iter()
            .filter(|child| child.starts_with(name))
            .collect();
        if found.is_empty() {
            return DeleteResult::unsuccessful(ZooKeeperStatus::NodeNotFound, path, None);
        }
        if found.len() > 1 {
            warn!(path, count = found.len(), "found several nodes for one protected path");
        }

        let mut outcome = None;
        let mut retry = false;
        for child in found {
            let result = client.delete(&path::combine(parent, child)).await;
            if result.is_retryable_error() {
                retry = true;
                continue;
            }
            if !result.is_successful() {
                return result;
            }
            outcome.get_or_insert(result);
        }

        if let (false, Some(result)) = (retry, outcome) {
            return result;
        }

        delay::wait(RETRY_DELAY, &never).await;
    }
}

fn invalid_path(path: &str) -> Arc<dyn std::error::Error + Send + Sync> {
    Arc::new(std::io::Error::other(format!(
        "node with path '{path}' has no parent or no name"
    )))
}
