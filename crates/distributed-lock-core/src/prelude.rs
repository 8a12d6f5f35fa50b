//! Convenience prelude for distributed lock types.

pub use crate::error::{LockError, LockResult};
pub use crate::traits::{DistributedLock, LockHandle, LockProvider, LockProviderExt};
pub use tokio_util::sync::CancellationToken;
