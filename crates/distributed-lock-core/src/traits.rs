//! Core traits for distributed locks.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::LockResult;

// ============================================================================
// Lock Handle Trait
// ============================================================================

/// Handle to a held distributed lock.
///
/// Call `release()` when the critical section is over. Backends may also
/// release on drop, but only the explicit call reports release errors.
///
/// # Example
///
/// ```rust,ignore
/// let handle = lock.acquire(&CancellationToken::new()).await?;
/// // Critical section - we hold the lock
/// do_work().await;
/// // Explicit release with error handling
/// handle.release().await?;
/// ```
pub trait LockHandle: Send + Sync + Sized {
    /// Returns a receiver that signals when the lock is lost.
    ///
    /// The receiver yields `true` once the lock is no longer held, either
    /// because it was released or because the backend observed its loss
    /// (e.g., the session holding it died).
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let mut lost = handle.lost_token().clone();
    /// tokio::select! {
    ///     _ = lost.wait_for(|lost| *lost) => {
    ///         eprintln!("Lock was lost!");
    ///     }
    ///     _ = do_work() => {
    ///         // Work completed while still holding lock
    ///     }
    /// }
    /// ```
    fn lost_token(&self) -> &tokio::sync::watch::Receiver<bool>;

    /// Returns whether the lock is still believed to be held.
    ///
    /// This is a hint: the value may turn `false` at any moment, and a
    /// `false` may be a false negative caused by connection loss.
    fn is_acquired(&self) -> bool {
        !*self.lost_token().borrow()
    }

    /// Explicitly releases the lock.
    fn release(self) -> impl Future<Output = LockResult<()>> + Send;
}

// ============================================================================
// Distributed Lock Trait
// ============================================================================

/// A distributed mutual exclusion lock.
///
/// Provides exclusive access to a resource identified by `name` across
/// processes and machines. The specific backend determines how the lock is
/// implemented.
///
/// # Example
///
/// ```rust,ignore
/// use distributed_lock_core::DistributedLock;
///
/// async fn protected_operation(lock: &impl DistributedLock) -> Result<(), Error> {
///     let cancellation = CancellationToken::new();
///     match lock.try_acquire(Duration::from_secs(5), &cancellation).await? {
///         Some(handle) => {
///             perform_critical_section().await?;
///             handle.release().await?;
///         }
///         None => println!("lock is busy"),
///     }
///     Ok(())
/// }
/// ```
pub trait DistributedLock: Send + Sync {
    /// The handle type returned when the lock is acquired.
    type Handle: LockHandle + Send;

    /// Returns the unique name identifying this lock.
    fn name(&self) -> &str;

    /// Acquires the lock, waiting as long as it takes.
    ///
    /// # Returns
    ///
    /// * `Ok(handle)` - Lock acquired successfully
    /// * `Err(LockError::Cancelled)` - `cancellation` fired before the lock was acquired
    /// * `Err(LockError::Connection)` / `Err(LockError::Backend)` - Unretryable backend failure
    fn acquire(
        &self,
        cancellation: &CancellationToken,
    ) -> impl Future<Output = LockResult<Self::Handle>> + Send;

    /// Attempts to acquire the lock within `timeout`.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(handle))` - Lock acquired successfully
    /// * `Ok(None)` - `timeout` elapsed first
    /// * `Err(LockError::Cancelled)` - `cancellation` fired
    /// * `Err(...)` - Unretryable backend failure
    fn try_acquire(
        &self,
        timeout: Duration,
        cancellation: &CancellationToken,
    ) -> impl Future<Output = LockResult<Option<Self::Handle>>> + Send;
}

// ============================================================================
// Provider Traits
// ============================================================================

/// Factory for creating distributed locks by name.
///
/// Providers encapsulate backend configuration, allowing application code
/// to be backend-agnostic.
///
/// # Example
///
/// ```rust,ignore
/// // Configure once at startup
/// let provider = ZooKeeperLockProvider::builder().client(client).build()?;
///
/// // Create locks by name anywhere in the application
/// let lock = provider.create_lock("my-resource")?;
/// let handle = lock.acquire(&CancellationToken::new()).await?;
/// ```
pub trait LockProvider: Send + Sync {
    /// The lock type created by this provider.
    type Lock: DistributedLock;

    /// Creates a lock with the given name.
    fn create_lock(&self, name: &str) -> LockResult<Self::Lock>;
}

// ============================================================================
// Convenience Extensions
// ============================================================================

/// Extension trait providing convenience methods for lock providers.
pub trait LockProviderExt: LockProvider {
    /// Acquires a lock by name, returning the handle.
    ///
    /// Convenience method combining `create_lock` and `acquire`.
    fn acquire_lock(
        &self,
        name: &str,
        cancellation: &CancellationToken,
    ) -> impl Future<Output = LockResult<<Self::Lock as DistributedLock>::Handle>> + Send
    where
        Self: Sync,
    {
        async move {
            let lock = self.create_lock(name)?;
            lock.acquire(cancellation).await
        }
    }

    /// Tries to acquire a lock by name within `timeout`.
    ///
    /// Convenience method combining `create_lock` and `try_acquire`.
    fn try_acquire_lock(
        &self,
        name: &str,
        timeout: Duration,
        cancellation: &CancellationToken,
    ) -> impl Future<Output = LockResult<Option<<Self::Lock as DistributedLock>::Handle>>> + Send
    where
        Self: Sync,
    {
        async move {
            let lock = self.create_lock(name)?;
            lock.try_acquire(timeout, cancellation).await
        }
    }
}

// Blanket implementation for all LockProviders
impl<T: LockProvider> LockProviderExt for T {}
