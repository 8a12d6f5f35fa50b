//! Mock provider for testing provider abstraction.

use distributed_lock_core::error::{LockError, LockResult};
use distributed_lock_core::traits::{DistributedLock, LockHandle, LockProvider};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Mock lock handle for testing.
#[derive(Debug)]
pub struct MockLockHandle {
    held: Arc<AtomicBool>,
    lost_receiver: watch::Receiver<bool>,
}

impl LockHandle for MockLockHandle {
    fn lost_token(&self) -> &watch::Receiver<bool> {
        &self.lost_receiver
    }

    async fn release(self) -> LockResult<()> {
        self.held.store(false, Ordering::Release);
        Ok(())
    }
}

/// Mock distributed lock for testing.
pub struct MockDistributedLock {
    name: String,
    held: Arc<AtomicBool>,
}

impl MockDistributedLock {
    fn try_take(&self) -> Option<MockLockHandle> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        let (_, receiver) = watch::channel(false);
        Some(MockLockHandle {
            held: self.held.clone(),
            lost_receiver: receiver,
        })
    }
}

impl DistributedLock for MockDistributedLock {
    type Handle = MockLockHandle;

    fn name(&self) -> &str {
        &self.name
    }

    async fn acquire(&self, cancellation: &CancellationToken) -> LockResult<Self::Handle> {
        loop {
            if cancellation.is_cancelled() {
                return Err(LockError::Cancelled);
            }
            if let Some(handle) = self.try_take() {
                return Ok(handle);
            }
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(10)) => {}
                _ = cancellation.cancelled() => {}
            }
        }
    }

    async fn try_acquire(
        &self,
        timeout: Duration,
        cancellation: &CancellationToken,
    ) -> LockResult<Option<Self::Handle>> {
        match tokio::time::timeout(timeout, self.acquire(cancellation)).await {
            Ok(result) => result.map(Some),
            Err(_) => Ok(None),
        }
    }
}

/// Mock provider for testing provider abstraction.
pub struct MockLockProvider {
    locks: Mutex<HashMap<String, Arc<AtomicBool>>>,
}

impl MockLockProvider {
    /// Creates a new mock provider.
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MockLockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LockProvider for MockLockProvider {
    type Lock = MockDistributedLock;

    fn create_lock(&self, name: &str) -> LockResult<Self::Lock> {
        if name.is_empty() {
            return Err(LockError::InvalidName("lock name cannot be empty".to_string()));
        }

        let mut locks = self.locks.lock().unwrap();
        let held = locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(AtomicBool::new(false)))
            .clone();

        Ok(MockDistributedLock {
            name: name.to_string(),
            held,
        })
    }
}
