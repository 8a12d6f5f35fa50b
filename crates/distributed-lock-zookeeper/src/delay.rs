//! Pauses between retries of transient store failures.

use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;

/// Nominal pause before retrying after a retryable store status.
pub const RETRY_DELAY: Duration = Duration::from_millis(100);

/// Total width of the jitter window, as a fraction of the delay.
const JITTER_WINDOW: f64 = 0.2;

/// Spreads `delay` by up to ±10% so that contenders woken by the same
/// reconnect do not hit the store in lockstep.
pub fn jittered(delay: Duration) -> Duration {
    let jitter = JITTER_WINDOW * (rand::thread_rng().r#gen::<f64>() - 0.5);
    delay.mul_f64(1.0 + jitter)
}

/// Sleeps for a jittered `delay`, returning early if `cancellation` fires.
pub async fn wait(delay: Duration, cancellation: &CancellationToken) {
    tokio::select! {
        _ = tokio::time::sleep(jittered(delay)) => {}
        _ = cancellation.cancelled() => {}
    }
}
