use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::core::{RegistryError, Result};

use super::ManualResetEvent;

/// Waits asynchronously for `event` to become signaled.
///
/// Resolves `Ok(true)` when signaled, `Ok(false)` when `timeout` elapses
/// first, and `Err(RegistryError::Cancelled)` when `cancel` fires first.
/// `None` for `timeout` waits indefinitely.
///
/// An already signaled event resolves without registering anything, and so
/// does a zero timeout. Otherwise a single [`RegisteredWait`](super::RegisteredWait)
/// is taken out on the event and released exactly once, whichever outcome
/// wins or if the returned future is dropped mid-wait.
///
/// # Errors
/// Returns `RegistryError::Cancelled` if the token is cancelled before the
/// event is signaled or the timeout elapses.
pub async fn wait_for_signal(
    event: &ManualResetEvent,
    timeout: Option<Duration>,
    cancel: Option<&CancellationToken>,
) -> Result<bool> {
    if event.is_set() {
        return Ok(true);
    }

    if timeout == Some(Duration::ZERO) {
        return Ok(false);
    }

    let Some(token) = cancel else {
        let mut registration = event.register_wait();
        let fired = registration.fired(timeout).await;
        registration.unregister();
        return Ok(fired);
    };

    if token.is_cancelled() {
        return Err(RegistryError::Cancelled);
    }

    let mut registration = event.register_wait();

    let outcome = tokio::select! {
        biased;
        () = token.cancelled() => {
            trace!("Signal wait cancelled");
            Err(RegistryError::Cancelled)
        }
        fired = registration.fired(timeout) => Ok(fired),
    };

    registration.unregister();
    outcome
}
