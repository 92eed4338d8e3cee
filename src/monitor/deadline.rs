// src/monitor/deadline.rs

//! Shared cancellation context bound to a wall-clock deadline.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Why the context was cancelled. The first cause recorded wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelCause {
    /// The wall-clock deadline passed.
    DeadlineExpired,
    /// A terminal execution event was observed.
    TerminalEvent,
    /// The poller stopped on a fetch error.
    PollerStopped,
    /// The monitor run finished and is releasing its workers.
    Finished,
}

/// Cloneable handle onto one cancellation context.
#[derive(Debug, Clone)]
pub struct Deadline {
    token: CancellationToken,
    cause: Arc<OnceLock<CancelCause>>,
    expires_at: Instant,
    timeout: Duration,
}

impl Deadline {
    /// Create a context that cancels itself after `timeout`.
    ///
    /// Spawns a timer task that ends as soon as the context is cancelled,
    /// whichever way that happens.
    pub fn start(timeout: Duration) -> Self {
        let deadline = Self {
            token: CancellationToken::new(),
            cause: Arc::new(OnceLock::new()),
            expires_at: Instant::now() + timeout,
            timeout,
        };

        let timer = deadline.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep_until(timer.expires_at) => {
                    debug!(timeout = ?timer.timeout, "execution deadline reached");
                    timer.cancel(CancelCause::DeadlineExpired);
                }
                _ = timer.token.cancelled() => {}
            }
        });

        deadline
    }

    pub fn cancel(&self, cause: CancelCause) {
        if self.cause.set(cause).is_ok() {
            debug!(?cause, "cancelling monitor context");
        }
        self.token.cancel();
    }

    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn cause(&self) -> Option<CancelCause> {
        self.cause.get().copied()
    }

    /// True once the wall-clock deadline itself has cancelled the context.
    pub fn expired(&self) -> bool {
        self.cause() == Some(CancelCause::DeadlineExpired)
    }

    /// Wall-clock expiry. Unaffected by early cancellation.
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
