use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::pool::error::PoolError;

/// Per-request cancellation scope: an optional deadline plus a token the
/// caller can fire at any time.
///
/// Only backends whose [`Capabilities::supports_cancellation`] is set honor
/// it; the others run to their client-level request timeout.
///
/// [`Capabilities::supports_cancellation`]: crate::pool::Capabilities
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    deadline: Option<Instant>,
    token: CancellationToken,
}

impl RequestContext {
    /// Never expires and is never cancelled unless [`cancel`](Self::cancel)
    /// is called.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            token: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            deadline: None,
            token,
        }
    }

    /// Derived context: cancelled with its parent, and bounded by the
    /// earlier of the parent deadline and `timeout`.
    pub fn child(&self, timeout: Option<Duration>) -> Self {
        let own = timeout.map(|t| Instant::now() + t);
        let deadline = match (self.deadline, own) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        Self {
            deadline,
            token: self.token.child_token(),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Error this context already carries, if any. Cancellation wins over an
    /// expired deadline.
    pub fn err(&self) -> Option<PoolError> {
        if self.token.is_cancelled() {
            return Some(PoolError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(PoolError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Drives `fut` until it finishes, the token fires, or the deadline
    /// passes, whichever comes first. Dropping `fut` aborts the request.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, PoolError>
    where
        F: std::future::Future<Output = Result<T, PoolError>>,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }

        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(PoolError::Cancelled),
            _ = expired => Err(PoolError::DeadlineExceeded),
            res = fut => res,
        }
    }
}
