use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::pool::error::PoolError;

/// Hard cap on concurrent requests, and hence HTTP/1 connections, one slot
/// may hold to its host.
///
/// Waiting for a permit is bounded. Closing the limiter wakes every waiter
/// with [`PoolError::Closed`] and rejects later acquisitions.
#[derive(Debug, Clone)]
pub struct ConnectionLimiter {
    permits: Arc<Semaphore>,
    max: usize,
    wait_timeout: Duration,
}

impl ConnectionLimiter {
    pub fn new(max: usize, wait_timeout: Duration) -> Self {
        let max = max.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max)),
            max,
            wait_timeout,
        }
    }

    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, PoolError> {
        match tokio::time::timeout(self.wait_timeout, self.permits.clone().acquire_owned()).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(PoolError::Closed),
            Err(_) => Err(PoolError::ConnectionWaitTimeout),
        }
    }

    pub fn close(&self) {
        self.permits.close();
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn in_use(&self) -> usize {
        self.max - self.permits.available_permits()
    }
}
