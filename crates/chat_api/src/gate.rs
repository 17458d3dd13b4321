use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::cancel::{await_or_cancel, CancelSignal};
use crate::error::ChatApiError;

/// Default number of completion calls allowed in flight at once.
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 10;

/// Counting admission control for outbound completion calls.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// Held slot of a [`ConcurrencyGate`]; dropping it frees the slot.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl Default for ConcurrencyGate {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT_REQUESTS)
    }
}

impl ConcurrencyGate {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Waits for a free slot. Cancellation abandons the wait without taking one.
    pub async fn acquire(
        &self,
        cancellation: Option<&CancelSignal>,
    ) -> Result<GatePermit, ChatApiError> {
        let permit = await_or_cancel(Arc::clone(&self.semaphore).acquire_owned(), cancellation)
            .await?
            .map_err(|_| ChatApiError::GateClosed)?;
        Ok(GatePermit { _permit: permit })
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    #[must_use]
    pub fn in_use(&self) -> usize {
        self.capacity - self.available()
    }
}
