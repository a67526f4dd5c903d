//! Admission gate bounding concurrent outbound fetches.
//!
//! Slots are granted in FIFO arrival order (tokio's semaphore is fair) and
//! released through RAII, so a slot is returned exactly once on every exit
//! path. The wait queue itself is unbounded; backpressure is the caller's
//! concern.

use assetgate_core::{Error, Result};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Concurrency limiter with a fixed slot capacity.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    slots: Arc<Semaphore>,
    capacity: usize,
}

/// A held capacity slot. Dropping it releases the slot.
#[derive(Debug)]
pub struct AdmissionSlot {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionGate {
    /// Create a gate with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Acquire a slot, suspending until one is free.
    pub async fn acquire(&self) -> Result<AdmissionSlot> {
        let permit = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| Error::configuration("admission gate closed"))?;
        Ok(AdmissionSlot { _permit: permit })
    }

    /// Configured slot capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free.
    #[must_use]
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }
}
