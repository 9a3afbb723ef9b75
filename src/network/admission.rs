//! Inbound admission control
//!
//! A counting semaphore of connection slots plus a separate shutdown signal.
//! The listener never waits for a slot: no free slot means the connection is
//! turned away on the spot.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio_util::sync::CancellationToken;

/// One occupied inbound slot. Dropping it frees the slot.
pub type SlotPermit = OwnedSemaphorePermit;

/// Outcome of asking for a slot
#[derive(Debug)]
pub enum Admit {
    Slot(SlotPermit),
    Full,
    Closed,
}

/// Shared admission state between the listener and its owner
#[derive(Clone, Debug)]
pub struct Admission {
    slots: Arc<Semaphore>,
    shutdown: CancellationToken,
}

impl Admission {
    pub fn new(max_inbound: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(max_inbound)),
            shutdown: CancellationToken::new(),
        }
    }

    /// Take a slot without waiting
    pub fn try_admit(&self) -> Admit {
        match self.slots.clone().try_acquire_owned() {
            Ok(permit) => Admit::Slot(permit),
            Err(TryAcquireError::NoPermits) => Admit::Full,
            Err(TryAcquireError::Closed) => Admit::Closed,
        }
    }

    /// Number of free slots
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    /// Stop admitting; the listener exits after the connection it is handling.
    pub fn close(&self) {
        self.slots.close();
    }

    /// Stop the listener loop at its next poll.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_are_returned_on_drop() {
        let admission = Admission::new(1);
        let permit = match admission.try_admit() {
            Admit::Slot(permit) => permit,
            other => panic!("expected slot, got {:?}", other),
        };
        assert!(matches!(admission.try_admit(), Admit::Full));

        drop(permit);
        assert_eq!(admission.available(), 1);
        assert!(matches!(admission.try_admit(), Admit::Slot(_)));
    }

    #[test]
    fn test_close_and_shutdown_are_separate() {
        let admission = Admission::new(2);
        admission.shutdown();
        assert!(admission.shutdown_token().is_cancelled());
        assert!(matches!(admission.try_admit(), Admit::Slot(_)));

        admission.close();
        assert!(matches!(admission.try_admit(), Admit::Closed));
    }
}
