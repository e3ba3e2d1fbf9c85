//! Bounded work queue between the access path and the workers

use crossbeam_channel::{bounded, Receiver, SendError, Sender, TrySendError};

use crate::config::SaturationPolicy;
use crate::error::{Error, Result};
use crate::tile::Ticket;

/// Sending half of the generation queue.
///
/// Dropping the last `WorkQueue` closes the queue: workers finish whatever
/// is still buffered and then exit.
#[derive(Debug, Clone)]
pub struct WorkQueue {
    tx: Sender<Ticket>,
    policy: SaturationPolicy,
    capacity: usize,
}

impl WorkQueue {
    /// Create a queue holding at most `capacity` pending requests
    pub fn bounded(capacity: usize, policy: SaturationPolicy) -> (Self, Receiver<Ticket>) {
        let (tx, rx) = bounded(capacity);
        (
            Self {
                tx,
                policy,
                capacity,
            },
            rx,
        )
    }

    /// Hand a generation request to the workers.
    ///
    /// With `SaturationPolicy::Drop` a full queue yields `Error::QueueFull`
    /// immediately; with `SaturationPolicy::Block` the call waits for space.
    pub fn submit(&self, ticket: Ticket) -> Result<()> {
        match self.policy {
            SaturationPolicy::Drop => self.tx.try_send(ticket).map_err(|err| match err {
                TrySendError::Full(ticket) => Error::QueueFull(ticket.coord),
                TrySendError::Disconnected(_) => Error::QueueClosed,
            }),
            SaturationPolicy::Block => self
                .tx
                .send(ticket)
                .map_err(|SendError(_)| Error::QueueClosed),
        }
    }

    /// Number of requests waiting for a worker
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    /// Check if no requests are waiting
    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    /// Maximum number of pending requests
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Saturation policy in effect
    pub fn policy(&self) -> SaturationPolicy {
        self.policy
    }
}
