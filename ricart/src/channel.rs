//! # Summary
//!
//! Transport abstraction between coordinators. Implementations must keep
//! per-link FIFO order: two envelopes sent by the same process to the same
//! destination arrive in the order they were sent. Nothing is promised across
//! links, and duplicates are tolerated by the receiving side.
//!
//! `send` must not block: coordinators call it while holding their
//! process-wide lock.

use std::sync::Arc;

use crate::error::Error;
use crate::message::{Envelope, ProcessID};

pub trait Channel: Send + Sync + 'static {
    /// Queues `envelope` for delivery to `to`.
    fn send(&self, to: ProcessID, envelope: Envelope) -> Result<(), Error>;
}

impl<C: Channel + ?Sized> Channel for Arc<C> {
    fn send(&self, to: ProcessID, envelope: Envelope) -> Result<(), Error> {
        (**self).send(to, envelope)
    }
}
