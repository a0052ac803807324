//! # Summary
//!
//! This module implements an in-process transport between coordinators.
//!
//! Currently backed by `tokio::sync::mpsc`: every process owns one unbounded
//! inbox, and a `LocalNetwork` routes envelopes to the right inbox through an
//! immutable `Registry` of transmitting ends. Since a single sender's messages
//! enter a single queue in order, per-link FIFO comes for free. The only way
//! for a send to fail is if the receiving task has shut down, which the
//! coordinator logs and otherwise ignores.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::channel::Channel;
use crate::coordinator::Coordinator;
use crate::error::Error;
use crate::message::{Envelope, ProcessID};
use crate::registry::Registry;

/// Inbox receiving channel.
#[derive(Debug)]
pub struct Rx(mpsc::UnboundedReceiver<Envelope>);

/// Inbox transmission channel. All clones send to the same receiving end.
#[derive(Clone, Debug)]
pub struct Tx(mpsc::UnboundedSender<Envelope>);

/// Create a new pair of linked receiving and transmitting channels.
pub fn new() -> (Rx, Tx) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Rx(rx), Tx(tx))
}

impl Rx {
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.0.recv().await
    }
}

/// Routes envelopes to the inbox of the destination process.
#[derive(Clone, Debug)]
pub struct LocalNetwork(Arc<Registry<Tx>>);

impl LocalNetwork {
    pub fn new(registry: Registry<Tx>) -> Self {
        LocalNetwork(Arc::new(registry))
    }

    pub fn registry(&self) -> &Registry<Tx> {
        &self.0
    }
}

impl Channel for LocalNetwork {
    fn send(&self, to: ProcessID, envelope: Envelope) -> Result<(), Error> {
        self.0
            .get(to)
            .ok_or(Error::UnknownPeer(to))?
            .0
            .send(envelope)
            .map_err(|_| Error::Disconnected(to))
    }
}

/// Drains one process's inbox into its coordinator, one envelope at a time.
pub struct Inbox<C: Channel> {
    coordinator: Coordinator<C>,
    rx: Rx,
}

impl<C: Channel> Inbox<C> {
    pub fn new(coordinator: Coordinator<C>, rx: Rx) -> Self {
        Inbox { coordinator, rx }
    }

    /// Runs until every transmitting end has been dropped.
    pub async fn run(mut self) {
        let id = self.coordinator.id();
        debug!("{} inbox open", id);
        while let Some(envelope) = self.rx.recv().await {
            if let Err(error) = self.coordinator.handle(envelope) {
                warn!("{} dropping {:?}: {}", id, envelope, error);
            }
        }
        debug!("{} inbox closed", id);
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::message::{Message, ResourceID};

    #[test]
    fn test_send_routes_by_id() {
        let (mut rx0, tx0) = new();
        let (mut rx1, tx1) = new();
        let network = LocalNetwork::new(Registry::new(vec![
            (ProcessID(0), tx0),
            (ProcessID(1), tx1),
        ]));
        let envelope = Envelope::new(ProcessID(0), ResourceID(0), Message::Release);
        network.send(ProcessID(1), envelope).unwrap();
        assert_eq!(rx1.0.try_recv().unwrap(), envelope);
        assert!(rx0.0.try_recv().is_err());
    }

    #[test]
    fn test_send_failures() {
        let (rx, tx) = new();
        let network = LocalNetwork::new(Registry::new(vec![(ProcessID(0), tx)]));
        let envelope = Envelope::new(ProcessID(0), ResourceID(0), Message::Release);
        assert_eq!(network.send(ProcessID(4), envelope), Err(Error::UnknownPeer(ProcessID(4))));
        drop(rx);
        assert_eq!(network.send(ProcessID(0), envelope), Err(Error::Disconnected(ProcessID(0))));
    }
}
