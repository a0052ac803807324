//! # Summary
//!
//! Deterministic, in-memory transport for exercising ordering edge cases.
//!
//! `SimNetwork` keeps one FIFO queue per directed link and delivers nothing on
//! its own: the caller decides which link moves next, either explicitly or by
//! drawing from a seeded RNG. `Simulation` bundles a network with one
//! coordinator per process and does the routing.

use std::collections::BTreeMap as Map;
use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::Rng;

use crate::channel::Channel;
use crate::coordinator::Coordinator;
use crate::error::Error;
use crate::message::{Envelope, ProcessID, ResourceID};
use crate::registry::Registry;
use crate::shared::Status;

/// Directed link between two processes.
pub type Link = (ProcessID, ProcessID);

/// Undelivered envelopes, one queue per link.
#[derive(Clone, Debug, Default)]
pub struct SimNetwork(Arc<Mutex<Map<Link, VecDeque<Envelope>>>>);

impl Channel for SimNetwork {
    fn send(&self, to: ProcessID, envelope: Envelope) -> Result<(), Error> {
        self.0
            .lock()
            .entry((envelope.from, to))
            .or_default()
            .push_back(envelope);
        Ok(())
    }
}

impl SimNetwork {
    pub fn new() -> Self {
        SimNetwork::default()
    }

    /// Number of envelopes sent but not yet delivered.
    pub fn in_flight(&self) -> usize {
        self.0.lock().values().map(VecDeque::len).sum()
    }

    /// Links that currently hold at least one envelope, in ascending order.
    pub fn busy_links(&self) -> Vec<Link> {
        self.0
            .lock()
            .iter()
            .filter(|(_, queue)| !queue.is_empty())
            .map(|(link, _)| *link)
            .collect()
    }

    /// Removes the oldest envelope on `link`.
    pub fn pop(&self, link: Link) -> Option<Envelope> {
        self.0.lock().get_mut(&link)?.pop_front()
    }

    /// Head of `link` without removing it.
    pub fn peek(&self, link: Link) -> Option<Envelope> {
        self.0.lock().get(&link)?.front().copied()
    }
}

/// A whole system of coordinators over one `SimNetwork`.
pub struct Simulation {
    network: SimNetwork,
    nodes: Vec<Coordinator<SimNetwork>>,
}

impl Simulation {
    /// Processes `0..count`, nothing in flight.
    pub fn new(count: u32) -> Self {
        let registry = Registry::with_count(count);
        let network = SimNetwork::new();
        let nodes = registry
            .ids()
            .map(|id| Coordinator::new(id, &registry, network.clone()))
            .collect::<Result<Vec<_>, _>>()
            .unwrap_or_default();
        Simulation { network, nodes }
    }

    pub fn network(&self) -> &SimNetwork {
        &self.network
    }

    pub fn nodes(&self) -> &[Coordinator<SimNetwork>] {
        &self.nodes
    }

    /// # Panics
    ///
    /// If `id` is not part of the simulation.
    pub fn node(&self, id: u32) -> &Coordinator<SimNetwork> {
        &self.nodes[id as usize]
    }

    /// Processes currently inside the critical section for `resource`.
    pub fn holders(&self, resource: ResourceID) -> Vec<ProcessID> {
        self.nodes
            .iter()
            .filter(|node| matches!(node.status(resource), Status::Held { .. }))
            .map(Coordinator::id)
            .collect()
    }

    /// Delivers the oldest envelope on `link`. Returns `false` if it was empty.
    pub fn deliver(&self, link: Link) -> bool {
        let (_, to) = link;
        match self.network.pop(link) {
        | None => false,
        | Some(envelope) => {
            if let Some(node) = self.nodes.get(to.0 as usize) {
                if let Err(error) = node.handle(envelope) {
                    warn!("{} dropping {:?}: {}", to, envelope, error);
                }
            }
            true
        }
        }
    }

    /// Delivers the head of the lowest busy link. Returns `false` when idle.
    pub fn step(&self) -> bool {
        match self.network.busy_links().first() {
        | Some(link) => self.deliver(*link),
        | None => false,
        }
    }

    /// Delivers the head of a uniformly chosen busy link. Returns `false` when idle.
    pub fn step_random<R: Rng>(&self, rng: &mut R) -> bool {
        let links = self.network.busy_links();
        if links.is_empty() {
            return false
        }
        let link = links[rng.gen_range(0..links.len())];
        self.deliver(link)
    }

    /// Delivers everything in flight, including messages sent along the way.
    pub fn run(&self) {
        while self.step() {}
    }
}
