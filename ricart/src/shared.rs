//! # Summary
//!
//! This module holds everything a single process knows about the protocol:
//! its Lamport clock and, for every resource it has seen, its Ricart–Agrawala
//! bookkeeping. We wrap the central `State` type with Arc<Mutex<T>> so the
//! application side and the inbound message handler mutate it one at a time.
//!
//! Outgoing messages are handed to the `Channel` while the lock is still held,
//! which keeps every decision and the messages it produces in one atomic step.

use std::collections::VecDeque;
use std::sync::Arc;

use hashbrown::{HashMap as Map, HashSet as Set};
use parking_lot::{Mutex, MutexGuard};
use tokio::sync::Notify;

use crate::channel::Channel;
use crate::clock::LamportClock;
use crate::error::Error;
use crate::message::{Envelope, Message, ProcessID, RequestRecord, ResourceID, Timestamp};

/// Thread-safe wrapper around per-process `State`.
#[derive(Clone, Debug)]
pub struct Shared(Arc<Mutex<State>>);

impl Shared {
    pub fn new(id: ProcessID, peers: Vec<ProcessID>) -> Self {
        Shared(Arc::new(Mutex::new(State::new(id, peers))))
    }

    /// Acquires the process-wide lock.
    pub fn lock(&self) -> MutexGuard<State> {
        self.0.lock()
    }
}

/// Progress of the local process on a single resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Status {
    Idle,
    Requesting {
        request: RequestRecord,
        pending: Vec<ProcessID>,
    },
    Held {
        request: RequestRecord,
    },
}

/// Result of checking whether an outstanding request has been granted.
pub(crate) enum Grant {
    Ready,
    Waiting(Arc<Notify>),
}

/// Ricart–Agrawala bookkeeping for one resource.
#[derive(Debug, Default)]
struct Exclusion {
    /// Between `request` and `release`
    wants_entry: bool,

    /// Every peer has answered and the waiter has been admitted
    in_critical_section: bool,

    /// Set exactly when `wants_entry` is
    my_request: Option<RequestRecord>,

    /// Remote requests answered only on release, in arrival order
    deferred: VecDeque<RequestRecord>,

    /// Peers that have not yet answered `my_request`
    pending: Set<ProcessID>,

    /// Signalled when `pending` drains
    granted: Arc<Notify>,
}

#[derive(Debug)]
pub struct State {
    id: ProcessID,
    peers: Vec<ProcessID>,
    clock: LamportClock,
    resources: Map<ResourceID, Exclusion>,
}

impl State {
    fn new(id: ProcessID, peers: Vec<ProcessID>) -> Self {
        State {
            id,
            peers,
            clock: LamportClock::new(),
            resources: Map::default(),
        }
    }

    pub fn clock(&self) -> Timestamp {
        self.clock.current()
    }

    /// Advances the clock for a local event that sends nothing.
    pub fn tick(&mut self) -> Timestamp {
        self.clock.tick()
    }

    pub fn status(&self, resource: ResourceID) -> Status {
        let exclusion = match self.resources.get(&resource) {
            Some(exclusion) => exclusion,
            None => return Status::Idle,
        };
        match (exclusion.my_request, exclusion.in_critical_section) {
        | (Some(request), true) => Status::Held { request },
        | (Some(request), false) => {
            let mut pending = exclusion.pending.iter().copied().collect::<Vec<_>>();
            pending.sort();
            Status::Requesting { request, pending }
        }
        | (None, _) => Status::Idle,
        }
    }

    /// Peers whose requests for `resource` are currently withheld.
    pub fn deferred(&self, resource: ResourceID) -> Vec<ProcessID> {
        self.resources
            .get(&resource)
            .map(|exclusion| exclusion.deferred.iter().map(|record| record.p_id).collect())
            .unwrap_or_default()
    }

    /// Starts a new entry attempt and broadcasts it to every peer.
    pub fn request<C: Channel>(&mut self, resource: ResourceID, channel: &C) -> Result<Timestamp, Error> {
        let exclusion = self.resources.entry(resource).or_default();
        if exclusion.wants_entry {
            return Err(Error::AlreadyRequested(resource))
        }

        let timestamp = self.clock.tick();
        exclusion.wants_entry = true;
        exclusion.my_request = Some(RequestRecord::new(timestamp, self.id));
        exclusion.pending = self.peers.iter().copied().collect();

        // Nobody to ask
        if exclusion.pending.is_empty() {
            exclusion.granted.notify_one();
        }

        debug!("{} requesting {} at {}", self.id, resource, timestamp);
        let request = Envelope::new(self.id, resource, Message::Request { timestamp });
        for peer in &self.peers {
            send(channel, *peer, request);
        }
        Ok(timestamp)
    }

    /// Admits the local process once every peer has answered.
    pub(crate) fn poll_grant(&mut self, resource: ResourceID) -> Result<Grant, Error> {
        let exclusion = match self.resources.get_mut(&resource) {
            Some(exclusion) if exclusion.wants_entry => exclusion,
            _ => return Err(Error::NotRequested(resource)),
        };

        if exclusion.in_critical_section {
            return Ok(Grant::Ready)
        }

        if !exclusion.pending.is_empty() {
            return Ok(Grant::Waiting(exclusion.granted.clone()))
        }

        exclusion.in_critical_section = true;
        let timestamp = self.clock.tick();
        info!("{} entered {} at {}", self.id, resource, timestamp);
        Ok(Grant::Ready)
    }

    /// Leaves the critical section, or withdraws a request that was never granted.
    /// Every deferred peer is answered and every peer is told about the release.
    pub fn release<C: Channel>(&mut self, resource: ResourceID, channel: &C) -> Result<(), Error> {
        let exclusion = match self.resources.get_mut(&resource) {
            Some(exclusion) if exclusion.wants_entry => exclusion,
            _ => return Err(Error::NotRequested(resource)),
        };

        let held = exclusion.in_critical_section;
        exclusion.in_critical_section = false;
        exclusion.wants_entry = false;
        exclusion.my_request = None;
        exclusion.pending.clear();

        let timestamp = self.clock.tick();
        if held {
            info!("{} left {} at {}", self.id, resource, timestamp);
        } else {
            info!("{} withdrew request for {} at {}", self.id, resource, timestamp);
        }

        for deferred in exclusion.deferred.drain(..) {
            let ok = Message::Ok { request: deferred.timestamp };
            send(channel, deferred.p_id, Envelope::new(self.id, resource, ok));
        }

        let release = Envelope::new(self.id, resource, Message::Release);
        for peer in &self.peers {
            send(channel, *peer, release);
        }
        Ok(())
    }

    /// Dispatches an inbound envelope. Envelopes from outside the
    /// registry are rejected without touching any state.
    pub fn handle<C: Channel>(&mut self, envelope: Envelope, channel: &C) -> Result<(), Error> {
        if !self.peers.contains(&envelope.from) {
            return Err(Error::UnknownPeer(envelope.from))
        }
        let Envelope { from, resource, message } = envelope;
        match message {
        | Message::Request { timestamp } => self.receive_request(from, resource, timestamp, channel),
        | Message::Ok { request } => self.receive_ok(from, resource, request),
        | Message::Release => self.receive_release(from, resource),
        }
        Ok(())
    }

    /// Ricart–Agrawala decision rule: answer immediately unless the local
    /// process holds the resource, or wants it with an earlier request.
    pub fn receive_request<C: Channel>(
        &mut self,
        from: ProcessID,
        resource: ResourceID,
        timestamp: Timestamp,
        channel: &C,
    ) {
        self.clock.observe(timestamp);
        self.clock.tick();

        let remote = RequestRecord::new(timestamp, from);
        let exclusion = self.resources.entry(resource).or_default();
        let prioritized = exclusion.my_request.map_or(false, |mine| mine < remote);

        if exclusion.in_critical_section || (exclusion.wants_entry && prioritized) {
            // Redelivered requests are already queued
            if !exclusion.deferred.contains(&remote) {
                debug!("{} deferring {:?} on {}", self.id, remote, resource);
                exclusion.deferred.push_back(remote);
            }
        } else {
            let ok = Message::Ok { request: timestamp };
            send(channel, from, Envelope::new(self.id, resource, ok));
        }
    }

    /// Records a grant. Grants for anything but the current request are ignored.
    pub fn receive_ok(&mut self, from: ProcessID, resource: ResourceID, request: Timestamp) {
        self.clock.tick();
        let id = self.id;
        match self.resources.get_mut(&resource) {
        | Some(exclusion) if exclusion.wants_entry
            && exclusion.my_request.map(|mine| mine.timestamp) == Some(request) =>
        {
            if exclusion.pending.remove(&from) && exclusion.pending.is_empty() {
                debug!("{} collected every grant for {}", id, resource);
                exclusion.granted.notify_one();
            }
        }
        | _ => debug!("{} ignoring OK from {} for {} at {}", id, from, resource, request),
        }
    }

    /// Forgets any deferred request `from` still has queued here.
    pub fn receive_release(&mut self, from: ProcessID, resource: ResourceID) {
        self.clock.tick();
        if let Some(exclusion) = self.resources.get_mut(&resource) {
            let before = exclusion.deferred.len();
            exclusion.deferred.retain(|record| record.p_id != from);
            if exclusion.deferred.len() != before {
                debug!("{} dropped withdrawn request from {} on {}", self.id, from, resource);
            }
        }
    }
}

fn send<C: Channel>(channel: &C, to: ProcessID, envelope: Envelope) {
    trace!("sending {:?} to {}", envelope, to);
    if let Err(error) = channel.send(to, envelope) {
        warn!("failed to send {:?} to {}: {}", envelope.message, to, error);
    }
}
