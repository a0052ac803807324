//! # Summary
//!
//! This module defines the `Coordinator`, the application-facing handle of one
//! process. Application tasks call `request_access`, `wait_for_grant` and
//! `release_access` (or the scoped `lock`), while the transport feeds inbound
//! envelopes through `handle`. Both sides serialize through the same
//! `shared::Shared` lock.

use std::sync::Arc;
use std::time;

use crate::channel::Channel;
use crate::error::Error;
use crate::message::{Envelope, Message, ProcessID, ResourceID, Timestamp};
use crate::registry::Registry;
use crate::resource::Resource;
use crate::shared::{Grant, Shared, Status};

/// Mutual exclusion endpoint of a single process. Clones share state.
#[derive(Derivative)]
#[derivative(Clone(bound = ""), Debug(bound = ""))]
pub struct Coordinator<C> {
    /// Unique ID of this process
    id: ProcessID,

    /// Per-process protocol state
    shared: Shared,

    /// Outbound transport
    #[derivative(Debug = "ignore")]
    channel: Arc<C>,

    /// Upper bound on `wait_for_grant`, if any
    timeout: Option<time::Duration>,
}

impl<C: Channel> Coordinator<C> {
    /// Creates the coordinator for `id`, which must be a member of `registry`.
    pub fn new<H>(id: ProcessID, registry: &Registry<H>, channel: C) -> Result<Self, Error> {
        if !registry.contains(id) {
            return Err(Error::UnknownPeer(id))
        }
        Ok(Coordinator {
            id,
            shared: Shared::new(id, registry.peers_of(id)),
            channel: Arc::new(channel),
            timeout: None,
        })
    }

    pub fn with_timeout(mut self, timeout: time::Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn id(&self) -> ProcessID {
        self.id
    }

    /// Current value of this process's logical clock.
    pub fn clock(&self) -> Timestamp {
        self.shared.lock().clock()
    }

    /// Advances the logical clock for an application event.
    pub fn tick(&self) -> Timestamp {
        self.shared.lock().tick()
    }

    pub fn status(&self, resource: ResourceID) -> Status {
        self.shared.lock().status(resource)
    }

    /// Peers currently waiting on this process for `resource`.
    pub fn deferred(&self, resource: ResourceID) -> Vec<ProcessID> {
        self.shared.lock().deferred(resource)
    }

    /// Broadcasts a request for `resource` and returns its timestamp
    /// without waiting for any answer.
    pub fn request_access(&self, resource: ResourceID) -> Result<Timestamp, Error> {
        self.shared.lock().request(resource, &*self.channel)
    }

    /// Non-blocking variant of `wait_for_grant`: enters the critical
    /// section and returns `true` if every peer has answered.
    pub fn try_grant(&self, resource: ResourceID) -> Result<bool, Error> {
        match self.shared.lock().poll_grant(resource)? {
        | Grant::Ready => Ok(true),
        | Grant::Waiting(_) => Ok(false),
        }
    }

    /// Suspends until every peer has answered the outstanding request, then
    /// enters the critical section. Fails with `Error::Timeout` if a timeout is
    /// configured and elapses first; the request is left outstanding.
    pub async fn wait_for_grant(&self, resource: ResourceID) -> Result<(), Error> {
        match self.timeout {
        | None => self.granted(resource).await,
        | Some(timeout) => tokio::time::timeout(timeout, self.granted(resource))
            .await
            .map_err(|_| Error::Timeout(resource))?,
        }
    }

    async fn granted(&self, resource: ResourceID) -> Result<(), Error> {
        loop {
            // Never hold the lock across the await
            let notify = match self.shared.lock().poll_grant(resource)? {
                Grant::Ready => return Ok(()),
                Grant::Waiting(notify) => notify,
            };
            notify.notified().await;
        }
    }

    /// Leaves the critical section, answering every deferred peer.
    /// Called before the grant arrives, this withdraws the request instead.
    pub fn release_access(&self, resource: ResourceID) -> Result<(), Error> {
        self.shared.lock().release(resource, &*self.channel)
    }

    /// Requests, waits for and returns a scoped critical section that is
    /// released on drop. A failed wait withdraws the request.
    pub async fn lock(&self, resource: ResourceID) -> Result<Guard<C>, Error> {
        self.request_access(resource)?;
        if let Err(error) = self.wait_for_grant(resource).await {
            warn!("{} abandoning {}: {}", self.id, resource, error);
            self.release_access(resource)?;
            return Err(error)
        }
        Ok(Guard {
            coordinator: self.clone(),
            resource,
        })
    }

    /// Applies an inbound envelope. Envelopes from unregistered senders
    /// are rejected with `Error::UnknownPeer` and otherwise ignored.
    pub fn handle(&self, envelope: Envelope) -> Result<(), Error> {
        trace!("{} received {:?}", self.id, envelope);
        self.shared.lock().handle(envelope, &*self.channel)
    }

    pub fn on_receive_request(&self, from: ProcessID, resource: ResourceID, timestamp: Timestamp) -> Result<(), Error> {
        self.handle(Envelope::new(from, resource, Message::Request { timestamp }))
    }

    pub fn on_receive_ok(&self, from: ProcessID, resource: ResourceID, request: Timestamp) -> Result<(), Error> {
        self.handle(Envelope::new(from, resource, Message::Ok { request }))
    }

    pub fn on_receive_release(&self, from: ProcessID, resource: ResourceID) -> Result<(), Error> {
        self.handle(Envelope::new(from, resource, Message::Release))
    }
}

/// Exclusive access to one resource, released when dropped.
#[derive(Debug)]
pub struct Guard<C: Channel> {
    coordinator: Coordinator<C>,
    resource: ResourceID,
}

impl<C: Channel> Guard<C> {
    pub fn resource(&self) -> ResourceID {
        self.resource
    }

    /// Reads shared state from inside the critical section.
    /// Fails with `Error::Unguarded` if `key` belongs to another resource.
    pub fn read<R: Resource>(&self, shared: &R, key: &R::Key) -> Result<Option<R::Value>, R::Error> {
        self.covers(shared, key)?;
        Ok(shared.read(key))
    }

    /// Writes shared state from inside the critical section.
    /// Fails with `Error::Unguarded` if `key` belongs to another resource.
    pub fn update<R: Resource>(&self, shared: &R, key: &R::Key, delta: R::Value) -> Result<(), R::Error> {
        self.covers(shared, key)?;
        trace!("{} updating under {}", self.coordinator.id, self.resource);
        shared.update(key, delta)
    }

    fn covers<R: Resource>(&self, shared: &R, key: &R::Key) -> Result<(), Error> {
        let found = shared.resource(key);
        if found != self.resource {
            return Err(Error::Unguarded { held: self.resource, found })
        }
        Ok(())
    }
}

impl<C: Channel> Drop for Guard<C> {
    fn drop(&mut self) {
        if let Err(error) = self.coordinator.release_access(self.resource) {
            warn!("{} failed to release {}: {}", self.coordinator.id, self.resource, error);
        }
    }
}
