//! # Summary
//!
//! Fixed membership of the system. A `Registry` is built once at startup and
//! never mutated afterwards; coordinators and channels only borrow it.
//!
//! Iteration follows `ProcessID` order, which keeps broadcasts deterministic
//! in simulation.

use std::collections::BTreeMap as Map;

use crate::message::ProcessID;

/// Known processes and their message-delivery handles.
#[derive(Clone, Debug)]
pub struct Registry<H> {
    handles: Map<ProcessID, H>,
}

impl<H> Registry<H> {
    pub fn new<I>(handles: I) -> Self
        where I: IntoIterator<Item = (ProcessID, H)>
    {
        Registry { handles: handles.into_iter().collect() }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn contains(&self, id: ProcessID) -> bool {
        self.handles.contains_key(&id)
    }

    /// Delivery handle for `id`, if registered.
    pub fn get(&self, id: ProcessID) -> Option<&H> {
        self.handles.get(&id)
    }

    /// All registered IDs in ascending order.
    pub fn ids<'a>(&'a self) -> impl Iterator<Item = ProcessID> + 'a {
        self.handles.keys().copied()
    }

    /// Every registered ID except `id`.
    pub fn peers_of(&self, id: ProcessID) -> Vec<ProcessID> {
        self.ids().filter(|p_id| *p_id != id).collect()
    }
}

impl Registry<()> {
    /// Membership without delivery handles, for `count` processes numbered from zero.
    pub fn with_count(count: u32) -> Self {
        Registry::new((0..count).map(|id| (ProcessID(id), ())))
    }
}
