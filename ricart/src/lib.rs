//! # Summary
//!
//! Ricart–Agrawala mutual exclusion ordered by Lamport clocks.
//!
//! Each process owns a `Coordinator`. Entering a critical section broadcasts a
//! timestamped request and waits until every peer has answered; peers answer
//! at once unless they hold the resource or requested it first, in which case
//! they answer on release. Requests are totally ordered by
//! `(timestamp, process id)`, which rules out deadlock and starvation.
//!
//! The transport is pluggable through `Channel`. `LocalNetwork` connects
//! coordinators inside one tokio runtime, and `sim::SimNetwork` hands delivery
//! order to the caller for testing.

#[macro_use] extern crate derivative;
#[macro_use] extern crate log;

mod channel;
mod clock;
mod config;
mod coordinator;
mod error;
mod local;
mod message;
mod registry;
mod resource;
mod shared;

pub mod sim;

pub use crate::channel::Channel;
pub use crate::clock::LamportClock;
pub use crate::config::{Cluster, Config};
pub use crate::coordinator::{Coordinator, Guard};
pub use crate::error::Error;
pub use crate::local::LocalNetwork;
pub use crate::message::{Envelope, Message, ProcessID, RequestRecord, ResourceID, Timestamp};
pub use crate::registry::Registry;
pub use crate::resource::Resource;
pub use crate::shared::Status;
