use crate::message::{ProcessID, ResourceID};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("{0} is not a registered peer")]
    UnknownPeer(ProcessID),

    #[error("{0} already has an outstanding request")]
    AlreadyRequested(ResourceID),

    #[error("{0} has no outstanding request")]
    NotRequested(ResourceID),

    #[error("timed out waiting for permission on {0}")]
    Timeout(ResourceID),

    #[error("{found} is not covered by the guard on {held}")]
    Unguarded {
        held: ResourceID,
        found: ResourceID,
    },

    #[error("channel to {0} is closed")]
    Disconnected(ProcessID),
}
