use crate::message::ResourceID;

/// Shared state protected by mutual exclusion.
///
/// Implementations serialize their own reads and writes; the protocol only
/// guarantees that a single process at a time holds the permission to call
/// `update`. See `Guard::read` and `Guard::update`.
pub trait Resource {
    type Key;
    type Value;
    type Error: From<crate::error::Error>;

    /// Exclusion resource that must be held to touch `key`.
    fn resource(&self, key: &Self::Key) -> ResourceID;

    fn read(&self, key: &Self::Key) -> Option<Self::Value>;

    fn update(&self, key: &Self::Key, delta: Self::Value) -> Result<(), Self::Error>;
}
