use serde_derive::{Deserialize, Serialize};

/// Lamport timestamp.
pub type Timestamp = u64;

/// Unique identifier of a participating process.
/// Ordering on IDs breaks ties between equal timestamps.
#[derive(Serialize, Deserialize)]
#[derive(Copy, Clone, Default, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessID(pub u32);

impl std::fmt::Display for ProcessID {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(fmt, "P{}", self.0)
    }
}

/// Identifier of a resource guarded by its own mutual exclusion instance.
#[derive(Serialize, Deserialize)]
#[derive(Copy, Clone, Default, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceID(pub u64);

impl std::fmt::Display for ResourceID {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(fmt, "R{}", self.0)
    }
}

/// A single request for the critical section.
///
/// Field order matters: the derived `Ord` compares `timestamp` first and
/// falls back to `p_id`, which yields Lamport's total order.
#[derive(Serialize, Deserialize)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestRecord {
    pub timestamp: Timestamp,
    pub p_id: ProcessID,
}

impl RequestRecord {
    pub fn new(timestamp: Timestamp, p_id: ProcessID) -> Self {
        RequestRecord { timestamp, p_id }
    }
}

#[derive(Serialize, Deserialize)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Message {
    /// Ask every peer for permission to enter.
    Request { timestamp: Timestamp },

    /// Grant permission. Echoes the timestamp of the request it answers.
    Ok { request: Timestamp },

    /// Sender left the critical section or withdrew its request.
    Release,
}

/// Routing information wrapped around every message.
#[derive(Serialize, Deserialize)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Envelope {
    pub from: ProcessID,
    pub resource: ResourceID,
    pub message: Message,
}

impl Envelope {
    pub fn new(from: ProcessID, resource: ResourceID, message: Message) -> Self {
        Envelope { from, resource, message }
    }

    /// Serializes this envelope with `bincode`.
    pub fn encode(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserializes an envelope previously produced by `encode`.
    pub fn decode(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_request_order_timestamp_first() {
        let a = RequestRecord::new(4, ProcessID(9));
        let b = RequestRecord::new(5, ProcessID(0));
        assert!(a < b);
    }

    #[test]
    fn test_request_order_breaks_ties_by_id() {
        let a = RequestRecord::new(5, ProcessID(0));
        let b = RequestRecord::new(5, ProcessID(1));
        let c = RequestRecord::new(5, ProcessID(2));
        assert!(a < b && b < c);
    }

    #[test]
    fn test_envelope_bincode() {
        let envelope = Envelope::new(
            ProcessID(3),
            ResourceID(7),
            Message::Request { timestamp: 42 },
        );
        let bytes = envelope.encode().unwrap();
        assert_eq!(Envelope::decode(&bytes).unwrap(), envelope);
        assert!(Envelope::decode(&bytes[..2]).is_err());
    }
}
