//! # Summary
//!
//! Lamport logical clock. The clock itself carries no lock: every process
//! keeps exactly one inside its `shared::State`, so all three operations
//! are serialized by the process-wide mutex.

use crate::message::Timestamp;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct LamportClock {
    value: Timestamp,
}

impl LamportClock {
    pub fn new() -> Self {
        LamportClock::default()
    }

    /// Advances the clock for a local event and returns the new value.
    pub fn tick(&mut self) -> Timestamp {
        self.value += 1;
        self.value
    }

    /// Catches up with a remote timestamp: `max(local, received) + 1`.
    pub fn observe(&mut self, received: Timestamp) -> Timestamp {
        self.value = std::cmp::max(self.value, received) + 1;
        self.value
    }

    pub fn current(&self) -> Timestamp {
        self.value
    }
}

#[cfg(test)]
mod tests {

    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_tick() {
        let mut clock = LamportClock::new();
        assert_eq!(clock.current(), 0);
        assert_eq!(clock.tick(), 1);
        assert_eq!(clock.tick(), 2);
        assert_eq!(clock.current(), 2);
    }

    #[test]
    fn test_observe_ahead() {
        let mut clock = LamportClock::new();
        clock.tick();
        assert_eq!(clock.observe(10), 11);
    }

    #[test]
    fn test_observe_behind() {
        let mut clock = LamportClock::new();
        for _ in 0..5 { clock.tick(); }
        assert_eq!(clock.observe(2), 6);
    }

    proptest! {
        #[test]
        fn test_strictly_increasing(events in proptest::collection::vec(proptest::option::of(0u64..1000), 1..64)) {
            let mut clock = LamportClock::new();
            for event in events {
                let before = clock.current();
                let after = match event {
                | Some(received) => {
                    let after = clock.observe(received);
                    prop_assert!(after > received);
                    after
                }
                | None => clock.tick(),
                };
                prop_assert!(after > before);
                prop_assert_eq!(after, clock.current());
            }
        }
    }
}
