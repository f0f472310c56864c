//! The busy flag that keeps the poller off the wire while commands are
//! outstanding.
//!
//! Each source of outbound traffic takes its own timed hold, so releasing
//! one (a remote-key ack) never cuts short another (a running burst query).
//! Holds expire on their own; nothing has to remember to clear them.

use std::collections::HashMap;

use tokio::time::Instant;

/// Why polling is suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hold {
    /// Post power-on query burst.
    Burst,
    /// A user command awaiting its reply.
    Command,
    /// A remote-key press awaiting its ack.
    Remote,
}

#[derive(Debug, Default)]
pub struct Inhibition {
    holds: HashMap<Hold, Instant>,
}

impl Inhibition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold until `until`, extending an existing hold of the same kind.
    pub fn hold(&mut self, reason: Hold, until: Instant) {
        let deadline = self.holds.entry(reason).or_insert(until);
        if *deadline < until {
            *deadline = until;
        }
    }

    pub fn release(&mut self, reason: Hold) {
        self.holds.remove(&reason);
    }

    /// Drop every hold (connection teardown).
    pub fn clear(&mut self) {
        self.holds.clear();
    }

    pub fn is_held(&self, reason: Hold, now: Instant) -> bool {
        self.holds.get(&reason).is_some_and(|&until| until > now)
    }

    /// Whether any hold is still in force.
    pub fn is_active(&self, now: Instant) -> bool {
        self.holds.values().any(|&until| until > now)
    }
}
