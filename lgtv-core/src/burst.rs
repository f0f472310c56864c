//! The query burst sent after the TV powers on.
//!
//! Queries go out one per `spacing`, the first immediately. The TV does not
//! pipeline, so the spacing is what keeps replies from colliding.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

use crate::frame::CommandFrame;

#[derive(Debug)]
pub struct BurstQuery {
    pending: VecDeque<CommandFrame>,
    spacing: Duration,
    next_at: Instant,
}

impl BurstQuery {
    pub fn new(spacing: Duration) -> Self {
        Self {
            pending: VecDeque::new(),
            spacing,
            next_at: Instant::now(),
        }
    }

    /// Queue `frames`, the first due at `now`. Returns when the last one
    /// goes out.
    pub fn start(&mut self, frames: Vec<CommandFrame>, now: Instant) -> Instant {
        self.pending = frames.into();
        self.next_at = now;
        now + self.duration()
    }

    /// Time from the first to the last send.
    pub fn duration(&self) -> Duration {
        let gaps = u32::try_from(self.pending.len().saturating_sub(1)).unwrap_or(u32::MAX);
        self.spacing.saturating_mul(gaps)
    }

    pub fn is_running(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    /// When the next query is due, if any are left.
    pub fn next_due(&self) -> Option<Instant> {
        self.is_running().then_some(self.next_at)
    }

    /// Take the next query if it is due.
    pub fn pop_due(&mut self, now: Instant) -> Option<CommandFrame> {
        if now < self.next_at {
            return None;
        }
        let frame = self.pending.pop_front()?;
        self.next_at += self.spacing;
        Some(frame)
    }

    pub fn cancel(&mut self) {
        self.pending.clear();
    }
}
