//! Periodic power-status poll.
//!
//! The power query is cheap and its reply tells us both that the TV is
//! still there and whether it is on. Everything else is re-queried by the
//! burst after a power-on.

use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::frame::CommandFrame;

#[derive(Debug)]
pub struct Poller {
    interval: Interval,
    query: CommandFrame,
}

impl Poller {
    /// Start a poller whose first tick is one `period` from now.
    pub fn new(period: Duration, query: CommandFrame) -> Self {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval, query }
    }

    /// Wait for the next tick.
    pub async fn tick(&mut self) -> Instant {
        self.interval.tick().await
    }

    /// The frame to send on a tick, or `None` when polling must wait.
    pub fn poll_frame(&self, connected: bool, inhibited: bool) -> Option<CommandFrame> {
        (connected && !inhibited).then(|| self.query.clone())
    }

    pub fn period(&self) -> Duration {
        self.interval.period()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poller() -> Poller {
        Poller::new(Duration::from_secs(5), CommandFrame::new("ka", 0, "ff"))
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_after_one_period() {
        let start = Instant::now();
        let mut poller = poller();
        let at = poller.tick().await;
        assert_eq!(at - start, Duration::from_secs(5));
        let at = poller.tick().await;
        assert_eq!(at - start, Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_is_not_immediate() {
        let mut poller = poller();
        let mut tick = tokio_test::task::spawn(poller.tick());
        tokio_test::assert_pending!(tick.poll());
    }

    #[tokio::test]
    async fn inhibited_or_offline_polls_nothing() {
        let poller = poller();
        assert!(poller.poll_frame(true, true).is_none());
        assert!(poller.poll_frame(false, false).is_none());
        let frame = poller.poll_frame(true, false).unwrap();
        assert_eq!(frame.to_bytes(), b"ka 00 ff\r\n");
        assert_eq!(poller.period(), Duration::from_secs(5));
    }
}
