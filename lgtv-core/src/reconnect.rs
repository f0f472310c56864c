//! Why a connection ended and how long to wait before the next attempt.

use std::io::ErrorKind;
use std::time::Duration;

use tracing::{Level, debug, error, info};

use crate::network::ConnectionInfo;

/// How a connection (or connection attempt) ended.
#[derive(Debug)]
pub enum Disconnect {
    /// The TV closed the socket; usually it was switched off.
    Closed,
    /// Nothing is listening. The TV is off; not worth an error.
    Refused,
    /// Any other socket failure: timeout, reset, unreachable, ...
    Error(std::io::Error),
    /// The session was asked to stop.
    Shutdown,
}

impl Disconnect {
    pub fn classify(e: std::io::Error) -> Self {
        match e.kind() {
            ErrorKind::ConnectionRefused => Self::Refused,
            _ => Self::Error(e),
        }
    }

    /// Log level for this outcome. Refusals are routine while the TV is
    /// off and stay below `info`.
    pub fn level(&self) -> Level {
        match self {
            Self::Closed | Self::Shutdown => Level::INFO,
            Self::Refused => Level::DEBUG,
            Self::Error(_) => Level::ERROR,
        }
    }

    /// One log line per ended attempt, at [`level`](Self::level).
    pub fn log(&self, peer: &ConnectionInfo, delay: Duration) {
        let message = match self {
            Self::Closed => format!("{peer} disconnected; reconnecting in {delay:?}"),
            Self::Refused => format!("{peer} refused connection; retrying in {delay:?}"),
            Self::Error(e) => format!("socket error on {peer}: {e}; reconnecting in {delay:?}"),
            Self::Shutdown => format!("{peer}: shutting down"),
        };
        let level = self.level();
        if level == Level::ERROR {
            error!("{message}");
        } else if level == Level::DEBUG {
            debug!("{message}");
        } else {
            info!("{message}");
        }
    }
}

/// Delays before reconnecting.
///
/// A clean close usually means the TV was switched off, so the wait is
/// long. Errors are more often transient and are retried sooner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub after_close: Duration,
    pub after_error: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            after_close: Duration::from_secs(60),
            after_error: Duration::from_secs(15),
        }
    }
}

impl ReconnectPolicy {
    /// `None` means do not reconnect.
    pub fn delay_for(&self, outcome: &Disconnect) -> Option<Duration> {
        match outcome {
            Disconnect::Closed => Some(self.after_close),
            Disconnect::Refused | Disconnect::Error(_) => Some(self.after_error),
            Disconnect::Shutdown => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn io(kind: ErrorKind) -> std::io::Error {
        std::io::Error::new(kind, "test")
    }

    #[test]
    fn classify_refused() {
        assert!(matches!(
            Disconnect::classify(io(ErrorKind::ConnectionRefused)),
            Disconnect::Refused
        ));
        assert!(matches!(
            Disconnect::classify(io(ErrorKind::TimedOut)),
            Disconnect::Error(_)
        ));
        assert!(matches!(
            Disconnect::classify(io(ErrorKind::ConnectionReset)),
            Disconnect::Error(_)
        ));
    }

    #[test]
    fn close_waits_longer_than_errors() {
        let policy = ReconnectPolicy::default();
        assert_eq!(
            policy.delay_for(&Disconnect::Closed),
            Some(Duration::from_secs(60))
        );
        assert_eq!(
            policy.delay_for(&Disconnect::Error(io(ErrorKind::NotFound))),
            Some(Duration::from_secs(15))
        );
        assert_eq!(
            policy.delay_for(&Disconnect::Refused),
            Some(Duration::from_secs(15))
        );
        assert_eq!(policy.delay_for(&Disconnect::Shutdown), None);
    }

    #[test]
    fn refusals_are_not_errors() {
        assert_eq!(Disconnect::Refused.level(), Level::DEBUG);
        assert_eq!(Disconnect::Error(io(ErrorKind::TimedOut)).level(), Level::ERROR);
        assert_eq!(Disconnect::Closed.level(), Level::INFO);
    }
}
