//! Domain-specific error types for the LG TV bridge.
//!
//! All fallible operations return `Result<T, LgtvError>`.
//! Only catalog loading is fatal; everything else is logged and the
//! session carries on with its reconnect/poll cycle.

use thiserror::Error;

/// The canonical error type for the bridge core.
#[derive(Debug, Error)]
pub enum LgtvError {
    // ── Catalog Errors ───────────────────────────────────────────
    /// The command table is malformed (duplicates, bad codes, ...).
    #[error("invalid catalog: {0}")]
    Catalog(String),

    /// No command with the given name, code or wire character.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// The command exists but the value does not map to any ValueSpec.
    #[error("unknown value {value:?} for command {command}")]
    UnknownValue { command: String, value: String },

    /// No remote key with the given name or code.
    #[error("unknown remote key: {0}")]
    UnknownRemoteKey(String),

    // ── Protocol Errors ──────────────────────────────────────────
    /// A frame could not be parsed.
    #[error("invalid frame: {0}")]
    InvalidFrame(&'static str),

    /// An operation was attempted in the wrong connection phase.
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),

    // ── Connection Errors ────────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// An mpsc channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    // ── Serialization Errors ─────────────────────────────────────
    /// The catalog document could not be parsed.
    #[error("encoding error: {0}")]
    Encoding(String),
}

// ── Convenient From implementations ──────────────────────────────

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for LgtvError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        LgtvError::ChannelClosed
    }
}

impl From<serde_json::Error> for LgtvError {
    fn from(e: serde_json::Error) -> Self {
        LgtvError::Encoding(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = LgtvError::UnknownValue {
            command: "power".into(),
            value: "7f".into(),
        };
        assert!(e.to_string().contains("power"));
        assert!(e.to_string().contains("7f"));

        let e = LgtvError::Catalog("duplicate code ka".into());
        assert!(e.to_string().contains("duplicate code ka"));
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broke");
        let e: LgtvError = io_err.into();
        assert!(matches!(e, LgtvError::Connection(_)));
    }

    #[test]
    fn from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let e: LgtvError = json_err.into();
        assert!(matches!(e, LgtvError::Encoding(_)));
    }
}
