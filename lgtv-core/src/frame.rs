//! Wire frames exchanged with the TV.
//!
//! Outbound commands are CR/LF terminated text lines:
//!
//! ```text
//! ka 00 01\r\n
//! ││ ││ └┴── value code (2 hex digits)
//! ││ └┴───── set id ("00" addresses every set)
//! └┴──────── command code
//! ```
//!
//! Inbound status replies are fixed 10-byte frames with no length prefix:
//!
//! ```text
//! a 01 OK01x
//! │ ││ ││││└─ terminator
//! │ ││ ││└┴── value code
//! │ ││ └┴──── "OK" or "NG"
//! │ └┴─────── set id
//! └────────── command character (second character of the command code)
//! ```

use std::fmt;

use crate::error::LgtvError;

/// Length of an inbound status frame.
pub const FRAME_LEN: usize = 10;

/// Last byte of every inbound status frame.
pub const TERMINATOR: u8 = b'x';

/// Ack field of an accepted command.
pub const ACK_OK: &str = "OK";

/// Value the TV reports alongside `NG` for an unknown command code.
pub const ILLEGAL_CODE: &str = "00";

// ── CommandFrame ─────────────────────────────────────────────────

/// An outbound command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame {
    command: String,
    set_id: u8,
    value: String,
}

impl CommandFrame {
    /// Build a frame from a command code and a two-digit value code.
    pub fn new(command: impl Into<String>, set_id: u8, value: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            set_id,
            value: value.into(),
        }
    }

    /// Build a frame carrying a linear integer value.
    pub fn ranged(command: impl Into<String>, set_id: u8, value: u8) -> Self {
        Self::new(command, set_id, format!("{value:02x}"))
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn set_id(&self) -> u8 {
        self.set_id
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// The character the TV echoes back in its reply.
    pub fn wire(&self) -> Option<char> {
        self.command.chars().nth(1)
    }

    /// Serialized bytes, terminator included.
    pub fn to_bytes(&self) -> Vec<u8> {
        format!("{self}\r\n").into_bytes()
    }
}

impl fmt::Display for CommandFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:02x} {}", self.command, self.set_id, self.value)
    }
}

// ── StatusFrame ──────────────────────────────────────────────────

/// A decoded inbound reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusFrame {
    command: char,
    set_id: String,
    ack: bool,
    value: String,
}

impl StatusFrame {
    pub fn new(command: char, set_id: impl Into<String>, ack: bool, value: impl Into<String>) -> Self {
        Self {
            command,
            set_id: set_id.into(),
            ack,
            value: value.into(),
        }
    }

    /// Parse exactly [`FRAME_LEN`] bytes ending in [`TERMINATOR`].
    pub fn parse(bytes: &[u8]) -> Result<Self, LgtvError> {
        if bytes.len() != FRAME_LEN {
            return Err(LgtvError::InvalidFrame("wrong length"));
        }
        if bytes[FRAME_LEN - 1] != TERMINATOR {
            return Err(LgtvError::InvalidFrame("missing terminator"));
        }
        if !bytes.is_ascii() {
            return Err(LgtvError::InvalidFrame("non-ascii bytes"));
        }
        let text = std::str::from_utf8(bytes).map_err(|_| LgtvError::InvalidFrame("non-ascii bytes"))?;

        Ok(Self {
            command: bytes[0] as char,
            set_id: text[2..4].to_string(),
            ack: &text[5..7] == ACK_OK,
            value: text[7..9].to_ascii_lowercase(),
        })
    }

    /// The command character, e.g. `a` for power.
    pub fn command(&self) -> char {
        self.command
    }

    pub fn set_id(&self) -> &str {
        &self.set_id
    }

    pub fn ack(&self) -> bool {
        self.ack
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// `NG` with value `00`: the TV did not recognize the command code.
    pub fn is_illegal_code(&self) -> bool {
        !self.ack && self.value == ILLEGAL_CODE
    }

    /// Serialize the way the TV does. Used by simulators and tests.
    pub fn to_bytes(&self) -> Vec<u8> {
        let ack = if self.ack { ACK_OK } else { "NG" };
        format!("{} {} {}{}x", self.command, self.set_id, ack, self.value).into_bytes()
    }
}

impl fmt::Display for StatusFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ack = if self.ack { ACK_OK } else { "NG" };
        write!(f, "{} {} {}{}", self.command, self.set_id, ack, self.value)
    }
}

// ── Tests ────────────────────────────────────────────────────────
