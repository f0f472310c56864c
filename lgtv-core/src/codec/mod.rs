//! `tokio_util` codec for the TV's serial protocol.
//!
//! The inbound stream has no length prefix: frames are recognized by their
//! fixed width and the `x` terminator. Anything that does not line up is
//! dropped so that one garbled read cannot desynchronize the stream for
//! good.

use bytes::{Buf, BytesMut};
use tracing::{trace, warn};

use crate::error::LgtvError;
use crate::frame::{CommandFrame, FRAME_LEN, StatusFrame, TERMINATOR};

/// Most bytes kept while waiting for a terminator.
pub const MAX_BUFFERED: usize = 15;

/// Frames [`StatusFrame`]s in and [`CommandFrame`]s out.
#[derive(Debug, Default)]
pub struct LgtvCodec {
    discarded: usize,
}

impl LgtvCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total bytes dropped while resynchronizing.
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    fn discard(&mut self, src: &mut BytesMut, n: usize, reason: &'static str) {
        warn!(
            bytes = ?String::from_utf8_lossy(&src[..n]),
            "discarding {n} buffered bytes: {reason}"
        );
        src.advance(n);
        self.discarded += n;
    }
}

impl tokio_util::codec::Decoder for LgtvCodec {
    type Item = StatusFrame;
    type Error = LgtvError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let window = src.len().min(MAX_BUFFERED);
            match src[..window].iter().position(|&b| b == TERMINATOR) {
                // Terminator too early: the bytes before it cannot be a frame.
                Some(pos) if pos + 1 < FRAME_LEN => {
                    self.discard(src, pos + 1, "short frame");
                }
                Some(pos) => {
                    let start = pos + 1 - FRAME_LEN;
                    if start > 0 {
                        self.discard(src, start, "leading garbage");
                    }
                    let raw = src.split_to(FRAME_LEN);
                    match StatusFrame::parse(&raw) {
                        Ok(frame) => {
                            trace!(%frame, "frame decoded");
                            return Ok(Some(frame));
                        }
                        Err(e) => {
                            self.discarded += FRAME_LEN;
                            warn!(bytes = ?String::from_utf8_lossy(&raw), "malformed frame: {e}");
                        }
                    }
                }
                // Only the overflowed window goes; later bytes may hold a frame.
                None if src.len() > MAX_BUFFERED => {
                    self.discard(src, MAX_BUFFERED + 1, "no terminator");
                }
                None => return Ok(None),
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if !src.is_empty() {
            let n = src.len();
            self.discard(src, n, "connection closed mid-frame");
        }
        Ok(None)
    }
}

impl tokio_util::codec::Encoder<CommandFrame> for LgtvCodec {
    type Error = LgtvError;

    fn encode(&mut self, item: CommandFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&item.to_bytes());
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────
