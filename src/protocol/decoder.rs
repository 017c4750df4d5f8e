//! # Line Decoder
//!
//! Reassembles lines from arbitrarily split serial reads and classifies them.

use bytes::{Buf, BytesMut};
use tracing::trace;

use super::frame::*;

/// Incremental decoder with a private carry-over buffer
///
/// Bytes after the last `\n` are kept until a later `feed` terminates them,
/// so the decoded frames do not depend on where the reads were split.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: BytesMut,
    heartbeat_marker: String,
    /// Set while dropping the tail of an oversized line
    discarding: bool,
    skipped: u64,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(HEARTBEAT_MARKER)
    }
}

impl FrameDecoder {
    pub fn new(heartbeat_marker: impl Into<String>) -> Self {
        Self {
            buf: BytesMut::with_capacity(MAX_LINE_LEN),
            heartbeat_marker: heartbeat_marker.into(),
            discarding: false,
            skipped: 0,
        }
    }

    /// Feed raw bytes and return every frame completed by them, in order.
    ///
    /// Unrecognized and malformed lines are dropped and only counted.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Frame> {
        self.buf.extend_from_slice(bytes);
        let mut frames = Vec::new();

        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line = self.buf.split_to(pos + 1);

            if self.discarding {
                self.discarding = false;
                continue;
            }

            match self.classify(&line[..pos]) {
                Some(frame) => frames.push(frame),
                None => {
                    self.skipped += 1;
                    trace!("Skipped line: {:?}", String::from_utf8_lossy(&line[..pos]));
                }
            }
        }

        if self.buf.len() > MAX_LINE_LEN {
            trace!("Discarding {} unterminated bytes", self.buf.len());
            if !self.discarding {
                self.skipped += 1;
            }
            self.buf.advance(self.buf.len());
            self.discarding = true;
        }

        frames
    }

    fn classify(&self, raw: &[u8]) -> Option<Frame> {
        if raw.len() > MAX_LINE_LEN {
            return None;
        }
        let text = std::str::from_utf8(raw).ok()?;
        classify_line(text, &self.heartbeat_marker)
    }

    /// Number of lines dropped since creation
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Bytes waiting for a terminator
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Forget any partial line, e.g. after the link was reopened
    pub fn reset(&mut self) {
        self.buf.clear();
        self.discarding = false;
    }
}
