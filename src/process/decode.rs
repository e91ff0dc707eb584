// src/process/decode.rs

//! Turning raw pipe reads into publishable text.
//!
//! Whatever a read returns is published straight away, except for a tail
//! that cannot be handled yet: a UTF-8 sequence split across reads, or an
//! escape sequence whose terminator has not arrived. That tail is prepended
//! to the next read.

use crate::scrub::pending_escape_start;

/// Longest unterminated escape sequence held back before it is published
/// as-is.
const MAX_HELD_ESCAPE: usize = 4096;

#[derive(Debug, Default)]
pub(crate) struct ChunkDecoder {
    pending: Vec<u8>,
}

impl ChunkDecoder {
    /// Append freshly read bytes and return the text that can be published
    /// now, if any.
    pub(crate) fn feed(&mut self, bytes: &[u8]) -> Option<String> {
        self.pending.extend_from_slice(bytes);

        let cut = self.pending.len() - incomplete_utf8_tail(&self.pending);
        let mut text = String::from_utf8_lossy(&self.pending[..cut]).into_owned();

        let keep_from = match pending_escape_start(&text) {
            Some(start) if text.len() - start <= MAX_HELD_ESCAPE => start,
            _ => text.len(),
        };

        let mut held = text.as_bytes()[keep_from..].to_vec();
        held.extend_from_slice(&self.pending[cut..]);
        self.pending = held;

        text.truncate(keep_from);
        (!text.is_empty()).then_some(text)
    }

    /// Flush everything still held back. Called at EOF.
    pub(crate) fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        (!rest.is_empty()).then(|| String::from_utf8_lossy(&rest).into_owned())
    }
}

/// Number of trailing bytes that start a UTF-8 sequence the buffer does not
/// yet hold completely.
fn incomplete_utf8_tail(bytes: &[u8]) -> usize {
    for back in 1..=bytes.len().min(3) {
        let byte = bytes[bytes.len() - back];
        if byte & 0xC0 == 0x80 {
            continue;
        }
        let needed = match byte {
            0xF0..=0xF7 => 4,
            0xE0..=0xEF => 3,
            0xC0..=0xDF => 2,
            _ => 1,
        };
        return if needed > back { back } else { 0 };
    }
    0
}
