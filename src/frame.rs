//! Line framing for the front end's ASCII sample stream.
//!
//! The device transmits one record per line, `"<I>,<II>,<III>"` with a CRLF
//! terminator, interleaved with occasional echo and banner text. Bytes arrive
//! in arbitrary chunk sizes, so the decoder keeps a carry buffer and only
//! acts on complete lines.

use log::debug;

/// One raw three-field record in lead order I, II, III.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawSample {
    pub fields: [String; 3],
}

/// Outcome of decoding one complete digit-bearing line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameEvent {
    /// A line that split into exactly three fields.
    Record(RawSample),
    /// A digit-bearing line that did not split into exactly three fields.
    /// It still consumes one buffer slot, which stays at zero.
    Malformed,
}

/// Incremental decoder over a raw byte stream.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    carry: Vec<u8>,
    skipped_lines: u64,
    malformed_lines: u64,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends freshly read bytes to the carry buffer.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.carry.extend_from_slice(bytes);
    }

    /// Pops the next decodable event, or `None` when no complete line is
    /// buffered yet. Lines without a single decimal digit (echoes, banners)
    /// are dropped here and never surface.
    pub fn next_event(&mut self) -> Option<FrameEvent> {
        while let Some(pos) = self.carry.iter().position(|&byte| byte == b'\n') {
            let line: Vec<u8> = self.carry.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line);
            let text = text.trim();
            if !text.bytes().any(|byte| byte.is_ascii_digit()) {
                self.skipped_lines += 1;
                debug!("skipping digitless line {text:?}");
                continue;
            }
            let fields: Vec<&str> = text.split(',').collect();
            if fields.len() != 3 {
                self.malformed_lines += 1;
                return Some(FrameEvent::Malformed);
            }
            return Some(FrameEvent::Record(RawSample {
                fields: [
                    fields[0].to_owned(),
                    fields[1].to_owned(),
                    fields[2].to_owned(),
                ],
            }));
        }
        None
    }

    /// Drops any buffered bytes, e.g. when resetting after a settle period.
    pub fn clear(&mut self) {
        self.carry.clear();
    }

    /// Digitless lines dropped so far.
    pub fn skipped_lines(&self) -> u64 {
        self.skipped_lines
    }

    /// Digit-bearing lines that failed to split into three fields.
    pub fn malformed_lines(&self) -> u64 {
        self.malformed_lines
    }
}
