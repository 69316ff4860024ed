//! Reassembly of command frames from arbitrarily split text chunks.
//!
//! Input is scanned for unescaped terminators; an escape character at the end
//! of a chunk stays buffered until the next chunk shows what it escapes.

use std::fmt;

use tracing::{trace, warn};

use crate::error::Result;
use crate::escape::{scan_for_terminator, Scan, SplitOptions};
use crate::received::ReceivedCommand;

/// Default upper bound for one frame, terminator included: 64 KiB.
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024;

/// Configuration for [`StreamFramer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramerConfig {
    /// Longest frame accepted, in bytes. Default: 64 KiB.
    pub max_frame_len: usize,
    /// How empty tokens are treated when frames are parsed.
    pub empty_tokens: SplitOptions,
}

impl Default for FramerConfig {
    fn default() -> Self {
        Self {
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            empty_tokens: SplitOptions::RemoveEmpty,
        }
    }
}

impl FramerConfig {
    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    pub fn keep_empty_tokens(mut self, keep: bool) -> Self {
        self.empty_tokens = if keep {
            SplitOptions::KeepEmpty
        } else {
            SplitOptions::RemoveEmpty
        };
        self
    }
}

/// One complete command as it arrived, terminator included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame(String);

impl RawFrame {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Split into command id and argument tokens.
    pub fn parse(&self, options: SplitOptions) -> Result<ReceivedCommand> {
        ReceivedCommand::parse(&self.0, options)
    }
}

impl fmt::Display for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RawFrame {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Reassembles complete frames from arbitrarily chunked text.
///
/// Text after the last terminator is carried over to the next [`feed`]. A
/// frame longer than [`FramerConfig::max_frame_len`] is dropped and counted;
/// the framer resynchronises at the next unescaped terminator.
///
/// [`feed`]: StreamFramer::feed
#[derive(Debug, Default)]
pub struct StreamFramer {
    carry: String,
    // Bytes of `carry` already scanned without finding a terminator.
    scanned: usize,
    discarding: bool,
    overflows: u64,
    config: FramerConfig,
}

impl StreamFramer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FramerConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Append `chunk` and return every frame it completed, in arrival order.
    pub fn feed(&mut self, chunk: &str) -> Vec<RawFrame> {
        self.carry.push_str(chunk);

        let max = self.config.max_frame_len;
        let mut frames = Vec::new();
        let mut start = 0;
        let mut pos = self.scanned;

        loop {
            match scan_for_terminator(self.carry.as_bytes(), pos) {
                Scan::Terminator(end) => {
                    let len = end + 1 - start;
                    if self.discarding {
                        self.discarding = false;
                    } else if len > max {
                        self.overflow(len);
                    } else {
                        frames.push(RawFrame(self.carry[start..=end].to_string()));
                    }
                    start = end + 1;
                    pos = start;
                }
                Scan::Incomplete { resume } => {
                    let partial = self.carry.len() - start;
                    if !self.discarding && partial > max {
                        self.overflow(partial);
                        self.discarding = true;
                    }
                    if self.discarding {
                        // Keep a dangling escape marker so the next chunk's
                        // first character is still read as escaped.
                        start = resume;
                    }
                    self.carry.drain(..start);
                    self.scanned = resume - start;
                    break;
                }
            }
        }

        if !frames.is_empty() {
            trace!(frames = frames.len(), pending = self.carry.len(), "framed chunk");
        }
        frames
    }

    fn overflow(&mut self, size: usize) {
        self.overflows += 1;
        warn!(
            size,
            max = self.config.max_frame_len,
            "frame exceeds maximum length, discarding"
        );
    }

    /// Text received after the last complete frame.
    pub fn pending(&self) -> &str {
        &self.carry
    }

    /// Drop any buffered partial frame.
    pub fn clear(&mut self) {
        self.carry.clear();
        self.scanned = 0;
        self.discarding = false;
    }

    /// Number of frames dropped for exceeding the length limit.
    pub fn overflows(&self) -> u64 {
        self.overflows
    }

    pub fn config(&self) -> &FramerConfig {
        &self.config
    }
}
