//! Incoming commands and their sequential, lenient argument reads.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::arg::{from_file_time, unpack, DeviceVersion};
use crate::error::{ProtocolError, Result};
use crate::escape::{split, strip_terminator, unescape, SplitOptions};
use crate::escape::{COMMAND_SEPARATOR, ESCAPE_CHAR, FIELD_SEPARATOR};

/// A parsed incoming command with a read cursor over its arguments.
///
/// Reads consume arguments left to right. Reading past the last argument, or
/// reading an argument that does not parse as the requested type, yields the
/// type's default value; [`last_read_ok`](Self::last_read_ok) tells the two
/// outcomes apart.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedCommand {
    command_id: i32,
    args: Vec<String>,
    cursor: usize,
    raw: String,
    last_ok: bool,
}

impl ReceivedCommand {
    /// Parse one frame. Leading and trailing whitespace is ignored, as is
    /// anything after the first unescaped terminator.
    pub fn parse(raw: &str, options: SplitOptions) -> Result<Self> {
        let body = strip_terminator(raw.trim(), COMMAND_SEPARATOR, ESCAPE_CHAR);
        if body.trim().is_empty() {
            return Err(ProtocolError::EmptyFrame);
        }

        let mut tokens = split(body, FIELD_SEPARATOR, ESCAPE_CHAR, SplitOptions::KeepEmpty);
        let id_token = tokens.remove(0);
        let command_id =
            id_token
                .trim()
                .parse::<i32>()
                .map_err(|_| ProtocolError::InvalidCommandId {
                    raw: raw.to_string(),
                })?;

        if options == SplitOptions::RemoveEmpty {
            tokens.retain(|token| !token.is_empty());
        }

        Ok(Self {
            command_id,
            args: tokens,
            cursor: 0,
            raw: raw.to_string(),
            last_ok: false,
        })
    }

    pub fn command_id(&self) -> i32 {
        self.command_id
    }

    /// Argument tokens as received, escape pairs included.
    pub fn tokens(&self) -> &[String] {
        &self.args
    }

    /// Arguments not yet consumed.
    pub fn remaining(&self) -> usize {
        self.args.len().saturating_sub(self.cursor)
    }

    /// The frame text this command was parsed from.
    pub fn raw_string(&self) -> &str {
        &self.raw
    }

    /// Whether the most recent read found an argument and parsed it.
    pub fn last_read_ok(&self) -> bool {
        self.last_ok
    }

    /// Move the cursor back to the first argument.
    pub fn rewind(&mut self) {
        self.cursor = 0;
        self.last_ok = false;
    }

    fn next_token(&mut self) -> Option<&str> {
        let token = self.args.get(self.cursor)?;
        self.cursor += 1;
        Some(token.as_str())
    }

    fn read_parsed<T: FromStr + Default>(&mut self) -> T {
        let value = self
            .next_token()
            .and_then(|token| unescape(token).trim().parse().ok());
        self.finish(value)
    }

    fn finish<T: Default>(&mut self, value: Option<T>) -> T {
        self.last_ok = value.is_some();
        value.unwrap_or_default()
    }

    pub fn read_i16(&mut self) -> i16 {
        self.read_parsed()
    }

    pub fn read_u16(&mut self) -> u16 {
        self.read_parsed()
    }

    pub fn read_i32(&mut self) -> i32 {
        self.read_parsed()
    }

    pub fn read_u32(&mut self) -> u32 {
        self.read_parsed()
    }

    pub fn read_i64(&mut self) -> i64 {
        self.read_parsed()
    }

    pub fn read_u64(&mut self) -> u64 {
        self.read_parsed()
    }

    pub fn read_f32(&mut self) -> f32 {
        self.read_parsed()
    }

    pub fn read_f64(&mut self) -> f64 {
        self.read_parsed()
    }

    /// Any non-zero integer is true. `true`/`false` are accepted too.
    pub fn read_bool(&mut self) -> bool {
        let value = self.next_token().and_then(|token| {
            let token = unescape(token);
            let token = token.trim();
            match token.parse::<i64>() {
                Ok(n) => Some(n != 0),
                Err(_) => token.to_ascii_lowercase().parse().ok(),
            }
        });
        self.finish(value)
    }

    /// First character of the argument; `'\0'` when there is none.
    pub fn read_char(&mut self) -> char {
        let value = self
            .next_token()
            .and_then(|token| unescape(token).chars().next());
        self.finish(value)
    }

    /// The unescaped argument text.
    pub fn read_string(&mut self) -> String {
        let value = self.next_token().map(unescape);
        self.finish(value)
    }

    /// A Windows file-time argument. Defaults to the Unix epoch.
    pub fn read_timestamp(&mut self) -> DateTime<Utc> {
        let value = self
            .next_token()
            .and_then(|token| unescape(token).trim().parse::<i64>().ok())
            .and_then(from_file_time);
        self.finish(value)
    }

    /// Defaults to the nil UUID.
    pub fn read_uuid(&mut self) -> Uuid {
        let value = self
            .next_token()
            .and_then(|token| Uuid::parse_str(unescape(token).trim()).ok());
        self.finish(value)
    }

    pub fn read_version(&mut self) -> DeviceVersion {
        self.read_parsed()
    }

    fn read_packed<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self
            .next_token()
            .map(unescape)
            .and_then(|token| unpack(&token))?;
        bytes.try_into().ok()
    }

    pub fn read_bin_i16(&mut self) -> i16 {
        let value = self.read_packed().map(i16::from_le_bytes);
        self.finish(value)
    }

    pub fn read_bin_u16(&mut self) -> u16 {
        let value = self.read_packed().map(u16::from_le_bytes);
        self.finish(value)
    }

    pub fn read_bin_i32(&mut self) -> i32 {
        let value = self.read_packed().map(i32::from_le_bytes);
        self.finish(value)
    }

    pub fn read_bin_u32(&mut self) -> u32 {
        let value = self.read_packed().map(u32::from_le_bytes);
        self.finish(value)
    }

    pub fn read_bin_f32(&mut self) -> f32 {
        let value = self.read_packed().map(f32::from_le_bytes);
        self.finish(value)
    }

    pub fn read_bin_bool(&mut self) -> bool {
        let value = self.read_packed::<1>().map(|[b]| b != 0);
        self.finish(value)
    }

    /// Strings are not packed; same as [`read_string`](Self::read_string).
    pub fn read_bin_string(&mut self) -> String {
        self.read_string()
    }
}
