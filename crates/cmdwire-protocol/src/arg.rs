//! Typed argument values and their wire rendering.
//!
//! Every supported argument kind is one [`Arg`] variant. A command picks an
//! [`Encoding`] once; each argument is rendered in that encoding.
//!
//! Text encoding renders culture-invariant decimal text. Binary encoding packs
//! fixed-width values as little-endian bytes, one character (U+0000..U+00FF)
//! per byte, escaped like any other text.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{ProtocolError, Result};
use crate::escape::escape;

/// Seconds between 1601-01-01 and 1970-01-01, the Windows file-time epoch
/// offset.
const FILETIME_UNIX_OFFSET_SECS: i64 = 11_644_473_600;
const FILETIME_TICKS_PER_SEC: i64 = 10_000_000;

/// How a command renders its arguments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Encoding {
    /// Human-readable decimal text.
    #[default]
    Text,
    /// Packed little-endian bytes for fixed-width values.
    Binary,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Text => f.write_str("text"),
            Encoding::Binary => f.write_str("binary"),
        }
    }
}

/// One command argument, recorded as given and rendered when the command is
/// turned into wire text.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// Produces no token.
    Null,
    Bool(bool),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    /// Narrowed to `f32` when rendered.
    F64(f64),
    Char(char),
    Str(String),
    /// Rendered as a Windows file time (100 ns ticks since 1601-01-01 UTC).
    Timestamp(DateTime<Utc>),
    Uuid(Uuid),
    Version(DeviceVersion),
    /// Pre-formatted token, emitted verbatim. The caller is responsible for
    /// escaping.
    Raw(String),
}

impl Arg {
    pub fn type_name(&self) -> &'static str {
        match self {
            Arg::Null => "null",
            Arg::Bool(_) => "bool",
            Arg::I16(_) => "i16",
            Arg::U16(_) => "u16",
            Arg::I32(_) => "i32",
            Arg::U32(_) => "u32",
            Arg::I64(_) => "i64",
            Arg::U64(_) => "u64",
            Arg::F32(_) => "f32",
            Arg::F64(_) => "f64",
            Arg::Char(_) => "char",
            Arg::Str(_) => "string",
            Arg::Timestamp(_) => "timestamp",
            Arg::Uuid(_) => "uuid",
            Arg::Version(_) => "version",
            Arg::Raw(_) => "raw",
        }
    }

    /// Whether this argument can be rendered in `encoding`.
    pub fn supports(&self, encoding: Encoding) -> bool {
        match encoding {
            Encoding::Text => true,
            Encoding::Binary => !matches!(
                self,
                Arg::I64(_)
                    | Arg::U64(_)
                    | Arg::Char(_)
                    | Arg::Timestamp(_)
                    | Arg::Uuid(_)
                    | Arg::Version(_)
            ),
        }
    }

    /// Render to a wire token. `Ok(None)` means the argument emits nothing.
    pub fn encode(&self, encoding: Encoding) -> Result<Option<String>> {
        match encoding {
            Encoding::Text => self.encode_text(),
            Encoding::Binary => self.encode_binary(),
        }
    }

    fn encode_text(&self) -> Result<Option<String>> {
        let token = match self {
            Arg::Null => return Ok(None),
            Arg::Bool(v) => bool_token(*v).to_string(),
            Arg::I16(v) => v.to_string(),
            Arg::U16(v) => v.to_string(),
            Arg::I32(v) => v.to_string(),
            Arg::U32(v) => v.to_string(),
            Arg::I64(v) => v.to_string(),
            Arg::U64(v) => v.to_string(),
            Arg::F32(v) => format_float(*v),
            Arg::F64(v) => format_float(*v as f32),
            Arg::Char(c) => escape(c.encode_utf8(&mut [0u8; 4])),
            Arg::Str(s) => escape(s),
            Arg::Timestamp(ts) => to_file_time(ts)
                .ok_or_else(|| ProtocolError::ArgumentOutOfRange {
                    type_name: self.type_name(),
                    value: ts.to_string(),
                })?
                .to_string(),
            Arg::Uuid(id) => escape(&id.hyphenated().to_string()),
            Arg::Version(v) => escape(&v.to_string()),
            Arg::Raw(token) => token.clone(),
        };
        Ok(Some(token))
    }

    fn encode_binary(&self) -> Result<Option<String>> {
        let token = match self {
            Arg::Null => return Ok(None),
            Arg::Bool(v) => pack(&[u8::from(*v)]),
            Arg::I16(v) => pack(&v.to_le_bytes()),
            Arg::U16(v) => pack(&v.to_le_bytes()),
            Arg::I32(v) => pack(&v.to_le_bytes()),
            Arg::U32(v) => pack(&v.to_le_bytes()),
            Arg::F32(v) => pack(&v.to_le_bytes()),
            Arg::F64(v) => pack(&(*v as f32).to_le_bytes()),
            Arg::Str(s) => escape(s),
            Arg::Raw(token) => token.clone(),
            other => {
                return Err(ProtocolError::UnsupportedArgumentType {
                    type_name: other.type_name(),
                    mode: Some(Encoding::Binary),
                })
            }
        };
        Ok(Some(token))
    }
}

fn bool_token(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

/// Shortest decimal text that parses back to the same `f32` bit pattern.
pub(crate) fn format_float(value: f32) -> String {
    value.to_string()
}

/// Pack bytes one character per byte, then escape reserved characters.
pub(crate) fn pack(bytes: &[u8]) -> String {
    let latin1: String = bytes.iter().copied().map(char::from).collect();
    escape(&latin1)
}

/// Inverse of [`pack`] applied to an already unescaped token. Fails if any
/// character lies outside U+0000..U+00FF.
pub(crate) fn unpack(value: &str) -> Option<Vec<u8>> {
    value.chars().map(|c| u8::try_from(c).ok()).collect()
}

/// 100 ns ticks since 1601-01-01 UTC. `None` before 1601 or when the tick
/// count does not fit in an `i64` (after year 30828).
pub fn to_file_time(ts: &DateTime<Utc>) -> Option<i64> {
    let ticks = ts
        .timestamp()
        .checked_add(FILETIME_UNIX_OFFSET_SECS)?
        .checked_mul(FILETIME_TICKS_PER_SEC)?
        .checked_add(i64::from(ts.timestamp_subsec_nanos() / 100))?;
    (ticks >= 0).then_some(ticks)
}

/// Inverse of [`to_file_time`]. `None` when the tick count is out of range.
pub fn from_file_time(ticks: i64) -> Option<DateTime<Utc>> {
    let secs = ticks.div_euclid(FILETIME_TICKS_PER_SEC) - FILETIME_UNIX_OFFSET_SECS;
    let nanos = (ticks.rem_euclid(FILETIME_TICKS_PER_SEC) * 100) as u32;
    DateTime::from_timestamp(secs, nanos)
}

/// A dotted `major.minor[.build[.revision]]` version, as devices report their
/// firmware and layout revisions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceVersion {
    pub major: u32,
    pub minor: u32,
    pub build: Option<u32>,
    pub revision: Option<u32>,
}

impl DeviceVersion {
    pub fn new(major: u32, minor: u32) -> Self {
        Self {
            major,
            minor,
            build: None,
            revision: None,
        }
    }

    pub fn with_build(mut self, build: u32) -> Self {
        self.build = Some(build);
        self
    }

    /// Set the revision. A revision implies a build; a missing build becomes 0.
    pub fn with_revision(mut self, revision: u32) -> Self {
        self.build = Some(self.build.unwrap_or(0));
        self.revision = Some(revision);
        self
    }
}

impl fmt::Display for DeviceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)?;
        if let Some(build) = self.build {
            write!(f, ".{build}")?;
            if let Some(revision) = self.revision {
                write!(f, ".{revision}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for DeviceVersion {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut parts = s.trim().split('.');
        let major = parts.next().unwrap_or_default().parse()?;
        let minor = parts.next().unwrap_or("0").parse()?;
        let build = parts.next().map(str::parse).transpose()?;
        let revision = parts.next().map(str::parse).transpose()?;
        Ok(Self {
            major,
            minor,
            build,
            revision,
        })
    }
}

macro_rules! arg_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Arg {
                fn from(value: $ty) -> Self {
                    Arg::$variant(value)
                }
            }
        )*
    };
}

arg_from! {
    bool => Bool,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    char => Char,
    String => Str,
    DateTime<Utc> => Timestamp,
    Uuid => Uuid,
    DeviceVersion => Version,
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Str(value.to_string())
    }
}

impl From<&String> for Arg {
    fn from(value: &String) -> Self {
        Arg::Str(value.clone())
    }
}

impl<T: Into<Arg>> From<Option<T>> for Arg {
    fn from(value: Option<T>) -> Self {
        value.map_or(Arg::Null, Into::into)
    }
}

impl TryFrom<&serde_json::Value> for Arg {
    type Error = ProtocolError;

    fn try_from(value: &serde_json::Value) -> Result<Self> {
        use serde_json::Value;

        match value {
            Value::Null => Ok(Arg::Null),
            Value::Bool(v) => Ok(Arg::Bool(*v)),
            Value::Number(n) => {
                if let Some(v) = n.as_i64() {
                    Ok(i32::try_from(v).map_or(Arg::I64(v), Arg::I32))
                } else if let Some(v) = n.as_u64() {
                    Ok(Arg::U64(v))
                } else {
                    Ok(Arg::F64(n.as_f64().unwrap_or_default()))
                }
            }
            Value::String(s) => Ok(Arg::Str(s.clone())),
            Value::Array(_) => Err(ProtocolError::UnsupportedArgumentType {
                type_name: "array",
                mode: None,
            }),
            Value::Object(_) => Err(ProtocolError::UnsupportedArgumentType {
                type_name: "object",
                mode: None,
            }),
        }
    }
}
