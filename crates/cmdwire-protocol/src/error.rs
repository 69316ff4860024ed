use crate::arg::Encoding;

/// Errors raised while building or parsing commands.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A frame held nothing but whitespace and a terminator.
    #[error("empty frame")]
    EmptyFrame,

    /// The leading token of a frame is not a base-10 command id.
    #[error("invalid command id in frame {raw:?}")]
    InvalidCommandId { raw: String },

    /// A value cannot be encoded as a command argument.
    #[error("unsupported argument type '{type_name}'{}", mode_suffix(.mode))]
    UnsupportedArgumentType {
        type_name: &'static str,
        mode: Option<Encoding>,
    },

    /// A value of a supported kind has no representation on the wire.
    #[error("{type_name} argument out of range: {value}")]
    ArgumentOutOfRange {
        type_name: &'static str,
        value: String,
    },

    /// A frame grew past the configured limit before its terminator arrived.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// A frame read from a byte stream was not valid UTF-8.
    #[error("frame is not valid UTF-8")]
    InvalidUtf8,

    /// An I/O error surfaced through the async codec.
    #[error("protocol I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn mode_suffix(mode: &Option<Encoding>) -> String {
    match mode {
        Some(mode) => format!(" in {mode} mode"),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_type_message_names_type_and_mode() {
        let err = ProtocolError::UnsupportedArgumentType {
            type_name: "uuid",
            mode: Some(Encoding::Binary),
        };
        assert_eq!(err.to_string(), "unsupported argument type 'uuid' in binary mode");

        let err = ProtocolError::UnsupportedArgumentType {
            type_name: "object",
            mode: None,
        };
        assert_eq!(err.to_string(), "unsupported argument type 'object'");
    }

    #[test]
    fn out_of_range_message_names_value() {
        let err = ProtocolError::ArgumentOutOfRange {
            type_name: "timestamp",
            value: "+40000-01-01 00:00:00 UTC".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "timestamp argument out of range: +40000-01-01 00:00:00 UTC"
        );
    }
}
