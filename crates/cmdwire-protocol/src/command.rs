//! Outgoing commands: an id, ordered arguments and an optional ack request.

use std::fmt;
use std::time::Duration;

use crate::arg::{Arg, Encoding};
use crate::error::{ProtocolError, Result};
use crate::escape::{escape, COMMAND_SEPARATOR, FIELD_SEPARATOR};

/// An outgoing command: an id plus ordered arguments and their rendered tokens.
///
/// The encoding is fixed when the command is created. Each argument is
/// rendered as it is added, so an argument the encoding cannot carry is
/// rejected by `push` and a built command always renders in full.
///
/// ```
/// use cmdwire_protocol::Command;
///
/// let cmd = Command::new(7)
///     .arg("IMG=_Panel/LED.png")?
///     .arg(-100)?
///     .arg(true)?;
/// assert_eq!(cmd.to_wire(), "7,IMG=_Panel//LED.png,-100,1;");
/// # Ok::<(), cmdwire_protocol::ProtocolError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    id: i32,
    mode: Encoding,
    pending: Vec<Arg>,
    /// Rendered tokens of `pending`, null arguments omitted.
    tokens: Vec<String>,
    ack: Option<AckRequest>,
}

/// The reply a command expects from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckRequest {
    /// Command id the device answers with.
    pub command_id: i32,
    /// How long the caller is prepared to wait for it.
    pub timeout: Duration,
}

impl Command {
    /// A text-mode command.
    pub fn new(id: i32) -> Self {
        Self::with_mode(id, Encoding::Text)
    }

    /// A binary-mode command.
    pub fn binary(id: i32) -> Self {
        Self::with_mode(id, Encoding::Binary)
    }

    pub fn with_mode(id: i32, mode: Encoding) -> Self {
        Self {
            id,
            mode,
            pending: Vec::new(),
            tokens: Vec::new(),
            ack: None,
        }
    }

    /// A text-mode command with `args` already pushed.
    pub fn with_args<I, A>(id: i32, args: I) -> Result<Self>
    where
        I: IntoIterator<Item = A>,
        A: Into<Arg>,
    {
        let mut cmd = Self::new(id);
        for arg in args {
            cmd.push(arg)?;
        }
        Ok(cmd)
    }

    /// Append an argument.
    pub fn push(&mut self, arg: impl Into<Arg>) -> Result<&mut Self> {
        let arg = arg.into();
        if !arg.supports(self.mode) {
            return Err(ProtocolError::UnsupportedArgumentType {
                type_name: arg.type_name(),
                mode: Some(self.mode),
            });
        }
        if let Some(token) = arg.encode(self.mode)? {
            self.tokens.push(token);
        }
        self.pending.push(arg);
        Ok(self)
    }

    /// By-value form of [`Command::push`] for chaining.
    pub fn arg(mut self, arg: impl Into<Arg>) -> Result<Self> {
        self.push(arg)?;
        Ok(self)
    }

    /// Append a pre-formatted token verbatim. Reserved characters in it are
    /// not escaped.
    pub fn push_raw(&mut self, token: impl Into<String>) -> &mut Self {
        let token = token.into();
        self.tokens.push(token.clone());
        self.pending.push(Arg::Raw(token));
        self
    }

    /// Append each string as an escaped argument.
    pub fn push_all<I, S>(&mut self, values: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for value in values {
            let value = value.into();
            self.tokens.push(escape(&value));
            self.pending.push(Arg::Str(value));
        }
        self
    }

    /// Mark this command as expecting `command_id` back within `timeout`.
    pub fn request_ack(mut self, command_id: i32, timeout: Duration) -> Self {
        self.ack = Some(AckRequest {
            command_id,
            timeout,
        });
        self
    }

    pub fn ack(&self) -> Option<AckRequest> {
        self.ack
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn mode(&self) -> Encoding {
        self.mode
    }

    pub fn args(&self) -> &[Arg] {
        &self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Render the argument tokens in order. Null arguments emit nothing.
    pub fn render(&self) -> Vec<String> {
        self.tokens.clone()
    }

    /// The complete wire text, terminator included.
    pub fn to_wire(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)?;
        for token in &self.tokens {
            write!(f, "{FIELD_SEPARATOR}{token}")?;
        }
        write!(f, "{COMMAND_SEPARATOR}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arg::DeviceVersion;

    #[test]
    fn command_without_args() {
        assert_eq!(Command::new(3).to_wire(), "3;");
        assert!(Command::new(3).render().is_empty());
    }

    #[test]
    fn command_renders_args_in_order() {
        let mut cmd = Command::new(7);
        cmd.push("IMG=_PanelImages/LED_green.png")
            .unwrap()
            .push(2000)
            .unwrap()
            .push(1.5f32)
            .unwrap()
            .push(false)
            .unwrap();

        assert_eq!(
            cmd.render(),
            vec!["IMG=_PanelImages//LED_green.png", "2000", "1.5", "0"]
        );
        assert_eq!(cmd.to_wire(), "7,IMG=_PanelImages//LED_green.png,2000,1.5,0;");
    }

    #[test]
    fn rendering_is_idempotent() {
        let cmd = Command::with_args(12, ["a,b", "c;d"]).unwrap();
        let first = cmd.to_wire();
        assert_eq!(cmd.to_wire(), first);
        assert_eq!(cmd.render(), cmd.render());
        assert_eq!(first, "12,a/,b,c/;d;");
    }

    #[test]
    fn null_arguments_are_skipped() {
        let cmd = Command::new(1)
            .arg(None::<i32>)
            .unwrap()
            .arg(5)
            .unwrap();
        assert_eq!(cmd.to_wire(), "1,5;");
        assert_eq!(cmd.args().len(), 2);
    }

    #[test]
    fn raw_tokens_are_verbatim() {
        let mut cmd = Command::new(4);
        cmd.push_raw("x,y");
        cmd.push_all(["p/q", "r"]);
        assert_eq!(cmd.to_wire(), "4,x,y,p//q,r;");
    }

    #[test]
    fn binary_command_rejects_text_only_kinds() {
        let err = Command::binary(9).arg(DeviceVersion::new(1, 1)).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::UnsupportedArgumentType {
                type_name: "version",
                mode: Some(Encoding::Binary)
            }
        ));

        let err = Command::binary(9).arg(5i64).unwrap_err();
        assert!(err.to_string().contains("binary mode"));
    }

    #[test]
    fn one_mode_per_command() {
        // Mixing is not possible: every argument renders in the command's mode.
        let text = Command::with_mode(9, Encoding::Text).arg(258i32).unwrap();
        let binary = Command::with_mode(9, Encoding::Binary).arg(258i32).unwrap();
        assert_eq!(text.to_wire(), "9,258;");
        assert_eq!(binary.to_wire(), "9,\u{2}\u{1}\u{0}\u{0};");

        let rejected = Command::binary(9).arg(1i32).unwrap().arg('c');
        assert!(rejected.is_err());
    }

    #[test]
    fn binary_command_packs_values() {
        let cmd = Command::binary(2)
            .arg(0x4142i16)
            .unwrap()
            .arg("s")
            .unwrap();
        assert_eq!(cmd.mode(), Encoding::Binary);
        assert_eq!(cmd.to_wire(), "2,BA,s;");
    }

    #[test]
    fn unrepresentable_argument_leaves_command_unchanged() {
        use chrono::{TimeZone, Utc};

        let mut cmd = Command::new(6);
        cmd.push(1).unwrap();
        let far_future = Utc.with_ymd_and_hms(40_000, 1, 1, 0, 0, 0).unwrap();
        let err = cmd.push(far_future).unwrap_err();
        assert!(matches!(err, ProtocolError::ArgumentOutOfRange { .. }));

        let before_epoch = Utc.with_ymd_and_hms(1000, 1, 1, 0, 0, 0).unwrap();
        assert!(Command::new(6).arg(before_epoch).is_err());

        assert_eq!(cmd.args().len(), 1);
        assert_eq!(cmd.to_wire(), "6,1;");
    }

    #[test]
    fn negative_command_ids_render() {
        assert_eq!(Command::new(-5).to_wire(), "-5;");
    }

    #[test]
    fn ack_request_is_recorded() {
        let cmd = Command::new(10).request_ack(11, Duration::from_millis(250));
        assert_eq!(
            cmd.ack(),
            Some(AckRequest {
                command_id: 11,
                timeout: Duration::from_millis(250)
            })
        );
        assert_eq!(cmd.to_wire(), "10;");
    }
}
