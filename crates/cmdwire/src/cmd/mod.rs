use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use cmdwire_protocol::{Arg, Command as WireCommand, DEFAULT_MAX_FRAME_LEN};

use crate::exit::{protocol_error, CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod echo;
pub mod encode;
pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encode a command and print its wire text.
    Encode(EncodeArgs),
    /// Frame and parse wire text from stdin or a file.
    Decode(DecodeArgs),
    /// Send a single command over a Unix socket.
    Send(SendArgs),
    /// Listen and print received commands.
    Listen(ListenArgs),
    /// Start an echo server.
    Echo(EchoArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Echo(args) => echo::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Command id and arguments, shared by `encode` and `send`.
#[derive(Args, Debug)]
pub struct CommandSpec {
    /// Numeric command id.
    #[arg(allow_negative_numbers = true)]
    pub id: i32,
    /// Arguments, each sent as an escaped string.
    #[arg(allow_negative_numbers = true, conflicts_with = "json")]
    pub args: Vec<String>,
    /// Arguments as a JSON array (null, bool, number, string).
    #[arg(long, value_name = "ARRAY")]
    pub json: Option<String>,
    /// Pack numeric arguments as little-endian bytes.
    #[arg(long)]
    pub binary: bool,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    #[command(flatten)]
    pub command: CommandSpec,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Read wire text from this file instead of stdin.
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,
    /// Keep empty arguments instead of dropping them.
    #[arg(long)]
    pub keep_empty: bool,
    /// Longest frame accepted, in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_FRAME_LEN)]
    pub max_frame_len: usize,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    #[command(flatten)]
    pub command: CommandSpec,
    /// Wait for one reply command and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for the reply when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// Exit after receiving N commands.
    #[arg(long)]
    pub count: Option<usize>,
    /// Keep empty arguments instead of dropping them.
    #[arg(long)]
    pub keep_empty: bool,
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Socket path to bind.
    pub path: PathBuf,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

impl CommandSpec {
    /// Build the outgoing command described on the command line.
    pub fn build(&self) -> CliResult<WireCommand> {
        let mut command = if self.binary {
            WireCommand::binary(self.id)
        } else {
            WireCommand::new(self.id)
        };

        match &self.json {
            Some(json) => {
                for arg in parse_json_args(json)? {
                    command
                        .push(arg)
                        .map_err(|err| protocol_error("invalid argument", err))?;
                }
            }
            None => {
                for value in &self.args {
                    command
                        .push(value.as_str())
                        .map_err(|err| protocol_error("invalid argument", err))?;
                }
            }
        }
        Ok(command)
    }
}

fn parse_json_args(json: &str) -> CliResult<Vec<Arg>> {
    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|err| CliError::usage(format!("--json is not valid JSON: {err}")))?;
    let serde_json::Value::Array(items) = value else {
        return Err(CliError::usage("--json must be a JSON array"));
    };
    items
        .iter()
        .map(|item| Arg::try_from(item).map_err(|err| protocol_error("invalid argument", err)))
        .collect()
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::usage("duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::usage(format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::usage("duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

pub fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
