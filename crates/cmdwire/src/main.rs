mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "cmdwire", version, about = "Delimited command protocol CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "info",
        env = "CMDWIRE_LOG_LEVEL",
        global = true
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_send_with_negative_argument() {
        let cli = Cli::try_parse_from([
            "cmdwire",
            "send",
            "/tmp/test.sock",
            "7",
            "LED",
            "-100",
            "--wait",
        ])
        .expect("send args should parse");

        let Command::Send(args) = cli.command else {
            panic!("expected send subcommand");
        };
        assert_eq!(args.command.id, 7);
        assert_eq!(args.command.args, vec!["LED", "-100"]);
        assert!(args.wait);
    }

    #[test]
    fn parses_negative_command_id() {
        let cli = Cli::try_parse_from(["cmdwire", "encode", "-3"]).expect("encode should parse");
        let Command::Encode(args) = cli.command else {
            panic!("expected encode subcommand");
        };
        assert_eq!(args.command.id, -3);
    }

    #[test]
    fn rejects_conflicting_argument_sources() {
        let err = Cli::try_parse_from(["cmdwire", "encode", "7", "a", "--json", "[1]"])
            .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "cmdwire",
            "decode",
            "--keep-empty",
            "--format",
            "json",
            "--log-level",
            "warn",
        ])
        .expect("decode args should parse");
        assert!(matches!(cli.command, Command::Decode(_)));
        assert_eq!(cli.format, Some(OutputFormat::Json));
        assert_eq!(cli.log_level, LogLevel::Warn);
    }
}
