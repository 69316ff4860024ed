use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use cmdwire_protocol::{unescape, Command, ProtocolError, ReceivedCommand};
use cmdwire_transport::BinaryBlob;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct ReceivedOutput<'a> {
    command_id: i32,
    args: Vec<String>,
    raw: &'a str,
}

#[derive(Serialize)]
struct EncodedOutput<'a> {
    command_id: i32,
    mode: String,
    tokens: Vec<String>,
    wire: &'a str,
}

#[derive(Serialize)]
struct FrameErrorOutput<'a> {
    error: String,
    raw: &'a str,
}

#[derive(Serialize)]
struct BlobOutput {
    tag: i32,
    size: usize,
}

fn json_line<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}

fn single_row_table(header: Vec<&str>, row: Vec<String>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header)
        .add_row(row);
    table
}

/// Unescaped argument values of a received command.
pub fn unescaped_args(command: &ReceivedCommand) -> Vec<String> {
    command.tokens().iter().map(|token| unescape(token)).collect()
}

pub fn print_received(command: &ReceivedCommand, format: OutputFormat) {
    let raw = command.raw_string().trim();
    let args = unescaped_args(command);
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                json_line(&ReceivedOutput {
                    command_id: command.command_id(),
                    args,
                    raw,
                })
            );
        }
        OutputFormat::Table => {
            let table = single_row_table(
                vec!["ID", "ARGS", "RAW"],
                vec![command.command_id().to_string(), args.join("\n"), raw.to_string()],
            );
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "command={} args={:?} raw={}",
                command.command_id(),
                args,
                raw
            );
        }
        OutputFormat::Raw => println!("{raw}"),
    }
}

pub fn print_encoded(command: &Command, format: OutputFormat) {
    let wire = command.to_wire();
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                json_line(&EncodedOutput {
                    command_id: command.id(),
                    mode: command.mode().to_string(),
                    tokens: command.render(),
                    wire: &wire,
                })
            );
        }
        OutputFormat::Table => {
            let table = single_row_table(
                vec!["ID", "MODE", "WIRE"],
                vec![command.id().to_string(), command.mode().to_string(), wire],
            );
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "command={} mode={} tokens={:?} wire={}",
                command.id(),
                command.mode(),
                command.render(),
                wire
            );
        }
        OutputFormat::Raw => println!("{wire}"),
    }
}

pub fn print_frame_error(raw: &str, err: &ProtocolError, format: OutputFormat) {
    let raw = raw.trim();
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                json_line(&FrameErrorOutput {
                    error: err.to_string(),
                    raw,
                })
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => println!("error={err} raw={raw}"),
        OutputFormat::Raw => eprintln!("{err}: {raw}"),
    }
}

pub fn print_blob(blob: &BinaryBlob, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                json_line(&BlobOutput {
                    tag: blob.tag,
                    size: blob.payload.len(),
                })
            );
        }
        OutputFormat::Table => {
            let table = single_row_table(
                vec!["TAG", "SIZE"],
                vec![blob.tag.to_string(), blob.payload.len().to_string()],
            );
            println!("{table}");
        }
        OutputFormat::Pretty => println!("blob tag={} size={}", blob.tag, blob.payload.len()),
        OutputFormat::Raw => print_raw(&blob.payload),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}
