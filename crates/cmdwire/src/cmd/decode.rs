use std::io::Read;

use cmdwire_protocol::{FramerConfig, StreamFramer};

use crate::cmd::DecodeArgs;
use crate::exit::{io_error, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_frame_error, print_received, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let input = read_input(&args)?;
    let config = FramerConfig::default()
        .with_max_frame_len(args.max_frame_len)
        .keep_empty_tokens(args.keep_empty);

    let summary = decode_text(&input, config, format);
    tracing::debug!(
        frames = summary.frames,
        errors = summary.errors,
        "decode finished"
    );

    if summary.errors > 0 {
        Ok(DATA_INVALID)
    } else {
        Ok(SUCCESS)
    }
}

fn read_input(args: &DecodeArgs) -> CliResult<String> {
    match &args.file {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err)),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .map_err(|err| io_error("failed reading stdin", err))?;
            Ok(text)
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct DecodeSummary {
    frames: usize,
    errors: usize,
}

fn decode_text(input: &str, config: FramerConfig, format: OutputFormat) -> DecodeSummary {
    let mut framer = StreamFramer::with_config(config);
    let mut summary = DecodeSummary::default();

    for frame in framer.feed(input) {
        summary.frames += 1;
        match frame.parse(config.empty_tokens) {
            Ok(command) => print_received(&command, format),
            Err(err) => {
                summary.errors += 1;
                print_frame_error(frame.as_str(), &err, format);
            }
        }
    }

    summary.errors += framer.overflows() as usize;
    if !framer.pending().trim().is_empty() {
        tracing::warn!(pending = framer.pending(), "input ends inside an unterminated command");
        summary.errors += 1;
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_frames_and_errors() {
        let summary = decode_text(
            "1,a/;b;\nx,2;7;",
            FramerConfig::default(),
            OutputFormat::Json,
        );
        assert_eq!(
            summary,
            DecodeSummary {
                frames: 3,
                errors: 1
            }
        );
    }

    #[test]
    fn trailing_partial_is_an_error() {
        let summary = decode_text("1;2,3", FramerConfig::default(), OutputFormat::Raw);
        assert_eq!(summary.frames, 1);
        assert_eq!(summary.errors, 1);

        let summary = decode_text("1;\n", FramerConfig::default(), OutputFormat::Raw);
        assert_eq!(summary.errors, 0);
    }

    #[test]
    fn oversized_frames_are_errors() {
        let config = FramerConfig::default().with_max_frame_len(4);
        let summary = decode_text("1,23456;1;", config, OutputFormat::Raw);
        assert_eq!(summary.frames, 1);
        assert_eq!(summary.errors, 1);
    }
}
