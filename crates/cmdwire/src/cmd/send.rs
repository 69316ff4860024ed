use std::sync::Arc;

use cmdwire_protocol::{ReceivedCommand, StreamFramer};
use cmdwire_session::{connect_with_config, Dispatcher, SessionConfig};
use cmdwire_transport::{EnvelopeConfig, Message, MessageSource};

use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{protocol_error, session_error, transport_error, CliResult, SUCCESS};
use crate::output::{print_received, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let command = args.command.build()?;

    let config = SessionConfig {
        envelope: EnvelopeConfig {
            read_timeout: Some(wait_timeout),
            write_timeout: Some(wait_timeout),
            ..EnvelopeConfig::default()
        },
        ..SessionConfig::default()
    };
    let conn = connect_with_config(&args.path, Arc::new(Dispatcher::new()), config)
        .map_err(|err| session_error("connect failed", err))?;

    conn.session
        .outbound()
        .send(&command)
        .map_err(|err| session_error("send failed", err))?;

    if args.wait {
        let (session, mut source) = conn.into_parts();
        let mut framer = StreamFramer::with_config(session.config().framer);
        let reply = wait_for_reply(&mut source, &mut framer)?;
        print_received(&reply, format);
    }

    Ok(SUCCESS)
}

/// Read messages until one complete command arrives. Binary blobs are
/// skipped.
fn wait_for_reply<S: MessageSource>(
    source: &mut S,
    framer: &mut StreamFramer,
) -> CliResult<ReceivedCommand> {
    loop {
        let message = source
            .recv()
            .map_err(|err| transport_error("receive failed", err))?;
        let Message::Text(text) = message else {
            tracing::debug!("ignoring binary message while waiting for reply");
            continue;
        };
        if let Some(frame) = framer.feed(&text).into_iter().next() {
            return frame
                .parse(framer.config().empty_tokens)
                .map_err(|err| protocol_error("invalid reply", err));
        }
    }
}
