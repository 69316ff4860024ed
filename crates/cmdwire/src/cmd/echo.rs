use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cmdwire_protocol::ReceivedCommand;
use cmdwire_session::{Connection, Dispatcher, Outbound, SessionListener};

use crate::cmd::{install_ctrlc_handler, EchoArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::OutputFormat;

pub fn run(args: EchoArgs, _format: OutputFormat) -> CliResult<i32> {
    let listener = SessionListener::bind(&args.path, Arc::new(echo_dispatcher()))
        .map_err(|err| session_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    while running.load(Ordering::SeqCst) {
        let Connection { session, source } = listener
            .accept()
            .map_err(|err| session_error("accept failed", err))?;
        let id = session.id().to_string();
        let session = session.with_binary_handler(|out, blob| {
            tracing::info!(tag = blob.tag, size = blob.payload.len(), "echoing blob");
            out.send_binary(blob.tag, &blob.payload)
        });

        match (Connection { session, source }).run() {
            Ok(stats) => tracing::info!(
                session = %id,
                frames = stats.inbound.frames,
                malformed = stats.inbound.malformed,
                "connection closed"
            ),
            Err(err) => tracing::warn!(session = %id, error = %err, "connection failed"),
        }
    }

    Ok(SUCCESS)
}

/// Sends every well-formed command back exactly as it arrived.
fn echo_dispatcher() -> Dispatcher<Outbound> {
    let mut dispatcher = Dispatcher::new();
    dispatcher.set_fallback(|out: &Outbound, command: &mut ReceivedCommand| {
        let frame = command.raw_string().trim();
        tracing::info!(
            command_id = command.command_id(),
            size = frame.len(),
            "echoing command"
        );
        out.send_text(frame)
    });
    dispatcher
}
