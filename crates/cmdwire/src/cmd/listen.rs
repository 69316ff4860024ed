use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use cmdwire_protocol::{FramerConfig, ReceivedCommand};
use cmdwire_session::{Dispatcher, Outbound, SessionConfig, SessionListener};
use cmdwire_transport::{MessageSource, TransportError};

use crate::cmd::{install_ctrlc_handler, ListenArgs};
use crate::exit::{session_error, transport_error, CliResult, SUCCESS};
use crate::output::{print_blob, print_received, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let printed = Arc::new(AtomicUsize::new(0));
    let dispatcher = printing_dispatcher(Arc::clone(&printed), args.count, format);
    let config = SessionConfig {
        framer: FramerConfig::default().keep_empty_tokens(args.keep_empty),
        ..SessionConfig::default()
    };
    let listener = SessionListener::bind_with_config(&args.path, Arc::new(dispatcher), config)
        .map_err(|err| session_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    while running.load(Ordering::SeqCst) {
        let (session, mut source) = listener
            .accept()
            .map_err(|err| session_error("accept failed", err))?
            .into_parts();
        let mut session = session.with_binary_handler(move |_, blob| {
            print_blob(&blob, format);
            Ok(())
        });
        tracing::info!(session = session.id(), "connection accepted");

        while running.load(Ordering::SeqCst) {
            match source.recv() {
                Ok(message) => session.on_message(message),
                Err(TransportError::Closed) => break,
                Err(err) => return Err(transport_error("receive failed", err)),
            }

            if limit_reached(args.count, &printed) {
                return Ok(SUCCESS);
            }
        }

        tracing::info!(
            session = session.id(),
            frames = session.stats().inbound.frames,
            "connection closed"
        );
    }

    Ok(SUCCESS)
}

/// Every command is unregistered here, so the fallback sees all of them.
fn printing_dispatcher(
    printed: Arc<AtomicUsize>,
    limit: Option<usize>,
    format: OutputFormat,
) -> Dispatcher<Outbound> {
    let mut dispatcher = Dispatcher::new();
    dispatcher.set_fallback(move |_: &Outbound, command: &mut ReceivedCommand| {
        let seen = printed.fetch_add(1, Ordering::SeqCst);
        if limit.is_none_or(|limit| seen < limit) {
            print_received(command, format);
        }
        Ok(())
    });
    dispatcher
}

fn limit_reached(limit: Option<usize>, printed: &AtomicUsize) -> bool {
    limit.is_some_and(|limit| printed.load(Ordering::SeqCst) >= limit)
}

#[cfg(test)]
mod tests {
    use cmdwire_protocol::SplitOptions;
    use cmdwire_transport::memory;

    use super::*;

    #[test]
    fn fallback_counts_every_command() {
        let printed = Arc::new(AtomicUsize::new(0));
        let dispatcher = printing_dispatcher(Arc::clone(&printed), Some(2), OutputFormat::Raw);
        let (_host, device) = memory::pair();
        let out = Outbound::new(device.sink);

        for raw in ["1;", "2,x;", "3;"] {
            let mut cmd = ReceivedCommand::parse(raw, SplitOptions::RemoveEmpty).expect("parse");
            dispatcher.dispatch(&out, &mut cmd).expect("dispatch");
        }

        assert_eq!(printed.load(Ordering::SeqCst), 3);
        assert!(limit_reached(Some(2), &printed));
        assert!(!limit_reached(None, &printed));
    }
}
