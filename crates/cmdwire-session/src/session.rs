use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use cmdwire_protocol::{AckRequest, Command, FramerConfig, StreamFramer};
use cmdwire_transport::{
    BinaryBlob, EnvelopeConfig, Message, MessageSink, MessageSource, TransportError,
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::ack::AckTracker;
use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::error::Result;

/// Per-session behaviour.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Frame length limit and empty-token handling for inbound text.
    pub framer: FramerConfig,
    /// Envelope limits and socket timeouts for stream transports.
    pub envelope: EnvelopeConfig,
}

/// Send half of a session, handed to handlers as their context.
///
/// Cheap to clone; clones share the underlying sink and acknowledgement
/// tracker.
#[derive(Clone)]
pub struct Outbound {
    sink: Arc<dyn MessageSink>,
    acks: AckTracker,
}

impl Outbound {
    pub fn new(sink: impl MessageSink + 'static) -> Self {
        Self::with_tracker(sink, AckTracker::new())
    }

    pub fn with_tracker(sink: impl MessageSink + 'static, acks: AckTracker) -> Self {
        Self {
            sink: Arc::new(sink),
            acks,
        }
    }

    /// Send `command`. If it requests an acknowledgement, the deadline starts
    /// now.
    pub fn send(&self, command: &Command) -> Result<()> {
        self.send_at(command, Instant::now())
    }

    /// Send `command`, starting any acknowledgement deadline at `now`.
    ///
    /// The acknowledgement is registered before the text is written, so a
    /// reply dispatched while the write is still in progress clears it.
    pub fn send_at(&self, command: &Command, now: Instant) -> Result<()> {
        let wire = command.to_wire();
        let ack = command.ack();
        if let Some(ack) = ack {
            self.acks.expect(ack, now);
        }
        if let Err(err) = self.sink.send_text(&wire) {
            if let Some(ack) = ack {
                self.acks.cancel(ack.command_id);
            }
            return Err(err.into());
        }
        debug!(command_id = command.id(), size = wire.len(), "sent command");
        Ok(())
    }

    /// Send pre-built text verbatim.
    pub fn send_text(&self, text: &str) -> Result<()> {
        self.sink.send_text(text)?;
        Ok(())
    }

    pub fn send_binary(&self, tag: i32, payload: &[u8]) -> Result<()> {
        self.sink.send_binary(tag, payload)?;
        Ok(())
    }

    pub fn acks(&self) -> &AckTracker {
        &self.acks
    }

    /// Drain acknowledgements overdue at `now`.
    pub fn expired_acks(&self, now: Instant) -> Vec<AckRequest> {
        self.acks.expired(now)
    }
}

impl fmt::Debug for Outbound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Outbound")
            .field("pending_acks", &self.acks.len())
            .finish_non_exhaustive()
    }
}

/// Counts for one batch of inbound text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InboundReport {
    /// Complete frames extracted.
    pub frames: u64,
    /// Frames a registered handler accepted.
    pub handled: u64,
    /// Frames with no registered handler.
    pub unknown: u64,
    /// Frames that failed to parse.
    pub malformed: u64,
    /// Frames whose handler returned an error.
    pub failed: u64,
    /// Frames dropped for exceeding the length limit.
    pub overflowed: u64,
}

impl InboundReport {
    fn absorb(&mut self, other: &InboundReport) {
        self.frames += other.frames;
        self.handled += other.handled;
        self.unknown += other.unknown;
        self.malformed += other.malformed;
        self.failed += other.failed;
        self.overflowed += other.overflowed;
    }
}

/// Running totals for a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub text_messages: u64,
    pub binary_messages: u64,
    #[serde(flatten)]
    pub inbound: InboundReport,
}

/// Receives binary blobs for a session.
pub type BinaryHandler = Box<dyn FnMut(&Outbound, BinaryBlob) -> Result<()> + Send>;

/// One connection's inbound state: a framer of its own, a shared dispatcher
/// and an outbound handle for replies.
///
/// `on_text` takes `&mut self`, so frames of one connection are extracted and
/// dispatched strictly in arrival order.
pub struct Session {
    id: String,
    framer: StreamFramer,
    dispatcher: Arc<Dispatcher<Outbound>>,
    outbound: Outbound,
    binary_handler: Option<BinaryHandler>,
    stats: SessionStats,
    config: SessionConfig,
}

impl Session {
    pub fn new(
        id: impl Into<String>,
        dispatcher: Arc<Dispatcher<Outbound>>,
        sink: impl MessageSink + 'static,
    ) -> Self {
        Self::with_config(id, dispatcher, sink, SessionConfig::default())
    }

    pub fn with_config(
        id: impl Into<String>,
        dispatcher: Arc<Dispatcher<Outbound>>,
        sink: impl MessageSink + 'static,
        config: SessionConfig,
    ) -> Self {
        Self {
            id: id.into(),
            framer: StreamFramer::with_config(config.framer),
            dispatcher,
            outbound: Outbound::new(sink),
            binary_handler: None,
            stats: SessionStats::default(),
            config,
        }
    }

    /// Route binary blobs to `handler` instead of logging and dropping them.
    pub fn with_binary_handler<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&Outbound, BinaryBlob) -> Result<()> + Send + 'static,
    {
        self.binary_handler = Some(Box::new(handler));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn outbound(&self) -> &Outbound {
        &self.outbound
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Text received after the last complete frame.
    pub fn pending(&self) -> &str {
        self.framer.pending()
    }

    /// Frame, parse and dispatch a chunk of inbound text.
    ///
    /// Malformed frames, oversized frames and handler failures are logged and
    /// counted; none of them stops later frames in the chunk.
    pub fn on_text(&mut self, chunk: &str) -> InboundReport {
        let mut report = InboundReport::default();
        let overflows_before = self.framer.overflows();
        let frames = self.framer.feed(chunk);
        report.overflowed = self.framer.overflows() - overflows_before;

        for frame in frames {
            report.frames += 1;
            let mut command = match frame.parse(self.config.framer.empty_tokens) {
                Ok(command) => command,
                Err(err) => {
                    warn!(
                        session = %self.id,
                        raw = frame.as_str(),
                        error = %err,
                        "dropping malformed frame"
                    );
                    report.malformed += 1;
                    continue;
                }
            };

            let command_id = command.command_id();
            self.outbound.acks.acknowledge(command_id);

            match self.dispatcher.dispatch(&self.outbound, &mut command) {
                Ok(DispatchOutcome::Handled) => report.handled += 1,
                Ok(DispatchOutcome::Unknown) => report.unknown += 1,
                Err(err) => {
                    warn!(session = %self.id, command_id, error = %err, "command handler failed");
                    report.failed += 1;
                }
            }
        }

        self.stats.text_messages += 1;
        self.stats.inbound.absorb(&report);
        report
    }

    /// Hand a binary blob to the binary handler, if any.
    pub fn on_binary(&mut self, blob: BinaryBlob) {
        self.stats.binary_messages += 1;
        match self.binary_handler.as_mut() {
            Some(handler) => {
                let tag = blob.tag;
                if let Err(err) = handler(&self.outbound, blob) {
                    warn!(session = %self.id, tag, error = %err, "binary handler failed");
                }
            }
            None => {
                debug!(
                    session = %self.id,
                    tag = blob.tag,
                    size = blob.payload.len(),
                    "no binary handler, dropping blob"
                );
            }
        }
    }

    pub fn on_message(&mut self, message: Message) {
        match message {
            Message::Text(text) => {
                self.on_text(&text);
            }
            Message::Binary(blob) => self.on_binary(blob),
        }
    }

    /// Process messages from `source` until the peer closes the connection.
    ///
    /// Returns `Ok(())` on a clean close and the transport error otherwise.
    pub fn run<S: MessageSource + ?Sized>(&mut self, source: &mut S) -> Result<()> {
        debug!(session = %self.id, "session started");
        loop {
            match source.recv() {
                Ok(message) => self.on_message(message),
                Err(TransportError::Closed) => {
                    debug!(session = %self.id, stats = ?self.stats, "peer closed connection");
                    return Ok(());
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("pending", &self.framer.pending())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

/// A session paired with the source feeding it.
#[derive(Debug)]
pub struct Connection<S> {
    pub session: Session,
    pub source: S,
}

impl<S: MessageSource> Connection<S> {
    /// Run the session until the peer closes, returning its final counts.
    pub fn run(mut self) -> Result<SessionStats> {
        self.session.run(&mut self.source)?;
        Ok(self.session.stats())
    }

    pub fn into_parts(self) -> (Session, S) {
        (self.session, self.source)
    }
}
