use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use cmdwire_protocol::ReceivedCommand;
use tracing::{debug, trace, warn};

use crate::error::Result;

/// Handles one command id. `C` is the context handed to every handler,
/// typically an [`Outbound`](crate::Outbound) for replies.
pub trait Handler<C>: Send + Sync {
    fn handle(&self, ctx: &C, command: &mut ReceivedCommand) -> Result<()>;
}

impl<C, F> Handler<C> for F
where
    F: Fn(&C, &mut ReceivedCommand) -> Result<()> + Send + Sync,
{
    fn handle(&self, ctx: &C, command: &mut ReceivedCommand) -> Result<()> {
        self(ctx, command)
    }
}

/// What [`Dispatcher::dispatch`] did with a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A registered handler ran.
    Handled,
    /// No handler was registered for the id.
    Unknown,
}

/// Routes commands to handlers by id.
///
/// Registration takes `&mut self` and happens during setup. Once built, share
/// the dispatcher behind an `Arc`.
pub struct Dispatcher<C> {
    handlers: HashMap<i32, Arc<dyn Handler<C>>>,
    fallback: Option<Arc<dyn Handler<C>>>,
}

impl<C> Dispatcher<C> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            fallback: None,
        }
    }

    /// Register a closure for `command_id`. Returns true if it replaced an
    /// existing handler.
    pub fn register<F>(&mut self, command_id: i32, handler: F) -> bool
    where
        F: Fn(&C, &mut ReceivedCommand) -> Result<()> + Send + Sync + 'static,
    {
        self.register_handler(command_id, handler)
    }

    /// Register any [`Handler`] implementation for `command_id`.
    pub fn register_handler<H>(&mut self, command_id: i32, handler: H) -> bool
    where
        H: Handler<C> + 'static,
    {
        self.handlers
            .insert(command_id, Arc::new(handler))
            .is_some()
    }

    pub fn unregister(&mut self, command_id: i32) -> bool {
        self.handlers.remove(&command_id).is_some()
    }

    /// Handler invoked for unknown ids. With a fallback set, unknown ids are
    /// logged at debug level instead of warn.
    pub fn set_fallback<F>(&mut self, handler: F)
    where
        F: Fn(&C, &mut ReceivedCommand) -> Result<()> + Send + Sync + 'static,
    {
        self.fallback = Some(Arc::new(handler));
    }

    pub fn contains(&self, command_id: i32) -> bool {
        self.handlers.contains_key(&command_id)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered ids in ascending order.
    pub fn command_ids(&self) -> Vec<i32> {
        let mut ids: Vec<i32> = self.handlers.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Invoke the handler registered for the command's id.
    ///
    /// An unknown id is not an error: it goes to the fallback if one is set,
    /// is logged otherwise, and is reported as [`DispatchOutcome::Unknown`].
    /// Handler errors are returned unchanged.
    pub fn dispatch(&self, ctx: &C, command: &mut ReceivedCommand) -> Result<DispatchOutcome> {
        let command_id = command.command_id();
        match self.handlers.get(&command_id) {
            Some(handler) => {
                trace!(command_id, "dispatching command");
                handler.handle(ctx, command)?;
                Ok(DispatchOutcome::Handled)
            }
            None => {
                match &self.fallback {
                    Some(fallback) => {
                        debug!(
                            command_id,
                            raw = command.raw_string(),
                            "passing unregistered command to fallback"
                        );
                        fallback.handle(ctx, command)?;
                    }
                    None => warn!(
                        command_id,
                        raw = command.raw_string(),
                        "no handler registered for command"
                    ),
                }
                Ok(DispatchOutcome::Unknown)
            }
        }
    }
}

impl<C> Default for Dispatcher<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for Dispatcher<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("command_ids", &self.command_ids())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use cmdwire_protocol::SplitOptions;

    use super::*;
    use crate::error::SessionError;

    fn parse(raw: &str) -> ReceivedCommand {
        ReceivedCommand::parse(raw, SplitOptions::RemoveEmpty).expect("frame should parse")
    }

    #[test]
    fn registered_handler_runs_once_with_args() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut dispatcher: Dispatcher<()> = Dispatcher::new();
        {
            let seen = Arc::clone(&seen);
            let calls = Arc::clone(&calls);
            dispatcher.register(7, move |_, cmd| {
                calls.fetch_add(1, Ordering::SeqCst);
                let name = cmd.read_string();
                let value = cmd.read_i32();
                seen.lock().expect("lock").push((name, value));
                Ok(())
            });
        }

        let mut cmd = parse("7,LED/,1,-100;");
        let outcome = dispatcher.dispatch(&(), &mut cmd).expect("dispatch");

        assert_eq!(outcome, DispatchOutcome::Handled);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            seen.lock().expect("lock").as_slice(),
            &[("LED,1".to_string(), -100)]
        );
    }

    #[test]
    fn unknown_id_invokes_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut dispatcher: Dispatcher<()> = Dispatcher::new();
        {
            let calls = Arc::clone(&calls);
            dispatcher.register(7, move |_, _| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        let mut cmd = parse("99,x;");
        let outcome = dispatcher.dispatch(&(), &mut cmd).expect("dispatch");

        assert_eq!(outcome, DispatchOutcome::Unknown);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn fallback_sees_unknown_commands() {
        let unknown = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher: Dispatcher<()> = Dispatcher::new();
        {
            let unknown = Arc::clone(&unknown);
            dispatcher.set_fallback(move |_, cmd| {
                unknown.lock().expect("lock").push(cmd.command_id());
                Ok(())
            });
        }

        dispatcher
            .dispatch(&(), &mut parse("42;"))
            .expect("dispatch");
        assert_eq!(unknown.lock().expect("lock").as_slice(), &[42]);
    }

    #[test]
    fn register_reports_replacement() {
        let mut dispatcher: Dispatcher<()> = Dispatcher::new();
        assert!(!dispatcher.register(1, |_, _| Ok(())));
        assert!(dispatcher.register(1, |_, _| Err(SessionError::handler("second"))));
        assert_eq!(dispatcher.len(), 1);

        let err = dispatcher.dispatch(&(), &mut parse("1;")).unwrap_err();
        assert!(matches!(err, SessionError::Handler(ref msg) if msg == "second"));

        assert!(dispatcher.unregister(1));
        assert!(dispatcher.is_empty());
    }

    #[test]
    fn handler_context_is_passed_through() {
        struct Counter(AtomicUsize);

        struct Add;
        impl Handler<Counter> for Add {
            fn handle(&self, ctx: &Counter, cmd: &mut ReceivedCommand) -> Result<()> {
                let n = cmd.read_u32() as usize;
                ctx.0.fetch_add(n, Ordering::SeqCst);
                Ok(())
            }
        }

        let mut dispatcher: Dispatcher<Counter> = Dispatcher::new();
        dispatcher.register_handler(3, Add);
        let ctx = Counter(AtomicUsize::new(0));

        dispatcher.dispatch(&ctx, &mut parse("3,5;")).expect("dispatch");
        dispatcher.dispatch(&ctx, &mut parse("3,6;")).expect("dispatch");
        assert_eq!(ctx.0.load(Ordering::SeqCst), 11);
        assert_eq!(dispatcher.command_ids(), vec![3]);
    }
}
