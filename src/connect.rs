//! The asynchronous connect protocol for connection-manager components.
//!
//! A connection manager never reports an outcome synchronously: `connect`
//! initiates the attempt and returns, and exactly one of the host's
//! success/error callbacks is later invoked through the reactor. Concurrent
//! attempts issued by the same manager are independent and may complete in
//! any order. A manager must not retry internally without an explicit
//! request; callback delivery is the single authoritative outcome
//! notification.

use crate::reactor::{EventToken, Interest, Reactor};
use std::sync::Arc;
use std::time::Duration;

/// How a connect attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected,
    Failed,
}

/// A host-supplied completion callback. Receives the name of the connection
/// manager that ran the attempt.
pub type ConnectFn = Box<dyn FnOnce(&str)>;

/// The behavior contract layered on top of a component of kind
/// connection-manager.
///
/// Implementations take ownership of the [`PendingConnect`] and resolve it
/// when the attempt completes. Initiation failures (a malformed target, an
/// unreachable descriptor) are reported the same way as late failures: by
/// resolving with [`ConnectOutcome::Failed`], never by a synchronous return
/// value.
pub trait ConnectionManager {
    /// Starts an attempt to establish a connection to `target`, a
    /// family-specific address or descriptor. Returns immediately.
    fn connect(&mut self, target: &str, pending: PendingConnect);
}

/// A one-shot completion handle for a single connect attempt.
///
/// Resolving schedules the matching callback through the reactor with a zero
/// timeout, so it runs on a later dispatch tick and never inside the call
/// that initiated the attempt. Exactly one callback fires per attempt: a
/// `PendingConnect` dropped unresolved (a plugin bug or an early bail-out)
/// delivers the error callback.
pub struct PendingConnect {
    reactor: Arc<dyn Reactor>,
    manager: String,
    on_success: Option<ConnectFn>,
    on_error: Option<ConnectFn>,
    resolved: bool,
}

impl PendingConnect {
    /// Creates a handle for one attempt run by the named connection manager.
    pub fn new(
        reactor: Arc<dyn Reactor>,
        manager: impl Into<String>,
        on_success: ConnectFn,
        on_error: ConnectFn,
    ) -> Self {
        Self {
            reactor,
            manager: manager.into(),
            on_success: Some(on_success),
            on_error: Some(on_error),
            resolved: false,
        }
    }

    /// The name of the connection manager this attempt belongs to.
    pub fn manager(&self) -> &str {
        &self.manager
    }

    /// Consumes the handle and schedules the callback for `outcome`.
    ///
    /// Returns the reactor token for the scheduled delivery; deleting that
    /// token before the reactor dispatches it is the only way to cancel the
    /// notification. Returns `None` when the reactor refused the
    /// registration, in which case no callback will fire.
    pub fn resolve(mut self, outcome: ConnectOutcome) -> Option<EventToken> {
        self.schedule(outcome)
    }

    fn schedule(&mut self, outcome: ConnectOutcome) -> Option<EventToken> {
        self.resolved = true;
        let callback = match outcome {
            ConnectOutcome::Connected => self.on_success.take(),
            ConnectOutcome::Failed => self.on_error.take(),
        }?;
        self.on_success = None;
        self.on_error = None;
        let manager = self.manager.clone();
        let mut slot = Some((callback, manager));
        let token = self.reactor.timeout_add(
            Duration::ZERO,
            Interest::TIMEOUT,
            Box::new(move |_fd, _interest| {
                if let Some((callback, manager)) = slot.take() {
                    callback(&manager);
                }
            }),
        );
        if token.is_none() {
            tracing::error!(manager = %self.manager, "reactor refused connect completion timer");
        }
        token
    }
}

impl Drop for PendingConnect {
    fn drop(&mut self) {
        if !self.resolved {
            self.schedule(ConnectOutcome::Failed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactor::StepReactor;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Flags {
        success: Cell<u32>,
        error: Cell<u32>,
    }

    fn pending(reactor: &Arc<StepReactor>, flags: &Rc<Flags>) -> PendingConnect {
        let s = flags.clone();
        let e = flags.clone();
        PendingConnect::new(
            reactor.clone() as Arc<dyn Reactor>,
            "cm0",
            Box::new(move |_| s.success.set(s.success.get() + 1)),
            Box::new(move |_| e.error.set(e.error.get() + 1)),
        )
    }

    fn flags() -> Rc<Flags> {
        Rc::new(Flags {
            success: Cell::new(0),
            error: Cell::new(0),
        })
    }

    #[test]
    fn success_fires_once_and_deferred() {
        let reactor = Arc::new(StepReactor::new());
        let flags = flags();
        let token = pending(&reactor, &flags).resolve(ConnectOutcome::Connected);
        assert!(token.is_some());
        // Nothing may fire inside the initiating call.
        assert_eq!(flags.success.get(), 0);
        assert_eq!(flags.error.get(), 0);
        reactor.tick();
        assert_eq!(flags.success.get(), 1);
        assert_eq!(flags.error.get(), 0);
        reactor.tick();
        assert_eq!(flags.success.get(), 1);
    }

    #[test]
    fn failure_fires_error_only() {
        let reactor = Arc::new(StepReactor::new());
        let flags = flags();
        pending(&reactor, &flags).resolve(ConnectOutcome::Failed);
        reactor.tick();
        assert_eq!(flags.success.get(), 0);
        assert_eq!(flags.error.get(), 1);
    }

    #[test]
    fn dropped_unresolved_reports_error() {
        let reactor = Arc::new(StepReactor::new());
        let flags = flags();
        drop(pending(&reactor, &flags));
        reactor.tick();
        assert_eq!(flags.success.get(), 0);
        assert_eq!(flags.error.get(), 1);
    }

    #[test]
    fn cancel_by_deleting_token() {
        let reactor = Arc::new(StepReactor::new());
        let flags = flags();
        let token = pending(&reactor, &flags)
            .resolve(ConnectOutcome::Connected)
            .unwrap();
        reactor.timeout_del(token);
        reactor.tick();
        assert_eq!(flags.success.get(), 0);
        assert_eq!(flags.error.get(), 0);
    }

    #[test]
    fn concurrent_attempts_are_independent() {
        let reactor = Arc::new(StepReactor::new());
        let first = flags();
        let second = flags();
        pending(&reactor, &first).resolve(ConnectOutcome::Connected);
        pending(&reactor, &second).resolve(ConnectOutcome::Failed);
        reactor.tick();
        assert_eq!(first.success.get(), 1);
        assert_eq!(first.error.get(), 0);
        assert_eq!(second.success.get(), 0);
        assert_eq!(second.error.get(), 1);
    }

    #[test]
    fn callback_receives_manager_name() {
        let reactor = Arc::new(StepReactor::new());
        let seen = Rc::new(Cell::new(false));
        let flag = seen.clone();
        PendingConnect::new(
            reactor.clone() as Arc<dyn Reactor>,
            "udp-cm",
            Box::new(move |name| {
                assert_eq!(name, "udp-cm");
                flag.set(true);
            }),
            Box::new(|_| panic!("attempt succeeded")),
        )
        .resolve(ConnectOutcome::Connected);
        reactor.tick();
        assert!(seen.get());
    }
}
