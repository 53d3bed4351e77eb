//! The [`Reactor`] adapter through which components watch file descriptors
//! and timers.
//!
//! The framework never owns a dispatch loop. The host application supplies an
//! implementation of [`Reactor`] when initializing a
//! [`Context`](crate::Context), and every component that needs I/O
//! notification goes through this one indirection. The same component
//! implementation therefore runs unmodified inside any host event loop: the
//! framework is a library, not a server.

use std::cell::RefCell;
use std::os::unix::io::RawFd;
use std::time::Duration;

/// A bit set describing which conditions a registration watches and, on
/// delivery, which condition fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Interest(u8);

impl Interest {
    /// Monitor read-availability.
    pub const READ: Interest = Interest(0x02);
    /// Monitor write-availability.
    pub const WRITE: Interest = Interest(0x04);
    /// Keep the registration alive after the callback fires. Without this,
    /// registrations are single-shot and the token becomes invalid once the
    /// callback has run.
    pub const PERSIST: Interest = Interest(0x10);
    /// Reported to callbacks when a timeout elapsed rather than an fd event.
    pub const TIMEOUT: Interest = Interest(0x01);

    pub const fn contains(self, other: Interest) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Interest) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The subset of this set also present in `other`.
    pub const fn masked(self, other: Interest) -> Interest {
        Interest(self.0 & other.0)
    }
}

impl std::ops::BitOr for Interest {
    type Output = Interest;

    fn bitor(self, rhs: Interest) -> Interest {
        Interest(self.0 | rhs.0)
    }
}

/// An opaque registration token.
///
/// The value is chosen by the reactor implementation and is meaningful only
/// to it. The framework and components never interpret a token; they store it
/// and present it back to the matching delete call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventToken(u64);

impl EventToken {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn into_inner(self) -> u64 {
        self.0
    }
}

/// The callback invoked when a registration fires. For pure timers the fd is
/// `None`; the [`Interest`] carries which condition occurred.
pub type EventFn = Box<dyn FnMut(Option<RawFd>, Interest)>;

/// The event facility the host supplies at context initialization.
///
/// Registrations without [`Interest::PERSIST`] are single-shot: once the
/// callback has fired, the token is dead and must not be passed to
/// `event_del`/`timeout_del`. Callers track firing themselves; deleting an
/// already-fired single-shot token is a contract violation the reactor is not
/// required to detect.
///
/// Callbacks are delivered one at a time on a single logical thread of
/// execution. Nothing here blocks: components register interest, return, and
/// get called back.
pub trait Reactor {
    /// Registers interest in `fd`. When `timeout` is present the callback
    /// fires on the earlier of an event occurring or the timeout elapsing.
    /// Returns `None` when the registration cannot be made.
    fn event_add(
        &self,
        fd: RawFd,
        interest: Interest,
        timeout: Option<Duration>,
        callback: EventFn,
    ) -> Option<EventToken>;

    /// Cancels a not-yet-fired registration made with
    /// [`event_add`](Reactor::event_add), or an already-fired persistent one.
    fn event_del(&self, token: EventToken);

    /// Registers a pure timer. With [`Interest::PERSIST`] the callback fires
    /// repeatedly every `timeout` until deleted.
    fn timeout_add(
        &self,
        timeout: Duration,
        interest: Interest,
        callback: EventFn,
    ) -> Option<EventToken>;

    /// Cancels a timer added with [`timeout_add`](Reactor::timeout_add).
    fn timeout_del(&self, token: EventToken);
}

struct Registration {
    token: u64,
    fd: Option<RawFd>,
    interest: Interest,
    timeout: Option<Duration>,
    callback: EventFn,
}

#[derive(Default)]
struct StepInner {
    next_token: u64,
    pending: Vec<Registration>,
    cancelled: Vec<u64>,
}

/// A deterministic [`Reactor`] that fires callbacks only when explicitly
/// stepped.
///
/// Registrations queue up and nothing is delivered until the embedder calls
/// [`tick`](StepReactor::tick) or [`fire`](StepReactor::fire). This is the
/// reference implementation of the reactor contract, usable by embedders that
/// drive dispatch manually, and it is what the test suite uses to check that
/// deferred callbacks are never delivered synchronously.
#[derive(Default)]
pub struct StepReactor {
    inner: RefCell<StepInner>,
}

impl StepReactor {
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of registrations waiting to fire.
    pub fn pending(&self) -> usize {
        self.inner.borrow().pending.len()
    }

    /// Delivers every pending registration once: timers fire with
    /// [`Interest::TIMEOUT`], fd registrations with their watched conditions.
    /// Persistent registrations survive. Returns how many callbacks ran.
    pub fn tick(&self) -> usize {
        self.dispatch(|reg| {
            Some(match reg.fd {
                Some(_) => reg.interest.masked(Interest::READ | Interest::WRITE),
                None => Interest::TIMEOUT,
            })
        })
    }

    /// Delivers only registrations watching `fd` for one of the conditions in
    /// `ready`. Returns how many callbacks ran.
    pub fn fire(&self, fd: RawFd, ready: Interest) -> usize {
        self.dispatch(|reg| {
            if reg.fd == Some(fd) && reg.interest.intersects(ready) {
                Some(reg.interest.masked(ready))
            } else {
                None
            }
        })
    }

    /// Delivers every registration whose timeout is at most `elapsed`,
    /// reporting [`Interest::TIMEOUT`] even for fd registrations, since the
    /// timeout elapsed without an event. Returns how many callbacks ran.
    pub fn advance(&self, elapsed: Duration) -> usize {
        self.dispatch(|reg| match reg.timeout {
            Some(timeout) if timeout <= elapsed => Some(Interest::TIMEOUT),
            _ => None,
        })
    }

    fn dispatch(&self, due: impl Fn(&Registration) -> Option<Interest>) -> usize {
        let mut selected = Vec::new();
        {
            let mut inner = self.inner.borrow_mut();
            let mut remaining = Vec::new();
            for reg in inner.pending.drain(..) {
                match due(&reg) {
                    Some(delivered) => selected.push((reg, delivered)),
                    None => remaining.push(reg),
                }
            }
            inner.pending = remaining;
        }

        // The borrow is released before callbacks run so they may re-enter
        // the reactor to add or delete registrations.
        let mut fired = 0;
        let mut survivors = Vec::new();
        for (mut reg, delivered) in selected {
            if self.inner.borrow().cancelled.contains(&reg.token) {
                continue;
            }
            (reg.callback)(reg.fd, delivered);
            fired += 1;
            if reg.interest.contains(Interest::PERSIST) {
                survivors.push(reg);
            }
        }

        let mut inner = self.inner.borrow_mut();
        let cancelled = std::mem::take(&mut inner.cancelled);
        inner
            .pending
            .extend(survivors.into_iter().filter(|r| !cancelled.contains(&r.token)));
        fired
    }

    fn add(&self, reg: impl FnOnce(u64) -> Registration) -> Option<EventToken> {
        let mut inner = self.inner.borrow_mut();
        let token = inner.next_token;
        inner.next_token += 1;
        inner.pending.push(reg(token));
        Some(EventToken::new(token))
    }

    fn del(&self, token: EventToken) {
        let mut inner = self.inner.borrow_mut();
        let raw = token.into_inner();
        if let Some(index) = inner.pending.iter().position(|r| r.token == raw) {
            inner.pending.remove(index);
        } else {
            // The registration may be mid-dispatch; remember the cancellation
            // so it is not re-queued and not fired later in this tick.
            inner.cancelled.push(raw);
        }
    }
}

impl Reactor for StepReactor {
    fn event_add(
        &self,
        fd: RawFd,
        interest: Interest,
        timeout: Option<Duration>,
        callback: EventFn,
    ) -> Option<EventToken> {
        if interest.masked(Interest::READ | Interest::WRITE).is_empty() {
            return None;
        }
        self.add(|token| Registration {
            token,
            fd: Some(fd),
            interest,
            timeout,
            callback,
        })
    }

    fn event_del(&self, token: EventToken) {
        self.del(token);
    }

    fn timeout_add(
        &self,
        timeout: Duration,
        interest: Interest,
        callback: EventFn,
    ) -> Option<EventToken> {
        self.add(|token| Registration {
            token,
            fd: None,
            interest,
            timeout: Some(timeout),
            callback,
        })
    }

    fn timeout_del(&self, token: EventToken) {
        self.del(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn interest_ops() {
        let mask = Interest::READ | Interest::PERSIST;
        assert!(mask.contains(Interest::READ));
        assert!(mask.contains(Interest::PERSIST));
        assert!(!mask.contains(Interest::WRITE));
        assert!(mask.intersects(Interest::READ | Interest::WRITE));
        assert!(mask.masked(Interest::PERSIST).contains(Interest::PERSIST));
    }

    #[test]
    fn nothing_fires_before_tick() {
        let reactor = StepReactor::new();
        let fired = Rc::new(Cell::new(0));
        let counter = fired.clone();
        reactor
            .timeout_add(
                Duration::ZERO,
                Interest::TIMEOUT,
                Box::new(move |_, _| counter.set(counter.get() + 1)),
            )
            .unwrap();
        assert_eq!(fired.get(), 0);
        assert_eq!(reactor.tick(), 1);
        assert_eq!(fired.get(), 1);
        // Single-shot: gone after firing.
        assert_eq!(reactor.tick(), 0);
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn persistent_registration_survives() {
        let reactor = StepReactor::new();
        let fired = Rc::new(Cell::new(0));
        let counter = fired.clone();
        let token = reactor
            .timeout_add(
                Duration::from_millis(5),
                Interest::TIMEOUT | Interest::PERSIST,
                Box::new(move |_, _| counter.set(counter.get() + 1)),
            )
            .unwrap();
        reactor.tick();
        reactor.tick();
        assert_eq!(fired.get(), 2);
        reactor.timeout_del(token);
        reactor.tick();
        assert_eq!(fired.get(), 2);
    }

    #[test]
    fn delete_before_fire_cancels() {
        let reactor = StepReactor::new();
        let fired = Rc::new(Cell::new(false));
        let flag = fired.clone();
        let token = reactor
            .event_add(
                3,
                Interest::READ,
                None,
                Box::new(move |_, _| flag.set(true)),
            )
            .unwrap();
        reactor.event_del(token);
        assert_eq!(reactor.tick(), 0);
        assert!(!fired.get());
    }

    #[test]
    fn fire_selects_by_fd_and_condition() {
        let reactor = StepReactor::new();
        let read_fired = Rc::new(Cell::new(false));
        let write_fired = Rc::new(Cell::new(false));
        let r = read_fired.clone();
        let w = write_fired.clone();
        reactor
            .event_add(
                3,
                Interest::READ,
                None,
                Box::new(move |fd, ev| {
                    assert_eq!(fd, Some(3));
                    assert!(ev.contains(Interest::READ));
                    r.set(true);
                }),
            )
            .unwrap();
        reactor
            .event_add(4, Interest::WRITE, None, Box::new(move |_, _| w.set(true)))
            .unwrap();
        reactor.fire(3, Interest::READ);
        assert!(read_fired.get());
        assert!(!write_fired.get());
        assert_eq!(reactor.pending(), 1);
    }

    #[test]
    fn event_add_requires_read_or_write() {
        let reactor = StepReactor::new();
        assert!(reactor
            .event_add(3, Interest::PERSIST, None, Box::new(|_, _| {}))
            .is_none());
    }

    #[test]
    fn advance_fires_expired_timeouts_only() {
        let reactor = StepReactor::new();
        let expired = Rc::new(Cell::new(false));
        let flag = expired.clone();
        reactor
            .event_add(
                5,
                Interest::READ,
                Some(Duration::from_millis(10)),
                Box::new(move |fd, ev| {
                    assert_eq!(fd, Some(5));
                    assert!(ev.contains(Interest::TIMEOUT));
                    flag.set(true);
                }),
            )
            .unwrap();
        reactor
            .timeout_add(
                Duration::from_secs(60),
                Interest::TIMEOUT,
                Box::new(|_, _| panic!("not yet due")),
            )
            .unwrap();
        assert_eq!(reactor.advance(Duration::from_millis(20)), 1);
        assert!(expired.get());
        assert_eq!(reactor.pending(), 1);
    }

    #[test]
    fn callback_may_reenter_reactor() {
        let reactor = Rc::new(StepReactor::new());
        let inner = reactor.clone();
        let fired = Rc::new(Cell::new(0));
        let counter = fired.clone();
        reactor
            .timeout_add(
                Duration::ZERO,
                Interest::TIMEOUT,
                Box::new(move |_, _| {
                    let counter = counter.clone();
                    inner.timeout_add(
                        Duration::ZERO,
                        Interest::TIMEOUT,
                        Box::new(move |_, _| counter.set(counter.get() + 1)),
                    );
                }),
            )
            .unwrap();
        reactor.tick();
        assert_eq!(fired.get(), 0);
        reactor.tick();
        assert_eq!(fired.get(), 1);
    }
}
