//! The [`Component`] unit and supporting types.

use crate::args::Args;
use crate::connect::ConnectionManager;
use crate::reactor::Reactor;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::cell::Cell;
use std::fmt::{self, Display};
use thiserror::Error as ThisError;

/// The three component kinds the framework hosts. Fixed at creation, a
/// component's kind never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentKind {
    /// Implements packet-forwarding logic between connections.
    Engine,
    /// Moves packets between the process and the outside world.
    Transport,
    /// Establishes links between components, possibly across a network.
    ConnectionManager,
}

impl Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Engine => "engine",
            Self::Transport => "transport",
            Self::ConnectionManager => "connection-manager",
        };
        write!(f, "{}", s)
    }
}

/// Plugin-private state held inside a [`Component`].
///
/// A family's factory produces one of these; the framework stores it without
/// interpreting it. Families downcast through [`Component::state`] to reach
/// their own type.
pub trait ComponentState: Any {
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// For components of kind connection-manager, exposes the asynchronous
    /// connect protocol.
    fn as_connection_manager(&mut self) -> Option<&mut dyn ConnectionManager> {
        None
    }

    /// Called before the state is dropped, while the owning context still
    /// holds the reactor. Implementations must delete every outstanding
    /// reactor registration they own here; a registration left behind would
    /// later invoke a callback into freed state.
    fn detach(&mut self, reactor: &dyn Reactor) {
        let _ = reactor;
    }
}

/// A named, typed, pluggable unit owned by a [`Context`](crate::Context).
///
/// The reference count tracks inbound references from other components, such
/// as a connection-manager-built link pinning a transport. It is maintained
/// explicitly by whichever code establishes or tears down a link; the
/// framework only refuses to remove a component while it is nonzero.
pub struct Component {
    name: String,
    kind: ComponentKind,
    family: String,
    args: Args,
    refs: Cell<usize>,
    state: Box<dyn ComponentState>,
}

impl Component {
    pub(crate) fn new(
        name: String,
        kind: ComponentKind,
        family: String,
        args: Args,
        state: Box<dyn ComponentState>,
    ) -> Self {
        Self {
            name,
            kind,
            family,
            args,
            refs: Cell::new(0),
            state,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    /// The arguments the component was constructed with, kept for
    /// configuration save.
    pub fn args(&self) -> &Args {
        &self.args
    }

    /// How many other components currently reference this one.
    pub fn ref_count(&self) -> usize {
        self.refs.get()
    }

    pub(crate) fn acquire(&self) {
        self.refs.set(self.refs.get() + 1);
    }

    pub(crate) fn release(&self) -> Result<(), ReleaseError> {
        let refs = self.refs.get();
        if refs == 0 {
            return Err(ReleaseError(self.name.clone()));
        }
        self.refs.set(refs - 1);
        Ok(())
    }

    /// Downcasts the plugin-private state to a concrete family type.
    pub fn state<T: ComponentState>(&self) -> Option<&T> {
        self.state.as_any().downcast_ref()
    }

    /// Mutable variant of [`state`](Component::state).
    pub fn state_mut<T: ComponentState>(&mut self) -> Option<&mut T> {
        self.state.as_any_mut().downcast_mut()
    }

    /// The connect protocol, for components of kind connection-manager.
    pub fn connection_manager(&mut self) -> Option<&mut dyn ConnectionManager> {
        self.state.as_connection_manager()
    }

    pub(crate) fn detach(&mut self, reactor: &dyn Reactor) {
        self.state.detach(reactor);
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("family", &self.family)
            .field("refs", &self.refs.get())
            .finish()
    }
}

/// Reference-count underflow: a link was torn down twice.
#[derive(Debug, ThisError, Clone, PartialEq, Eq)]
#[error("component {0:?} released with a zero reference count")]
pub struct ReleaseError(pub String);
