//! An embeddable virtual Ethernet switching runtime.
//!
//! Independently implemented pieces of a virtual switch — packet transports
//! (tap device, UDP socket, unix socket, ...), switching engines (hub,
//! bridge, learning switch), and connection managers that build links between
//! remote instances — are instantiated by name and wired together at runtime
//! into an arbitrary topology, inside a host process that supplies its own
//! event loop.
//!
//! # Organization
//!
//! - [`Packet`] is the zero-copy, margin-reserving frame container every
//!   transport and engine exchanges
//! - [`Reactor`] is the adapter through which components watch file
//!   descriptors and timers without the framework owning a dispatch loop
//! - [`Component`] and [`ComponentFactory`] implement the kind/family
//!   polymorphism that lets new plugins be added without touching the
//!   framework
//! - [`ConnectionManager`] and [`PendingConnect`] implement the asynchronous
//!   connect protocol
//! - [`Context`] is the registry that owns and names components and drives
//!   configuration persistence
//!
//! # Hosting contract
//!
//! The framework is single-threaded cooperative and never blocks: anything
//! that would wait for I/O is expressed as "register interest, return, get
//! called back" through the bound [`Reactor`]. The host creates a
//! [`Context`], binds a reactor, and asks the context to instantiate named
//! components; once components are linked, packet buffers move directly
//! between transports and engines without the context in the path.

pub mod args;
pub use args::{ArgError, ArgValue, Args};

pub mod packet;
pub use packet::{Packet, PacketError, PacketHeader};

pub mod reactor;
pub use reactor::{EventFn, EventToken, Interest, Reactor, StepReactor};

pub mod component;
pub use component::{Component, ComponentKind, ComponentState};

pub mod connect;
pub use connect::{ConnectFn, ConnectOutcome, ConnectionManager, PendingConnect};

pub mod registry;
pub use registry::{ComponentFactory, FactoryEnv, Registry};

pub mod context;
pub use context::{Context, CreateError, InitError, RemoveError};

pub mod config;
pub use config::{ComponentRecord, ConfigCodec, ConfigError, JsonCodec};

pub mod logging;
pub use logging::{set_log_handler, LogHandler, Priority};
