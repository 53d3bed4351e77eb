//! The best-effort logging sink.
//!
//! A single process-wide handler receives (priority, message) pairs. When no
//! handler is installed, messages are emitted as `tracing` events at the
//! mapped level, which end up on standard error under the usual subscriber
//! defaults. Infrastructure only; nothing here carries correctness
//! obligations.

use std::fmt::{self, Display};
use std::sync::RwLock;

/// Message priorities, ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Error,
    Warning,
    Notice,
    Info,
    Debug,
}

impl Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Notice => "notice",
            Self::Info => "info",
            Self::Debug => "debug",
        };
        write!(f, "{}", s)
    }
}

/// The process-wide handler type.
pub type LogHandler = Box<dyn Fn(Priority, &str) + Send + Sync>;

static HANDLER: RwLock<Option<LogHandler>> = RwLock::new(None);

/// Installs (or with `None`, removes) the process-wide log handler.
pub fn set_log_handler(handler: Option<LogHandler>) {
    *HANDLER.write().expect("log handler lock poisoned") = handler;
}

/// Delivers a message to the installed handler, or to `tracing` when none is
/// installed.
pub fn log(priority: Priority, message: &str) {
    if let Some(handler) = HANDLER.read().expect("log handler lock poisoned").as_ref() {
        handler(priority, message);
        return;
    }
    match priority {
        Priority::Error => tracing::error!("{message}"),
        Priority::Warning => tracing::warn!("{message}"),
        Priority::Notice | Priority::Info => tracing::info!("{message}"),
        Priority::Debug => tracing::debug!("{message}"),
    }
}

/// Component lifecycle events logged from inside the framework.
pub(crate) fn component_created_event(kind: impl Display, family: &str, name: &str) {
    log(
        Priority::Info,
        &format!("created {kind} component {name:?} (family {family:?})"),
    );
}

pub(crate) fn component_removed_event(name: &str) {
    log(Priority::Info, &format!("removed component {name:?}"));
}

pub(crate) fn config_loaded_event(count: usize, path: &std::path::Path) {
    log(
        Priority::Notice,
        &format!("loaded {count} component(s) from {}", path.display()),
    );
}

pub(crate) fn config_saved_event(count: usize, path: &std::path::Path) {
    log(
        Priority::Notice,
        &format!("saved {count} component(s) to {}", path.display()),
    );
}
