//! The [`Context`] registry that owns and names components.

use crate::args::{ArgError, Args};
use crate::component::{Component, ComponentKind};
use crate::logging::{component_created_event, component_removed_event};
use crate::reactor::Reactor;
use crate::registry::{FactoryEnv, Registry};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use thiserror::Error as ThisError;

/// The root ownership object for one virtual switch instance.
///
/// A context owns all components by name, holds the factory registry they are
/// built from, and carries the single reactor binding every component uses
/// for event registration. Access is single-threaded cooperative: control
/// re-enters framework code only through reactor-invoked callbacks, delivered
/// one at a time.
pub struct Context {
    components: FxHashMap<String, Component>,
    reactor: Option<Arc<dyn Reactor>>,
    registry: Registry,
    // Monotonic; never reused so synthesized names cannot collide with names
    // handed out earlier, even after removals.
    auto_name: u64,
}

impl Context {
    /// Creates an empty context with an empty factory registry.
    pub fn new() -> Self {
        Self::with_registry(Registry::new())
    }

    /// Creates an empty context over the given factory registry.
    pub fn with_registry(registry: Registry) -> Self {
        Self {
            components: FxHashMap::default(),
            reactor: None,
            registry,
            auto_name: 0,
        }
    }

    /// Binds the host's event reactor. Must run before any component that
    /// registers events is created, and at most once per context.
    pub fn init(&mut self, reactor: Arc<dyn Reactor>) -> Result<(), InitError> {
        if self.reactor.is_some() {
            return Err(InitError::AlreadyInitialized);
        }
        self.reactor = Some(reactor);
        Ok(())
    }

    /// Whether a reactor is currently bound.
    pub fn is_initialized(&self) -> bool {
        self.reactor.is_some()
    }

    /// Detaches the reactor. Components stay in place but no further
    /// event-registering creation is possible; the context is only good for
    /// inspection and dropping afterward.
    pub fn fini(&mut self) {
        self.reactor = None;
    }

    /// The factory registry components are built from.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Looks up the factory for (kind, family), allocates a unique name, and
    /// builds the component. With `name` as `None` a name is synthesized from
    /// the family and a counter that never repeats within this context.
    ///
    /// On any failure the context is unchanged: no partially constructed
    /// component is registered.
    pub fn create_component(
        &mut self,
        kind: ComponentKind,
        family: &str,
        name: Option<&str>,
        args: Args,
    ) -> Result<&Component, CreateError> {
        let reactor = self
            .reactor
            .as_ref()
            .ok_or(CreateError::NotInitialized)?
            .clone();
        let factory =
            self.registry
                .lookup(kind, family)
                .ok_or_else(|| CreateError::UnknownFamily {
                    kind,
                    family: family.to_string(),
                })?;
        let name = match name {
            Some(given) => {
                if self.components.contains_key(given) {
                    return Err(CreateError::DuplicateName(given.to_string()));
                }
                given.to_string()
            }
            None => self.synthesize_name(family),
        };
        let env = FactoryEnv::new(reactor);
        let state = factory.build(&name, &args, &env)?;
        component_created_event(kind, family, &name);
        let component = Component::new(name.clone(), kind, family.to_string(), args, state);
        Ok(self.components.entry(name).or_insert(component))
    }

    fn synthesize_name(&mut self, family: &str) -> String {
        loop {
            let candidate = format!("{}{}", family, self.auto_name);
            self.auto_name += 1;
            if !self.components.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    /// Exact-match lookup. Absence is an expected outcome, not an error.
    pub fn get_component(&self, name: &str) -> Option<&Component> {
        self.components.get(name)
    }

    /// Mutable variant of [`get_component`](Context::get_component).
    pub fn get_component_mut(&mut self, name: &str) -> Option<&mut Component> {
        self.components.get_mut(name)
    }

    /// Removes a component, running its detach hook and dropping its state.
    /// Refused while other components still reference it.
    pub fn remove_component(&mut self, name: &str) -> Result<(), RemoveError> {
        let component = self
            .components
            .get(name)
            .ok_or_else(|| RemoveError::NotFound(name.to_string()))?;
        let refs = component.ref_count();
        if refs > 0 {
            return Err(RemoveError::Busy {
                name: name.to_string(),
                refs,
            });
        }
        let mut component = self.components.remove(name).expect("presence checked above");
        if let Some(reactor) = &self.reactor {
            component.detach(reactor.as_ref());
        }
        component_removed_event(name);
        Ok(())
    }

    /// Records that another component now references `name`. Used by link
    /// establishment, typically in connection managers. Returns false when no
    /// such component exists.
    pub fn add_ref(&self, name: &str) -> bool {
        match self.components.get(name) {
            Some(component) => {
                component.acquire();
                true
            }
            None => false,
        }
    }

    /// Releases a reference previously taken with [`add_ref`](Context::add_ref).
    pub fn drop_ref(&self, name: &str) -> bool {
        match self.components.get(name) {
            Some(component) => match component.release() {
                Ok(()) => true,
                Err(err) => {
                    tracing::warn!("{err}");
                    false
                }
            },
            None => false,
        }
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        // The binding leaves the context first so no detach hook can
        // register new events during teardown, but destroyed components
        // still get to delete the registrations they own; a registration
        // left behind would later fire into freed state.
        let reactor = self.reactor.take();

        // Remove unreferenced components until a fixed point, letting
        // reference counts drain naturally as their holders go away.
        loop {
            let removable: Vec<String> = self
                .components
                .values()
                .filter(|c| c.ref_count() == 0)
                .map(|c| c.name().to_string())
                .collect();
            if removable.is_empty() {
                break;
            }
            for name in removable {
                if let Some(mut component) = self.components.remove(&name) {
                    if let Some(reactor) = &reactor {
                        component.detach(reactor.as_ref());
                    }
                }
            }
        }

        // Whatever is left is cyclic; context deletion is unconditional.
        if !self.components.is_empty() {
            tracing::warn!(
                count = self.components.len(),
                "forcibly releasing components with cyclic references"
            );
            for (_, mut component) in self.components.drain() {
                if let Some(reactor) = &reactor {
                    component.detach(reactor.as_ref());
                }
            }
        }
    }
}

/// Double initialization of a context.
#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum InitError {
    #[error("context is already bound to a reactor")]
    AlreadyInitialized,
}

/// Failure to create a component. The context is left unchanged.
#[derive(Debug, ThisError, Clone, PartialEq, Eq)]
pub enum CreateError {
    #[error("no factory registered for {kind} family {family:?}")]
    UnknownFamily {
        kind: ComponentKind,
        family: String,
    },
    #[error("a component named {0:?} already exists")]
    DuplicateName(String),
    #[error("context has no bound reactor")]
    NotInitialized,
    #[error("invalid construction arguments: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Arg(#[from] ArgError),
    #[error("out of resources: {0}")]
    Allocation(String),
}

/// Failure to remove a component. The component stays registered, unchanged.
#[derive(Debug, ThisError, Clone, PartialEq, Eq)]
pub enum RemoveError {
    #[error("component {name:?} is referenced by {refs} other component(s)")]
    Busy { name: String, refs: usize },
    #[error("no component named {0:?}")]
    NotFound(String),
}
