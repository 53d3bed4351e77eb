//! Factory registration for pluggable component families.

use crate::args::Args;
use crate::component::{ComponentKind, ComponentState};
use crate::context::CreateError;
use crate::reactor::Reactor;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// What a factory may touch while constructing a component.
pub struct FactoryEnv {
    reactor: Arc<dyn Reactor>,
}

impl FactoryEnv {
    pub(crate) fn new(reactor: Arc<dyn Reactor>) -> Self {
        Self { reactor }
    }

    /// The reactor bound to the owning context, for components that register
    /// fd or timer interest during construction.
    pub fn reactor(&self) -> &Arc<dyn Reactor> {
        &self.reactor
    }
}

/// Builds the plugin-private state for one component family.
///
/// A factory is registered under a (kind, family) pair and receives the
/// family-defined [`Args`] uninterpreted; it validates and decodes its own
/// expected shape, returning [`CreateError::InvalidArgument`] (or an
/// [`ArgError`](crate::args::ArgError) through its `From` impl) on a
/// malformed set.
pub trait ComponentFactory {
    fn build(
        &self,
        name: &str,
        args: &Args,
        env: &FactoryEnv,
    ) -> Result<Box<dyn ComponentState>, CreateError>;
}

/// A mapping of (kind, family) pairs to factories.
///
/// New transport, engine, and connection-manager implementations plug in here
/// without touching the framework.
#[derive(Default)]
pub struct Registry {
    factories: FxHashMap<(ComponentKind, String), Arc<dyn ComponentFactory>>,
}

impl Registry {
    pub fn new() -> Self {
        Default::default()
    }

    /// A builder function that registers `factory` for the given pair.
    pub fn with(
        mut self,
        kind: ComponentKind,
        family: impl Into<String>,
        factory: Arc<dyn ComponentFactory>,
    ) -> Self {
        self.register(kind, family, factory);
        self
    }

    /// Registers `factory` for the given pair, replacing any previous entry.
    pub fn register(
        &mut self,
        kind: ComponentKind,
        family: impl Into<String>,
        factory: Arc<dyn ComponentFactory>,
    ) {
        self.factories.insert((kind, family.into()), factory);
    }

    pub fn lookup(&self, kind: ComponentKind, family: &str) -> Option<Arc<dyn ComponentFactory>> {
        self.factories.get(&(kind, family.to_string())).cloned()
    }

    pub fn contains(&self, kind: ComponentKind, family: &str) -> bool {
        self.factories.contains_key(&(kind, family.to_string()))
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;

    struct Null;

    impl ComponentState for Null {
        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    struct NullFactory;

    impl ComponentFactory for NullFactory {
        fn build(
            &self,
            _name: &str,
            _args: &Args,
            _env: &FactoryEnv,
        ) -> Result<Box<dyn ComponentState>, CreateError> {
            Ok(Box::new(Null))
        }
    }

    #[test]
    fn lookup_is_per_kind() {
        let registry = Registry::new().with(
            ComponentKind::Engine,
            "hub",
            Arc::new(NullFactory) as Arc<dyn ComponentFactory>,
        );
        assert!(registry.contains(ComponentKind::Engine, "hub"));
        assert!(!registry.contains(ComponentKind::Transport, "hub"));
        assert!(registry.lookup(ComponentKind::Engine, "hub").is_some());
        assert!(registry.lookup(ComponentKind::Engine, "switch").is_none());
    }
}
