//! Component registries for pipeline wiring.
//!
//! Components are collected into typed, ordered registries at startup and
//! never mutated during execution. Registration order is the execution order
//! everywhere a registry feeds a chain.

use std::sync::Arc;
use tracing::debug;

use crate::chain::Interceptor;
use crate::ratelimit::ConfigFactory;
use crate::resolution::ResolutionContext;
use crate::resolver::Resolver;
use crate::schema::{SchemaContext, SchemaGenerator};
use serde_json::Value;

/// An ordered collection of components sharing one capability.
///
/// Order is fixed at wiring time and stable across resolutions for the
/// process lifetime. An empty registry is a valid, common case: chains built
/// from it degenerate to just their terminal operation.
pub struct Registry<T: ?Sized> {
    components: Vec<Arc<T>>,
}

impl<T: ?Sized> Registry<T> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// Append a component. Called from service wiring at startup only.
    pub fn register(&mut self, component: Arc<T>) {
        self.components.push(component);
    }

    /// All components in registration order.
    pub fn components(&self) -> &[Arc<T>] {
        &self.components
    }

    /// Clone the ordered component list, e.g. to seed a chain executor.
    pub fn to_vec(&self) -> Vec<Arc<T>> {
        self.components.clone()
    }

    /// Number of registered components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Whether no components are registered.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl<T: ?Sized> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// All component registries the pipeline draws from, grouped by capability.
///
/// Built once at startup by the wiring layer; read-only afterwards and safe
/// for unsynchronized concurrent reads.
#[derive(Default)]
pub struct PipelineComponents {
    /// Contribute type definitions at schema-build time
    pub schema_generators: Registry<dyn SchemaGenerator>,
    /// Wrap each generator's contribution
    pub schema_interceptors: Registry<dyn Interceptor<SchemaContext, ()>>,
    /// Wrap every field resolution
    pub resolution_interceptors: Registry<dyn Interceptor<ResolutionContext, Value>>,
    /// Terminal field resolvers
    pub resolvers: Registry<dyn Resolver>,
    /// Limiter configuration factories, first-success order
    pub config_factories: Registry<dyn ConfigFactory>,
}

impl PipelineComponents {
    /// Create an empty wiring set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Log a wiring summary. Useful at startup to catch misconfiguration.
    pub fn log_summary(&self) {
        debug!(
            schema_generators = self.schema_generators.len(),
            schema_interceptors = self.schema_interceptors.len(),
            resolution_interceptors = self.resolution_interceptors.len(),
            resolvers = self.resolvers.len(),
            config_factories = self.config_factories.len(),
            "Pipeline components wired"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Marker: Send + Sync {
        fn id(&self) -> u32;
    }

    struct M(u32);

    impl Marker for M {
        fn id(&self) -> u32 {
            self.0
        }
    }

    #[test]
    fn test_empty_registry_resolves_to_empty_list() {
        let registry: Registry<dyn Marker> = Registry::new();
        assert!(registry.is_empty());
        assert!(registry.components().is_empty());
    }

    #[test]
    fn test_registration_order_is_preserved() {
        let mut registry: Registry<dyn Marker> = Registry::new();
        registry.register(Arc::new(M(1)));
        registry.register(Arc::new(M(2)));
        registry.register(Arc::new(M(3)));

        let ids: Vec<u32> = registry.components().iter().map(|c| c.id()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_to_vec_matches_components() {
        let mut registry: Registry<dyn Marker> = Registry::new();
        registry.register(Arc::new(M(7)));
        registry.register(Arc::new(M(8)));

        let cloned = registry.to_vec();
        assert_eq!(cloned.len(), registry.len());
        assert_eq!(cloned[0].id(), 7);
        assert_eq!(cloned[1].id(), 8);
    }
}
