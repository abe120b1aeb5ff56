//! Resolver components and the field/type -> handler table.
//!
//! Resolvers declare the fields they handle through [`Resolver::bindings`]
//! (explicit registration, in place of runtime attribute scanning). The
//! [`ResolverMap`] collects those declarations into a lookup table on first
//! use and caches it for the process lifetime.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::debug;

use crate::error::Result;
use crate::resolution::ResolutionContext;
use serde_json::Value;

/// A "handles field on type" declaration made by a resolver component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldBinding {
    /// GraphQL type name the handler applies to
    pub type_name: String,
    /// Handler method name; matched exactly against the requested field name
    pub method: String,
}

impl FieldBinding {
    pub fn new(type_name: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            method: method.into(),
        }
    }
}

/// A terminal field resolver component.
pub trait Resolver: Send + Sync {
    /// Component name, for logging.
    fn name(&self) -> &str;

    /// The fields this component handles.
    fn bindings(&self) -> Vec<FieldBinding>;

    /// Invoke the named handler method.
    fn resolve(&self, method: &str, ctx: &ResolutionContext) -> Result<Value>;
}

/// One candidate handler for a type: the component plus the method to call.
#[derive(Clone)]
pub struct ResolverBinding {
    pub resolver: Arc<dyn Resolver>,
    pub method: String,
}

/// Lookup table from type name to candidate handlers.
///
/// Built lazily on the first lookup and cached permanently; reads after the
/// one-time build need no synchronization. A type may map to zero, one, or
/// many candidates (a generic backing-store resolver and a type-specific
/// override may coexist); callers select by exact method-name match. The map
/// itself makes no selection decision.
pub struct ResolverMap {
    resolvers: Vec<Arc<dyn Resolver>>,
    table: OnceLock<HashMap<String, Vec<ResolverBinding>>>,
}

impl ResolverMap {
    /// Create a map over the registered resolver components.
    pub fn new(resolvers: Vec<Arc<dyn Resolver>>) -> Self {
        Self {
            resolvers,
            table: OnceLock::new(),
        }
    }

    /// Candidate handlers for a type, in resolver registration order.
    ///
    /// Returns an empty slice for types no resolver claims.
    pub fn resolvers_for(&self, type_name: &str) -> &[ResolverBinding] {
        self.table()
            .get(type_name)
            .map(|bindings| bindings.as_slice())
            .unwrap_or(&[])
    }

    /// Number of distinct type names with at least one handler.
    pub fn type_count(&self) -> usize {
        self.table().len()
    }

    fn table(&self) -> &HashMap<String, Vec<ResolverBinding>> {
        self.table.get_or_init(|| self.build())
    }

    fn build(&self) -> HashMap<String, Vec<ResolverBinding>> {
        let mut table: HashMap<String, Vec<ResolverBinding>> = HashMap::new();

        for resolver in &self.resolvers {
            for binding in resolver.bindings() {
                debug!(
                    resolver = resolver.name(),
                    type_name = %binding.type_name,
                    method = %binding.method,
                    "Registering resolver binding"
                );
                table.entry(binding.type_name).or_default().push(ResolverBinding {
                    resolver: Arc::clone(resolver),
                    method: binding.method,
                });
            }
        }

        debug!(types = table.len(), "Resolver map built");
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FixedResolver {
        name: &'static str,
        bindings: Vec<FieldBinding>,
    }

    impl Resolver for FixedResolver {
        fn name(&self) -> &str {
            self.name
        }

        fn bindings(&self) -> Vec<FieldBinding> {
            self.bindings.clone()
        }

        fn resolve(&self, method: &str, _ctx: &ResolutionContext) -> Result<Value> {
            Ok(json!({ "resolver": self.name, "method": method }))
        }
    }

    fn sample_map() -> ResolverMap {
        ResolverMap::new(vec![
            Arc::new(FixedResolver {
                name: "orm",
                bindings: vec![
                    FieldBinding::new("User", "id"),
                    FieldBinding::new("User", "email"),
                    FieldBinding::new("Post", "title"),
                ],
            }) as Arc<dyn Resolver>,
            Arc::new(FixedResolver {
                name: "override",
                bindings: vec![FieldBinding::new("User", "email")],
            }),
        ])
    }

    #[test]
    fn test_lookup_by_type_name() {
        let map = sample_map();

        assert_eq!(map.resolvers_for("User").len(), 3);
        assert_eq!(map.resolvers_for("Post").len(), 1);
        assert!(map.resolvers_for("Comment").is_empty());
    }

    #[test]
    fn test_multiple_candidates_keep_registration_order() {
        let map = sample_map();

        let emails: Vec<&str> = map
            .resolvers_for("User")
            .iter()
            .filter(|b| b.method == "email")
            .map(|b| b.resolver.name())
            .collect();

        // Generic handler first, the override after it
        assert_eq!(emails, vec!["orm", "override"]);
    }

    #[test]
    fn test_build_is_idempotent() {
        let map = sample_map();

        let first: Vec<(String, String)> = map
            .resolvers_for("User")
            .iter()
            .map(|b| (b.resolver.name().to_string(), b.method.clone()))
            .collect();
        let second: Vec<(String, String)> = map
            .resolvers_for("User")
            .iter()
            .map(|b| (b.resolver.name().to_string(), b.method.clone()))
            .collect();

        assert_eq!(first, second);
        assert_eq!(map.type_count(), 2);
    }
}
