//! Schema assembly.
//!
//! At schema-build time the component registries supply ordered schema
//! generators and schema interceptors; the chain executor runs the
//! interceptors around each generator's contribution to the schema registry.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::chain::ChainExecutor;
use crate::error::Result;
use crate::registry::PipelineComponents;

/// A field on a schema type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDefinition {
    /// Field name
    pub name: String,
    /// Name of the type this field resolves to
    pub type_name: String,
    /// Explicit required-role marker, checked before any configured rules
    pub required_role: Option<String>,
}

impl FieldDefinition {
    /// A plain field with no role marker.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            required_role: None,
        }
    }

    /// Attach an explicit required-role marker.
    pub fn with_required_role(mut self, role: impl Into<String>) -> Self {
        self.required_role = Some(role.into());
        self
    }
}

/// A schema type and its fields.
#[derive(Debug, Clone, Default)]
pub struct TypeDefinition {
    /// Type name
    pub name: String,
    /// Fields in contribution order
    pub fields: Vec<FieldDefinition>,
}

impl TypeDefinition {
    /// Create a type with no fields yet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Append a field definition.
    pub fn field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    /// Look up a field by exact name.
    pub fn field_named(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Collects generator contributions into the final schema.
///
/// Built once at startup and read-only afterwards; safe for unsynchronized
/// concurrent reads during resolution.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    types: HashMap<String, TypeDefinition>,
}

impl SchemaRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a type contribution. Contributions to an existing type merge
    /// their fields in arrival order.
    pub fn contribute_type(&mut self, definition: TypeDefinition) {
        match self.types.get_mut(&definition.name) {
            Some(existing) => existing.fields.extend(definition.fields),
            None => {
                self.types.insert(definition.name.clone(), definition);
            }
        }
    }

    /// Look up a type by exact name.
    pub fn type_named(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.get(name)
    }

    /// Number of registered types.
    pub fn type_count(&self) -> usize {
        self.types.len()
    }
}

/// Contributes type definitions to the schema registry at build time.
pub trait SchemaGenerator: Send + Sync {
    /// Generator name, for logging and context inspection.
    fn name(&self) -> &str;

    /// Apply this generator's contribution to the registry.
    fn contribute(&self, registry: &mut SchemaRegistry) -> Result<()>;
}

/// Context threaded through the schema interceptor chain.
pub struct SchemaContext {
    /// The schema being assembled
    pub registry: SchemaRegistry,
    /// Name of the generator whose contribution is being applied
    pub generator: String,
}

/// Assemble the schema: run the schema interceptor chain around each
/// generator's contribution, in generator registration order.
pub fn assemble(components: &PipelineComponents) -> Result<SchemaRegistry> {
    let executor: ChainExecutor<SchemaContext, ()> =
        ChainExecutor::new(components.schema_interceptors.to_vec());

    let mut ctx = SchemaContext {
        registry: SchemaRegistry::new(),
        generator: String::new(),
    };

    for generator in components.schema_generators.components() {
        ctx.generator = generator.name().to_string();
        debug!(generator = %ctx.generator, "Applying schema contribution");

        let generator = Arc::clone(generator);
        executor.process(&mut ctx, move |ctx| generator.contribute(&mut ctx.registry))?;
    }

    debug!(types = ctx.registry.type_count(), "Schema assembled");
    Ok(ctx.registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{Interceptor, Next};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticGenerator {
        name: &'static str,
        definition: TypeDefinition,
    }

    impl SchemaGenerator for StaticGenerator {
        fn name(&self) -> &str {
            self.name
        }

        fn contribute(&self, registry: &mut SchemaRegistry) -> Result<()> {
            registry.contribute_type(self.definition.clone());
            Ok(())
        }
    }

    struct CountingInterceptor {
        invocations: Arc<AtomicUsize>,
    }

    impl Interceptor<SchemaContext, ()> for CountingInterceptor {
        fn handle(&self, ctx: &mut SchemaContext, next: Next<'_, SchemaContext, ()>) -> Result<()> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            next.run(ctx)
        }
    }

    #[test]
    fn test_contributions_to_same_type_merge() {
        let mut components = PipelineComponents::new();
        components.schema_generators.register(Arc::new(StaticGenerator {
            name: "base",
            definition: TypeDefinition::new("User").field(FieldDefinition::new("id", "ID")),
        }));
        components.schema_generators.register(Arc::new(StaticGenerator {
            name: "extension",
            definition: TypeDefinition::new("User").field(FieldDefinition::new("email", "String")),
        }));

        let schema = assemble(&components).unwrap();

        let user = schema.type_named("User").unwrap();
        assert_eq!(user.fields.len(), 2);
        assert!(user.field_named("id").is_some());
        assert!(user.field_named("email").is_some());
    }

    #[test]
    fn test_interceptor_wraps_each_contribution() {
        let invocations = Arc::new(AtomicUsize::new(0));

        let mut components = PipelineComponents::new();
        components.schema_interceptors.register(Arc::new(CountingInterceptor {
            invocations: Arc::clone(&invocations),
        }));
        for name in ["a", "b", "c"] {
            components.schema_generators.register(Arc::new(StaticGenerator {
                name,
                definition: TypeDefinition::new(name.to_uppercase()),
            }));
        }

        let schema = assemble(&components).unwrap();

        assert_eq!(schema.type_count(), 3);
        assert_eq!(invocations.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_required_role_marker_survives_assembly() {
        let mut components = PipelineComponents::new();
        components.schema_generators.register(Arc::new(StaticGenerator {
            name: "audit",
            definition: TypeDefinition::new("Query").field(
                FieldDefinition::new("auditLog", "AuditLog").with_required_role("ADMIN"),
            ),
        }));

        let schema = assemble(&components).unwrap();

        let field = schema
            .type_named("Query")
            .and_then(|t| t.field_named("auditLog"))
            .unwrap();
        assert_eq!(field.required_role.as_deref(), Some("ADMIN"));
    }
}
