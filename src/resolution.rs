//! Per-request resolution contexts and the field resolution pipeline.
//!
//! Each incoming request is handled by one logical worker; interceptors are
//! synchronous with respect to one request. The only cross-field mutable
//! state is the execution context's lazy-denial table, which the access
//! interceptor fills and the terminal resolver step consults.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, trace};

use crate::chain::ChainExecutor;
use crate::error::{PipelineError, Result};
use crate::registry::PipelineComponents;
use crate::resolver::ResolverMap;

/// Request-scoped data shared across all field resolutions of one query.
pub struct ExecutionContext {
    /// Rate-limit subject key (client, IP, or user identifier)
    pub subject: String,
    /// Roles the caller holds
    pub roles: Vec<String>,
    /// Source address of the request, if known
    pub source_ip: Option<IpAddr>,
    /// Sub-fields denied lazily by the access interceptor, keyed by
    /// (type name, field name). The denial fires only if the field is
    /// actually resolved.
    deny_table: Mutex<HashMap<(String, String), String>>,
}

impl ExecutionContext {
    /// Create a context for a request identified by `subject`.
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            roles: Vec::new(),
            source_ip: None,
            deny_table: Mutex::new(HashMap::new()),
        }
    }

    /// Attach the caller's roles.
    pub fn with_roles(mut self, roles: Vec<String>) -> Self {
        self.roles = roles;
        self
    }

    /// Attach the request source address.
    pub fn with_source_ip(mut self, ip: IpAddr) -> Self {
        self.source_ip = Some(ip);
        self
    }

    /// Whether the caller holds the given role.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Whether the caller holds any of the given roles.
    pub fn has_any_role(&self, roles: &[String]) -> bool {
        roles.iter().any(|r| self.has_role(r))
    }

    /// Register a lazy denial for one sub-field of a type.
    pub fn deny_field(
        &self,
        type_name: impl Into<String>,
        field: impl Into<String>,
        required_role: impl Into<String>,
    ) {
        self.deny_table
            .lock()
            .insert((type_name.into(), field.into()), required_role.into());
    }

    /// The role a denied field would have required, if the field is denied.
    pub fn denial_for(&self, type_name: &str, field: &str) -> Option<String> {
        self.deny_table
            .lock()
            .get(&(type_name.to_string(), field.to_string()))
            .cloned()
    }
}

/// Static description of the field being resolved.
#[derive(Debug, Clone, Default)]
pub struct FieldInfo {
    /// Type the field is selected on
    pub parent_type: String,
    /// Field name
    pub name: String,
    /// Type the field resolves to
    pub resolved_type: String,
    /// Explicit required-role marker from the schema
    pub required_role: Option<String>,
    /// Sub-fields of the resolved type present in the requested selection set
    pub selection: Vec<String>,
}

impl FieldInfo {
    pub fn new(
        parent_type: impl Into<String>,
        name: impl Into<String>,
        resolved_type: impl Into<String>,
    ) -> Self {
        Self {
            parent_type: parent_type.into(),
            name: name.into(),
            resolved_type: resolved_type.into(),
            required_role: None,
            selection: Vec::new(),
        }
    }

    pub fn with_required_role(mut self, role: impl Into<String>) -> Self {
        self.required_role = Some(role.into());
        self
    }

    pub fn with_selection(mut self, selection: Vec<String>) -> Self {
        self.selection = selection;
        self
    }
}

/// Context threaded through the resolution interceptor chain for one field.
pub struct ResolutionContext {
    /// Parent object value the field is selected on
    pub object_value: Value,
    /// Field arguments from the query
    pub args: HashMap<String, Value>,
    /// Request-scoped execution context
    pub execution: Arc<ExecutionContext>,
    /// The field being resolved
    pub field: FieldInfo,
}

impl ResolutionContext {
    /// Context for a root-level field (no parent object).
    pub fn new(execution: Arc<ExecutionContext>, field: FieldInfo) -> Self {
        Self {
            object_value: Value::Null,
            args: HashMap::new(),
            execution,
            field,
        }
    }

    /// Attach the parent object value.
    pub fn with_object_value(mut self, value: Value) -> Self {
        self.object_value = value;
        self
    }

    /// Attach field arguments.
    pub fn with_args(mut self, args: HashMap<String, Value>) -> Self {
        self.args = args;
        self
    }
}

/// The field resolution pipeline: ordered resolution interceptors around a
/// terminal resolver selected from the resolver map.
///
/// Stateless after construction; one instance serves all concurrent requests.
pub struct ResolutionPipeline {
    executor: ChainExecutor<ResolutionContext, Value>,
    map: ResolverMap,
}

impl ResolutionPipeline {
    /// Build the pipeline from the wired components.
    pub fn from_components(components: &PipelineComponents) -> Self {
        Self {
            executor: ChainExecutor::new(components.resolution_interceptors.to_vec()),
            map: ResolverMap::new(components.resolvers.to_vec()),
        }
    }

    /// The underlying resolver map.
    pub fn resolver_map(&self) -> &ResolverMap {
        &self.map
    }

    /// Resolve one field: run the interceptor chain, ending at the terminal
    /// resolver chosen by exact method-name match on the parent type.
    ///
    /// The lazy-denial table is consulted just before the terminal resolver
    /// runs, so a denial registered for this field by an earlier resolution
    /// surfaces here and nowhere else.
    pub fn resolve_field(&self, ctx: &mut ResolutionContext) -> Result<Value> {
        trace!(
            parent_type = %ctx.field.parent_type,
            field = %ctx.field.name,
            "Resolving field"
        );

        self.executor.process(ctx, |ctx| {
            if ctx
                .execution
                .denial_for(&ctx.field.parent_type, &ctx.field.name)
                .is_some()
            {
                debug!(
                    type_name = %ctx.field.parent_type,
                    field = %ctx.field.name,
                    "Lazy denial fired on field read"
                );
                return Err(PipelineError::AccessDenied {
                    type_name: ctx.field.parent_type.clone(),
                    field: ctx.field.name.clone(),
                });
            }

            let bindings = self.map.resolvers_for(&ctx.field.parent_type);
            let binding = bindings
                .iter()
                .find(|b| b.method == ctx.field.name)
                .ok_or_else(|| PipelineError::ResolverMissing {
                    type_name: ctx.field.parent_type.clone(),
                    field: ctx.field.name.clone(),
                })?;

            binding.resolver.resolve(&binding.method, ctx)
        })
    }
}
