//! Field and type authorization.
//!
//! The access control interceptor runs inside the resolution chain. It calls
//! `next` first (the value must exist before authorization can be layered
//! onto its sub-selections), then checks the explicit required-role marker,
//! whole-type rules, and sub-field rules. Sub-field denials are lazy: the
//! offending field is registered in the execution context's deny table and
//! errors only if it is actually resolved, so a partially authorized
//! response is possible and only the unauthorized leaf fails.

use std::net::IpAddr;

use serde_json::Value;
use tracing::{debug, trace};

use crate::chain::{Interceptor, Next};
use crate::config::{AccessRuleConfig, PipelineConfig};
use crate::error::{PipelineError, Result};
use crate::resolution::{ExecutionContext, ResolutionContext};

/// One loaded access control rule. Read-only during resolution.
#[derive(Debug, Clone)]
pub struct AccessRule {
    /// Resolved type name the rule applies to
    pub type_name: String,
    /// Restricted sub-fields; empty means the whole type
    pub fields: Vec<String>,
    /// Roles allowed past the rule
    pub roles: Vec<String>,
    /// Source addresses allowed past the rule, when present
    pub allow_ips: Option<Vec<IpAddr>>,
}

impl AccessRule {
    /// Whether the caller satisfies this rule. Role and allowlist are both
    /// required when both are configured.
    fn permits(&self, execution: &ExecutionContext) -> bool {
        if !self.roles.is_empty() && !execution.has_any_role(&self.roles) {
            return false;
        }
        if let Some(ref allowed) = self.allow_ips {
            match execution.source_ip {
                Some(ip) => allowed.contains(&ip),
                None => false,
            }
        } else {
            true
        }
    }
}

impl TryFrom<&AccessRuleConfig> for AccessRule {
    type Error = PipelineError;

    fn try_from(config: &AccessRuleConfig) -> Result<Self> {
        let allow_ips = config
            .allow_ips
            .as_ref()
            .map(|ips| {
                ips.iter()
                    .map(|ip| {
                        ip.parse::<IpAddr>().map_err(|e| {
                            PipelineError::Config(format!("Bad allowlist address '{}': {}", ip, e))
                        })
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?;

        Ok(Self {
            type_name: config.type_name.clone(),
            fields: config.fields.clone(),
            roles: config.roles.clone(),
            allow_ips,
        })
    }
}

/// Resolution interceptor enforcing configured access control rules.
pub struct AccessControlInterceptor {
    rules: Vec<AccessRule>,
}

impl AccessControlInterceptor {
    /// Create the interceptor over a loaded rule list.
    pub fn new(rules: Vec<AccessRule>) -> Self {
        Self { rules }
    }

    /// Load the rule list from the pipeline configuration.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let rules = config
            .access_rules
            .iter()
            .map(AccessRule::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(rules))
    }
}

impl Interceptor<ResolutionContext, Value> for AccessControlInterceptor {
    fn handle(
        &self,
        ctx: &mut ResolutionContext,
        next: Next<'_, ResolutionContext, Value>,
    ) -> Result<Value> {
        let value = next.run(ctx)?;

        // (a) Explicit required-role marker on the field itself
        if let Some(ref role) = ctx.field.required_role {
            if !ctx.execution.has_role(role) {
                debug!(
                    type_name = %ctx.field.parent_type,
                    field = %ctx.field.name,
                    role = %role,
                    "Field role marker not satisfied"
                );
                return Err(PipelineError::AccessDenied {
                    type_name: ctx.field.parent_type.clone(),
                    field: ctx.field.name.clone(),
                });
            }
        }

        // (b), (c) Configured rules, keyed by the resolved type name
        for rule in self
            .rules
            .iter()
            .filter(|r| r.type_name == ctx.field.resolved_type)
        {
            if rule.permits(&ctx.execution) {
                continue;
            }

            if rule.fields.is_empty() {
                // Whole-type rule: deny the field that produced the value
                debug!(
                    type_name = %ctx.field.resolved_type,
                    field = %ctx.field.name,
                    "Type-level access rule denied"
                );
                return Err(PipelineError::AccessDenied {
                    type_name: ctx.field.resolved_type.clone(),
                    field: ctx.field.name.clone(),
                });
            }

            // Sub-field rule: only fields actually present in the requested
            // selection are registered, and the denial fires lazily when the
            // field is resolved.
            for field in &rule.fields {
                if ctx.field.selection.iter().any(|s| s == field) {
                    trace!(
                        type_name = %ctx.field.resolved_type,
                        field = %field,
                        "Registering lazy sub-field denial"
                    );
                    ctx.execution.deny_field(
                        ctx.field.resolved_type.as_str(),
                        field.as_str(),
                        rule.roles.join(","),
                    );
                }
            }
        }

        Ok(value)
    }
}
