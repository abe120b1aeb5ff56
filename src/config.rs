//! Configuration management for the resolution pipeline.
//!
//! Supplies named rate-limit policies and the access control rule list from a
//! YAML document. Loaded once by an external configuration collaborator and
//! read-only afterwards.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::ratelimit::Strategy;

/// Main configuration for the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Named rate-limit policies (policy name -> parameters)
    #[serde(default)]
    pub policies: HashMap<String, PolicyConfig>,

    /// Access control rules, evaluated by resolved type name
    #[serde(default)]
    pub access_rules: Vec<AccessRuleConfig>,
}

/// Parameters for a single named rate-limit policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Limiting strategy for this policy
    #[serde(default)]
    pub strategy: StrategyKind,

    /// Maximum tokens allowed in the window
    pub limit: u64,

    /// Window length in seconds
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

/// Limiting strategy (matches the configuration file format).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Sliding window, bucket created on first use
    #[default]
    SlidingWindow,
    /// Sliding window requiring a pre-initialized bucket
    SlidingWindowStrict,
}

impl From<StrategyKind> for Strategy {
    fn from(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::SlidingWindow => Strategy::SlidingWindow,
            StrategyKind::SlidingWindowStrict => Strategy::SlidingWindowStrict,
        }
    }
}

/// A single access control rule.
///
/// A rule with an empty `fields` list applies to the whole type; otherwise it
/// restricts only the listed sub-fields. A rule with `allow_ips` set only
/// denies callers whose source address is outside the list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessRuleConfig {
    /// Resolved GraphQL type name this rule applies to
    pub type_name: String,

    /// Restricted sub-fields (empty = whole type)
    #[serde(default)]
    pub fields: Vec<String>,

    /// Roles allowed past this rule
    #[serde(default)]
    pub roles: Vec<String>,

    /// Optional source-IP allowlist
    #[serde(default)]
    pub allow_ips: Option<Vec<String>>,
}

fn default_interval_secs() -> u64 {
    60
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading pipeline configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)
            .map_err(|e| PipelineError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Get the parameters for a named policy.
    pub fn policy(&self, name: &str) -> Option<&PolicyConfig> {
        self.policies.get(name)
    }

    fn validate(&self) -> Result<()> {
        for (name, policy) in &self.policies {
            if policy.limit == 0 {
                return Err(PipelineError::Config(format!(
                    "Policy '{}' has a zero limit",
                    name
                )));
            }
            if policy.interval_secs == 0 {
                return Err(PipelineError::Config(format!(
                    "Policy '{}' has a zero interval",
                    name
                )));
            }
        }
        Ok(())
    }
}
