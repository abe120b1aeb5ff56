//! Limiter configuration resolution.
//!
//! An ordered chain of configuration factories, evaluated by first-success:
//! each factory either produces a fully formed [`LimiterConfig`] for a
//! (policy, subject) pair or declares itself not applicable. If every factory
//! passes, rate limiting for that policy is a no-op. This lets a catch-all
//! default and any number of named-policy factories coexist without one
//! config format knowing about the others.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace};

use crate::config::PipelineConfig;

use super::limiter::Strategy;

/// Limiter parameters for one request, created per request and not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimiterConfig {
    /// Limiter (policy) name; part of the bucket key
    pub name: String,
    /// Strategy to apply
    pub strategy: Strategy,
    /// Subject key the bucket is scoped to
    pub subject: String,
    /// Maximum tokens in the window, > 0
    pub limit: u64,
    /// Window length, > 0
    pub interval: Duration,
}

/// Produces limiter configurations for policies it recognizes.
pub trait ConfigFactory: Send + Sync {
    /// Factory name, for logging.
    fn name(&self) -> &str;

    /// A configuration for this (policy, subject), or `None` when this
    /// factory is not applicable.
    fn create(&self, policy: &str, subject: &str) -> Option<LimiterConfig>;
}

/// Evaluates the ordered factory chain; the first non-`None` result wins.
pub struct PolicyResolver {
    factories: Vec<Arc<dyn ConfigFactory>>,
}

impl PolicyResolver {
    /// Create a resolver over an ordered factory list.
    pub fn new(factories: Vec<Arc<dyn ConfigFactory>>) -> Self {
        Self { factories }
    }

    /// Resolve the limiter configuration for a policy and subject.
    ///
    /// `None` means no factory claimed the policy: the request proceeds
    /// unconstrained.
    pub fn resolve(&self, policy: &str, subject: &str) -> Option<LimiterConfig> {
        for factory in &self.factories {
            if let Some(config) = factory.create(policy, subject) {
                trace!(
                    factory = factory.name(),
                    policy = policy,
                    limit = config.limit,
                    "Limiter configuration resolved"
                );
                return Some(config);
            }
        }

        debug!(policy = policy, "No limiter configuration; limiting skipped");
        None
    }
}

/// Factory backed by the named policy table in the pipeline configuration.
pub struct NamedPolicyFactory {
    config: Arc<PipelineConfig>,
}

impl NamedPolicyFactory {
    pub fn new(config: Arc<PipelineConfig>) -> Self {
        Self { config }
    }
}

impl ConfigFactory for NamedPolicyFactory {
    fn name(&self) -> &str {
        "named-policy"
    }

    fn create(&self, policy: &str, subject: &str) -> Option<LimiterConfig> {
        let params = self.config.policy(policy)?;
        Some(LimiterConfig {
            name: policy.to_string(),
            strategy: params.strategy.into(),
            subject: subject.to_string(),
            limit: params.limit,
            interval: Duration::from_secs(params.interval_secs),
        })
    }
}

/// Catch-all factory applying one fixed limit to any policy name.
///
/// Registered after the named factory, it backstops policies the
/// configuration file does not mention.
pub struct DefaultPolicyFactory {
    limit: u64,
    interval: Duration,
}

impl DefaultPolicyFactory {
    pub fn new(limit: u64, interval: Duration) -> Self {
        Self { limit, interval }
    }
}

impl ConfigFactory for DefaultPolicyFactory {
    fn name(&self) -> &str {
        "default-policy"
    }

    fn create(&self, policy: &str, subject: &str) -> Option<LimiterConfig> {
        Some(LimiterConfig {
            name: policy.to_string(),
            strategy: Strategy::SlidingWindow,
            subject: subject.to_string(),
            limit: self.limit,
            interval: self.interval,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct OnlyFor {
        policy: &'static str,
        limit: u64,
    }

    impl ConfigFactory for OnlyFor {
        fn name(&self) -> &str {
            "only-for"
        }

        fn create(&self, policy: &str, subject: &str) -> Option<LimiterConfig> {
            if policy != self.policy {
                return None;
            }
            Some(LimiterConfig {
                name: policy.to_string(),
                strategy: Strategy::SlidingWindow,
                subject: subject.to_string(),
                limit: self.limit,
                interval: Duration::from_secs(60),
            })
        }
    }

    #[test]
    fn test_first_applicable_factory_wins() {
        let resolver = PolicyResolver::new(vec![
            Arc::new(OnlyFor {
                policy: "graphql",
                limit: 100,
            }) as Arc<dyn ConfigFactory>,
            Arc::new(DefaultPolicyFactory::new(10, Duration::from_secs(60))),
        ]);

        let graphql = resolver.resolve("graphql", "10.0.0.1").unwrap();
        assert_eq!(graphql.limit, 100);

        // Falls through to the catch-all
        let other = resolver.resolve("default", "10.0.0.1").unwrap();
        assert_eq!(other.limit, 10);
        assert_eq!(other.name, "default");
    }

    #[test]
    fn test_no_factory_means_no_limiting() {
        let resolver = PolicyResolver::new(vec![Arc::new(OnlyFor {
            policy: "graphql",
            limit: 100,
        }) as Arc<dyn ConfigFactory>]);

        assert!(resolver.resolve("unknown", "10.0.0.1").is_none());
    }

    #[test]
    fn test_named_factory_reads_policy_table() {
        let yaml = r#"
policies:
  graphql:
    strategy: sliding_window_strict
    limit: 500
    interval_secs: 120
"#;
        let config = Arc::new(PipelineConfig::from_yaml(yaml).unwrap());
        let factory = NamedPolicyFactory::new(config);

        let resolved = factory.create("graphql", "client-9").unwrap();
        assert_eq!(resolved.strategy, Strategy::SlidingWindowStrict);
        assert_eq!(resolved.limit, 500);
        assert_eq!(resolved.interval, Duration::from_secs(120));
        assert_eq!(resolved.subject, "client-9");

        assert!(factory.create("missing", "client-9").is_none());
    }
}
