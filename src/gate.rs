//! Execution gating against the sliding-window limiter.
//!
//! Two structurally identical paths share the limiter and decision type: the
//! query cost gate converts a computed complexity score into a token cost,
//! and the per-request gate consumes one token unconditionally. Which bucket
//! a path lands in is decided purely by its policy name, so gates configured
//! with distinct policies never contend for one window.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::{PipelineError, Result};
use crate::ratelimit::{Decision, PolicyResolver, SlidingWindowLimiter};

/// Complexity points per token. The injected complexity score is scaled down
/// by this factor, with a floor of one token per query.
const COMPLEXITY_PER_TOKEN: f64 = 100.0;

/// Quota information exposed on accepted responses, e.g. as headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaInfo {
    /// Window limit
    pub limit: u64,
    /// Tokens left in the window
    pub remaining: u64,
    /// Unix timestamp at which the window rolls past this request
    pub reset: i64,
}

impl From<Decision> for QuotaInfo {
    fn from(decision: Decision) -> Self {
        Self {
            limit: decision.limit,
            remaining: decision.remaining,
            reset: decision.reset_at.timestamp(),
        }
    }
}

/// Gates execution by consuming limiter tokens before a query runs.
pub struct RateLimitGate {
    limiter: Arc<SlidingWindowLimiter>,
    policies: PolicyResolver,
}

impl RateLimitGate {
    /// Create a gate over a limiter and the configuration factory chain.
    pub fn new(limiter: Arc<SlidingWindowLimiter>, policies: PolicyResolver) -> Self {
        Self { limiter, policies }
    }

    /// Gate a query by its computed complexity score.
    ///
    /// `cost = max(1, round(complexity / 100))`. Returns `Ok(None)` when no
    /// factory produces a configuration for the policy (limiting skipped),
    /// `Ok(Some(quota))` on acceptance, and [`PipelineError::RateLimited`]
    /// on denial.
    pub async fn check_query(
        &self,
        policy: &str,
        subject: &str,
        complexity: u64,
    ) -> Result<Option<QuotaInfo>> {
        let cost = Self::cost_for(complexity);
        trace!(
            policy = policy,
            complexity = complexity,
            cost = cost,
            "Gating query by complexity"
        );
        self.consume(policy, subject, cost).await
    }

    /// Gate a non-query request: one token, unconditionally.
    pub async fn check_request(&self, policy: &str, subject: &str) -> Result<Option<QuotaInfo>> {
        self.consume(policy, subject, 1).await
    }

    async fn consume(&self, policy: &str, subject: &str, tokens: u64) -> Result<Option<QuotaInfo>> {
        let config = match self.policies.resolve(policy, subject) {
            Some(config) => config,
            None => return Ok(None),
        };

        let decision = self.limiter.consume(&config, tokens).await?;
        if !decision.accepted {
            debug!(
                policy = policy,
                subject = subject,
                tokens = tokens,
                reset_at = %decision.reset_at,
                "Request denied by rate limit"
            );
            return Err(PipelineError::RateLimited {
                limit: decision.limit,
                reset_at: decision.reset_at,
            });
        }

        Ok(Some(decision.into()))
    }

    /// Token cost for a complexity score.
    fn cost_for(complexity: u64) -> u64 {
        let cost = (complexity as f64 / COMPLEXITY_PER_TOKEN).round() as u64;
        cost.max(1)
    }
}
