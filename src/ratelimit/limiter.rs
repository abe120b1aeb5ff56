//! Sliding-window rate limiter.
//!
//! Consumption is evaluated over a continuously moving time range ending
//! "now", not fixed aligned buckets. The read-modify-write against the
//! bucket store is serialized per bucket key, so two contending `consume`
//! calls can never both succeed on one remaining token budget.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::error::{PipelineError, Result};

use super::bucket::{Bucket, BucketKey, BucketStore};
use super::policy::LimiterConfig;

/// Limiting strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Sliding window; the bucket is created on first use
    SlidingWindow,
    /// Sliding window over a pre-initialized bucket; a missing bucket is a
    /// hard wiring error
    SlidingWindowStrict,
}

/// Immutable result of one `consume` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Whether the consumption was admitted
    pub accepted: bool,
    /// The configured limit
    pub limit: u64,
    /// Tokens left in the window, never negative
    pub remaining: u64,
    /// When the window rolls past this call
    pub reset_at: DateTime<Utc>,
}

/// The sliding-window limiter.
///
/// Thread-safe and shared across all requests; per-key mutexes guard each
/// fetch -> compute -> persist sequence against the store.
pub struct SlidingWindowLimiter {
    store: Arc<dyn BucketStore>,
    locks: DashMap<BucketKey, Arc<Mutex<()>>>,
}

impl SlidingWindowLimiter {
    /// Create a limiter over a bucket store.
    pub fn new(store: Arc<dyn BucketStore>) -> Self {
        Self {
            store,
            locks: DashMap::new(),
        }
    }

    /// Consume `tokens` against the bucket the configuration names.
    ///
    /// On denial the bucket is not mutated and the decision carries the
    /// remaining budget; callers may retry after `reset_at`.
    pub async fn consume(&self, config: &LimiterConfig, tokens: u64) -> Result<Decision> {
        self.consume_at(config, tokens, Utc::now()).await
    }

    /// Clear all entries for the configured bucket unconditionally.
    pub async fn reset(&self, config: &LimiterConfig) -> Result<()> {
        let key = BucketKey::new(&config.name, &config.subject);
        let lock = self.lock_for(&key);
        let _guard = lock.lock().await;

        debug!(key = %key, "Resetting rate limit bucket");
        self.store.reset(&key, DateTime::<Utc>::MIN_UTC).await
    }

    pub(crate) async fn consume_at(
        &self,
        config: &LimiterConfig,
        tokens: u64,
        now: DateTime<Utc>,
    ) -> Result<Decision> {
        let key = BucketKey::new(&config.name, &config.subject);
        let interval = Duration::from_std(config.interval).map_err(|e| {
            PipelineError::Config(format!("Interval out of range for '{}': {}", config.name, e))
        })?;
        let window_start = now - interval;

        let lock = self.lock_for(&key);
        let _guard = lock.lock().await;

        let mut bucket = match self.store.fetch(&key).await? {
            Some(bucket) => bucket,
            None => match config.strategy {
                Strategy::SlidingWindow => Bucket::new(key.clone()),
                Strategy::SlidingWindowStrict => {
                    return Err(PipelineError::BucketMissing {
                        limiter: config.name.clone(),
                        subject: config.subject.clone(),
                    })
                }
            },
        };

        let consumed = bucket.consumed_since(window_start);
        let reset_at = now + interval;

        trace!(
            key = %key,
            consumed = consumed,
            tokens = tokens,
            limit = config.limit,
            "Evaluating sliding window"
        );

        if consumed + tokens > config.limit {
            debug!(key = %key, limit = config.limit, "Rate limit exceeded");
            return Ok(Decision {
                accepted: false,
                limit: config.limit,
                remaining: config.limit.saturating_sub(consumed),
                reset_at,
            });
        }

        bucket.append(now, tokens);
        bucket.prune_before(window_start);
        self.store.persist(bucket).await?;

        Ok(Decision {
            accepted: true,
            limit: config.limit,
            remaining: config.limit.saturating_sub(consumed + tokens),
            reset_at,
        })
    }

    fn lock_for(&self, key: &BucketKey) -> Arc<Mutex<()>> {
        self.locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
