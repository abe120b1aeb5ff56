//! Rate-limit buckets and the storage boundary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A key that uniquely identifies a rate-limit bucket.
///
/// The limiter name and the subject key together scope one consumption
/// window, so distinct policies never share a window even for one subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketKey {
    /// Limiter (policy) name
    pub limiter: String,
    /// Subject the bucket is scoped to (client, IP, or user)
    pub subject: String,
}

impl BucketKey {
    pub fn new(limiter: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            limiter: limiter.into(),
            subject: subject.into(),
        }
    }
}

impl std::fmt::Display for BucketKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.limiter, self.subject)
    }
}

/// One consumption record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketEntry {
    /// When the consumption happened
    pub at: DateTime<Utc>,
    /// Tokens consumed
    pub tokens: u64,
}

/// The consumption history for one (limiter, subject) pair.
///
/// Entries older than the active window may be pruned lazily; pruning never
/// changes the consumed total the window observes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bucket {
    /// The key this bucket is stored under
    pub key: BucketKey,
    /// Consumption entries, oldest first
    pub entries: Vec<BucketEntry>,
}

impl Bucket {
    /// Create an empty bucket.
    pub fn new(key: BucketKey) -> Self {
        Self {
            key,
            entries: Vec::new(),
        }
    }

    /// Sum of tokens consumed at or after `window_start`.
    pub fn consumed_since(&self, window_start: DateTime<Utc>) -> u64 {
        self.entries
            .iter()
            .filter(|e| e.at >= window_start)
            .map(|e| e.tokens)
            .sum()
    }

    /// Record a consumption.
    pub fn append(&mut self, at: DateTime<Utc>, tokens: u64) {
        self.entries.push(BucketEntry { at, tokens });
    }

    /// Drop entries that fell out of the window.
    pub fn prune_before(&mut self, window_start: DateTime<Utc>) {
        self.entries.retain(|e| e.at >= window_start);
    }
}

/// Storage boundary for rate-limit buckets.
///
/// The limiter is agnostic to the backing technology; an implementation may
/// be in-process memory, a relational store, or anything else that can
/// round-trip a [`Bucket`]. Read-modify-write serialization per key is the
/// limiter's responsibility, not the store's.
#[async_trait]
pub trait BucketStore: Send + Sync {
    /// Fetch the bucket for a key, if one exists.
    async fn fetch(&self, key: &BucketKey) -> Result<Option<Bucket>>;

    /// Persist a bucket, replacing any previous state for its key.
    async fn persist(&self, bucket: Bucket) -> Result<()>;

    /// Drop all entries recorded at or after `since`. The bucket itself
    /// survives so strict strategies still find it initialized.
    async fn reset(&self, key: &BucketKey, since: DateTime<Utc>) -> Result<()>;
}

/// In-process bucket store backed by a concurrent map.
#[derive(Default)]
pub struct MemoryBucketStore {
    buckets: DashMap<BucketKey, Bucket>,
}

impl MemoryBucketStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-create an empty bucket, as a wiring step for strategies that
    /// require initialized buckets.
    pub fn initialize(&self, key: BucketKey) {
        self.buckets
            .entry(key.clone())
            .or_insert_with(|| Bucket::new(key));
    }

    /// Number of buckets currently held.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

#[async_trait]
impl BucketStore for MemoryBucketStore {
    async fn fetch(&self, key: &BucketKey) -> Result<Option<Bucket>> {
        Ok(self.buckets.get(key).map(|b| b.clone()))
    }

    async fn persist(&self, bucket: Bucket) -> Result<()> {
        self.buckets.insert(bucket.key.clone(), bucket);
        Ok(())
    }

    async fn reset(&self, key: &BucketKey, since: DateTime<Utc>) -> Result<()> {
        if let Some(mut bucket) = self.buckets.get_mut(key) {
            bucket.entries.retain(|e| e.at < since);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_consumed_since_is_a_true_sliding_sum() {
        let mut bucket = Bucket::new(BucketKey::new("graphql", "10.0.0.1"));
        bucket.append(ts(0), 2);
        bucket.append(ts(30), 3);
        bucket.append(ts(59), 1);

        // An entry from 59 seconds ago in a 60-second window still counts
        assert_eq!(bucket.consumed_since(ts(0)), 6);
        assert_eq!(bucket.consumed_since(ts(1)), 4);
        assert_eq!(bucket.consumed_since(ts(60)), 0);
    }

    #[test]
    fn test_prune_keeps_window_entries() {
        let mut bucket = Bucket::new(BucketKey::new("graphql", "10.0.0.1"));
        bucket.append(ts(0), 1);
        bucket.append(ts(45), 1);

        bucket.prune_before(ts(10));

        assert_eq!(bucket.entries.len(), 1);
        assert_eq!(bucket.entries[0].at, ts(45));
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryBucketStore::new();
        let key = BucketKey::new("default", "client-1");

        assert!(store.fetch(&key).await.unwrap().is_none());

        let mut bucket = Bucket::new(key.clone());
        bucket.append(ts(5), 4);
        store.persist(bucket).await.unwrap();

        let fetched = store.fetch(&key).await.unwrap().unwrap();
        assert_eq!(fetched.entries.len(), 1);
        assert_eq!(fetched.consumed_since(ts(0)), 4);
    }

    #[tokio::test]
    async fn test_reset_drops_entries_but_keeps_bucket() {
        let store = MemoryBucketStore::new();
        let key = BucketKey::new("default", "client-1");

        let mut bucket = Bucket::new(key.clone());
        bucket.append(ts(5), 1);
        bucket.append(ts(50), 1);
        store.persist(bucket).await.unwrap();

        store.reset(&key, ts(0)).await.unwrap();

        let fetched = store.fetch(&key).await.unwrap().unwrap();
        assert!(fetched.entries.is_empty());
    }

    #[tokio::test]
    async fn test_reset_since_is_a_lower_bound() {
        let store = MemoryBucketStore::new();
        let key = BucketKey::new("default", "client-1");

        let mut bucket = Bucket::new(key.clone());
        bucket.append(ts(5), 1);
        bucket.append(ts(50), 1);
        store.persist(bucket).await.unwrap();

        store.reset(&key, ts(40)).await.unwrap();

        let fetched = store.fetch(&key).await.unwrap().unwrap();
        assert_eq!(fetched.entries.len(), 1);
        assert_eq!(fetched.entries[0].at, ts(5));
    }
}
