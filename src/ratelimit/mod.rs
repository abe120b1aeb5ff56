//! Rate limiting logic and state management.

mod bucket;
mod limiter;
mod policy;

pub use bucket::{Bucket, BucketEntry, BucketKey, BucketStore, MemoryBucketStore};
pub use limiter::{Decision, SlidingWindowLimiter, Strategy};
pub use policy::{
    ConfigFactory, DefaultPolicyFactory, LimiterConfig, NamedPolicyFactory, PolicyResolver,
};
