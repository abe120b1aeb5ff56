//! Error types for the resolution pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for pipeline operations.
///
/// Denials ([`PipelineError::RateLimited`], [`PipelineError::AccessDenied`])
/// are recoverable, client-visible results that short-circuit the interceptor
/// chain. The remaining variants indicate wiring or collaborator failures and
/// propagate to the outer request handler as internal errors.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Bucket store backend errors
    #[error("Bucket store error: {0}")]
    Store(String),

    /// A strategy required a pre-initialized bucket that does not exist.
    /// This is a wiring bug, not a user fault.
    #[error("Rate limit bucket not initialized for limiter '{limiter}' subject '{subject}'")]
    BucketMissing { limiter: String, subject: String },

    /// Capacity exceeded for the active window. Callers may retry after `reset_at`.
    #[error("Rate limit of {limit} exceeded, retry after {reset_at}")]
    RateLimited {
        limit: u64,
        reset_at: DateTime<Utc>,
    },

    /// The caller is not authorized for a field or type. Scoped to the
    /// smallest possible part of the response.
    #[error("Access denied to {type_name}.{field}")]
    AccessDenied { type_name: String, field: String },

    /// No terminal resolver is registered for a requested field
    #[error("No resolver registered for {type_name}.{field}")]
    ResolverMissing { type_name: String, field: String },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Structured payload returned to clients when a request is rate limited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenialPayload {
    /// Human-readable denial message
    pub message: String,
    /// HTTP-style status code, always 429
    pub code: u16,
    /// Unix timestamp at which the window rolls past the denial
    pub reset: i64,
}

impl DenialPayload {
    /// Build the client-visible payload for a capacity denial.
    pub fn rate_limited(limit: u64, reset_at: DateTime<Utc>) -> Self {
        Self {
            message: format!("Rate limit of {} exceeded", limit),
            code: 429,
            reset: reset_at.timestamp(),
        }
    }
}

impl PipelineError {
    /// Convert a denial into its client-visible payload, if it is one.
    pub fn to_denial_payload(&self) -> Option<DenialPayload> {
        match self {
            PipelineError::RateLimited { limit, reset_at } => {
                Some(DenialPayload::rate_limited(*limit, *reset_at))
            }
            _ => None,
        }
    }

    /// Whether this error should reach the client rather than the error log.
    pub fn is_client_visible(&self) -> bool {
        matches!(
            self,
            PipelineError::RateLimited { .. } | PipelineError::AccessDenied { .. }
        )
    }
}
