//! Fieldgate - Interceptor-Driven GraphQL Resolution Pipeline
//!
//! This crate implements the request-resolution core of a GraphQL API layer:
//! an ordered chain of pluggable interceptors that assembles the schema and
//! resolves every field at query time, gated by a sliding-window rate limiter
//! whose token cost is derived from computed query complexity.
//!
//! Transport, query parsing, and storage engines are external collaborators
//! consumed through narrow interfaces ([`ratelimit::BucketStore`], the typed
//! registries in [`registry`], and [`config::PipelineConfig`]).

pub mod access;
pub mod chain;
pub mod config;
pub mod error;
pub mod gate;
pub mod ratelimit;
pub mod registry;
pub mod resolution;
pub mod resolver;
pub mod schema;
