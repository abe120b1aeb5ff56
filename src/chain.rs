//! Generic ordered-interceptor composition.
//!
//! The same executor type is instantiated once for schema assembly and once
//! for field resolution; only the context and output types differ. Each
//! `process` call builds its own continuation chain, so a shared executor is
//! safe to reuse concurrently across independent calls.

use std::sync::Arc;
use tracing::trace;

use crate::error::Result;

/// A unit of cross-cutting logic composed into an ordered chain around a core
/// operation.
///
/// An interceptor may inspect or mutate the context, call `next` exactly zero
/// or one times, and return a result. Not calling `next` short-circuits the
/// chain: the interceptor's own return value becomes the overall result and
/// the terminal operation never runs.
pub trait Interceptor<Ctx, Out>: Send + Sync {
    /// Handle one pass through the chain.
    fn handle(&self, ctx: &mut Ctx, next: Next<'_, Ctx, Out>) -> Result<Out>;
}

/// The continuation handed to each interceptor: the remaining chain, or the
/// terminal operation if none remain.
pub struct Next<'a, Ctx, Out> {
    remaining: &'a [Arc<dyn Interceptor<Ctx, Out>>],
    finalize: &'a dyn Fn(&mut Ctx) -> Result<Out>,
}

impl<'a, Ctx, Out> Next<'a, Ctx, Out> {
    /// Invoke the remaining chain. Consumes the continuation, so an
    /// interceptor cannot run the tail twice.
    pub fn run(self, ctx: &mut Ctx) -> Result<Out> {
        match self.remaining.split_first() {
            Some((head, rest)) => head.handle(
                ctx,
                Next {
                    remaining: rest,
                    finalize: self.finalize,
                },
            ),
            None => (self.finalize)(ctx),
        }
    }
}

/// Threads a context through ordered interceptors to a terminal operation.
///
/// Execution order is strictly the registration order of the interceptor
/// list, fixed at construction.
pub struct ChainExecutor<Ctx, Out> {
    interceptors: Vec<Arc<dyn Interceptor<Ctx, Out>>>,
}

impl<Ctx, Out> ChainExecutor<Ctx, Out> {
    /// Create an executor over an ordered interceptor list.
    pub fn new(interceptors: Vec<Arc<dyn Interceptor<Ctx, Out>>>) -> Self {
        Self { interceptors }
    }

    /// Run `ctx` through the chain, ending at `finalize`.
    ///
    /// For an empty interceptor list this is exactly `finalize(ctx)`.
    pub fn process<F>(&self, ctx: &mut Ctx, finalize: F) -> Result<Out>
    where
        F: Fn(&mut Ctx) -> Result<Out>,
    {
        trace!(interceptors = self.interceptors.len(), "Running chain");

        let next = Next {
            remaining: &self.interceptors,
            finalize: &finalize,
        };
        next.run(ctx)
    }

    /// Number of interceptors in the chain.
    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    /// Whether the chain degenerates to just the terminal operation.
    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }
}
