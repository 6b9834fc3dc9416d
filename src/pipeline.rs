//! Pipeline construction.
//!
//! A [`PipelineBuilder`] collects middleware for one message type in the
//! order they are declared. There is no priority system: what you read top to
//! bottom in the configuration function is what runs outside to inside.
//!
//! ```rust
//! use std::time::Duration;
//! use sluice::{Message, PipelineBuilder, middleware::{Retry, Timeout}};
//!
//! #[derive(Clone)]
//! struct SyncInventory;
//! impl Message for SyncInventory { type Response = (); }
//!
//! let mut pipeline = PipelineBuilder::<SyncInventory>::new();
//! pipeline
//!     .use_middleware(Retry::new(3))
//!     .use_middleware(Timeout::new(Duration::from_secs(1)));
//!
//! pipeline.configure::<Retry>(|retry| retry.max_attempts = 5)?;
//! pipeline.without::<Timeout>();
//!
//! assert_eq!(pipeline.len(), 1);
//! # Ok::<(), sluice::ConfigurationError>(())
//! ```

use std::any::{Any, TypeId, type_name};
use std::fmt;

use crate::context::InvocationContext;
use crate::error::{ConfigurationError, Error};
use crate::handler::Handler;
use crate::message::Message;
use crate::middleware::{BoxFuture, Middleware, Next};

// ── Entries ───────────────────────────────────────────────────────────────────

/// `Middleware` plus the downcast hook `configure` needs.
pub(crate) trait AnyMiddleware<M: Message>: Middleware<M> {
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<M: Message, T: Middleware<M>> AnyMiddleware<M> for T {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// One middleware in a pipeline, keyed by its type.
pub(crate) struct Entry<M: Message> {
    type_id: TypeId,
    name: &'static str,
    middleware: Box<dyn AnyMiddleware<M> + Send + Sync>,
}

impl<M: Message> Entry<M> {
    fn new<T: Middleware<M>>(middleware: T) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: type_name::<T>(),
            middleware: Box::new(middleware),
        }
    }

    pub(crate) fn middleware(&self) -> &(dyn AnyMiddleware<M> + Send + Sync) {
        &*self.middleware
    }
}

// ── Builder ───────────────────────────────────────────────────────────────────

/// Ordered, type-keyed collection of middleware for message type `M`.
pub struct PipelineBuilder<M: Message> {
    entries: Vec<Entry<M>>,
}

impl<M: Message> PipelineBuilder<M> {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Appends `middleware`.
    ///
    /// If a middleware of the same type is already present it is removed
    /// first, so the new value lands at the end: the most recent call decides
    /// both the configuration and the position.
    pub fn use_middleware<T: Middleware<M>>(&mut self, middleware: T) -> &mut Self {
        self.remove(TypeId::of::<T>());
        self.entries.push(Entry::new(middleware));
        self
    }

    /// Removes the middleware of type `T`. Does nothing if it is absent.
    pub fn without<T: Middleware<M>>(&mut self) -> &mut Self {
        self.remove(TypeId::of::<T>());
        self
    }

    /// Mutates the middleware of type `T` in place, keeping its position.
    /// Assign through the reference to replace it outright.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::MiddlewareNotPresent`] if the pipeline has no
    /// `T`. The pipeline is left unchanged.
    pub fn configure<T: Middleware<M>>(
        &mut self,
        f: impl FnOnce(&mut T),
    ) -> Result<&mut Self, ConfigurationError> {
        let not_present = || ConfigurationError::MiddlewareNotPresent {
            middleware: type_name::<T>(),
            message: M::name(),
        };

        let entry = self
            .entries
            .iter_mut()
            .find(|entry| entry.type_id == TypeId::of::<T>())
            .ok_or_else(not_present)?;
        let middleware = entry
            .middleware
            .as_any_mut()
            .downcast_mut::<T>()
            .ok_or_else(not_present)?;

        f(middleware);
        Ok(self)
    }

    pub fn contains<T: Middleware<M>>(&self) -> bool {
        self.position(TypeId::of::<T>()).is_some()
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Type names in execution order, outermost first.
    pub fn middleware_names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.name).collect()
    }

    /// Freezes the builder.
    pub fn build(self) -> Pipeline<M> {
        Pipeline { entries: self.entries }
    }

    fn position(&self, type_id: TypeId) -> Option<usize> {
        self.entries.iter().position(|e| e.type_id == type_id)
    }

    fn remove(&mut self, type_id: TypeId) {
        if let Some(index) = self.position(type_id) {
            self.entries.remove(index);
        }
    }
}

impl<M: Message> Default for PipelineBuilder<M> {
    fn default() -> Self { Self::new() }
}

impl<M: Message> fmt::Debug for PipelineBuilder<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.iter().map(|e| e.name)).finish()
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

/// A finished, immutable pipeline. Share it behind an `Arc` to run
/// concurrent invocations through the same instance.
pub struct Pipeline<M: Message> {
    entries: Vec<Entry<M>>,
}

impl<M: Message> Pipeline<M> {
    /// Runs `ctx` through every middleware and finally `handler`.
    pub fn execute<'a>(
        &'a self,
        ctx: InvocationContext<M>,
        handler: &'a dyn Handler<M>,
    ) -> BoxFuture<'a, Result<M::Response, Error>> {
        Next::new(&self.entries, handler).run(ctx)
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn contains<T: Middleware<M>>(&self) -> bool {
        self.entries.iter().any(|e| e.type_id == TypeId::of::<T>())
    }

    /// Type names in execution order, outermost first.
    pub fn middleware_names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.name).collect()
    }
}

impl<M: Message> fmt::Debug for Pipeline<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.iter().map(|e| e.name)).finish()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;

    struct Count;
    impl Message for Count {
        type Response = u32;
    }

    #[derive(Debug, PartialEq)]
    struct Add(u32);
    struct Double;
    struct Noop;

    #[async_trait]
    impl Middleware<Count> for Add {
        async fn handle(&self, ctx: InvocationContext<Count>, next: Next<'_, Count>) -> Result<u32, Error> {
            Ok(next.run(ctx).await? + self.0)
        }
    }

    #[async_trait]
    impl Middleware<Count> for Double {
        async fn handle(&self, ctx: InvocationContext<Count>, next: Next<'_, Count>) -> Result<u32, Error> {
            Ok(next.run(ctx).await? * 2)
        }
    }

    #[async_trait]
    impl Middleware<Count> for Noop {
        async fn handle(&self, ctx: InvocationContext<Count>, next: Next<'_, Count>) -> Result<u32, Error> {
            next.run(ctx).await
        }
    }

    fn names(builder: &PipelineBuilder<Count>) -> Vec<&'static str> {
        builder
            .middleware_names()
            .into_iter()
            .map(|n| n.rsplit("::").next().unwrap_or(n))
            .collect()
    }

    #[test]
    fn preserves_declaration_order() {
        let mut builder = PipelineBuilder::<Count>::new();
        builder.use_middleware(Add(1)).use_middleware(Double).use_middleware(Noop);
        assert_eq!(names(&builder), ["Add", "Double", "Noop"]);
    }

    #[test]
    fn reuse_moves_to_most_recent_position() {
        let mut builder = PipelineBuilder::<Count>::new();
        builder
            .use_middleware(Add(1))
            .use_middleware(Double)
            .use_middleware(Add(5));
        assert_eq!(names(&builder), ["Double", "Add"]);
        assert_eq!(builder.len(), 2);
    }

    #[test]
    fn without_absent_is_noop() {
        let mut builder = PipelineBuilder::<Count>::new();
        builder.use_middleware(Double).without::<Add>().without::<Add>();
        assert_eq!(names(&builder), ["Double"]);
    }

    #[test]
    fn use_after_without_readds() {
        let mut builder = PipelineBuilder::<Count>::new();
        builder
            .use_middleware(Add(1))
            .use_middleware(Double)
            .without::<Add>()
            .use_middleware(Add(2));
        assert_eq!(names(&builder), ["Double", "Add"]);
    }

    #[test]
    fn configure_absent_fails_without_mutation() {
        let mut builder = PipelineBuilder::<Count>::new();
        builder.use_middleware(Double);

        let err = builder.configure::<Add>(|add| add.0 = 9).unwrap_err();
        assert!(matches!(err, ConfigurationError::MiddlewareNotPresent { .. }));
        assert_eq!(names(&builder), ["Double"]);
    }

    #[test]
    fn configure_keeps_position() {
        let mut builder = PipelineBuilder::<Count>::new();
        builder.use_middleware(Add(1)).use_middleware(Double);
        builder.configure::<Add>(|add| add.0 += 10).unwrap();
        assert_eq!(names(&builder), ["Add", "Double"]);
    }

    #[tokio::test]
    async fn configuration_reaches_the_middleware() {
        let handler = crate::handler_fn(|_: Count, _: crate::CancellationSignal| async { Ok::<u32, Error>(1) });

        let mut builder = PipelineBuilder::<Count>::new();
        builder.use_middleware(Add(1)).use_middleware(Double);
        builder.configure::<Add>(|add| *add = Add(100)).unwrap();
        let pipeline = builder.build();

        // Add(100) wraps Double: (1 * 2) + 100
        let ctx = InvocationContext::new(Count, Default::default());
        assert_eq!(pipeline.execute(ctx, &handler).await.unwrap(), 102);
    }

    #[tokio::test]
    async fn empty_pipeline_calls_handler_directly() {
        let handler = crate::handler_fn(|_: Count, _: crate::CancellationSignal| async { Ok::<u32, Error>(7) });
        let pipeline = PipelineBuilder::<Count>::new().build();
        assert!(pipeline.is_empty());

        let ctx = InvocationContext::new(Count, Default::default());
        assert_eq!(pipeline.execute(ctx, &handler).await.unwrap(), 7);
    }
}
