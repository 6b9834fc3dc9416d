//! Middleware layer.
//!
//! Middleware wrap a handler invocation and are the right place for
//! cross-cutting concerns: structured logging, validation, authorization,
//! retries and deadlines.
//!
//! # How a chain runs
//!
//! A pipeline `[A, B]` around handler `H` is a right fold. `A` is outermost:
//! it sees the call first and the result last.
//!
//! ```text
//! A.handle(ctx, next→B) ─┐
//!   B.handle(ctx, next→H) ─┐
//!     H.handle(message, cancellation)
//!   B ◀── Result ───────────┘
//! A ◀── Result ───────────┘
//! ```
//!
//! Each middleware decides what to do with [`Next`]:
//!
//! - call it once and post-process the result,
//! - not call it at all (short-circuit: cache hit, failed validation),
//! - call it several times (retry).
//!
//! Errors travel back out unchanged unless a middleware maps them.

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;

use crate::context::InvocationContext;
use crate::error::Error;
use crate::handler::Handler;
use crate::message::Message;
use crate::pipeline::Entry;

pub mod authorization;
pub mod logging;
pub mod retry;
pub mod timeout;
pub mod validation;

pub use authorization::{Authorization, AuthorizationOutcome};
pub use logging::{Failure, LogLevel, Logging, LoggingSettings, Payload, PostExecution, PreExecution};
pub use retry::Retry;
pub use timeout::Timeout;
pub use validation::{FieldError, Validate, Validation, ValidationError};

/// A heap-allocated, type-erased future.
///
/// `Send` so invocations can run on a multi-threaded runtime; `'a` so the
/// future may borrow the pipeline it runs in.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One link of a pipeline.
///
/// The middleware value doubles as its configuration object: its fields are
/// what [`PipelineBuilder::configure`](crate::PipelineBuilder::configure)
/// mutates. A pipeline holds at most one value per middleware type.
///
/// ```rust
/// use async_trait::async_trait;
/// use sluice::{Error, InvocationContext, Message, Middleware, Next};
///
/// struct Tenant { header: &'static str }
///
/// #[async_trait]
/// impl<M: Message> Middleware<M> for Tenant {
///     async fn handle(&self, ctx: InvocationContext<M>, next: Next<'_, M>) -> Result<M::Response, Error> {
///         if !ctx.metadata().contains_key(self.header) {
///             return Err(Error::Unauthorized("missing tenant".into()));
///         }
///         next.run(ctx).await
///     }
/// }
/// ```
#[async_trait]
pub trait Middleware<M: Message>: Send + Sync + 'static {
    async fn handle(&self, ctx: InvocationContext<M>, next: Next<'_, M>) -> Result<M::Response, Error>;
}

/// The remainder of the chain, from the point of view of one middleware.
///
/// `Copy`, and [`run`](Next::run) takes `&self`, so a middleware may invoke
/// the rest of the chain as often as it likes.
pub struct Next<'a, M: Message> {
    remaining: &'a [Entry<M>],
    handler: &'a dyn Handler<M>,
}

impl<'a, M: Message> Next<'a, M> {
    pub(crate) fn new(remaining: &'a [Entry<M>], handler: &'a dyn Handler<M>) -> Self {
        Self { remaining, handler }
    }

    /// Invokes the next middleware, or the handler if none are left.
    pub fn run(&self, ctx: InvocationContext<M>) -> BoxFuture<'a, Result<M::Response, Error>> {
        let remaining: &'a [Entry<M>] = self.remaining;
        let handler: &'a dyn Handler<M> = self.handler;

        match remaining.split_first() {
            Some((entry, rest)) => entry.middleware().handle(ctx, Next::new(rest, handler)),
            None => {
                let (message, cancellation, _metadata) = ctx.into_parts();
                handler.handle(message, cancellation)
            }
        }
    }

    /// How many middleware are still ahead of the handler.
    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }
}

impl<M: Message> Clone for Next<'_, M> {
    fn clone(&self) -> Self { *self }
}

impl<M: Message> Copy for Next<'_, M> {}
