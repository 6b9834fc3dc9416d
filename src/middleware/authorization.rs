//! Authorization checks.
//!
//! An [`Authorization`] holds an ordered list of checks. Each check looks at
//! the invocation (usually a principal a transport put into the metadata,
//! and the message itself) and allows or denies it. The first denial
//! short-circuits the chain with [`Error::Unauthorized`].
//!
//! Checks accumulate, so a shared pipeline can enable the middleware once
//! and individual handlers can add their own rules afterwards:
//!
//! ```rust
//! use sluice::{Message, PipelineBuilder};
//! use sluice::middleware::{Authorization, AuthorizationOutcome};
//!
//! struct DeleteAccount { owner: String }
//! impl Message for DeleteAccount { type Response = (); }
//!
//! let mut pipeline = PipelineBuilder::<DeleteAccount>::new();
//! pipeline.use_middleware(Authorization::new());
//!
//! pipeline.configure::<Authorization<DeleteAccount>>(|auth| {
//!     auth.add_check(|ctx| {
//!         let caller = ctx.metadata().get("principal");
//!         AuthorizationOutcome::require(
//!             caller == Some(ctx.message().owner.as_str()),
//!             "only the owner may delete an account",
//!         )
//!     });
//! })?;
//! # Ok::<(), sluice::ConfigurationError>(())
//! ```
//!
//! Checks that need I/O (a permission service, a database) are added with
//! [`Authorization::add_async_check`]. Such a check reads what it needs from
//! the context up front and returns a future owning it; the context itself
//! is not borrowed across the wait.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::InvocationContext;
use crate::error::Error;
use crate::message::Message;
use crate::middleware::{BoxFuture, Middleware, Next};

/// Verdict of one check.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AuthorizationOutcome {
    Allowed,
    Denied(String),
}

impl AuthorizationOutcome {
    /// `Allowed` if `ok`, otherwise `Denied(reason)`.
    pub fn require(ok: bool, reason: impl Into<String>) -> Self {
        if ok { Self::Allowed } else { Self::Denied(reason.into()) }
    }
}

type SyncCheck<M> = Arc<dyn Fn(&InvocationContext<M>) -> AuthorizationOutcome + Send + Sync>;
type AsyncCheck<M> =
    Arc<dyn Fn(&InvocationContext<M>) -> BoxFuture<'static, AuthorizationOutcome> + Send + Sync>;

enum Check<M: Message> {
    Immediate(SyncCheck<M>),
    Deferred(AsyncCheck<M>),
}

impl<M: Message> Clone for Check<M> {
    fn clone(&self) -> Self {
        match self {
            Self::Immediate(check) => Self::Immediate(Arc::clone(check)),
            Self::Deferred(check) => Self::Deferred(Arc::clone(check)),
        }
    }
}

/// Authorization middleware. With no checks it allows everything.
pub struct Authorization<M: Message> {
    checks: Vec<Check<M>>,
}

impl<M: Message> Authorization<M> {
    pub fn new() -> Self {
        Self { checks: Vec::new() }
    }

    pub fn with_check<F>(mut self, check: F) -> Self
    where
        F: Fn(&InvocationContext<M>) -> AuthorizationOutcome + Send + Sync + 'static,
    {
        self.add_check(check);
        self
    }

    pub fn add_check<F>(&mut self, check: F) -> &mut Self
    where
        F: Fn(&InvocationContext<M>) -> AuthorizationOutcome + Send + Sync + 'static,
    {
        self.checks.push(Check::Immediate(Arc::new(check)));
        self
    }

    pub fn with_async_check<F>(mut self, check: F) -> Self
    where
        F: Fn(&InvocationContext<M>) -> BoxFuture<'static, AuthorizationOutcome> + Send + Sync + 'static,
    {
        self.add_async_check(check);
        self
    }

    /// Appends a check that completes asynchronously. It runs in order with
    /// the others and is not started if an earlier check denies.
    pub fn add_async_check<F>(&mut self, check: F) -> &mut Self
    where
        F: Fn(&InvocationContext<M>) -> BoxFuture<'static, AuthorizationOutcome> + Send + Sync + 'static,
    {
        self.checks.push(Check::Deferred(Arc::new(check)));
        self
    }

    pub fn len(&self) -> usize { self.checks.len() }
    pub fn is_empty(&self) -> bool { self.checks.is_empty() }
}

impl<M: Message> Default for Authorization<M> {
    fn default() -> Self { Self::new() }
}

impl<M: Message> Clone for Authorization<M> {
    fn clone(&self) -> Self {
        Self { checks: self.checks.clone() }
    }
}

impl<M: Message> fmt::Debug for Authorization<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authorization").field("checks", &self.checks.len()).finish()
    }
}

#[async_trait]
impl<M: Message> Middleware<M> for Authorization<M> {
    async fn handle(&self, ctx: InvocationContext<M>, next: Next<'_, M>) -> Result<M::Response, Error> {
        for check in &self.checks {
            let outcome = match check {
                Check::Immediate(check) => (**check)(&ctx),
                Check::Deferred(check) => {
                    let pending = (**check)(&ctx);
                    pending.await
                }
            };
            if let AuthorizationOutcome::Denied(reason) = outcome {
                tracing::debug!(message_type = M::name(), id = %ctx.id(), %reason, "authorization denied");
                return Err(Error::Unauthorized(reason));
            }
        }
        next.run(ctx).await
    }
}
