//! Retry within the pipeline.
//!
//! Calls the rest of the chain again when it fails with a retryable error.
//! Every attempt runs the inner middleware and the handler from scratch with
//! a clone of the original context, so the message type must be `Clone`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::context::InvocationContext;
use crate::error::Error;
use crate::message::Message;
use crate::middleware::{Middleware, Next};

type Predicate = Arc<dyn Fn(&Error) -> bool + Send + Sync>;

/// Retry middleware.
///
/// Defaults: no delay between attempts, and every error is retried except
/// the permanent ones (see [`Error::is_permanent`]).
#[derive(Clone)]
pub struct Retry {
    /// Total attempts including the first. `0` is treated as `1`.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub delay: Duration,
    predicate: Predicate,
}

impl Retry {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            delay: Duration::ZERO,
            predicate: Arc::new(|err: &Error| !err.is_permanent()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Only retry errors for which `predicate` returns `true`.
    pub fn retry_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Error) -> bool + Send + Sync + 'static,
    {
        self.predicate = Arc::new(predicate);
        self
    }

    fn should_retry(&self, err: &Error) -> bool {
        (*self.predicate)(err)
    }
}

impl fmt::Debug for Retry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retry")
            .field("max_attempts", &self.max_attempts)
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<M: Message + Clone> Middleware<M> for Retry {
    async fn handle(&self, ctx: InvocationContext<M>, next: Next<'_, M>) -> Result<M::Response, Error> {
        let max_attempts = self.max_attempts.max(1);
        let cancellation = ctx.cancellation().clone();
        let mut attempt = 1;

        loop {
            let attempt_ctx = ctx.clone();
            let err = match next.run(attempt_ctx).await {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };

            if attempt >= max_attempts || cancellation.is_cancelled() || !self.should_retry(&err) {
                return Err(err);
            }

            tracing::warn!(
                message_type = M::name(),
                id = %ctx.id(),
                attempt,
                max_attempts,
                error = %err,
                "attempt failed, retrying"
            );

            if !self.delay.is_zero() {
                tokio::select! {
                    () = tokio::time::sleep(self.delay) => {}
                    () = cancellation.cancelled() => return Err(err),
                }
            }

            attempt += 1;
        }
    }
}
