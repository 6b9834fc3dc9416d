//! Deadlines.
//!
//! The chain itself imposes no deadline. This middleware adds one: the inner
//! layers see a child of the caller's cancellation signal, which fires
//! either when the caller cancels or when the deadline passes. On deadline
//! the inner future is dropped and the call fails with [`Error::Timeout`].

use std::time::Duration;

use async_trait::async_trait;

use crate::context::InvocationContext;
use crate::error::Error;
use crate::message::Message;
use crate::middleware::{Middleware, Next};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Timeout {
    pub duration: Duration,
}

impl Timeout {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

#[async_trait]
impl<M: Message> Middleware<M> for Timeout {
    async fn handle(&self, mut ctx: InvocationContext<M>, next: Next<'_, M>) -> Result<M::Response, Error> {
        let deadline = ctx.cancellation().child();
        ctx.set_cancellation(deadline.clone());
        let id = ctx.id();

        match tokio::time::timeout(self.duration, next.run(ctx)).await {
            Ok(result) => result,
            Err(_elapsed) => {
                deadline.cancel();
                tracing::warn!(message_type = M::name(), %id, timeout = ?self.duration, "deadline exceeded");
                Err(Error::Timeout(self.duration))
            }
        }
    }
}
