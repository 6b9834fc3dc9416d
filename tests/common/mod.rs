#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use sluice::{CancellationSignal, Error, Handler, InvocationContext, Message, Middleware, Next};

/// Shared, ordered log of what ran.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.lock().iter().filter(|e| *e == entry).count()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Echo {
    pub text: String,
}

impl Echo {
    pub fn new(text: &str) -> Self {
        Self { text: text.to_owned() }
    }
}

impl Message for Echo {
    type Response = String;
}

/// Returns the message text, recording that it ran.
pub struct EchoHandler {
    pub journal: Journal,
}

#[async_trait]
impl Handler<Echo> for EchoHandler {
    async fn handle(&self, message: Echo, _cancellation: CancellationSignal) -> Result<String, Error> {
        self.journal.push("handler");
        Ok(message.text)
    }
}

/// Records `X-before` and `X-after:<ok|err>` around `next`.
pub struct Recorder<const TAG: char> {
    pub journal: Journal,
}

impl<const TAG: char> Recorder<TAG> {
    pub fn new(journal: &Journal) -> Self {
        Self { journal: journal.clone() }
    }
}

#[async_trait]
impl<const TAG: char, M: Message> Middleware<M> for Recorder<TAG> {
    async fn handle(&self, ctx: InvocationContext<M>, next: Next<'_, M>) -> Result<M::Response, Error> {
        self.journal.push(format!("{TAG}-before"));
        let result = next.run(ctx).await;
        let outcome = if result.is_ok() { "ok" } else { "err" };
        self.journal.push(format!("{TAG}-after:{outcome}"));
        result
    }
}

#[derive(Debug, thiserror::Error)]
#[error("downstream unavailable")]
pub struct Unavailable;
