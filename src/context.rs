//! Per-invocation state.

use std::fmt;

use uuid::Uuid;

use crate::cancellation::CancellationSignal;
use crate::message::Message;
use crate::metadata::Metadata;

/// Everything one call carries through the chain.
///
/// Built fresh for every external call and dropped when the call returns.
/// Middleware receive it by value, may change it, and hand it to
/// [`Next::run`](crate::Next::run). The terminal handler takes the message
/// and the cancellation signal out of it; the rest is discarded there.
///
/// The response is not stored here. It is the value `Next::run` resolves
/// to, which is what every middleware sees on the way back out.
pub struct InvocationContext<M: Message> {
    id: Uuid,
    message: M,
    cancellation: CancellationSignal,
    metadata: Metadata,
}

impl<M: Message> InvocationContext<M> {
    pub fn new(message: M, cancellation: CancellationSignal) -> Self {
        Self {
            id: Uuid::new_v4(),
            message,
            cancellation,
            metadata: Metadata::new(),
        }
    }

    /// Attaches transport metadata. Returns `self` for chaining.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Unique per invocation. Retry attempts share the id of the call.
    pub fn id(&self) -> Uuid { self.id }

    pub fn message(&self) -> &M { &self.message }
    pub fn message_mut(&mut self) -> &mut M { &mut self.message }

    /// Swaps in a different message for the inner layers.
    pub fn replace_message(&mut self, message: M) -> M {
        std::mem::replace(&mut self.message, message)
    }

    /// The effective signal: the caller's, or whatever an outer middleware
    /// narrowed it to.
    pub fn cancellation(&self) -> &CancellationSignal { &self.cancellation }

    pub fn set_cancellation(&mut self, cancellation: CancellationSignal) {
        self.cancellation = cancellation;
    }

    pub fn metadata(&self) -> &Metadata { &self.metadata }
    pub fn metadata_mut(&mut self) -> &mut Metadata { &mut self.metadata }

    pub fn into_parts(self) -> (M, CancellationSignal, Metadata) {
        (self.message, self.cancellation, self.metadata)
    }
}

impl<M: Message + Clone> Clone for InvocationContext<M> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            message: self.message.clone(),
            cancellation: self.cancellation.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

impl<M: Message + fmt::Debug> fmt::Debug for InvocationContext<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationContext")
            .field("id", &self.id)
            .field("message", &self.message)
            .field("cancellation", &self.cancellation)
            .field("metadata", &self.metadata)
            .finish()
    }
}
