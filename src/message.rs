//! Commands and queries.

use std::fmt;

/// Whether a message changes state or only reads it.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MessageKind {
    Command,
    Query,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::Query   => "query",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A command or query that a [`Handler`](crate::Handler) answers.
///
/// ```rust
/// use sluice::{Message, MessageKind};
///
/// struct GetUser { id: u64 }
/// struct User { name: String }
///
/// impl Message for GetUser {
///     type Response = User;
///     const KIND: MessageKind = MessageKind::Query;
/// }
/// ```
///
/// Commands with nothing to return use `()` as their response.
pub trait Message: Send + 'static {
    type Response: Send + 'static;

    const KIND: MessageKind = MessageKind::Command;

    /// Human-readable name used in logs and error messages.
    fn name() -> &'static str {
        std::any::type_name::<Self>()
    }
}
