//! Error types.
//!
//! Two families:
//!
//! - [`ConfigurationError`]: the pipeline was set up wrong. Raised
//!   synchronously while a pipeline or registry is being built, never halfway
//!   through an invocation.
//! - [`Error`]: what an invocation resolves to when it fails. The chain
//!   passes these through untouched; only a middleware that explicitly maps
//!   an error changes it.

use std::time::Duration;

use crate::middleware::validation::ValidationError;

/// A boxed domain error returned by a handler or middleware.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Invalid pipeline or registry setup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    /// `configure` was called for a middleware the pipeline does not contain.
    #[error("middleware `{middleware}` is not part of the pipeline for `{message}`")]
    MiddlewareNotPresent {
        middleware: &'static str,
        message: &'static str,
    },

    /// A handler for this message type is already registered.
    #[error("a handler for `{message}` is already registered")]
    DuplicateHandler { message: &'static str },

    /// A configuration value is out of range or inconsistent.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// The error an invocation resolves to.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The pipeline could not be built for this call.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// No handler is registered for the message type.
    #[error("no handler registered for `{0}`")]
    NoHandler(&'static str),

    /// Rejected by the validation middleware.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Rejected by an authorization check.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A layer observed the cancellation signal and gave up.
    #[error("invocation cancelled")]
    Cancelled,

    /// The timeout middleware's deadline elapsed.
    #[error("invocation timed out after {0:?}")]
    Timeout(Duration),

    /// A domain error raised by a handler or middleware.
    #[error(transparent)]
    Handler(BoxError),
}

impl Error {
    /// Wraps a domain error. Use [`Error::downcast_ref`] to get it back.
    pub fn handler(err: impl Into<BoxError>) -> Self {
        Self::Handler(err.into())
    }

    /// Returns the domain error if this is [`Error::Handler`] holding an `E`.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            Self::Handler(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }

    /// `true` for errors that would fail again on an identical retry.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_)
                | Self::NoHandler(_)
                | Self::Validation(_)
                | Self::Unauthorized(_)
                | Self::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("stock exhausted")]
    struct OutOfStock;

    #[test]
    fn downcast_recovers_domain_error() {
        let err = Error::handler(OutOfStock);
        assert!(err.downcast_ref::<OutOfStock>().is_some());
        assert_eq!(err.to_string(), "stock exhausted");
    }

    #[test]
    fn downcast_ignores_other_variants() {
        assert!(Error::Cancelled.downcast_ref::<OutOfStock>().is_none());
    }

    #[test]
    fn permanence() {
        assert!(Error::Cancelled.is_permanent());
        assert!(Error::Unauthorized("nope".into()).is_permanent());
        assert!(!Error::Timeout(Duration::from_secs(1)).is_permanent());
        assert!(!Error::handler(OutOfStock).is_permanent());
    }

    #[test]
    fn configuration_error_message() {
        let err = ConfigurationError::MiddlewareNotPresent {
            middleware: "Retry",
            message: "PlaceOrder",
        };
        assert_eq!(
            err.to_string(),
            "middleware `Retry` is not part of the pipeline for `PlaceOrder`"
        );
        let wrapped: Error = err.clone().into();
        assert_eq!(wrapped.to_string(), err.to_string());
    }
}
