//! Message validation.
//!
//! Messages opt in by implementing [`Validate`]. The [`Validation`]
//! middleware calls it before anything further in the chain runs and
//! short-circuits with [`Error::Validation`] when it fails.

use std::fmt;

use async_trait::async_trait;

use crate::context::InvocationContext;
use crate::error::Error;
use crate::message::Message;
use crate::middleware::{Middleware, Next};

/// Implemented by messages that can check their own invariants.
///
/// ```rust
/// use sluice::middleware::{Validate, ValidationError};
///
/// struct CreateUser { name: String, age: u8 }
///
/// impl Validate for CreateUser {
///     fn validate(&self) -> Result<(), ValidationError> {
///         let mut errors = ValidationError::new();
///         errors.check(!self.name.is_empty(), "name", "must not be empty");
///         errors.check(self.age >= 18, "age", "must be at least 18");
///         errors.into_result()
///     }
/// }
/// ```
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

/// One failed rule.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Every rule a message broke.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ValidationError {
    errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a single failed field.
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut err = Self::new();
        err.push(field, message);
        err
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) -> &mut Self {
        self.errors.push(FieldError { field: field.into(), message: message.into() });
        self
    }

    /// Records a failure unless `ok` holds.
    pub fn check(&mut self, ok: bool, field: impl Into<String>, message: impl Into<String>) -> &mut Self {
        if !ok {
            self.push(field, message);
        }
        self
    }

    pub fn errors(&self) -> &[FieldError] { &self.errors }
    pub fn is_empty(&self) -> bool { self.errors.is_empty() }

    /// `Ok(())` if nothing was recorded.
    pub fn into_result(self) -> Result<(), Self> {
        if self.errors.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.as_slice() {
            [] => f.write_str("validation failed"),
            [only] => write!(f, "{only}"),
            many => {
                f.write_str("validation failed with multiple errors: ")?;
                for (i, err) in many.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{err}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Rejects invalid messages before they reach inner middleware or the
/// handler.
#[derive(Clone, Copy, Debug, Default)]
pub struct Validation;

#[async_trait]
impl<M> Middleware<M> for Validation
where
    M: Message + Validate,
{
    async fn handle(&self, ctx: InvocationContext<M>, next: Next<'_, M>) -> Result<M::Response, Error> {
        ctx.message().validate()?;
        next.run(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_error_displays_plainly() {
        assert_eq!(ValidationError::field("name", "required").to_string(), "name: required");
    }

    #[test]
    fn multiple_errors_are_combined() {
        let mut err = ValidationError::new();
        err.push("name", "required").push("age", "too low");
        assert_eq!(
            err.to_string(),
            "validation failed with multiple errors: name: required, age: too low"
        );
    }

    #[test]
    fn check_only_records_failures() {
        let mut err = ValidationError::new();
        err.check(true, "a", "never").check(false, "b", "always");
        assert_eq!(err.errors().len(), 1);
        assert_eq!(err.errors()[0].field, "b");
        assert!(ValidationError::new().into_result().is_ok());
    }
}
