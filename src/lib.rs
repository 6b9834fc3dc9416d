//! # sluice
//!
//! Typed middleware pipelines for command and query handlers.
//! A handler, the middleware around it, and nothing else.
//!
//! ## The contract
//!
//! A handler does one thing: turn a message into a response. Everything
//! around that (logging, validation, authorization, retries, deadlines) is
//! middleware, declared in order next to the handler and executed in exactly
//! that order. No priorities, no reordering, no reflection.
//!
//! ```text
//! caller ─▶ HandlerProxy ─▶ [Logging ─▶ Validation ─▶ Retry ─▶ Handler]
//!                             outermost                     innermost
//! ```
//!
//! What sluice leaves to others:
//!
//! - **Transports**: HTTP routing and wire formats belong to your server.
//!   The only bridge is [`Metadata::from_headers`].
//! - **Dependency injection**: handlers are plain values; ambient state
//!   reaches pipeline configuration through [`Services`].
//!
//! ## Quick start
//!
//! ```rust
//! use async_trait::async_trait;
//! use sluice::{
//!     CancellationSignal, ConfigurationError, Error, Handler, HandlerRegistry,
//!     Message, MessageKind, PipelineBuilder, Services,
//!     middleware::{Logging, Validate, Validation, ValidationError},
//! };
//!
//! #[derive(Clone, Debug)]
//! struct GetUser { id: u64 }
//!
//! #[derive(Debug, PartialEq)]
//! struct User { id: u64, name: String }
//!
//! impl Message for GetUser {
//!     type Response = User;
//!     const KIND: MessageKind = MessageKind::Query;
//! }
//!
//! impl Validate for GetUser {
//!     fn validate(&self) -> Result<(), ValidationError> {
//!         let mut errors = ValidationError::new();
//!         errors.check(self.id > 0, "id", "must be positive");
//!         errors.into_result()
//!     }
//! }
//!
//! struct GetUserHandler;
//!
//! #[async_trait]
//! impl Handler<GetUser> for GetUserHandler {
//!     async fn handle(&self, query: GetUser, cancel: CancellationSignal) -> Result<User, Error> {
//!         cancel.check()?;
//!         Ok(User { id: query.id, name: "alice".into() })
//!     }
//!
//!     fn configure_pipeline(
//!         pipeline: &mut PipelineBuilder<GetUser>,
//!         _services: &Services,
//!     ) -> Result<(), ConfigurationError> {
//!         pipeline.use_middleware(Logging::new()).use_middleware(Validation);
//!         Ok(())
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Error> {
//! let mut registry = HandlerRegistry::new();
//! registry.register::<GetUser, _>(GetUserHandler)?;
//!
//! let user = registry.send(GetUser { id: 42 }, CancellationSignal::new()).await?;
//! assert_eq!(user.name, "alice");
//!
//! let rejected = registry.send(GetUser { id: 0 }, CancellationSignal::new()).await;
//! assert!(matches!(rejected, Err(Error::Validation(_))));
//! # Ok(())
//! # }
//! ```

mod cancellation;
mod context;
mod error;
mod handler;
mod message;
mod metadata;
mod pipeline;
mod proxy;
mod registry;
mod services;
mod settings;

pub mod middleware;

pub use cancellation::CancellationSignal;
pub use context::InvocationContext;
pub use error::{BoxError, ConfigurationError, Error};
pub use handler::{Handler, HandlerFn, handler_fn};
pub use message::{Message, MessageKind};
pub use metadata::Metadata;
pub use middleware::{BoxFuture, Middleware, Next};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use proxy::{ConfigureFn, HandlerProxy};
pub use registry::HandlerRegistry;
pub use services::Services;
pub use settings::{PipelineSettings, RetrySettings};
