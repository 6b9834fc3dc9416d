//! Terminal handlers.
//!
//! A handler is the innermost link of every chain: the function that
//! actually executes a command or answers a query. Its only contract with
//! the pipeline is the signature
//!
//! ```text
//! (message, cancellation) -> Result<response, Error>
//! ```
//!
//! plus an optional static hook that describes the handler's own pipeline.
//!
//! # From `async fn` to handler
//!
//! ```text
//! async fn place_order(cmd, cancel) -> Result<…> { … }  ← user writes this
//!        ↓ handler_fn(place_order)
//! HandlerFn(place_order)                               ← newtype wrapper
//!        ↓ HandlerProxy::new(…)
//! Arc<dyn Handler<PlaceOrder>>                         ← stored type-erased
//!        ↓ at the end of the chain
//! handler.handle(message, cancellation)               ← one vtable dispatch
//! ```

use std::future::Future;

use async_trait::async_trait;

use crate::cancellation::CancellationSignal;
use crate::error::{ConfigurationError, Error};
use crate::message::Message;
use crate::pipeline::PipelineBuilder;
use crate::services::Services;

/// Executes one message type.
///
/// ```rust
/// use async_trait::async_trait;
/// use sluice::{
///     CancellationSignal, ConfigurationError, Error, Handler, Message,
///     PipelineBuilder, Services, middleware::Validation,
/// };
/// # use sluice::middleware::{Validate, ValidationError};
///
/// struct Rename { name: String }
/// impl Message for Rename { type Response = (); }
/// # impl Validate for Rename {
/// #     fn validate(&self) -> Result<(), ValidationError> { Ok(()) }
/// # }
///
/// struct RenameHandler;
///
/// #[async_trait]
/// impl Handler<Rename> for RenameHandler {
///     async fn handle(&self, cmd: Rename, _: CancellationSignal) -> Result<(), Error> {
///         println!("renaming to {}", cmd.name);
///         Ok(())
///     }
///
///     fn configure_pipeline(
///         pipeline: &mut PipelineBuilder<Rename>,
///         _services: &Services,
///     ) -> Result<(), ConfigurationError> {
///         pipeline.use_middleware(Validation);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Handler<M: Message>: Send + Sync + 'static {
    async fn handle(&self, message: M, cancellation: CancellationSignal) -> Result<M::Response, Error>;

    /// Describes the pipeline this handler runs behind. Called every time a
    /// pipeline is built, with the ambient services of the proxy.
    ///
    /// The default pipeline is empty.
    fn configure_pipeline(
        pipeline: &mut PipelineBuilder<M>,
        services: &Services,
    ) -> Result<(), ConfigurationError>
    where
        Self: Sized,
    {
        let _ = (pipeline, services);
        Ok(())
    }
}

/// Wraps an async closure as a [`Handler`]. The handler's own pipeline is
/// empty; pair it with [`HandlerProxy::with_pipeline`](crate::HandlerProxy::with_pipeline)
/// to add middleware.
///
/// ```rust
/// use sluice::{CancellationSignal, Error, Message, handler_fn};
///
/// struct Ping;
/// impl Message for Ping { type Response = &'static str; }
///
/// let handler = handler_fn(|_: Ping, _: CancellationSignal| async { Ok::<_, Error>("pong") });
/// ```
pub fn handler_fn<F>(f: F) -> HandlerFn<F> {
    HandlerFn(f)
}

/// See [`handler_fn`].
#[derive(Clone, Copy)]
pub struct HandlerFn<F>(F);

#[async_trait]
impl<M, F, Fut> Handler<M> for HandlerFn<F>
where
    M: Message,
    F: Fn(M, CancellationSignal) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<M::Response, Error>> + Send + 'static,
{
    async fn handle(&self, message: M, cancellation: CancellationSignal) -> Result<M::Response, Error> {
        (self.0)(message, cancellation).await
    }
}
