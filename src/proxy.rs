//! Handler proxies.
//!
//! A [`HandlerProxy`] is what callers hold instead of the handler itself. On
//! every call it builds the pipeline from its configuration function (or
//! reuses a cached one), wraps the message in a fresh
//! [`InvocationContext`] and drives the chain.
//!
//! Rebuilding per call is the default because a configuration function may
//! read ambient state that changes between calls. Pipelines that depend on
//! nothing but their own code can opt into [`HandlerProxy::cached`].

use std::sync::Arc;

use tracing::{debug, trace};

use crate::cancellation::CancellationSignal;
use crate::context::InvocationContext;
use crate::error::{ConfigurationError, Error};
use crate::handler::Handler;
use crate::message::Message;
use crate::pipeline::{Pipeline, PipelineBuilder};
use crate::services::Services;

/// The pipeline configuration seam.
pub type ConfigureFn<M> =
    dyn Fn(&mut PipelineBuilder<M>, &Services) -> Result<(), ConfigurationError> + Send + Sync;

/// A callable handler with its pipeline.
///
/// Cloning is cheap (a few `Arc` increments) and clones may be invoked
/// concurrently.
pub struct HandlerProxy<M: Message> {
    handler: Arc<dyn Handler<M>>,
    configure: Arc<ConfigureFn<M>>,
    services: Arc<Services>,
    cached: Option<Arc<Pipeline<M>>>,
}

impl<M: Message> HandlerProxy<M> {
    /// Uses the handler's own [`Handler::configure_pipeline`] hook.
    pub fn new<H: Handler<M>>(handler: H) -> Self {
        let configure: Arc<ConfigureFn<M>> = Arc::new(H::configure_pipeline);
        Self::from_parts(Arc::new(handler), configure)
    }

    /// Uses `configure` instead of the handler's own hook.
    pub fn with_pipeline<H, F>(handler: H, configure: F) -> Self
    where
        H: Handler<M>,
        F: Fn(&mut PipelineBuilder<M>, &Services) -> Result<(), ConfigurationError>
            + Send
            + Sync
            + 'static,
    {
        Self::from_parts(Arc::new(handler), Arc::new(configure))
    }

    fn from_parts(handler: Arc<dyn Handler<M>>, configure: Arc<ConfigureFn<M>>) -> Self {
        Self {
            handler,
            configure,
            services: Arc::new(Services::new()),
            cached: None,
        }
    }

    /// Ambient services handed to the configuration function. Drops any
    /// cached pipeline, since it was built against the previous services.
    pub fn with_services(mut self, services: Arc<Services>) -> Self {
        self.services = services;
        self.cached = None;
        self
    }

    /// Builds the pipeline once now and reuses it for every call.
    ///
    /// # Errors
    ///
    /// Whatever the configuration function returns.
    pub fn cached(mut self) -> Result<Self, ConfigurationError> {
        self.cached = Some(Arc::new(self.build_pipeline()?));
        Ok(self)
    }

    pub fn is_cached(&self) -> bool {
        self.cached.is_some()
    }

    /// Runs the configuration function against a fresh builder.
    pub fn build_pipeline(&self) -> Result<Pipeline<M>, ConfigurationError> {
        let mut builder = PipelineBuilder::new();
        (*self.configure)(&mut builder, &self.services)?;
        let pipeline = builder.build();
        debug!(
            message_type = M::name(),
            middleware = ?pipeline.middleware_names(),
            "pipeline built"
        );
        Ok(pipeline)
    }

    /// Invokes the handler through its pipeline.
    pub async fn invoke(&self, message: M, cancellation: CancellationSignal) -> Result<M::Response, Error> {
        self.invoke_context(InvocationContext::new(message, cancellation)).await
    }

    /// Like [`invoke`](Self::invoke), for transports that prepare the context
    /// themselves (typically to attach [`Metadata`](crate::Metadata)).
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] before anything runs if the pipeline cannot
    /// be built; otherwise whatever the chain resolves to.
    pub async fn invoke_context(&self, ctx: InvocationContext<M>) -> Result<M::Response, Error> {
        let built;
        let pipeline: &Pipeline<M> = match &self.cached {
            Some(cached) => cached,
            None => {
                built = self.build_pipeline()?;
                &built
            }
        };

        trace!(message_type = M::name(), kind = %M::KIND, id = %ctx.id(), "invoking");
        pipeline.execute(ctx, &*self.handler).await
    }
}

impl<M: Message> Clone for HandlerProxy<M> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            configure: Arc::clone(&self.configure),
            services: Arc::clone(&self.services),
            cached: self.cached.clone(),
        }
    }
}

impl<M: Message> std::fmt::Debug for HandlerProxy<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerProxy")
            .field("message", &M::name())
            .field("cached", &self.cached)
            .finish_non_exhaustive()
    }
}
