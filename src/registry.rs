//! Handler registry.
//!
//! Maps each message type to the one proxy that handles it. The message
//! type itself is the key, so lookups are typed end to end: `send::<M>`
//! can only ever reach a `HandlerProxy<M>`.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::cancellation::CancellationSignal;
use crate::error::{ConfigurationError, Error};
use crate::handler::Handler;
use crate::message::Message;
use crate::pipeline::PipelineBuilder;
use crate::proxy::HandlerProxy;
use crate::services::Services;

/// One handler per message type.
///
/// ```rust
/// use sluice::{CancellationSignal, Error, HandlerRegistry, Message, handler_fn};
///
/// struct Ping;
/// impl Message for Ping { type Response = &'static str; }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Error> {
/// let mut registry = HandlerRegistry::new();
/// registry.register::<Ping, _>(handler_fn(|_: Ping, _: CancellationSignal| async {
///     Ok::<_, Error>("pong")
/// }))?;
///
/// let reply = registry.send(Ping, CancellationSignal::new()).await?;
/// assert_eq!(reply, "pong");
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct HandlerRegistry {
    services: Arc<Services>,
    proxies: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry whose configuration functions see `services`.
    pub fn with_services(services: Services) -> Self {
        Self { services: Arc::new(services), proxies: HashMap::new() }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Registers `handler` with its own pipeline hook.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::DuplicateHandler`] if `M` already has a handler,
    /// or the hook's own error. The pipeline is built once here so a broken
    /// configuration is reported now rather than on the first call.
    pub fn register<M, H>(&mut self, handler: H) -> Result<&mut Self, ConfigurationError>
    where
        M: Message,
        H: Handler<M>,
    {
        self.insert(HandlerProxy::new(handler))
    }

    /// Registers `handler` with an external pipeline configuration that
    /// takes precedence over the handler's own hook.
    pub fn register_with<M, H, F>(&mut self, handler: H, configure: F) -> Result<&mut Self, ConfigurationError>
    where
        M: Message,
        H: Handler<M>,
        F: Fn(&mut PipelineBuilder<M>, &Services) -> Result<(), ConfigurationError>
            + Send
            + Sync
            + 'static,
    {
        self.insert(HandlerProxy::with_pipeline(handler, configure))
    }

    fn insert<M: Message>(&mut self, proxy: HandlerProxy<M>) -> Result<&mut Self, ConfigurationError> {
        let key = TypeId::of::<M>();
        if self.proxies.contains_key(&key) {
            return Err(ConfigurationError::DuplicateHandler { message: M::name() });
        }

        let proxy = proxy.with_services(Arc::clone(&self.services));
        let pipeline = proxy.build_pipeline()?;

        info!(
            message_type = M::name(),
            kind = %M::KIND,
            middleware = pipeline.len(),
            "handler registered"
        );
        self.proxies.insert(key, Box::new(proxy));
        Ok(self)
    }

    fn get<M: Message>(&self) -> Result<&HandlerProxy<M>, Error> {
        self.proxies
            .get(&TypeId::of::<M>())
            .and_then(|proxy| proxy.downcast_ref::<HandlerProxy<M>>())
            .ok_or(Error::NoHandler(M::name()))
    }

    /// A clone of the proxy for `M`, to call without going through the
    /// registry.
    pub fn proxy<M: Message>(&self) -> Result<HandlerProxy<M>, Error> {
        self.get::<M>().cloned()
    }

    /// Invokes the handler for `M`.
    pub async fn send<M: Message>(&self, message: M, cancellation: CancellationSignal) -> Result<M::Response, Error> {
        self.get::<M>()?.invoke(message, cancellation).await
    }

    pub fn contains<M: Message>(&self) -> bool {
        self.proxies.contains_key(&TypeId::of::<M>())
    }

    pub fn len(&self) -> usize { self.proxies.len() }
    pub fn is_empty(&self) -> bool { self.proxies.is_empty() }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.proxies.len())
            .finish_non_exhaustive()
    }
}
