//! Structured logging around each invocation.
//!
//! Opens one `tracing` span per call and emits up to three events inside it:
//!
//! | Event | When | Default level |
//! |---|---|---|
//! | pre-execution | before `next` | `info` |
//! | post-execution | `next` returned `Ok` | `info` |
//! | error | `next` returned `Err` | `error` |
//!
//! The error is always handed back unchanged; logging never swallows it.
//!
//! Each event can be intercepted by a hook. A hook sees what the event would
//! carry and returns `false` to suppress the default event, typically after
//! emitting its own. Hooks run inside the invocation span.
//!
//! ```rust
//! use sluice::{Message, PipelineBuilder};
//! use sluice::middleware::{Logging, Payload};
//!
//! #[derive(Debug)]
//! struct Login { user: String, password: String }
//! impl Message for Login { type Response = bool; }
//!
//! let mut pipeline = PipelineBuilder::<Login>::new();
//! pipeline.use_middleware(
//!     Logging::<Login>::new()
//!         .message_payload_for(|login: &Login| {
//!             if login.password.is_empty() { Payload::Debug } else { Payload::Omit }
//!         })
//!         .on_success(|event| {
//!             tracing::info!(id = %event.id, granted = *event.response, "login attempt");
//!             false
//!         }),
//! );
//! ```

use std::fmt::{self, Debug};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::Instrument;
use uuid::Uuid;

use crate::context::InvocationContext;
use crate::error::Error;
use crate::message::Message;
use crate::middleware::{Middleware, Next};

/// Level of one logging event.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// How message and response payloads appear in events.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    /// Leave the `payload` field out of the event.
    Omit,
    /// Render with the `Debug` impl.
    #[default]
    Debug,
    /// Single-line JSON. Needs [`Logging::json_payloads`]; falls back to
    /// `Debug` without it.
    Json,
    /// Multi-line JSON. Same requirement as `Json`.
    IndentedJson,
}

/// The level and payload part of [`Logging`], which is all that can come
/// from a configuration file.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSettings {
    pub pre_level: LogLevel,
    pub post_level: LogLevel,
    pub error_level: LogLevel,
    pub message_payload: Payload,
    pub response_payload: Payload,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            pre_level: LogLevel::Info,
            post_level: LogLevel::Info,
            error_level: LogLevel::Error,
            message_payload: Payload::Debug,
            response_payload: Payload::Debug,
        }
    }
}

/// What the pre-execution hook sees.
pub struct PreExecution<'a, M> {
    pub id: Uuid,
    pub level: LogLevel,
    pub message: &'a M,
}

/// What the post-execution hook sees.
pub struct PostExecution<'a, M: Message> {
    pub id: Uuid,
    pub level: LogLevel,
    pub response: &'a M::Response,
    pub elapsed: Duration,
}

/// What the error hook sees.
pub struct Failure<'a> {
    pub id: Uuid,
    pub level: LogLevel,
    pub error: &'a Error,
    pub elapsed: Duration,
}

type PreHook<M> = Arc<dyn for<'a> Fn(&PreExecution<'a, M>) -> bool + Send + Sync>;
type PostHook<M> = Arc<dyn for<'a> Fn(&PostExecution<'a, M>) -> bool + Send + Sync>;
type ErrorHook = Arc<dyn for<'a> Fn(&Failure<'a>) -> bool + Send + Sync>;
type PayloadFor<M> = Arc<dyn Fn(&M) -> Payload + Send + Sync>;

// Set only where the payload types are `Serialize`.
struct JsonCodec<M: Message> {
    message: fn(&M, bool) -> Option<String>,
    response: fn(&M::Response, bool) -> Option<String>,
}

impl<M: Message> Clone for JsonCodec<M> {
    fn clone(&self) -> Self { *self }
}

impl<M: Message> Copy for JsonCodec<M> {}

fn to_json<T: Serialize>(value: &T, indented: bool) -> Option<String> {
    let rendered = if indented { serde_json::to_string_pretty(value) } else { serde_json::to_string(value) };
    rendered.ok()
}

// `tracing` fixes the level of an event at compile time, so a runtime level
// needs one call site per variant.
macro_rules! event_at {
    ($level:expr, $($arg:tt)+) => {
        match $level {
            LogLevel::Trace => tracing::trace!($($arg)+),
            LogLevel::Debug => tracing::debug!($($arg)+),
            LogLevel::Info  => tracing::info!($($arg)+),
            LogLevel::Warn  => tracing::warn!($($arg)+),
            LogLevel::Error => tracing::error!($($arg)+),
        }
    };
}

/// Logging middleware. The public fields are its configuration; payload
/// strategies per message and hooks are set through the builder methods.
pub struct Logging<M: Message> {
    pub pre_level: LogLevel,
    pub post_level: LogLevel,
    pub error_level: LogLevel,
    pub message_payload: Payload,
    pub response_payload: Payload,
    message_payload_for: Option<PayloadFor<M>>,
    response_payload_for: Option<PayloadFor<M>>,
    pre_hook: Option<PreHook<M>>,
    post_hook: Option<PostHook<M>>,
    error_hook: Option<ErrorHook>,
    json: Option<JsonCodec<M>>,
}

impl<M: Message> Logging<M> {
    pub fn new() -> Self {
        Self::from(LoggingSettings::default())
    }

    /// Omits both payloads, for messages that carry secrets.
    pub fn without_payloads(mut self) -> Self {
        self.message_payload = Payload::Omit;
        self.response_payload = Payload::Omit;
        self
    }

    /// Renders both payloads as single-line JSON.
    pub fn json_payloads(mut self) -> Self
    where
        M: Serialize,
        M::Response: Serialize,
    {
        self.json = Some(JsonCodec { message: to_json::<M>, response: to_json::<M::Response> });
        self.message_payload = Payload::Json;
        self.response_payload = Payload::Json;
        self
    }

    /// Picks the message payload strategy per message. Overrides
    /// `message_payload`.
    pub fn message_payload_for<F>(mut self, f: F) -> Self
    where
        F: Fn(&M) -> Payload + Send + Sync + 'static,
    {
        self.message_payload_for = Some(Arc::new(f));
        self
    }

    /// Picks the response payload strategy per message. Decided before the
    /// call, since the message is handed on by value. Overrides
    /// `response_payload`.
    pub fn response_payload_for<F>(mut self, f: F) -> Self
    where
        F: Fn(&M) -> Payload + Send + Sync + 'static,
    {
        self.response_payload_for = Some(Arc::new(f));
        self
    }

    /// Runs before the pre-execution event; `false` suppresses the event.
    pub fn on_execute<F>(mut self, hook: F) -> Self
    where
        F: for<'a> Fn(&PreExecution<'a, M>) -> bool + Send + Sync + 'static,
    {
        self.pre_hook = Some(Arc::new(hook));
        self
    }

    /// Runs before the post-execution event; `false` suppresses the event.
    pub fn on_success<F>(mut self, hook: F) -> Self
    where
        F: for<'a> Fn(&PostExecution<'a, M>) -> bool + Send + Sync + 'static,
    {
        self.post_hook = Some(Arc::new(hook));
        self
    }

    /// Runs before the error event; `false` suppresses the event. The error
    /// is returned either way.
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: for<'a> Fn(&Failure<'a>) -> bool + Send + Sync + 'static,
    {
        self.error_hook = Some(Arc::new(hook));
        self
    }

    fn render_message(&self, strategy: Payload, message: &M) -> Option<String>
    where
        M: Debug,
    {
        match (strategy, self.json) {
            (Payload::Omit, _) => None,
            (Payload::Json, Some(json)) => (json.message)(message, false),
            (Payload::IndentedJson, Some(json)) => (json.message)(message, true),
            _ => Some(format!("{message:?}")),
        }
    }

    fn render_response(&self, strategy: Payload, response: &M::Response) -> Option<String>
    where
        M::Response: Debug,
    {
        match (strategy, self.json) {
            (Payload::Omit, _) => None,
            (Payload::Json, Some(json)) => (json.response)(response, false),
            (Payload::IndentedJson, Some(json)) => (json.response)(response, true),
            _ => Some(format!("{response:?}")),
        }
    }
}

impl<M: Message> From<LoggingSettings> for Logging<M> {
    fn from(settings: LoggingSettings) -> Self {
        Self {
            pre_level: settings.pre_level,
            post_level: settings.post_level,
            error_level: settings.error_level,
            message_payload: settings.message_payload,
            response_payload: settings.response_payload,
            message_payload_for: None,
            response_payload_for: None,
            pre_hook: None,
            post_hook: None,
            error_hook: None,
            json: None,
        }
    }
}

impl<M: Message> Default for Logging<M> {
    fn default() -> Self { Self::new() }
}

impl<M: Message> Clone for Logging<M> {
    fn clone(&self) -> Self {
        Self {
            pre_level: self.pre_level,
            post_level: self.post_level,
            error_level: self.error_level,
            message_payload: self.message_payload,
            response_payload: self.response_payload,
            message_payload_for: self.message_payload_for.clone(),
            response_payload_for: self.response_payload_for.clone(),
            pre_hook: self.pre_hook.clone(),
            post_hook: self.post_hook.clone(),
            error_hook: self.error_hook.clone(),
            json: self.json,
        }
    }
}

impl<M: Message> fmt::Debug for Logging<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logging")
            .field("pre_level", &self.pre_level)
            .field("post_level", &self.post_level)
            .field("error_level", &self.error_level)
            .field("message_payload", &self.message_payload)
            .field("response_payload", &self.response_payload)
            .field("json", &self.json.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<M> Middleware<M> for Logging<M>
where
    M: Message + Debug,
    M::Response: Debug,
{
    async fn handle(&self, ctx: InvocationContext<M>, next: Next<'_, M>) -> Result<M::Response, Error> {
        let id = ctx.id();
        let span = tracing::info_span!(
            "invocation",
            message_type = M::name(),
            kind = %M::KIND,
            id = %id
        );

        async move {
            let message_strategy = match &self.message_payload_for {
                Some(f) => (**f)(ctx.message()),
                None => self.message_payload,
            };
            let response_strategy = match &self.response_payload_for {
                Some(f) => (**f)(ctx.message()),
                None => self.response_payload,
            };

            let emit = self.pre_hook.as_ref().is_none_or(|hook| {
                (**hook)(&PreExecution { id, level: self.pre_level, message: ctx.message() })
            });
            if emit {
                match self.render_message(message_strategy, ctx.message()) {
                    Some(payload) => event_at!(self.pre_level, payload = %payload, "executing {}", M::KIND),
                    None => event_at!(self.pre_level, "executing {}", M::KIND),
                }
            }

            let started = Instant::now();
            let result = next.run(ctx).await;
            let elapsed = started.elapsed();
            let elapsed_ms = elapsed.as_secs_f64() * 1000.0;

            match &result {
                Ok(response) => {
                    let emit = self.post_hook.as_ref().is_none_or(|hook| {
                        (**hook)(&PostExecution { id, level: self.post_level, response, elapsed })
                    });
                    if emit {
                        match self.render_response(response_strategy, response) {
                            Some(payload) => {
                                event_at!(self.post_level, elapsed_ms, payload = %payload, "executed {}", M::KIND)
                            }
                            None => event_at!(self.post_level, elapsed_ms, "executed {}", M::KIND),
                        }
                    }
                }
                Err(error) => {
                    let emit = self.error_hook.as_ref().is_none_or(|hook| {
                        (**hook)(&Failure { id, level: self.error_level, error, elapsed })
                    });
                    if emit {
                        event_at!(self.error_level, elapsed_ms, error = %error, "{} failed", M::KIND);
                    }
                }
            }

            result
        }
        .instrument(span)
        .await
    }
}
