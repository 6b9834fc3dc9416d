//! Declarative pipeline settings.
//!
//! Lets the cross-cutting part of a pipeline come from a configuration file
//! instead of code:
//!
//! ```json
//! {
//!   "logging":    { "pre_level": "debug", "message_payload": "omit" },
//!   "timeout_ms": 2000,
//!   "retry":      { "max_attempts": 3, "delay_ms": 100 }
//! }
//! ```
//!
//! Every section is optional. [`PipelineSettings::apply`] appends what is
//! present in a fixed order, logging → timeout → retry, so logging sees the
//! whole call and one deadline bounds every retry attempt together.

use std::fmt::Debug;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::message::Message;
use crate::middleware::{Logging, LoggingSettings, Retry, Timeout};
use crate::pipeline::PipelineBuilder;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySettings {
    pub max_attempts: u32,
    #[serde(default)]
    pub delay_ms: u64,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineSettings {
    pub logging: Option<LoggingSettings>,
    pub timeout_ms: Option<u64>,
    pub retry: Option<RetrySettings>,
}

impl PipelineSettings {
    /// Parses and validates settings from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigurationError> {
        let settings: Self = serde_json::from_str(json)
            .map_err(|e| ConfigurationError::Invalid(format!("pipeline settings: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.timeout_ms == Some(0) {
            return Err(ConfigurationError::Invalid("timeout_ms must be greater than zero".into()));
        }
        if self.retry.is_some_and(|r| r.max_attempts == 0) {
            return Err(ConfigurationError::Invalid("retry.max_attempts must be at least 1".into()));
        }
        Ok(())
    }

    /// Appends the configured middleware to `pipeline`.
    pub fn apply<M>(&self, pipeline: &mut PipelineBuilder<M>) -> Result<(), ConfigurationError>
    where
        M: Message + Clone + Debug,
        M::Response: Debug,
    {
        self.validate()?;

        if let Some(logging) = self.logging {
            pipeline.use_middleware(Logging::<M>::from(logging));
        }
        if let Some(ms) = self.timeout_ms {
            pipeline.use_middleware(Timeout::new(Duration::from_millis(ms)));
        }
        if let Some(retry) = self.retry {
            pipeline.use_middleware(
                Retry::new(retry.max_attempts).with_delay(Duration::from_millis(retry.delay_ms)),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{LogLevel, Payload};

    #[derive(Clone, Debug)]
    struct Report;
    impl Message for Report {
        type Response = String;
    }

    #[test]
    fn parses_every_section() {
        let settings = PipelineSettings::from_json_str(
            r#"{
                "logging": { "pre_level": "debug", "message_payload": "omit" },
                "timeout_ms": 2000,
                "retry": { "max_attempts": 3, "delay_ms": 100 }
            }"#,
        )
        .unwrap();

        let logging = settings.logging.unwrap();
        assert_eq!(logging.pre_level, LogLevel::Debug);
        assert_eq!(logging.post_level, LogLevel::Info);
        assert_eq!(logging.message_payload, Payload::Omit);
        assert_eq!(settings.timeout_ms, Some(2000));
        assert_eq!(settings.retry, Some(RetrySettings { max_attempts: 3, delay_ms: 100 }));
    }

    #[test]
    fn empty_object_means_nothing() {
        let settings = PipelineSettings::from_json_str("{}").unwrap();
        assert_eq!(settings, PipelineSettings::default());

        let mut pipeline = PipelineBuilder::<Report>::new();
        settings.apply(&mut pipeline).unwrap();
        assert!(pipeline.is_empty());
    }

    #[test]
    fn rejects_unknown_fields_and_zero_values() {
        for json in [
            r#"{ "retries": 3 }"#,
            r#"{ "timeout_ms": 0 }"#,
            r#"{ "retry": { "max_attempts": 0 } }"#,
            r#"{ "logging": { "colour": true } }"#,
        ] {
            let err = PipelineSettings::from_json_str(json).unwrap_err();
            assert!(matches!(err, ConfigurationError::Invalid(_)), "{json}: {err}");
        }
    }

    #[test]
    fn apply_uses_fixed_order() {
        let settings = PipelineSettings {
            logging: Some(LoggingSettings::default()),
            timeout_ms: Some(50),
            retry: Some(RetrySettings { max_attempts: 2, delay_ms: 0 }),
        };
        let mut pipeline = PipelineBuilder::<Report>::new();
        settings.apply(&mut pipeline).unwrap();

        assert!(pipeline.contains::<Logging<Report>>());
        assert!(pipeline.contains::<Timeout>());
        assert!(pipeline.contains::<Retry>());
        let names: Vec<_> = pipeline
            .middleware_names()
            .into_iter()
            .map(|n| n.split('<').next().unwrap_or(n))
            .map(|n| n.rsplit("::").next().unwrap_or(n))
            .collect();
        assert_eq!(names, ["Logging", "Timeout", "Retry"]);
    }
}
