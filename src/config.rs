//! Publisher configuration
//!
//! Loaded from `WORKFLOW_NATS_*` environment variables (a `.env` file is
//! honoured). `server_url`, `stream_name` and `subject` are required.

use crate::error::PublisherError;
use crate::stream::StreamDescriptor;
use config::{Config, Environment};
use serde::Deserialize;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "WORKFLOW_NATS";

/// Publisher configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PublisherConfig {
    /// NATS server URL(s) - comma-separated for multiple servers
    pub server_url: String,

    /// Name of the JetStream stream holding workflow records
    pub stream_name: String,

    /// Subject workflow records are published under
    pub subject: String,

    /// Subject patterns the stream accepts; defaults to `[subject]`
    #[serde(default)]
    pub stream_subjects: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Health/metrics HTTP port
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_http_port() -> u16 {
    9090
}

impl PublisherConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, PublisherError> {
        dotenvy::dotenv().ok();

        let settings = Config::builder()
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("stream_subjects"),
            )
            .build()
            .map_err(|e| PublisherError::Config(e.to_string()))?;

        Self::from_settings(settings)
    }

    /// Build from an already-assembled settings tree
    pub fn from_settings(settings: Config) -> Result<Self, PublisherError> {
        let config: Self = settings
            .try_deserialize()
            .map_err(|e| PublisherError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), PublisherError> {
        for (key, value) in [
            ("server_url", &self.server_url),
            ("stream_name", &self.stream_name),
            ("subject", &self.subject),
        ] {
            if value.trim().is_empty() {
                return Err(PublisherError::Config(format!(
                    "{ENV_PREFIX}_{} must not be empty",
                    key.to_uppercase()
                )));
            }
        }
        Ok(())
    }

    /// Stream descriptor for the configured stream
    pub fn stream_descriptor(&self) -> Result<StreamDescriptor, PublisherError> {
        if self.stream_subjects.is_empty() {
            StreamDescriptor::new(self.stream_name.clone(), [self.subject.clone()])
        } else {
            StreamDescriptor::new(self.stream_name.clone(), self.stream_subjects.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> Config {
        let mut builder = Config::builder();
        for (key, value) in pairs {
            builder = builder.set_override(*key, *value).unwrap();
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_required_values_and_defaults() {
        let config = PublisherConfig::from_settings(settings(&[
            ("server_url", "nats://localhost:4222"),
            ("stream_name", "WORKFLOWS"),
            ("subject", "workflows.recorded"),
        ]))
        .unwrap();

        assert_eq!(config.server_url, "nats://localhost:4222");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.http_port, 9090);
        assert!(config.stream_subjects.is_empty());
    }

    #[test]
    fn test_missing_subject_is_rejected() {
        let err = PublisherConfig::from_settings(settings(&[
            ("server_url", "nats://localhost:4222"),
            ("stream_name", "WORKFLOWS"),
        ]))
        .unwrap_err();

        assert!(matches!(err, PublisherError::Config(_)));
        assert!(err.to_string().contains("subject"));
    }

    #[test]
    fn test_empty_server_url_is_rejected() {
        let err = PublisherConfig::from_settings(settings(&[
            ("server_url", " "),
            ("stream_name", "WORKFLOWS"),
            ("subject", "workflows.recorded"),
        ]))
        .unwrap_err();

        assert_eq!(
            err.to_string(),
            "configuration error: WORKFLOW_NATS_SERVER_URL must not be empty"
        );
    }

    #[test]
    fn test_descriptor_defaults_to_publish_subject() {
        let config = PublisherConfig::from_settings(settings(&[
            ("server_url", "nats://localhost:4222"),
            ("stream_name", "WORKFLOWS"),
            ("subject", "workflows.recorded"),
        ]))
        .unwrap();

        let descriptor = config.stream_descriptor().unwrap();
        assert_eq!(descriptor.name(), "WORKFLOWS");
        assert_eq!(descriptor.subjects(), ["workflows.recorded".to_string()]);
    }

    #[test]
    fn test_descriptor_uses_explicit_stream_subjects() {
        let settings = Config::builder()
            .set_override("server_url", "nats://localhost:4222")
            .unwrap()
            .set_override("stream_name", "WORKFLOWS")
            .unwrap()
            .set_override("subject", "workflows.recorded")
            .unwrap()
            .set_override("stream_subjects", vec!["workflows.>", "archive.workflows.>"])
            .unwrap()
            .build()
            .unwrap();

        let descriptor = PublisherConfig::from_settings(settings)
            .unwrap()
            .stream_descriptor()
            .unwrap();
        assert_eq!(descriptor.subjects().len(), 2);
        assert!(descriptor.accepts("workflows.recorded"));
    }
}
