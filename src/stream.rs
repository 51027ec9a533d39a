//! Stream declaration
//!
//! Establishes the durable JetStream stream that holds published workflow
//! records. Declaration is idempotent: an existing stream with the same name
//! is left untouched.

use crate::broker::{Broker, DeclareOutcome};
use crate::error::PublisherError;
use tracing::{debug, error, info};

/// Broker storage class for a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageClass {
    /// Durable on disk, survives broker restarts
    #[default]
    File,
    /// Volatile, lost when the broker restarts
    Memory,
}

/// Immutable description of a declared stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    name: String,
    subjects: Vec<String>,
    storage: StorageClass,
}

impl StreamDescriptor {
    /// Build a validated descriptor with file storage
    pub fn new<I, S>(name: impl Into<String>, subjects: I) -> Result<Self, PublisherError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_storage(name, subjects, StorageClass::File)
    }

    /// Build a validated descriptor with an explicit storage class
    ///
    /// Workflow records must survive broker restarts, so anything other than
    /// [`StorageClass::File`] is rejected.
    pub fn with_storage<I, S>(
        name: impl Into<String>,
        subjects: I,
        storage: StorageClass,
    ) -> Result<Self, PublisherError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        let subjects: Vec<String> = subjects.into_iter().map(Into::into).collect();

        if name.is_empty() {
            return Err(PublisherError::InvalidStream("stream name must not be empty".to_string()));
        }
        if name.chars().any(|c| c.is_whitespace() || matches!(c, '.' | '*' | '>')) {
            return Err(PublisherError::InvalidStream(format!(
                "stream name '{name}' contains a reserved character"
            )));
        }
        if subjects.is_empty() {
            return Err(PublisherError::InvalidStream(format!(
                "stream '{name}' needs at least one subject"
            )));
        }
        if subjects.iter().any(|s| s.trim().is_empty()) {
            return Err(PublisherError::InvalidStream(format!(
                "stream '{name}' has an empty subject pattern"
            )));
        }
        if storage != StorageClass::File {
            return Err(PublisherError::InvalidStream(format!(
                "stream '{name}' must use file storage to survive broker restarts"
            )));
        }

        Ok(Self {
            name,
            subjects,
            storage,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subjects(&self) -> &[String] {
        &self.subjects
    }

    pub fn storage(&self) -> StorageClass {
        self.storage
    }

    /// Whether a concrete subject is captured by one of this stream's patterns
    pub fn accepts(&self, subject: &str) -> bool {
        self.subjects.iter().any(|pattern| subject_matches(pattern, subject))
    }
}

/// Match a concrete subject against a NATS subject pattern
///
/// `*` matches exactly one token; `>` matches one or more trailing tokens.
pub fn subject_matches(pattern: &str, subject: &str) -> bool {
    let mut pattern_tokens = pattern.split('.');
    let mut subject_tokens = subject.split('.');

    loop {
        match (pattern_tokens.next(), subject_tokens.next()) {
            (Some(">"), Some(token)) => return !token.is_empty(),
            (Some("*"), Some(token)) if !token.is_empty() => continue,
            (Some(p), Some(s)) if !s.is_empty() && p == s => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// Whether two subject patterns could capture the same subject
///
/// The broker refuses to create a stream whose subjects overlap another
/// stream's.
pub fn subjects_overlap(a: &str, b: &str) -> bool {
    let mut a_tokens = a.split('.');
    let mut b_tokens = b.split('.');

    loop {
        match (a_tokens.next(), b_tokens.next()) {
            (Some(">"), Some(_)) | (Some(_), Some(">")) => return true,
            (Some("*"), Some(_)) | (Some(_), Some("*")) => continue,
            (Some(x), Some(y)) if x == y => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// Declare (create if absent) a durable stream on the broker
///
/// Fails with [`PublisherError::InvalidStream`] before touching the broker
/// when the arguments are invalid, and with
/// [`PublisherError::StreamDeclaration`] when the broker rejects the stream.
pub async fn declare_stream<B, I, S>(
    broker: &B,
    name: &str,
    subjects: I,
    storage: StorageClass,
) -> Result<StreamDescriptor, PublisherError>
where
    B: Broker + ?Sized,
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let descriptor = StreamDescriptor::with_storage(name, subjects, storage)?;
    ensure_stream(broker, &descriptor).await?;
    Ok(descriptor)
}

/// Ensure an already-validated stream exists on the broker
pub async fn ensure_stream<B>(broker: &B, descriptor: &StreamDescriptor) -> Result<DeclareOutcome, PublisherError>
where
    B: Broker + ?Sized,
{
    match broker.declare_stream(descriptor).await {
        Ok(DeclareOutcome::Created) => {
            info!(stream = descriptor.name(), subjects = ?descriptor.subjects(), "Created stream");
            Ok(DeclareOutcome::Created)
        }
        Ok(DeclareOutcome::Existing) => {
            debug!(stream = descriptor.name(), "Stream already exists");
            Ok(DeclareOutcome::Existing)
        }
        Err(e) => {
            error!(stream = descriptor.name(), error = %e, "Failed to declare stream");
            Err(PublisherError::StreamDeclaration {
                stream: descriptor.name().to_string(),
                source: e,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_subject_match() {
        assert!(subject_matches("workflows.recorded", "workflows.recorded"));
        assert!(!subject_matches("workflows.recorded", "workflows.deleted"));
        assert!(!subject_matches("workflows", "workflows.recorded"));
        assert!(!subject_matches("workflows.recorded", "workflows"));
    }

    #[test]
    fn test_single_token_wildcard() {
        assert!(subject_matches("workflows.*", "workflows.recorded"));
        assert!(!subject_matches("workflows.*", "workflows.argo.recorded"));
        assert!(!subject_matches("workflows.*", "workflows"));
        assert!(subject_matches("*.recorded", "workflows.recorded"));
    }

    #[test]
    fn test_tail_wildcard() {
        assert!(subject_matches("workflows.>", "workflows.recorded"));
        assert!(subject_matches("workflows.>", "workflows.argo.recorded"));
        assert!(!subject_matches("workflows.>", "workflows"));
        assert!(subject_matches(">", "anything.at.all"));
    }

    #[test]
    fn test_empty_tokens_never_match() {
        assert!(!subject_matches("workflows.*", "workflows."));
        assert!(!subject_matches("workflows.>", "workflows."));
    }

    #[test]
    fn test_overlap() {
        assert!(subjects_overlap("workflows.>", "workflows.recorded"));
        assert!(subjects_overlap("workflows.*", "*.recorded"));
        assert!(subjects_overlap("workflows.recorded", "workflows.recorded"));
        assert!(!subjects_overlap("workflows.recorded", "workflows.deleted"));
        assert!(!subjects_overlap("workflows.*", "events.*"));
        assert!(!subjects_overlap("workflows.*", "workflows.a.b"));
    }

    #[test]
    fn test_descriptor_defaults_to_file_storage() {
        let descriptor = StreamDescriptor::new("WORKFLOWS", ["workflows.>"]).unwrap();
        assert_eq!(descriptor.name(), "WORKFLOWS");
        assert_eq!(descriptor.subjects(), ["workflows.>".to_string()]);
        assert_eq!(descriptor.storage(), StorageClass::File);
        assert!(descriptor.accepts("workflows.recorded"));
        assert!(!descriptor.accepts("events.recorded"));
    }

    #[test]
    fn test_descriptor_rejects_invalid_input() {
        let empty: [&str; 0] = [];
        assert!(matches!(
            StreamDescriptor::new("", ["workflows"]),
            Err(PublisherError::InvalidStream(_))
        ));
        assert!(matches!(
            StreamDescriptor::new("WORKFLOWS", empty),
            Err(PublisherError::InvalidStream(_))
        ));
        assert!(matches!(
            StreamDescriptor::new("WORKFLOWS", [""]),
            Err(PublisherError::InvalidStream(_))
        ));
        assert!(matches!(
            StreamDescriptor::new("WORK.FLOWS", ["workflows"]),
            Err(PublisherError::InvalidStream(_))
        ));
    }

    #[test]
    fn test_descriptor_rejects_memory_storage() {
        let err = StreamDescriptor::with_storage("WORKFLOWS", ["workflows"], StorageClass::Memory)
            .unwrap_err();
        assert!(err.to_string().contains("file storage"));
    }
}
