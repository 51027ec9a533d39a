//! Workflow record framing
//!
//! Turns a newline-delimited JSON workflow document into the identifier and
//! opaque payload handed to the publisher. The payload bytes are forwarded
//! unchanged; JSON is only parsed to find an identifier for diagnostics.

use bytes::Bytes;
use serde::Deserialize;
use uuid::Uuid;

/// A workflow record ready for publishing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowRecord {
    pub identifier: String,
    pub payload: Bytes,
}

#[derive(Deserialize)]
struct Envelope {
    metadata: Option<Metadata>,
}

#[derive(Deserialize)]
struct Metadata {
    uid: Option<String>,
    name: Option<String>,
}

impl WorkflowRecord {
    /// Frame one input line
    ///
    /// Returns None for blank lines. The identifier is `metadata.uid`, then
    /// `metadata.name`, then a fresh UUID v4 (also used for non-JSON input).
    pub fn from_line(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }

        let identifier = serde_json::from_str::<Envelope>(trimmed)
            .ok()
            .and_then(|envelope| envelope.metadata)
            .and_then(|metadata| {
                metadata
                    .uid
                    .filter(|uid| !uid.is_empty())
                    .or(metadata.name.filter(|name| !name.is_empty()))
            })
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Some(Self {
            identifier,
            payload: Bytes::copy_from_slice(trimmed.as_bytes()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_lines_are_skipped() {
        assert!(WorkflowRecord::from_line("").is_none());
        assert!(WorkflowRecord::from_line("   \t").is_none());
    }

    #[test]
    fn test_uid_is_preferred() {
        let line = r#"{"metadata":{"uid":"5f1c","name":"hello-world-x7k2"},"status":{"phase":"Succeeded"}}"#;
        let record = WorkflowRecord::from_line(line).unwrap();

        assert_eq!(record.identifier, "5f1c");
        assert_eq!(record.payload, Bytes::from(line));
    }

    #[test]
    fn test_name_used_without_uid() {
        let record = WorkflowRecord::from_line(r#"{"metadata":{"name":"hello-world-x7k2"}}"#).unwrap();
        assert_eq!(record.identifier, "hello-world-x7k2");
    }

    #[test]
    fn test_non_json_gets_generated_identifier() {
        let record = WorkflowRecord::from_line("not json").unwrap();

        assert!(Uuid::parse_str(&record.identifier).is_ok());
        assert_eq!(record.payload, Bytes::from_static(b"not json"));
    }
}
