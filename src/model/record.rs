//! Extracted metadata for one message, and the source it came from.

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset};

use crate::error::{EmlError, Result};

/// File extension accepted as a message source.
pub const EML_EXTENSION: &str = ".eml";

/// Metadata extracted from one message, or a placeholder for a message that
/// is only known through another message's references.
///
/// A placeholder carries `message_id` and `record_name` and nothing else.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct EmailRecord {
    /// `Message-ID` (or `$MessageID`), as written in the header.
    pub message_id: Option<String>,

    /// Source file name, extension stripped.
    pub record_name: String,

    /// True for a node synthesized from a reference.
    pub is_placeholder: bool,

    /// Decoded subject.
    pub subject: Option<String>,

    /// Bare addresses per header slot. `None` marks a slot that could not
    /// be resolved to an address (`<>`).
    pub from: Vec<Option<String>>,
    pub to: Vec<Option<String>>,
    pub cc: Vec<Option<String>>,
    pub bcc: Vec<Option<String>>,

    pub sent_date: Option<DateTime<FixedOffset>>,

    /// Message-IDs from the `References` header, in order.
    pub references: Vec<String>,

    pub in_reply_to: Option<String>,

    /// Vendor conversation token (`Thread_Index` / `Thread-Index`).
    pub thread_index: Option<String>,

    /// Number of header occurrences, duplicates included.
    pub header_count: usize,

    /// Number of body lines.
    pub line_count: usize,
}

impl EmailRecord {
    /// A record with only a name, to be filled in by extraction.
    pub fn new(record_name: impl Into<String>) -> Self {
        Self {
            message_id: None,
            record_name: record_name.into(),
            is_placeholder: false,
            subject: None,
            from: Vec::new(),
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            sent_date: None,
            references: Vec::new(),
            in_reply_to: None,
            thread_index: None,
            header_count: 0,
            line_count: 0,
        }
    }

    /// A graph-only record for a message seen as a reference. It carries
    /// the record name of the message that referenced it.
    pub fn placeholder(message_id: impl Into<String>, record_name: impl Into<String>) -> Self {
        let mut record = Self::new(record_name);
        record.message_id = Some(message_id.into());
        record.is_placeholder = true;
        record
    }
}

/// A message source on disk: its path and the record name derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSource {
    path: PathBuf,
    record_name: String,
}

impl MessageSource {
    /// Accept a path whose final segment ends in `.eml` (any case).
    ///
    /// The record name is that segment without the extension, trimmed.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let has_extension = file_name.len() >= EML_EXTENSION.len()
            && file_name
                .get(file_name.len() - EML_EXTENSION.len()..)
                .is_some_and(|ext| ext.eq_ignore_ascii_case(EML_EXTENSION));
        if !has_extension {
            return Err(EmlError::SourceRejected {
                path,
                reason: "not an .eml file".to_string(),
            });
        }

        let record_name = file_name[..file_name.len() - EML_EXTENSION.len()]
            .trim()
            .to_string();
        Ok(Self { path, record_name })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record_name(&self) -> &str {
        &self.record_name
    }

    /// Path as shown in logs and output.
    pub fn display_path(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_record_name_strips_extension_and_trims() {
        let source = MessageSource::new("/data/inbox/ Quarterly report .EML").unwrap();
        assert_eq!(source.record_name(), "Quarterly report");
        assert_eq!(source.path(), Path::new("/data/inbox/ Quarterly report .EML"));
    }

    #[test]
    fn test_wrong_extension_is_rejected() {
        let err = MessageSource::new("notes.txt").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceRejected);
        assert!(MessageSource::new("eml").is_err());
        assert!(MessageSource::new("archive.eml.gz").is_err());
    }

    #[test]
    fn test_placeholder_carries_only_identity() {
        let record = EmailRecord::placeholder("<abc@example.com>", "reply");
        assert!(record.is_placeholder);
        assert_eq!(record.record_name, "reply");
        assert_eq!(record.message_id.as_deref(), Some("<abc@example.com>"));
        assert!(record.subject.is_none());
        assert!(record.from.is_empty());
        assert!(record.sent_date.is_none());
    }
}
