//! Centralized error types for emlinfo.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to interpret raw bytes as a structured message at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The source contained no bytes (or only whitespace).
    #[error("message source is empty")]
    Empty,

    /// The first line is not a `Name: value` header field.
    #[error("no header block found (first line: '{0}')")]
    NoHeaderBlock(String),

    /// The source exceeds the configured size limit.
    #[error("message is {size} bytes, larger than the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },
}

/// How the batch driver should react to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ErrorKind {
    /// The input is not a structured message; skip it.
    SourceRejected,
    /// A required field is missing or could not be recovered; skip the message.
    ExtractionFailed,
    /// Output or storage I/O failed; stop the run.
    SystemFailure,
}

/// All errors produced by the emlinfo library.
#[derive(Error, Debug)]
pub enum EmlError {
    /// The source name does not follow the EML convention.
    #[error("Ignoring '{path}': {reason}")]
    SourceRejected { path: PathBuf, reason: String },

    /// The source could not be parsed into headers and body.
    #[error("Failed in parsing EML file '{path}': {error}")]
    Parse { path: PathBuf, error: ParseError },

    /// A field required for the metadata record could not be extracted.
    #[error("Failed in extracting information from '{origin}': {field}: {reason}")]
    ExtractionFailed {
        origin: String,
        field: String,
        reason: String,
    },

    /// The message source could not be read.
    #[error("Could not read EML file '{path}': {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    /// I/O error on the output document or attachment storage.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias for `Result<T, EmlError>`.
pub type Result<T> = std::result::Result<T, EmlError>;

impl EmlError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an `ExtractionFailed` variant.
    pub fn extraction(
        origin: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::ExtractionFailed {
            origin: origin.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Classify this error.
    ///
    /// An unreadable message source is a per-message problem, so it is
    /// reported as `ExtractionFailed` rather than terminating the batch.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SourceRejected { .. } | Self::Parse { .. } => ErrorKind::SourceRejected,
            Self::ExtractionFailed { .. } | Self::Unreadable { .. } => ErrorKind::ExtractionFailed,
            Self::Io { .. } => ErrorKind::SystemFailure,
        }
    }

    /// `true` if the run must stop.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::SystemFailure
    }
}
