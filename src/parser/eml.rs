//! Reader for individual `.eml` files (RFC 5322 messages without MBOX framing).

use tracing::debug;

use crate::error::{EmlError, Result};
use crate::model::record::MessageSource;
use crate::parser::message::{MessageParser, RawMessage};

/// Read a `.eml` file and parse it into a [`RawMessage`].
///
/// An unreadable file is reported as [`EmlError::Unreadable`]; a file that is
/// not a structured message as [`EmlError::Parse`].
pub fn read_eml(source: &MessageSource, parser: &MessageParser) -> Result<RawMessage> {
    let path = source.path();
    let data = std::fs::read(path).map_err(|e| EmlError::Unreadable {
        path: path.to_path_buf(),
        source: e,
    })?;
    debug!(path = %path.display(), bytes = data.len(), "Read EML file");

    parser.parse(&data).map_err(|error| EmlError::Parse {
        path: path.to_path_buf(),
        error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_read_eml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("message.eml");
        std::fs::write(&path, "From: a@b.com\r\nSubject: Hi\r\n\r\nBody\r\n").unwrap();

        let source = MessageSource::new(&path).unwrap();
        let msg = read_eml(&source, &MessageParser::default()).unwrap();
        assert_eq!(msg.header_count(), 2);
        assert_eq!(msg.line_count(), 1);
    }

    #[test]
    fn test_missing_file_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let source = MessageSource::new(dir.path().join("gone.eml")).unwrap();
        let err = read_eml(&source, &MessageParser::default()).unwrap_err();
        assert!(matches!(err, EmlError::Unreadable { .. }));
        assert_eq!(err.kind(), ErrorKind::ExtractionFailed);
    }

    #[test]
    fn test_file_without_headers_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.eml");
        std::fs::write(&path, "just text\n").unwrap();

        let source = MessageSource::new(&path).unwrap();
        let err = read_eml(&source, &MessageParser::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceRejected);
    }
}
