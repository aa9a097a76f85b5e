//! Store attachment parts of messages.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{EmlError, Result};
use crate::model::attachment::AttachmentPart;
use crate::parser::message::RawMessage;
use crate::parser::mime::attachment_parts;

/// Receives the non-text parts of a message and returns where each one went.
pub trait AttachmentSink {
    /// Store one part.
    fn store(&mut self, part: &AttachmentPart) -> Result<PathBuf>;
}

/// Writes parts into a directory as `<counter>.<extension>`.
///
/// The counter starts at 1. Existing files are never overwritten.
#[derive(Debug)]
pub struct DirectorySink {
    dir: PathBuf,
    next_id: usize,
}

impl DirectorySink {
    /// Use `dir`. It is created on the first store.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            next_id: 1,
        }
    }

    /// A sink in a subfolder of `root` named after the message record.
    pub fn for_record(root: &Path, record_name: &str) -> Self {
        Self::new(root.join(sanitize_filename_part(record_name, 100)))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl AttachmentSink for DirectorySink {
    fn store(&mut self, part: &AttachmentPart) -> Result<PathBuf> {
        let contents = part.contents();
        std::fs::create_dir_all(&self.dir).map_err(|e| EmlError::io(&self.dir, e))?;
        let extension = sanitize_filename_part(part.extension(), 150);
        let path = unique_path(&self.dir.join(format!("{}.{extension}", self.next_id)));
        self.next_id += 1;

        std::fs::write(&path, contents).map_err(|e| EmlError::io(&path, e))?;
        debug!(
            path = %path.display(),
            mime_type = part.mime_type(),
            bytes = contents.len(),
            "Stored attachment"
        );
        Ok(path)
    }
}

/// Hand every non-text part of `message` to `sink`, descending at most
/// `max_depth` multipart levels.
pub fn export_attachments(
    message: &RawMessage,
    max_depth: usize,
    sink: &mut dyn AttachmentSink,
) -> Result<Vec<PathBuf>> {
    attachment_parts(message, max_depth)
        .iter()
        .map(|part| sink.store(part))
        .collect()
}

/// Replace characters that are unsafe in file names with `_`.
pub fn sanitize_filename_part(s: &str, max_len: usize) -> String {
    let sanitized: String = s
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '.' || c == '_' || c == '@' || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .take(max_len)
        .collect();

    if sanitized.trim().is_empty() {
        "unknown".to_string()
    } else {
        sanitized
    }
}

/// If `path` already exists, append a counter to make it unique.
fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let parent = path.parent().unwrap_or(Path::new("."));

    let mut i = 1;
    loop {
        let candidate = if ext.is_empty() {
            parent.join(format!("{stem}_{i}"))
        } else {
            parent.join(format!("{stem}_{i}.{ext}"))
        };
        if !candidate.exists() {
            return candidate;
        }
        i += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::message::{parse_message, MAX_DEPTH};

    const MESSAGE: &[u8] = b"Content-Type: multipart/mixed; boundary=sep\r\n\
\r\n\
--sep\r\n\
Content-Type: text/plain\r\n\
\r\n\
See attached.\r\n\
--sep\r\n\
Content-Type: application/pdf; name=\"minutes.pdf\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
JVBERi0xLjQ=\r\n\
--sep\r\n\
Content-Type: application/octet-stream\r\n\
\r\n\
raw\r\n\
--sep--\r\n";

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename_part("hello/world", 20), "hello_world");
        assert_eq!(sanitize_filename_part("report.pdf", 30), "report.pdf");
        assert_eq!(sanitize_filename_part("", 10), "unknown");
        assert_eq!(sanitize_filename_part("abcdef", 3), "abc");
    }

    #[test]
    fn test_export_attachments_numbers_files() {
        let dir = tempfile::tempdir().unwrap();
        let msg = parse_message(MESSAGE).unwrap();
        let mut sink = DirectorySink::new(dir.path());

        let paths = export_attachments(&msg, MAX_DEPTH, &mut sink).unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0], dir.path().join("1.minutes.pdf"));
        assert_eq!(paths[1], dir.path().join("2.txt"));
        assert_eq!(std::fs::read(&paths[0]).unwrap(), b"%PDF-1.4");
        assert_eq!(std::fs::read(&paths[1]).unwrap(), b"raw");
    }

    #[test]
    fn test_existing_file_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("1.minutes.pdf"), b"keep").unwrap();

        let msg = parse_message(MESSAGE).unwrap();
        let mut sink = DirectorySink::new(dir.path());
        let paths = export_attachments(&msg, MAX_DEPTH, &mut sink).unwrap();

        assert_eq!(std::fs::read(dir.path().join("1.minutes.pdf")).unwrap(), b"keep");
        assert_ne!(paths[0], dir.path().join("1.minutes.pdf"));
        assert!(paths[0].exists());
    }

    #[test]
    fn test_for_record_subfolder_created_on_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::for_record(dir.path(), "Budget: Q1");
        assert_eq!(sink.dir(), dir.path().join("Budget_ Q1"));
        assert!(!sink.dir().exists());

        let msg = parse_message(MESSAGE).unwrap();
        export_attachments(&msg, MAX_DEPTH, &mut sink).unwrap();
        assert!(sink.dir().join("2.txt").is_file());
    }
}
