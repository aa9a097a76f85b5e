//! Attachment hand-off descriptor.
//!
//! Storage collaborators receive the descriptor with the transfer encoding
//! already undone and decide what to do with the bytes.

/// Extension used when the content type carries no `name=` parameter.
pub const FALLBACK_EXTENSION: &str = "txt";

/// A non-text leaf part of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentPart {
    /// Lowercased `type/subtype`.
    mime_type: String,
    /// The `name=` parameter of the content type.
    name: Option<String>,
    /// Decoded content.
    contents: Vec<u8>,
}

impl AttachmentPart {
    pub fn new(mime_type: String, name: Option<String>, contents: Vec<u8>) -> Self {
        let name = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        Self {
            mime_type,
            name,
            contents,
        }
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    /// Suffix for the stored file: the declared name if any, otherwise `txt`.
    pub fn extension(&self) -> &str {
        self.name.as_deref().unwrap_or(FALLBACK_EXTENSION)
    }
}
