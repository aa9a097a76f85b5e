//! Raw message parsing: header block and folding-preserving header values.
//!
//! The parser does only what metadata extraction needs. The body is kept as
//! bytes; its MIME structure is read on demand in [`super::mime`].

use tracing::debug;

use crate::error::ParseError;
use crate::parser::header::{decode_header_bytes, unfold};

/// Default maximum multipart nesting depth that is descended into.
pub const MAX_DEPTH: usize = 10;

/// Default maximum message size in bytes (256 MB).
pub const MAX_MESSAGE_SIZE: usize = 256 * 1024 * 1024;

/// A single header occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawHeader {
    name: String,
    raw_value: String,
}

impl RawHeader {
    /// Build a header from a name and a raw (possibly folded) value.
    pub fn new(name: impl Into<String>, raw_value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            raw_value: raw_value.into(),
        }
    }

    /// Header name as it appears in the source.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Case-insensitive name comparison.
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// The value with its original folding. Every fold is `\r\n` followed by
    /// the continuation line's leading whitespace, whatever line ending the
    /// source used.
    pub fn raw_value(&self) -> &str {
        &self.raw_value
    }

    /// The unfolded value, trimmed.
    pub fn value(&self) -> String {
        unfold(&self.raw_value).trim().to_string()
    }
}

/// Headers of a message plus the bytes it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    headers: Vec<RawHeader>,
    source: Vec<u8>,
    body_start: usize,
}

impl RawMessage {
    /// All header occurrences in source order.
    pub fn headers(&self) -> &[RawHeader] {
        &self.headers
    }

    /// Number of header occurrences (duplicates counted individually).
    pub fn header_count(&self) -> usize {
        self.headers.len()
    }

    /// Every occurrence of a header, case-insensitively, in source order.
    pub fn headers_named<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a RawHeader> + 'a {
        self.headers.iter().filter(move |h| h.is(name))
    }

    /// The first occurrence of a header.
    pub fn first_header(&self, name: &str) -> Option<&RawHeader> {
        self.headers.iter().find(|h| h.is(name))
    }

    /// The whole message, without a leading BOM or `From ` separator.
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Everything after the blank line that ends the header block.
    pub fn body(&self) -> &[u8] {
        &self.source[self.body_start..]
    }

    /// Number of lines in the body as it appeared in the source.
    pub fn line_count(&self) -> usize {
        count_lines(self.body())
    }
}

/// Parser turning message bytes into a [`RawMessage`].
#[derive(Debug, Clone)]
pub struct MessageParser {
    max_depth: usize,
    max_message_size: usize,
}

impl Default for MessageParser {
    fn default() -> Self {
        Self {
            max_depth: MAX_DEPTH,
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }
}

impl MessageParser {
    /// Create a parser with explicit limits.
    pub fn new(max_depth: usize, max_message_size: usize) -> Self {
        Self {
            max_depth,
            max_message_size,
        }
    }

    /// How deep multipart bodies are descended into when looking for parts.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Parse a complete message.
    ///
    /// Fails when the source is empty, too large, or does not start with a
    /// header field.
    pub fn parse(&self, data: &[u8]) -> Result<RawMessage, ParseError> {
        if data.len() > self.max_message_size {
            return Err(ParseError::TooLarge {
                size: data.len(),
                limit: self.max_message_size,
            });
        }

        let data = skip_from_line(strip_bom(data));
        let first_line = data
            .split(|&b| b == b'\n')
            .find(|line| !is_blank_line(line));
        let Some(first_line) = first_line else {
            return Err(ParseError::Empty);
        };

        let leading_blank = data.len() - trim_leading_blank_lines(data).len();
        if leading_blank > 0 || header_name(first_line).is_none() {
            let shown: String = decode_header_bytes(first_line)
                .trim_end()
                .chars()
                .take(60)
                .collect();
            return Err(ParseError::NoHeaderBlock(shown));
        }

        let (headers, body_start) = split_headers(data);
        Ok(RawMessage {
            headers,
            source: data.to_vec(),
            body_start,
        })
    }
}

/// Parse a message with default limits.
pub fn parse_message(data: &[u8]) -> Result<RawMessage, ParseError> {
    MessageParser::default().parse(data)
}

/// Collect the header fields. Returns them with the offset of the body.
fn split_headers(data: &[u8]) -> (Vec<RawHeader>, usize) {
    let mut headers: Vec<RawHeader> = Vec::new();
    let mut pos = 0;

    let body_start = loop {
        if pos >= data.len() {
            break data.len();
        }
        let line_end = data[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(data.len(), |p| pos + p + 1);
        let line = trim_line_ending(&data[pos..line_end]);

        if line.is_empty() {
            break line_end;
        }

        if line[0] == b' ' || line[0] == b'\t' {
            // Continuation line
            if let Some(last) = headers.last_mut() {
                last.raw_value.push_str("\r\n");
                last.raw_value.push_str(&decode_header_bytes(line));
            }
        } else if let Some(name_len) = header_name(line) {
            let name = decode_header_bytes(&line[..name_len]).trim_end().to_string();
            let value = decode_header_bytes(&line[name_len + 1..]);
            headers.push(RawHeader::new(name, value.trim_start()));
        } else {
            debug!(
                line = %decode_header_bytes(line),
                "Skipping header line without a field name"
            );
        }

        pos = line_end;
    };

    // An empty first line followed by a fold must not leave a leading break
    for header in &mut headers {
        let trimmed = header.raw_value.trim_start();
        if trimmed.len() != header.raw_value.len() {
            header.raw_value = trimmed.to_string();
        }
    }

    (headers, body_start)
}

/// Length of the field name if `line` starts with `Name:`.
fn header_name(line: &[u8]) -> Option<usize> {
    let colon = line.iter().position(|&b| b == b':')?;
    let name = &line[..colon];
    // Trailing whitespace before the colon is tolerated (obsolete syntax)
    let trimmed_len = name
        .iter()
        .rposition(|&b| b != b' ' && b != b'\t')
        .map_or(0, |p| p + 1);
    if trimmed_len == 0 {
        return None;
    }
    if name[..trimmed_len]
        .iter()
        .all(|&b| (33..=126).contains(&b))
    {
        Some(colon)
    } else {
        None
    }
}

/// Strip a UTF-8 BOM.
fn strip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data)
}

/// Skip a leading MBOX `From ` separator line.
fn skip_from_line(data: &[u8]) -> &[u8] {
    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}

fn trim_leading_blank_lines(data: &[u8]) -> &[u8] {
    let mut rest = data;
    while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
        if is_blank_line(&rest[..pos]) {
            rest = &rest[pos + 1..];
        } else {
            break;
        }
    }
    rest
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Check whether a line is blank (empty or only whitespace / CR / LF).
fn is_blank_line(line: &[u8]) -> bool {
    line.iter()
        .all(|&b| b == b'\n' || b == b'\r' || b == b' ' || b == b'\t')
}

/// Count lines; a final line without a terminator still counts.
fn count_lines(body: &[u8]) -> usize {
    if body.is_empty() {
        return 0;
    }
    let newlines = body.iter().filter(|&&b| b == b'\n').count();
    if body.ends_with(b"\n") {
        newlines
    } else {
        newlines + 1
    }
}
