//! Markup output: one `<e>` element per record inside an `<Emails>` root.
//!
//! Element names are the short ones consumed by the downstream archival
//! tooling: `<f>` path and sender, `<s>` subject, `<dt>` date, `<t>`/`<c>`/`<b>`
//! recipients, `<i>` message id, `<rs>` reference, `<irt>` in-reply-to and
//! `<ti>` thread index.

use std::borrow::Cow;
use std::io::{self, Write};

use chrono::SecondsFormat;
use tracing::debug;

use crate::model::record::EmailRecord;
use crate::parser::message::RawHeader;

/// Declaration written at the top of every document.
pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="no" ?>"#;

/// Turn an arbitrary header name into a valid element name.
///
/// Letters are kept, digits are kept (a digit that would start the name gets
/// an `X` prefix), `$` becomes `Dollar`, and everything else is dropped.
pub fn sanitize_element_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_alphabetic() {
            result.push(c);
        } else if c.is_numeric() {
            if result.is_empty() {
                result.push('X');
            }
            result.push(c);
        } else if c == '$' {
            result.push_str("Dollar");
        }
    }
    result
}

/// Replace `& < > " '` with their predefined entities.
pub fn escape_text(s: &str) -> Cow<'_, str> {
    if !s.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(s);
    }
    let mut result = String::with_capacity(s.len() + 16);
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&apos;"),
            _ => result.push(c),
        }
    }
    Cow::Owned(result)
}

/// Streaming writer for an `<Emails>` document.
pub struct EmailsWriter<W: Write> {
    out: W,
    written: usize,
}

impl<W: Write> EmailsWriter<W> {
    /// Write the declaration and open the root element.
    pub fn new(mut out: W) -> io::Result<Self> {
        writeln!(out, "{XML_DECLARATION}")?;
        writeln!(out, "<Emails>")?;
        Ok(Self { out, written: 0 })
    }

    /// Number of `<e>` elements written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Write one record, optionally followed by every header of the message
    /// in an `<emailHeaders>` block.
    ///
    /// Absent optional fields are omitted. A null address slot is written as
    /// an empty element so that positions are kept.
    pub fn write_entry(
        &mut self,
        record: &EmailRecord,
        path: &str,
        headers: Option<&[RawHeader]>,
    ) -> io::Result<()> {
        writeln!(self.out, "<e>")?;
        self.element("f", Some(path))?;
        self.element("s", record.subject.as_deref())?;
        let date = record
            .sent_date
            .map(|d| d.to_rfc3339_opts(SecondsFormat::Secs, true));
        self.element("dt", date.as_deref())?;

        for (tag, slots) in [
            ("f", &record.from),
            ("t", &record.to),
            ("c", &record.cc),
            ("b", &record.bcc),
        ] {
            for slot in slots {
                self.element(tag, Some(slot.as_deref().unwrap_or("")))?;
            }
        }

        self.element("i", record.message_id.as_deref())?;
        for reference in &record.references {
            self.element("rs", Some(reference))?;
        }
        self.element("irt", record.in_reply_to.as_deref())?;
        self.element("ti", record.thread_index.as_deref())?;

        if let Some(headers) = headers {
            self.write_headers(headers)?;
        }

        writeln!(self.out, "</e>")?;
        self.written += 1;
        Ok(())
    }

    /// Close the root element and flush. Returns the inner writer.
    pub fn finish(mut self) -> io::Result<W> {
        writeln!(self.out, "</Emails>")?;
        self.out.flush()?;
        Ok(self.out)
    }

    fn element(&mut self, tag: &str, value: Option<&str>) -> io::Result<()> {
        match value {
            Some(value) => writeln!(self.out, " <{tag}>{}</{tag}>", escape_text(value)),
            None => Ok(()),
        }
    }

    fn write_headers(&mut self, headers: &[RawHeader]) -> io::Result<()> {
        writeln!(self.out, " <emailHeaders>")?;
        for header in headers {
            let name = sanitize_element_name(header.name());
            if name.is_empty() {
                debug!(header = header.name(), "Header name has no usable characters, skipped");
                continue;
            }
            writeln!(
                self.out,
                "  <{name}>{}</{name}>",
                escape_text(&header.value())
            )?;
        }
        writeln!(self.out, " </emailHeaders>")
    }
}
