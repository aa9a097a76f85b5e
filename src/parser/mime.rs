//! MIME structure: walking the part tree of a message and collecting the
//! parts handed off as attachments.

use mail_parser::{MessagePart, MimeHeaders, PartType};
use tracing::debug;

use crate::model::attachment::AttachmentPart;
use crate::parser::message::RawMessage;

/// Collect every non-text leaf part of a message for hand-off to storage.
///
/// Multipart bodies nested deeper than `max_depth` are not descended into.
/// A body `mail-parser` cannot read at all yields no parts.
pub fn attachment_parts(message: &RawMessage, max_depth: usize) -> Vec<AttachmentPart> {
    let parser = mail_parser::MessageParser::default();
    let Some(parsed) = parser.parse(message.source()) else {
        debug!("MIME structure unreadable, no attachments listed");
        return Vec::new();
    };

    let mut result = Vec::new();
    collect_attachments(&parsed, 0, 0, max_depth, &mut result);
    result
}

fn collect_attachments(
    msg: &mail_parser::Message<'_>,
    part_id: usize,
    depth: usize,
    max_depth: usize,
    out: &mut Vec<AttachmentPart>,
) {
    let Some(part) = msg.part(part_id) else {
        return;
    };

    if let PartType::Multipart(children) = &part.body {
        if depth >= max_depth {
            debug!(depth, "Maximum multipart depth reached, parts skipped");
            return;
        }
        for &child in children {
            collect_attachments(msg, child, depth + 1, max_depth, out);
        }
        return;
    }

    // A part without a Content-Type is text/plain (RFC 2045 §5.2)
    let Some(content_type) = part.content_type() else {
        return;
    };
    if content_type.ctype().eq_ignore_ascii_case("text") {
        return;
    }
    out.push(describe_part(part, content_type));
}

fn describe_part(part: &MessagePart<'_>, content_type: &mail_parser::ContentType<'_>) -> AttachmentPart {
    let main = content_type.ctype().to_ascii_lowercase();
    let mime_type = match content_type.subtype() {
        Some(sub) => format!("{main}/{}", sub.to_ascii_lowercase()),
        None => main,
    };
    let name = content_type.attribute("name").map(String::from);
    AttachmentPart::new(mime_type, name, part.contents().to_vec())
}
