//! Header extraction: turns a parsed message into an [`EmailRecord`].

pub mod date;
pub mod recipients;

use tracing::debug;

use crate::error::{EmlError, Result};
use crate::model::record::{EmailRecord, MessageSource};
use crate::parser::header::decode_encoded_words;
use crate::parser::message::RawMessage;

/// Header names tried in order for the message identifier.
const MESSAGE_ID_HEADERS: &[&str] = &["Message-ID", "$MessageID"];

/// Header names tried in order for the parent identifier.
const IN_REPLY_TO_HEADERS: &[&str] = &["In-Reply-To", "In_Reply_To"];

/// Header names tried in order for the vendor conversation token.
const THREAD_INDEX_HEADERS: &[&str] = &["Thread_Index", "Thread-Index"];

/// Extract the metadata record of a message.
///
/// Fails with [`EmlError::ExtractionFailed`] when the `Date` header is missing
/// or unparseable, or when an address header cannot be parsed even after
/// fold repair.
pub fn extract_record(message: &RawMessage, source: &MessageSource) -> Result<EmailRecord> {
    let origin = source.display_path();
    let mut record = EmailRecord::new(source.record_name());

    record.subject = message
        .first_header("Subject")
        .map(|h| decode_encoded_words(&h.value()));

    let date = message
        .first_header("Date")
        .ok_or_else(|| EmlError::extraction(&origin, "Date", "Email didn't have a Date header"))?
        .value();
    let sent_date = date::parse_date(&date)
        .map_err(|e| EmlError::extraction(&origin, "Date", format!("{e}: '{date}'")))?;
    record.sent_date = Some(sent_date);

    record.from = recipients::parse_addresses(message, "From")
        .map_err(|e| EmlError::extraction(&origin, "From", e.to_string()))?;
    for (name, slot) in [
        ("To", &mut record.to),
        ("Cc", &mut record.cc),
        ("Bcc", &mut record.bcc),
    ] {
        *slot = recipients::parse_recipients(message, name)
            .map_err(|e| EmlError::extraction(&origin, name, e.to_string()))?;
    }

    record.message_id = first_value(message, MESSAGE_ID_HEADERS);
    record.in_reply_to = first_value(message, IN_REPLY_TO_HEADERS);
    record.thread_index = first_value(message, THREAD_INDEX_HEADERS);

    record.references = message
        .headers_named("References")
        .flat_map(|h| {
            h.value()
                .split_whitespace()
                .map(decode_encoded_words)
                .collect::<Vec<_>>()
        })
        .collect();

    record.header_count = message.header_count();
    record.line_count = message.line_count();

    debug!(
        path = %origin,
        message_id = record.message_id.as_deref().unwrap_or("-"),
        headers = record.header_count,
        "Extracted record"
    );
    Ok(record)
}

/// First non-empty value among the named headers, decoded.
fn first_value(message: &RawMessage, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        message
            .headers_named(name)
            .map(|h| h.value())
            .find(|v| !v.is_empty())
            .map(|v| decode_encoded_words(&v))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::parser::message::parse_message;

    fn source() -> MessageSource {
        MessageSource::new("/archive/Budget meeting.eml").unwrap()
    }

    fn extract(data: &str) -> Result<EmailRecord> {
        let msg = parse_message(data.as_bytes()).unwrap();
        extract_record(&msg, &source())
    }

    const FULL: &str = "From: \"Ann Example\" <ann@example.com>\r\n\
To: bob@example.com, =?UTF-8?Q?Carl?= <carl@example.com>\r\n\
Cc: <>, dora@example.com\r\n\
Subject: =?UTF-8?B?UmU6IEJ1ZGdldA==?=\r\n\
Date: Tue, 1 Jan 2019 10:00:00 +1000 (AEST)\r\n\
Message-ID: <m2@example.com>\r\n\
In-Reply-To: <m1@example.com>\r\n\
References: <m0@example.com>\r\n <m1@example.com>\r\n\
Thread-Index: AdQ1Bx==\r\n\
\r\n\
Line one\r\n\
Line two\r\n";

    #[test]
    fn test_extract_full_record() {
        let record = extract(FULL).unwrap();
        assert_eq!(record.record_name, "Budget meeting");
        assert!(!record.is_placeholder);
        assert_eq!(record.subject.as_deref(), Some("Re: Budget"));
        assert_eq!(record.from, vec![Some("ann@example.com".to_string())]);
        assert_eq!(
            record.to,
            vec![
                Some("bob@example.com".to_string()),
                Some("carl@example.com".to_string())
            ]
        );
        assert_eq!(record.cc, vec![None, Some("dora@example.com".to_string())]);
        assert!(record.bcc.is_empty());
        assert_eq!(record.message_id.as_deref(), Some("<m2@example.com>"));
        assert_eq!(record.in_reply_to.as_deref(), Some("<m1@example.com>"));
        assert_eq!(record.references, vec!["<m0@example.com>", "<m1@example.com>"]);
        assert_eq!(record.thread_index.as_deref(), Some("AdQ1Bx=="));
        assert_eq!(record.header_count, 9);
        assert_eq!(record.line_count, 2);
    }

    #[test]
    fn test_date_comment_matches_plain_date() {
        let with = extract(FULL).unwrap();
        let without = extract(&FULL.replace(" (AEST)", "")).unwrap();
        assert_eq!(with.sent_date, without.sent_date);
        assert_eq!(
            with.sent_date.unwrap().to_rfc3339(),
            "2019-01-01T10:00:00+10:00"
        );
    }

    #[test]
    fn test_missing_date_fails() {
        let err = extract("Subject: no date\r\n\r\nbody\r\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExtractionFailed);
        let msg = err.to_string();
        assert!(msg.contains("Date"));
        assert!(msg.contains("Budget meeting.eml"));
    }

    #[test]
    fn test_unparseable_date_names_value() {
        let err = extract("Date: sometime soon\r\n\r\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExtractionFailed);
        assert!(err.to_string().contains("sometime soon"));
    }

    #[test]
    fn test_message_id_fallback() {
        let record =
            extract("Date: Mon, 1 Jan 2024 00:00:00 +0000\n$MessageID: <legacy@notes>\n\n").unwrap();
        assert_eq!(record.message_id.as_deref(), Some("<legacy@notes>"));
    }

    #[test]
    fn test_thread_index_spelling_order() {
        let record = extract(
            "Date: Mon, 1 Jan 2024 00:00:00 +0000\nThread-Index: native\nThread_Index: normalized\n\n",
        )
        .unwrap();
        assert_eq!(record.thread_index.as_deref(), Some("normalized"));

        let record = extract(
            "Date: Mon, 1 Jan 2024 00:00:00 +0000\nThread_Index:\nThread-Index: native\n\n",
        )
        .unwrap();
        assert_eq!(record.thread_index.as_deref(), Some("native"));
    }

    #[test]
    fn test_in_reply_to_underscore_spelling() {
        let record = extract(
            "Date: Mon, 1 Jan 2024 00:00:00 +0000\nIn_Reply_To: <parent@notes>\n\n",
        )
        .unwrap();
        assert_eq!(record.in_reply_to.as_deref(), Some("<parent@notes>"));

        let record = extract(
            "Date: Mon, 1 Jan 2024 00:00:00 +0000\nIn_Reply_To: <b@x>\nIn-Reply-To: <a@x>\n\n",
        )
        .unwrap();
        assert_eq!(record.in_reply_to.as_deref(), Some("<a@x>"));
    }

    #[test]
    fn test_absent_optional_headers() {
        let record = extract("Date: Mon, 1 Jan 2024 00:00:00 +0000\n\n").unwrap();
        assert!(record.subject.is_none());
        assert!(record.message_id.is_none());
        assert!(record.references.is_empty());
        assert!(record.from.is_empty());
        assert_eq!(record.header_count, 1);
    }

    #[test]
    fn test_unrecoverable_recipients_fail() {
        let err = extract("Date: Mon, 1 Jan 2024 00:00:00 +0000\nTo: Bob <bob@example.com\n\n")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExtractionFailed);
        assert!(err.to_string().contains("To"));
    }

    #[test]
    fn test_unknown_charset_subject_kept_literal() {
        let record =
            extract("Date: Mon, 1 Jan 2024 00:00:00 +0000\nSubject: =?x-unknown?Q?hi?=\n\n").unwrap();
        assert_eq!(record.subject.as_deref(), Some("=?x-unknown?Q?hi?="));
    }
}
