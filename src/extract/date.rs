//! `Date` header normalization.

use chrono::{DateTime, FixedOffset, ParseError};

/// Parse an RFC 5322 date, ignoring a trailing parenthetical zone name.
///
/// Some exporters append a redundant zone comment after the numeric offset,
/// e.g. `Tue, 1 Jan 2019 10:00:00 +1000 (AEST)`. Everything from the last `(`
/// onward is dropped, together with the space before it.
pub fn parse_date(value: &str) -> Result<DateTime<FixedOffset>, ParseError> {
    DateTime::parse_from_rfc2822(strip_zone_comment(value))
}

fn strip_zone_comment(value: &str) -> &str {
    match value.rfind('(') {
        Some(pos) => value[..pos].trim(),
        None => value.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_standard_date() {
        let dt = parse_date("Mon, 15 Jan 2024 10:30:00 +0100").unwrap();
        assert_eq!(dt.year(), 2024);
        assert_eq!(dt.hour(), 10);
        assert_eq!(dt.offset().local_minus_utc(), 3600);
    }

    #[test]
    fn test_zone_comment_is_ignored() {
        let with = parse_date("Tue, 1 Jan 2019 10:00:00 +1000 (AEST)").unwrap();
        let without = parse_date("Tue, 1 Jan 2019 10:00:00 +1000").unwrap();
        assert_eq!(with, without);
        assert_eq!(with.offset(), without.offset());
    }

    #[test]
    fn test_round_trip_is_stable() {
        let first = parse_date("Wed, 20 Mar 2024 23:05:09 -0700 (PDT)").unwrap();
        let second = parse_date(&first.to_rfc2822()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.to_rfc2822(), second.to_rfc2822());
    }

    #[test]
    fn test_unparseable_date_fails() {
        assert!(parse_date("yesterday afternoon").is_err());
        assert!(parse_date("(GST)").is_err());
        assert!(parse_date("").is_err());
    }
}
