//! Email address list parsing (RFC 5322 §3.4), strict enough to notice
//! broken folding.

use thiserror::Error;

/// A parsed mailbox, reduced to its bare address.
///
/// `"Juan García <juan@ejemplo.com>"` and `"juan@ejemplo.com (Juan)"` both
/// give `address = "juan@ejemplo.com"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddress {
    /// The bare address (`user@domain`).
    pub address: String,
}

/// An address list that does not follow the mailbox grammar.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason} in '{text}'")]
pub struct AddressError {
    pub reason: String,
    pub text: String,
}

impl AddressError {
    fn new(reason: impl Into<String>, text: &str) -> Self {
        Self {
            reason: reason.into(),
            text: text.to_string(),
        }
    }
}

/// Characters allowed in an unquoted local part besides letters and digits.
const ATEXT_SPECIALS: &str = "!#$%&'*+-/=?^_`{|}~.";

impl EmailAddress {
    /// Parse a single mailbox.
    ///
    /// Supported formats:
    /// - `"user@domain.com"`
    /// - `"<user@domain.com>"`
    /// - `"Display Name <user@domain.com>"`
    /// - `"\"Display, Name\" <user@domain.com>"`
    ///
    /// `Ok(None)` is the null address `<>`: present in the header but with
    /// nothing to resolve.
    pub fn parse(raw: &str) -> Result<Option<Self>, AddressError> {
        let cleaned = strip_comments(raw)?;
        let trimmed = cleaned.trim();
        if trimmed.is_empty() {
            return Err(AddressError::new("Empty address", raw));
        }

        if let Some(angle_start) = find_unquoted(trimmed, '<') {
            let after = &trimmed[angle_start + 1..];
            let angle_end = after
                .find('>')
                .ok_or_else(|| AddressError::new("Missing '>'", raw))?;
            if !after[angle_end + 1..].trim().is_empty() {
                return Err(AddressError::new("Text after '>'", raw));
            }
            let inner = after[..angle_end].trim();
            if inner.contains('<') {
                return Err(AddressError::new("Nested '<'", raw));
            }
            if inner.is_empty() {
                return Ok(None);
            }
            let address = strip_route(inner);
            validate_addr_spec(address).map_err(|reason| AddressError::new(reason, raw))?;
            return Ok(Some(Self {
                address: address.to_string(),
            }));
        }

        if find_unquoted(trimmed, '>').is_some() {
            return Err(AddressError::new("Missing '<'", raw));
        }

        validate_addr_spec(trimmed).map_err(|reason| AddressError::new(reason, raw))?;
        Ok(Some(Self {
            address: trimmed.to_string(),
        }))
    }

    /// Parse a comma-separated address list.
    ///
    /// Handles quoted commas (`"Last, First" <a@b.com>, other@c.com`) and
    /// groups (`team: a@b.com, c@d.com;`). Empty list elements are skipped;
    /// null addresses keep their slot as `None`.
    pub fn parse_list(raw: &str) -> Result<Vec<Option<Self>>, AddressError> {
        let mut results = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        let mut escaped = false;
        let mut in_angle = false;
        let mut comment_depth = 0usize;
        let mut in_group = false;

        let flush = |current: &mut String, results: &mut Vec<Option<Self>>| {
            if !current.trim().is_empty() {
                results.push(Self::parse(current)?);
            }
            current.clear();
            Ok::<(), AddressError>(())
        };

        for ch in raw.chars() {
            if escaped {
                escaped = false;
                current.push(ch);
                continue;
            }
            match ch {
                '\\' if in_quotes || comment_depth > 0 => {
                    escaped = true;
                    current.push(ch);
                }
                '"' if comment_depth == 0 => {
                    in_quotes = !in_quotes;
                    current.push(ch);
                }
                '(' if !in_quotes => {
                    comment_depth += 1;
                    current.push(ch);
                }
                ')' if !in_quotes && comment_depth > 0 => {
                    comment_depth -= 1;
                    current.push(ch);
                }
                '<' if !in_quotes && comment_depth == 0 => {
                    if in_angle {
                        return Err(AddressError::new("Nested '<'", raw));
                    }
                    in_angle = true;
                    current.push(ch);
                }
                '>' if !in_quotes && comment_depth == 0 => {
                    in_angle = false;
                    current.push(ch);
                }
                ':' if !in_quotes && !in_angle && comment_depth == 0 && !in_group => {
                    // Group display name: discard it, keep the members
                    in_group = true;
                    current.clear();
                }
                ';' if !in_quotes && !in_angle && comment_depth == 0 && in_group => {
                    flush(&mut current, &mut results)?;
                    in_group = false;
                }
                ',' if !in_quotes && !in_angle && comment_depth == 0 => {
                    flush(&mut current, &mut results)?;
                }
                _ => current.push(ch),
            }
        }

        if in_quotes {
            return Err(AddressError::new("Missing '\"'", raw));
        }
        if comment_depth > 0 {
            return Err(AddressError::new("Missing ')'", raw));
        }
        if in_angle {
            return Err(AddressError::new("Missing '>'", raw));
        }

        // Last segment
        flush(&mut current, &mut results)?;

        Ok(results)
    }
}

/// Replace `(comments)` outside quoted strings with a space.
fn strip_comments(s: &str) -> Result<String, AddressError> {
    let mut result = String::with_capacity(s.len());
    let mut depth = 0usize;
    let mut in_quotes = false;
    let mut escaped = false;
    for ch in s.chars() {
        if escaped {
            escaped = false;
            if depth == 0 {
                result.push(ch);
            }
            continue;
        }
        match ch {
            '\\' if in_quotes || depth > 0 => {
                escaped = true;
                if depth == 0 {
                    result.push(ch);
                }
            }
            '"' if depth == 0 => {
                in_quotes = !in_quotes;
                result.push(ch);
            }
            '(' if !in_quotes => depth += 1,
            ')' if !in_quotes => {
                if depth == 0 {
                    return Err(AddressError::new("Missing '('", s));
                }
                depth -= 1;
                if depth == 0 {
                    result.push(' ');
                }
            }
            _ if depth > 0 => {}
            _ => result.push(ch),
        }
    }
    if depth > 0 {
        return Err(AddressError::new("Missing ')'", s));
    }
    Ok(result)
}

/// Byte position of `needle` outside double quotes.
fn find_unquoted(s: &str, needle: char) -> Option<usize> {
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, ch) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            c if c == needle && !in_quotes => return Some(i),
            _ => {}
        }
    }
    None
}

/// Drop an obsolete source route: `@relay.example:user@host` → `user@host`.
fn strip_route(addr: &str) -> &str {
    if addr.starts_with('@') {
        if let Some(colon) = addr.find(':') {
            return &addr[colon + 1..];
        }
    }
    addr
}

/// Check an `addr-spec`. A local part without a domain is accepted.
fn validate_addr_spec(addr: &str) -> Result<(), &'static str> {
    let (local, domain) = match rfind_unquoted_at(addr) {
        Some(at) => (&addr[..at], Some(&addr[at + 1..])),
        None => (addr, None),
    };

    if local.is_empty() {
        return Err("Missing local name");
    }
    if local.starts_with('"') {
        if local.len() < 2 || !local.ends_with('"') {
            return Err("Unterminated quoted local name");
        }
        if local.chars().any(|c| c.is_control()) {
            return Err("Local address contains control character");
        }
    } else {
        for c in local.chars() {
            if c.is_whitespace() || c.is_control() {
                return Err("Local address contains control or whitespace");
            }
            if !(c.is_alphanumeric() || ATEXT_SPECIALS.contains(c)) {
                return Err("Local address contains illegal character");
            }
        }
    }

    if let Some(domain) = domain {
        if domain.is_empty() {
            return Err("Missing domain");
        }
        if domain.starts_with('[') {
            if !domain.ends_with(']') || domain.chars().any(char::is_whitespace) {
                return Err("Invalid domain literal");
            }
            return Ok(());
        }
        for c in domain.chars() {
            if c.is_whitespace() || c.is_control() {
                return Err("Domain contains control or whitespace");
            }
            if !(c.is_alphanumeric() || c == '-' || c == '.' || c == '_') {
                return Err("Domain contains illegal character");
            }
        }
    }
    Ok(())
}

fn rfind_unquoted_at(addr: &str) -> Option<usize> {
    let mut last = None;
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, ch) in addr.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            '@' if !in_quotes => last = Some(i),
            _ => {}
        }
    }
    last
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addresses(list: &[Option<EmailAddress>]) -> Vec<Option<&str>> {
        list.iter()
            .map(|a| a.as_ref().map(|a| a.address.as_str()))
            .collect()
    }

    #[test]
    fn test_parse_bare_address() {
        let addr = EmailAddress::parse("user@example.com").unwrap().unwrap();
        assert_eq!(addr.address, "user@example.com");
    }

    #[test]
    fn test_parse_angle_address() {
        let addr = EmailAddress::parse("<user@example.com>").unwrap().unwrap();
        assert_eq!(addr.address, "user@example.com");
    }

    #[test]
    fn test_parse_name_and_address() {
        let addr = EmailAddress::parse("User One <user1@example.com>")
            .unwrap()
            .unwrap();
        assert_eq!(addr.address, "user1@example.com");
    }

    #[test]
    fn test_parse_quoted_name() {
        let addr = EmailAddress::parse("\"Last, First\" <user@example.com>")
            .unwrap()
            .unwrap();
        assert_eq!(addr.address, "user@example.com");
    }

    #[test]
    fn test_parse_encoded_display_name() {
        let addr = EmailAddress::parse("=?UTF-8?B?Sm9zw6k=?= <jose@example.com>")
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_comment_is_discarded() {
        let addr = EmailAddress::parse("user@example.com (Some User)")
            .unwrap()
            .unwrap();
        assert_eq!(addr.address, "user@example.com");
    }

    #[test]
    fn test_null_address_is_none() {
        assert_eq!(EmailAddress::parse("<>").unwrap(), None);
        assert_eq!(EmailAddress::parse("\"Nobody\" < >").unwrap(), None);
    }

    #[test]
    fn test_parse_list() {
        let list =
            EmailAddress::parse_list("User One <a@b.com>, User Two <c@d.com>, plain@addr.com")
                .unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(
            addresses(&list),
            vec![Some("a@b.com"), Some("c@d.com"), Some("plain@addr.com")]
        );
    }

    #[test]
    fn test_parse_list_with_quoted_comma() {
        let list = EmailAddress::parse_list("\"Last, First\" <a@b.com>, other@c.com").unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(addresses(&list), vec![Some("a@b.com"), Some("other@c.com")]);
    }

    #[test]
    fn test_parse_list_keeps_null_slot() {
        let list = EmailAddress::parse_list("a@x.com, <>, b@y.com").unwrap();
        assert_eq!(addresses(&list), vec![Some("a@x.com"), None, Some("b@y.com")]);
    }

    #[test]
    fn test_parse_list_groups() {
        let list = EmailAddress::parse_list("team: a@b.com, c@d.com;, e@f.com").unwrap();
        assert_eq!(
            addresses(&list),
            vec![Some("a@b.com"), Some("c@d.com"), Some("e@f.com")]
        );
        let empty = EmailAddress::parse_list("undisclosed-recipients:;").unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_whitespace_inside_address_is_rejected() {
        let err = EmailAddress::parse_list("Someone <some one@example.com>").unwrap_err();
        assert!(err.reason.contains("whitespace"));
        assert!(EmailAddress::parse_list("jo hn@example.com").is_err());
        assert!(EmailAddress::parse_list("john@exa mple.com").is_err());
    }

    #[test]
    fn test_stray_quote_in_domain_is_rejected() {
        assert!(EmailAddress::parse_list("Bob <'bob@example.com'>").is_err());
    }

    #[test]
    fn test_unbalanced_syntax_is_rejected() {
        assert!(EmailAddress::parse_list("Bob <bob@example.com").is_err());
        assert!(EmailAddress::parse_list("\"Bob <bob@example.com>").is_err());
        assert!(EmailAddress::parse_list("Bob bob@example.com>").is_err());
        assert!(EmailAddress::parse_list("a@b.com (unclosed").is_err());
    }

    #[test]
    fn test_local_only_address() {
        let list = EmailAddress::parse_list("postmaster").unwrap();
        assert_eq!(addresses(&list), vec![Some("postmaster")]);
    }

    #[test]
    fn test_empty_elements_are_skipped() {
        let list = EmailAddress::parse_list("a@b.com, , c@d.com,").unwrap();
        assert_eq!(list.len(), 2);
        assert!(EmailAddress::parse_list("").unwrap().is_empty());
    }
}
