//! Address headers, with recovery for address lists broken by bad folding.

use tracing::debug;

use crate::model::address::{AddressError, EmailAddress};
use crate::parser::header::decode_encoded_words;
use crate::parser::message::RawMessage;

/// Parse every occurrence of an address header into bare address tokens.
///
/// Occurrences are joined with `,` and parsed as one list. An absent header
/// yields an empty list.
pub fn parse_addresses(message: &RawMessage, name: &str) -> Result<Vec<Option<String>>, AddressError> {
    let values: Vec<String> = message.headers_named(name).map(|h| h.value()).collect();
    if values.is_empty() {
        return Ok(Vec::new());
    }
    EmailAddress::parse_list(&values.join(",")).map(bare_tokens)
}

/// Like [`parse_addresses`], but when strict parsing fails each raw header
/// occurrence is cleaned with [`repair_folding`] and parsed again.
///
/// The error returned is the one from the repaired text.
pub fn parse_recipients(message: &RawMessage, name: &str) -> Result<Vec<Option<String>>, AddressError> {
    let strict_error = match parse_addresses(message, name) {
        Ok(list) => return Ok(list),
        Err(e) => e,
    };
    debug!(header = name, error = %strict_error, "Address list rejected, retrying with fold repair");

    let mut result = Vec::new();
    for header in message.headers_named(name) {
        let repaired = repair_folding(header.raw_value());
        let list = EmailAddress::parse_list(repaired.trim())?;
        result.extend(bare_tokens(list));
    }
    Ok(result)
}

/// Undo the folding damage of exporters that break lines at a fixed width
/// regardless of address tokens.
///
/// Every `CRLF SP` fold is removed outright and every `CRLF HTAB` becomes a
/// single space; `<'` and `'>` lose their stray quote. This is lossy: a fold
/// that replaced a real space glues the neighbouring words together.
pub fn repair_folding(raw: &str) -> String {
    raw.replace("\r\n ", "")
        .replace("\r\n\t", " ")
        .replace("<'", "<")
        .replace("'>", ">")
}

fn bare_tokens(list: Vec<Option<EmailAddress>>) -> Vec<Option<String>> {
    list.into_iter()
        .map(|slot| match slot {
            Some(addr) => Some(decode_encoded_words(&addr.address)),
            None => {
                debug!("Null address slot kept");
                None
            }
        })
        .collect()
}
