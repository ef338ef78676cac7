//! Cookie codec.
//!
//! # Responsibilities
//! - Parse the inbound `Cookie` header into a [`CookieMap`]
//! - Normalize cookie strings embedded in query/body parameters
//! - Render a [`CookieMap`] back into a `Cookie` header for upstream calls
//!
//! # Design Decisions
//! - Malformed fragments are skipped, never reported
//! - Keys and values are percent-decoded, then trimmed
//! - Decoding is lenient: invalid escapes and UTF-8 are kept lossily

use indexmap::IndexMap;
use percent_encoding::percent_decode_str;

/// Cookie name to decoded, trimmed value. Keeps first-seen key order.
pub type CookieMap = IndexMap<String, String>;

/// Parse a raw `Cookie` header value.
///
/// Pairs are separated by `;` followed by at least one whitespace character.
/// A trailing whitespace run also terminates the last pair. A `;` with no
/// following whitespace does not separate pairs and stays in the value.
pub fn parse(raw: &str) -> CookieMap {
    let mut cookies = CookieMap::new();
    for pair in split_header_pairs(raw) {
        if let Some((key, value)) = crack(pair) {
            cookies.insert(
                decode(key).trim().to_string(),
                decode(value).trim().to_string(),
            );
        }
    }
    cookies
}

/// Normalize a cookie string that arrived inside query or body parameters.
///
/// The whole string is percent-decoded once, then split on `;` (with or
/// without following whitespace). Fragments follow the same rules as [`parse`].
pub fn serialize(cookie: &str) -> CookieMap {
    let decoded = decode(cookie);
    let mut cookies = CookieMap::new();
    for pair in decoded.split(';') {
        if let Some((key, value)) = crack(pair.trim()) {
            cookies.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    cookies
}

/// Render cookies as a `Cookie` request header value.
pub fn to_header(cookies: &CookieMap) -> String {
    cookies
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Split at the first `=`. Rejects a missing `=`, a leading `=` and a trailing `=`.
fn crack(pair: &str) -> Option<(&str, &str)> {
    let idx = pair.find('=')?;
    if idx == 0 || idx == pair.len() - 1 {
        return None;
    }
    Some((&pair[..idx], &pair[idx + 1..]))
}

fn split_header_pairs(raw: &str) -> Vec<&str> {
    // Everything at or past this offset is the trailing whitespace run.
    let trailing = raw.trim_end().len();
    let mut pairs = Vec::new();
    let mut start = 0;
    let mut chars = raw.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        if idx >= trailing {
            pairs.push(&raw[start..idx]);
            start = raw.len();
            break;
        }
        if ch != ';' {
            continue;
        }
        let mut end = idx + 1;
        while let Some(&(next_idx, next)) = chars.peek() {
            if !next.is_whitespace() {
                break;
            }
            end = next_idx + next.len_utf8();
            chars.next();
        }
        if end > idx + 1 {
            pairs.push(&raw[start..idx]);
            start = end;
        }
    }

    pairs.push(&raw[start..]);
    pairs
}

fn decode(input: &str) -> String {
    percent_decode_str(input).decode_utf8_lossy().into_owned()
}
