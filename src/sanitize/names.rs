//! Identifier sanitization

use regex::Regex;
use std::sync::LazyLock;

/// Any character that may not appear in a warehouse identifier
static INVALID_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_]").unwrap());

/// Normalize an arbitrary field name into a warehouse-safe identifier
///
/// Characters outside `[A-Za-z0-9_]` become `_`, a leading `_` is added when
/// the name does not start with a letter or underscore, and the result is
/// lower-cased. Applying it twice gives the same result as applying it once.
pub fn sanitize_name(raw: &str) -> String {
    let replaced = INVALID_CHARS.replace_all(raw, "_");

    let starts_ok = replaced
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');

    let mut name = String::with_capacity(replaced.len() + 1);
    if !starts_ok {
        name.push('_');
    }
    name.push_str(&replaced);
    name.to_ascii_lowercase()
}
