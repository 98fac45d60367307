//! # Entity resolution
//!
//! Maps an HTML character reference (`&amp;`, `&#65;`, `&#x41;`) to the text
//! it stands for.
//!
//! Numeric references are decoded permissively: every character between the
//! prefix and the closing `;` is read as a digit, and a character that is not
//! a digit of the base counts as `0`. A reference such as `&#1z2;` therefore
//! decodes as `&#102;`. Stricter validation is a policy a caller can add on
//! top; the renderer keeps this behavior so that output does not change.
//!
//! Anything that cannot be resolved (an unknown name, an empty digit run,
//! text that is not shaped like a reference at all) comes back unchanged.
//! Unresolvable references are not errors.

mod table;

use std::borrow::Cow;

use table::NAMED_ENTITIES;

const REPLACEMENT: &str = "\u{FFFD}";

/// Resolve a single entity reference, delimiters included.
///
/// Returns the decoded text, or `entity` itself when it is not a reference
/// this resolver knows.
///
/// ```
/// use markdown_relay_engine::resolve_entity;
///
/// assert_eq!(resolve_entity("&amp;"), "&");
/// assert_eq!(resolve_entity("&#x41;"), "A");
/// assert_eq!(resolve_entity("&bogus;"), "&bogus;");
/// ```
pub fn resolve_entity(entity: &str) -> Cow<'_, str> {
    let Some(body) = entity
        .strip_prefix('&')
        .and_then(|rest| rest.strip_suffix(';'))
    else {
        return Cow::Borrowed(entity);
    };

    let resolved = match body.strip_prefix('#') {
        Some(number) => resolve_numeric(number),
        None => lookup_named(body).map(Cow::Borrowed),
    };

    resolved.unwrap_or(Cow::Borrowed(entity))
}

/// Look up a named reference without its `&` and `;` delimiters.
pub fn lookup_named(name: &str) -> Option<&'static str> {
    NAMED_ENTITIES
        .binary_search_by(|(candidate, _)| candidate.cmp(&name))
        .ok()
        .map(|index| NAMED_ENTITIES[index].1)
}

fn resolve_numeric(number: &str) -> Option<Cow<'static, str>> {
    let (digits, radix) = match number.strip_prefix(['x', 'X']) {
        Some(hex) => (hex, 16),
        None => (number, 10),
    };
    if digits.is_empty() {
        return None;
    }

    let codepoint = digits.chars().fold(0u32, |acc, c| {
        acc.saturating_mul(radix)
            .saturating_add(c.to_digit(radix).unwrap_or(0))
    });

    Some(match char::from_u32(codepoint) {
        Some(c) if c != '\0' => Cow::Owned(c.to_string()),
        _ => Cow::Borrowed(REPLACEMENT),
    })
}

/// Whether `text` is shaped like a complete entity reference.
///
/// Used by tokenizers when splitting raw attribute text: `&name;`,
/// `&#digits;` (1-7 digits) and `&#xhex;` (1-6 hex digits) qualify.
pub fn is_entity_reference(text: &str) -> bool {
    entity_reference_len(text) == Some(text.len())
}

/// Length in bytes of the entity reference at the start of `text`, if any.
pub fn entity_reference_len(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.first() != Some(&b'&') {
        return None;
    }

    let (body_start, max_len, accept): (usize, usize, fn(&u8) -> bool) = match bytes.get(1) {
        Some(b'#') => match bytes.get(2) {
            Some(b'x' | b'X') => (3, 6, u8::is_ascii_hexdigit),
            _ => (2, 7, u8::is_ascii_digit),
        },
        Some(b) if b.is_ascii_alphabetic() => (1, 48, u8::is_ascii_alphanumeric),
        _ => return None,
    };

    let body_len = bytes[body_start..]
        .iter()
        .take_while(|b| accept(b))
        .count();
    if body_len == 0 || body_len > max_len {
        return None;
    }

    let end = body_start + body_len;
    (bytes.get(end) == Some(&b';')).then_some(end + 1)
}
