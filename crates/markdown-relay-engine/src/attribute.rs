//! # Attributes
//!
//! Some blocks and spans carry composite text values: a link's href, an
//! image title, a code block's info string. Their raw text can mix literal
//! characters with entity references and NUL bytes, and a consumer that
//! re-escapes or re-serializes the value needs to tell those apart.
//!
//! A tokenizer describes such a value as a [`RawAttribute`]: one text buffer
//! plus a parallel table of substring kinds and offsets. The table always
//! ends with an offset equal to the text length; that final offset, not a
//! terminator byte, marks the end, because substrings may contain NUL.
//!
//! [`RawAttribute::decompose`] walks the table and produces an owned
//! [`Attribute`]: either [`Attribute::Absent`] (no value was supplied, e.g.
//! the info string of an indented code block) or the ordered list of
//! substrings covering the whole text without gaps or overlaps.

use std::borrow::Cow;

use serde::Serialize;

use crate::entity::{entity_reference_len, resolve_entity};
use crate::event::TextType;
use crate::tokenizer::TokenizerFault;

/// One typed piece of an attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Substring {
    pub kind: TextType,
    pub text: String,
}

impl Substring {
    pub fn new(kind: TextType, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// A decomposed attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(untagged)]
pub enum Attribute {
    /// No value was supplied. Distinct from a present but empty value.
    #[default]
    Absent,
    Present(Vec<Substring>),
}

impl Attribute {
    pub fn is_absent(&self) -> bool {
        matches!(self, Attribute::Absent)
    }

    /// The substrings in order; empty when absent.
    pub fn substrings(&self) -> &[Substring] {
        match self {
            Attribute::Absent => &[],
            Attribute::Present(substrings) => substrings,
        }
    }

    /// Concatenation of the substrings as they appeared, entities still
    /// encoded.
    pub fn raw_text(&self) -> Option<String> {
        match self {
            Attribute::Absent => None,
            Attribute::Present(substrings) => {
                Some(substrings.iter().map(|s| s.text.as_str()).collect())
            }
        }
    }

    /// The value as a reader would see it: entities resolved and NUL
    /// replaced with U+FFFD.
    pub fn decoded_text(&self) -> Option<String> {
        let Attribute::Present(substrings) = self else {
            return None;
        };
        let mut out = String::new();
        for substring in substrings {
            match substring.kind {
                TextType::Entity => out.push_str(&resolve_entity(&substring.text)),
                TextType::NullChar => out.push('\u{FFFD}'),
                _ => out.push_str(&substring.text),
            }
        }
        Some(out)
    }
}

/// Attribute text and its substring table, as supplied by a tokenizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAttribute<'a> {
    text: Option<Cow<'a, str>>,
    substr_types: Vec<TextType>,
    substr_offsets: Vec<usize>,
}

impl<'a> RawAttribute<'a> {
    /// No value.
    pub fn absent() -> Self {
        Self {
            text: None,
            substr_types: Vec::new(),
            substr_offsets: Vec::new(),
        }
    }

    /// Text that is already fully decoded, delivered as one normal
    /// substring (or no substrings when empty).
    pub fn literal(text: impl Into<Cow<'a, str>>) -> Self {
        let text = text.into();
        let (substr_types, substr_offsets) = if text.is_empty() {
            (Vec::new(), vec![0])
        } else {
            (vec![TextType::Normal], vec![0, text.len()])
        };
        Self {
            text: Some(text),
            substr_types,
            substr_offsets,
        }
    }

    /// Build from attribute text as written in Markdown source.
    ///
    /// Backslash escapes of ASCII punctuation are applied, entity references
    /// become their own [`TextType::Entity`] substrings (still encoded), and
    /// every NUL byte becomes a [`TextType::NullChar`] substring.
    pub fn from_markdown(raw: &'a str) -> Self {
        if !raw.contains(['\\', '&', '\0']) {
            return Self::literal(raw);
        }

        let mut builder = Builder::default();
        let mut rest = raw;
        while let Some(c) = rest.chars().next() {
            let escaped = rest[c.len_utf8()..].chars().next();
            match c {
                '\\' if escaped.is_some_and(|e| e.is_ascii_punctuation()) => {
                    let e = escaped.unwrap_or('\\');
                    builder.push_normal(e);
                    rest = &rest[1 + e.len_utf8()..];
                }
                '&' => match entity_reference_len(rest) {
                    Some(len) => {
                        builder.push_piece(TextType::Entity, &rest[..len]);
                        rest = &rest[len..];
                    }
                    None => {
                        builder.push_normal('&');
                        rest = &rest[1..];
                    }
                },
                '\0' => {
                    builder.push_piece(TextType::NullChar, "\0");
                    rest = &rest[1..];
                }
                _ => {
                    builder.push_normal(c);
                    rest = &rest[c.len_utf8()..];
                }
            }
        }
        builder.finish()
    }

    /// Assemble from a tokenizer's own substring table.
    ///
    /// `offsets` must have one more entry than `types`, start at 0, increase
    /// strictly, end at `text.len()` and fall on character boundaries.
    pub fn from_parts(
        text: impl Into<Cow<'a, str>>,
        types: Vec<TextType>,
        offsets: Vec<usize>,
    ) -> Result<Self, TokenizerFault> {
        let text = text.into();
        let malformed = |reason: &str| Err(TokenizerFault::MalformedAttribute(reason.to_string()));

        if offsets.len() != types.len() + 1 {
            return malformed("offset table must have one entry more than the type table");
        }
        if offsets.first() != Some(&0) {
            return malformed("first offset must be 0");
        }
        if offsets.last() != Some(&text.len()) {
            return malformed("last offset must equal the attribute size");
        }
        if offsets.windows(2).any(|w| w[0] >= w[1]) {
            return malformed("offsets must increase strictly");
        }
        if offsets.iter().any(|&o| !text.is_char_boundary(o)) {
            return malformed("offset splits a UTF-8 sequence");
        }

        Ok(Self {
            text: Some(text),
            substr_types: types,
            substr_offsets: offsets,
        })
    }

    /// Build from pieces whose kinds are already known. Adjacent normal
    /// pieces merge into one substring.
    pub(crate) fn from_pieces<'p>(pieces: impl IntoIterator<Item = (TextType, &'p str)>) -> Self {
        let mut builder = Builder::default();
        for (kind, piece) in pieces {
            match kind {
                _ if piece.is_empty() => {}
                TextType::Normal => piece.chars().for_each(|c| builder.push_normal(c)),
                _ => builder.push_piece(kind, piece),
            }
        }
        builder.finish()
    }

    /// Detach from the memory the attribute was built over.
    pub fn into_owned(self) -> RawAttribute<'static> {
        RawAttribute {
            text: self.text.map(|text| Cow::Owned(text.into_owned())),
            substr_types: self.substr_types,
            substr_offsets: self.substr_offsets,
        }
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Total attribute size in bytes; 0 when absent.
    pub fn size(&self) -> usize {
        self.text.as_ref().map_or(0, |t| t.len())
    }

    /// Split into typed substrings.
    pub fn decompose(&self) -> Attribute {
        let Some(text) = self.text.as_deref() else {
            return Attribute::Absent;
        };

        let substrings = self
            .substr_offsets
            .windows(2)
            .zip(&self.substr_types)
            .take_while(|(bounds, _)| bounds[0] != text.len())
            .map(|(bounds, &kind)| Substring::new(kind, &text[bounds[0]..bounds[1]]))
            .collect();

        Attribute::Present(substrings)
    }
}

#[derive(Default)]
struct Builder {
    text: String,
    types: Vec<TextType>,
    offsets: Vec<usize>,
    in_normal: bool,
}

impl Builder {
    fn push_normal(&mut self, c: char) {
        if !self.in_normal {
            self.offsets.push(self.text.len());
            self.types.push(TextType::Normal);
            self.in_normal = true;
        }
        self.text.push(c);
    }

    fn push_piece(&mut self, kind: TextType, piece: &str) {
        self.offsets.push(self.text.len());
        self.types.push(kind);
        self.text.push_str(piece);
        self.in_normal = false;
    }

    fn finish<'a>(mut self) -> RawAttribute<'a> {
        self.offsets.push(self.text.len());
        RawAttribute {
            text: Some(Cow::Owned(self.text)),
            substr_types: self.types,
            substr_offsets: self.offsets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn normal(text: &str) -> Substring {
        Substring::new(TextType::Normal, text)
    }

    #[test]
    fn absent_is_not_empty() {
        let absent = RawAttribute::absent().decompose();
        let empty = RawAttribute::literal("").decompose();

        assert_eq!(absent, Attribute::Absent);
        assert_eq!(empty, Attribute::Present(vec![]));
        assert_ne!(absent, empty);
    }

    #[test]
    fn plain_text_is_one_normal_substring() {
        let attr = RawAttribute::from_markdown("python").decompose();
        assert_eq!(attr.substrings(), &[normal("python")]);
    }

    #[test]
    fn entities_get_their_own_substrings() {
        let attr = RawAttribute::from_markdown("a&amp;b&#65;").decompose();
        assert_eq!(
            attr.substrings(),
            &[
                normal("a"),
                Substring::new(TextType::Entity, "&amp;"),
                normal("b"),
                Substring::new(TextType::Entity, "&#65;"),
            ]
        );
        assert_eq!(attr.decoded_text().as_deref(), Some("a&bA"));
    }

    #[test]
    fn bare_ampersand_stays_normal() {
        let attr = RawAttribute::from_markdown("fish & chips").decompose();
        assert_eq!(attr.substrings(), &[normal("fish & chips")]);
    }

    #[test]
    fn backslash_escapes_are_applied() {
        let attr = RawAttribute::from_markdown(r"a\*b\&amp;c\d").decompose();
        assert_eq!(attr.substrings(), &[normal(r"a*b&amp;c\d")]);
    }

    #[test]
    fn nul_bytes_are_distinguished() {
        let attr = RawAttribute::from_markdown("x\0y").decompose();
        assert_eq!(
            attr.substrings(),
            &[
                normal("x"),
                Substring::new(TextType::NullChar, "\0"),
                normal("y"),
            ]
        );
        assert_eq!(attr.decoded_text().as_deref(), Some("x\u{FFFD}y"));
    }

    #[test]
    fn decomposition_covers_the_whole_text() {
        for raw in ["", "abc", "&lt;tag&gt;", "a\0\0b", "&&amp;&", "émoji &copy; ✓"] {
            let built = RawAttribute::from_markdown(raw);
            let attr = built.decompose();
            assert_eq!(attr.raw_text().as_deref(), built.text(), "input {raw:?}");
        }
    }

    #[test]
    fn pieces_merge_adjacent_normal_text() {
        let raw = RawAttribute::from_pieces([
            (TextType::Normal, "http://"),
            (TextType::Normal, "a.io/?x"),
            (TextType::Entity, "&amp;"),
            (TextType::Normal, ""),
            (TextType::Normal, "y"),
        ]);
        assert_eq!(
            raw.decompose().substrings(),
            &[
                normal("http://a.io/?x"),
                Substring::new(TextType::Entity, "&amp;"),
                normal("y"),
            ]
        );
    }

    #[test]
    fn owned_copy_decomposes_the_same() {
        let source = String::from("t&lt;");
        let raw = RawAttribute::from_markdown(&source);
        let expected = raw.decompose();
        let owned: RawAttribute<'static> = raw.into_owned();
        drop(source);
        assert_eq!(owned.decompose(), expected);
    }

    #[test]
    fn from_parts_accepts_a_valid_table() {
        let raw = RawAttribute::from_parts(
            "a&lt;b",
            vec![TextType::Normal, TextType::Entity, TextType::Normal],
            vec![0, 1, 5, 6],
        )
        .unwrap();
        assert_eq!(raw.size(), 6);
        assert_eq!(raw.decompose().substrings().len(), 3);
    }

    #[test]
    fn from_parts_rejects_malformed_tables() {
        let cases: Vec<(&str, Vec<TextType>, Vec<usize>)> = vec![
            ("abc", vec![TextType::Normal], vec![0]),
            ("abc", vec![TextType::Normal], vec![1, 3]),
            ("abc", vec![TextType::Normal], vec![0, 2]),
            ("abc", vec![TextType::Normal, TextType::Normal], vec![0, 0, 3]),
            ("é", vec![TextType::Normal, TextType::Normal], vec![0, 1, 2]),
        ];
        for (text, types, offsets) in cases {
            let result = RawAttribute::from_parts(text, types, offsets.clone());
            assert!(
                matches!(result, Err(TokenizerFault::MalformedAttribute(_))),
                "offsets {offsets:?} should be rejected"
            );
        }
    }
}
