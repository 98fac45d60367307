//! # Events
//!
//! The closed enumerations consumers match on, and the typed records that
//! accompany block and span events.
//!
//! A block or span record is generic over its attribute representation. The
//! tokenizer hands out records holding [`RawAttribute`]s, which borrow memory
//! that is only valid for one callback; the dispatcher decomposes them into
//! owned [`Attribute`]s before a handler sees them.
//!
//! ```text
//! EnterBlock(Doc)
//!   EnterBlock(H { level: 1 })
//!     Text(Normal, "Hi")
//!   LeaveBlock(H { level: 1 })
//! LeaveBlock(Doc)
//! ```

mod detail;

pub use detail::*;

use serde::Serialize;

use crate::attribute::{Attribute, RawAttribute};

/// Kind of a block-level element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u32)]
pub enum BlockType {
    Doc = 0,
    Quote,
    Ul,
    Ol,
    Li,
    Hr,
    H,
    Code,
    Html,
    P,
    Table,
    Thead,
    Tbody,
    Tr,
    Th,
    Td,
}

/// Kind of an inline element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u32)]
pub enum SpanType {
    Em = 0,
    Strong,
    A,
    Img,
    Code,
    Del,
    LatexMath,
    LatexMathDisplay,
    WikiLink,
    U,
}

/// How the bytes of a text event (or attribute substring) are to be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u32)]
pub enum TextType {
    /// Ordinary text.
    Normal = 0,
    /// A NUL byte in the input. Renderers usually replace it with U+FFFD.
    NullChar,
    /// Hard line break.
    Br,
    /// Soft line break.
    SoftBr,
    /// An entity reference, delimiters included, still encoded.
    Entity,
    /// Contents of a code span or code block.
    Code,
    /// Raw HTML.
    Html,
    /// Contents of a math span.
    LatexMath,
}

/// Table column alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[repr(u32)]
pub enum Align {
    #[default]
    Default = 0,
    Left,
    Center,
    Right,
}

/// A block together with its kind-specific detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum Block<A = Attribute> {
    Doc,
    Quote,
    Ul(UnorderedListDetail),
    Ol(OrderedListDetail),
    Li(ListItemDetail),
    Hr,
    H(HeadingDetail),
    Code(CodeBlockDetail<A>),
    Html,
    P,
    Table(TableDetail),
    Thead,
    Tbody,
    Tr,
    Th(CellDetail),
    Td(CellDetail),
}

impl<A> Block<A> {
    pub fn kind(&self) -> BlockType {
        match self {
            Block::Doc => BlockType::Doc,
            Block::Quote => BlockType::Quote,
            Block::Ul(_) => BlockType::Ul,
            Block::Ol(_) => BlockType::Ol,
            Block::Li(_) => BlockType::Li,
            Block::Hr => BlockType::Hr,
            Block::H(_) => BlockType::H,
            Block::Code(_) => BlockType::Code,
            Block::Html => BlockType::Html,
            Block::P => BlockType::P,
            Block::Table(_) => BlockType::Table,
            Block::Thead => BlockType::Thead,
            Block::Tbody => BlockType::Tbody,
            Block::Tr => BlockType::Tr,
            Block::Th(_) => BlockType::Th,
            Block::Td(_) => BlockType::Td,
        }
    }

    /// Rebuild the record with every attribute passed through `f`.
    pub fn map_attributes<B>(&self, mut f: impl FnMut(&A) -> B) -> Block<B> {
        match self {
            Block::Doc => Block::Doc,
            Block::Quote => Block::Quote,
            Block::Ul(d) => Block::Ul(*d),
            Block::Ol(d) => Block::Ol(*d),
            Block::Li(d) => Block::Li(*d),
            Block::Hr => Block::Hr,
            Block::H(d) => Block::H(*d),
            Block::Code(d) => Block::Code(CodeBlockDetail {
                fence_char: d.fence_char,
                info: f(&d.info),
                lang: f(&d.lang),
            }),
            Block::Html => Block::Html,
            Block::P => Block::P,
            Block::Table(d) => Block::Table(*d),
            Block::Thead => Block::Thead,
            Block::Tbody => Block::Tbody,
            Block::Tr => Block::Tr,
            Block::Th(d) => Block::Th(*d),
            Block::Td(d) => Block::Td(*d),
        }
    }
}

/// An inline element together with its kind-specific detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum Span<A = Attribute> {
    Em,
    Strong,
    A(LinkDetail<A>),
    Img(ImageDetail<A>),
    Code,
    Del,
    LatexMath,
    LatexMathDisplay,
    WikiLink(WikiLinkDetail<A>),
    U,
}

impl<A> Span<A> {
    pub fn kind(&self) -> SpanType {
        match self {
            Span::Em => SpanType::Em,
            Span::Strong => SpanType::Strong,
            Span::A(_) => SpanType::A,
            Span::Img(_) => SpanType::Img,
            Span::Code => SpanType::Code,
            Span::Del => SpanType::Del,
            Span::LatexMath => SpanType::LatexMath,
            Span::LatexMathDisplay => SpanType::LatexMathDisplay,
            Span::WikiLink(_) => SpanType::WikiLink,
            Span::U => SpanType::U,
        }
    }

    /// Rebuild the record with every attribute passed through `f`.
    pub fn map_attributes<B>(&self, mut f: impl FnMut(&A) -> B) -> Span<B> {
        match self {
            Span::Em => Span::Em,
            Span::Strong => Span::Strong,
            Span::A(d) => Span::A(LinkDetail {
                href: f(&d.href),
                title: f(&d.title),
            }),
            Span::Img(d) => Span::Img(ImageDetail {
                src: f(&d.src),
                title: f(&d.title),
            }),
            Span::Code => Span::Code,
            Span::Del => Span::Del,
            Span::LatexMath => Span::LatexMath,
            Span::LatexMathDisplay => Span::LatexMathDisplay,
            Span::WikiLink(d) => Span::WikiLink(WikiLinkDetail {
                target: f(&d.target),
            }),
            Span::U => Span::U,
        }
    }
}

/// One event as produced by a tokenizer, before attribute decomposition.
///
/// Everything borrowed here is only valid for the duration of the callback
/// that receives it.
#[derive(Debug, Clone, Copy)]
pub enum RawEvent<'a> {
    EnterBlock(&'a Block<RawAttribute<'a>>),
    LeaveBlock(&'a Block<RawAttribute<'a>>),
    EnterSpan(&'a Span<RawAttribute<'a>>),
    LeaveSpan(&'a Span<RawAttribute<'a>>),
    Text(TextType, &'a str),
}

/// One event with its typed record, as delivered to handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "record")]
pub enum Event<'a> {
    EnterBlock(Block),
    LeaveBlock(Block),
    EnterSpan(Span),
    LeaveSpan(Span),
    Text(TextType, &'a str),
}

impl<'a> Event<'a> {
    /// Build the typed record for `raw`, decomposing every attribute now,
    /// while the raw attribute memory is still valid.
    pub fn from_raw(raw: RawEvent<'a>) -> Self {
        match raw {
            RawEvent::EnterBlock(block) => {
                Event::EnterBlock(block.map_attributes(RawAttribute::decompose))
            }
            RawEvent::LeaveBlock(block) => {
                Event::LeaveBlock(block.map_attributes(RawAttribute::decompose))
            }
            RawEvent::EnterSpan(span) => {
                Event::EnterSpan(span.map_attributes(RawAttribute::decompose))
            }
            RawEvent::LeaveSpan(span) => {
                Event::LeaveSpan(span.map_attributes(RawAttribute::decompose))
            }
            RawEvent::Text(kind, text) => Event::Text(kind, text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::Substring;
    use pretty_assertions::assert_eq;

    #[test]
    fn discriminants_match_md4c_numbering() {
        assert_eq!(BlockType::Doc as u32, 0);
        assert_eq!(BlockType::Td as u32, 15);
        assert_eq!(SpanType::U as u32, 9);
        assert_eq!(TextType::LatexMath as u32, 7);
        assert_eq!(Align::Right as u32, 3);
    }

    #[test]
    fn kinds_follow_variants() {
        let block: Block = Block::H(HeadingDetail { level: 2 });
        assert_eq!(block.kind(), BlockType::H);

        let span: Span = Span::WikiLink(WikiLinkDetail {
            target: Attribute::Absent,
        });
        assert_eq!(span.kind(), SpanType::WikiLink);
    }

    #[test]
    fn from_raw_decomposes_code_block_attributes() {
        let raw = Block::Code(CodeBlockDetail {
            fence_char: Some('`'),
            info: RawAttribute::from_markdown("rust &amp; more"),
            lang: RawAttribute::from_markdown("rust"),
        });

        let Event::EnterBlock(Block::Code(detail)) = Event::from_raw(RawEvent::EnterBlock(&raw))
        else {
            panic!("expected a code block");
        };

        assert_eq!(detail.fence_char, Some('`'));
        assert_eq!(
            detail.lang.substrings(),
            &[Substring::new(TextType::Normal, "rust")]
        );
        assert_eq!(
            detail.info.substrings(),
            &[
                Substring::new(TextType::Normal, "rust "),
                Substring::new(TextType::Entity, "&amp;"),
                Substring::new(TextType::Normal, " more"),
            ]
        );
    }

    #[test]
    fn absent_attributes_stay_absent() {
        let raw = Block::Code(CodeBlockDetail {
            fence_char: None,
            info: RawAttribute::absent(),
            lang: RawAttribute::absent(),
        });
        let block = raw.map_attributes(RawAttribute::decompose);
        let Block::Code(detail) = block else {
            panic!("expected a code block");
        };
        assert!(detail.info.is_absent());
        assert!(detail.lang.is_absent());
    }

    #[test]
    fn records_serialize_as_field_mappings() {
        let block: Block = Block::Ol(OrderedListDetail {
            start: 3,
            is_tight: true,
            mark_delimiter: ')',
        });
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "type": "Ol",
                "start": 3,
                "is_tight": true,
                "mark_delimiter": ")"
            })
        );

        let span: Span = Span::A(LinkDetail {
            href: Attribute::Present(vec![Substring::new(TextType::Normal, "/x")]),
            title: Attribute::Absent,
        });
        let value = serde_json::to_value(&span).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "type": "A",
                "href": [{"kind": "Normal", "text": "/x"}],
                "title": null
            })
        );
    }
}
