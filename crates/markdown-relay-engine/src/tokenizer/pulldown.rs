//! Tokenizer backed by pulldown-cmark.
//!
//! pulldown-cmark's event model is close to md4c's but not identical:
//! list details, task markers, table sections and raw attribute text have
//! to be reconstructed from the source. Events are lowered into md4c-shaped
//! records and handed to the sink one top-level block at a time, because
//! some records (a list's tightness, a table's row counts) are only known
//! once their children have been seen.

use std::borrow::Cow;
use std::ops::{ControlFlow, Range};

use log::debug;
use pulldown_cmark::{Alignment, CodeBlockKind, CowStr, Event, LinkType, Options, Parser, Tag};

use super::autolink::find_autolinks;
use super::{RunStatus, Sink, Tokenizer, TokenizerFault};
use crate::attribute::RawAttribute;
use crate::entity::is_entity_reference;
use crate::event::{
    Align, Block, BlockType, CellDetail, CodeBlockDetail, HeadingDetail, ImageDetail, LinkDetail,
    ListItemDetail, OrderedListDetail, RawEvent, Span, SpanType, TableDetail, TaskMark, TextType,
    UnorderedListDetail, WikiLinkDetail,
};
use crate::flags::ParserFlags;

#[derive(Debug, Clone, Copy, Default)]
pub struct PulldownTokenizer;

impl PulldownTokenizer {
    pub fn new() -> Self {
        Self
    }
}

impl Tokenizer for PulldownTokenizer {
    fn tokenize(
        &self,
        input: &str,
        flags: ParserFlags,
        sink: &mut dyn Sink,
    ) -> Result<RunStatus, TokenizerFault> {
        if u32::try_from(input.len()).is_err() {
            return Err(TokenizerFault::InputTooLarge(input.len()));
        }

        let events = Parser::new_ext(input, options(flags)).into_offset_iter();
        let status = Lowering::new(input, flags).run(events, sink)?;
        debug!("Lowered {} bytes of markdown: {:?}", input.len(), status);
        Ok(status)
    }
}

fn options(flags: ParserFlags) -> Options {
    let mut options = Options::empty();
    let pairs = [
        (ParserFlags::TABLES, Options::ENABLE_TABLES),
        (ParserFlags::STRIKETHROUGH, Options::ENABLE_STRIKETHROUGH),
        (ParserFlags::TASKLISTS, Options::ENABLE_TASKLISTS),
        (ParserFlags::LATEX_MATH_SPANS, Options::ENABLE_MATH),
        (ParserFlags::WIKILINKS, Options::ENABLE_WIKILINKS),
    ];
    for (flag, option) in pairs {
        if flags.contains(flag) {
            options.insert(option);
        }
    }
    options
}

/// An md4c-shaped event owning its record.
#[derive(Debug, Clone)]
enum Lowered<'a> {
    EnterBlock(Block<RawAttribute<'a>>),
    LeaveBlock(Block<RawAttribute<'a>>),
    EnterSpan(Span<RawAttribute<'a>>),
    LeaveSpan(Span<RawAttribute<'a>>),
    Text(TextType, Cow<'a, str>),
}

impl Lowered<'_> {
    fn as_raw(&self) -> RawEvent<'_> {
        match self {
            Lowered::EnterBlock(block) => RawEvent::EnterBlock(block),
            Lowered::LeaveBlock(block) => RawEvent::LeaveBlock(block),
            Lowered::EnterSpan(span) => RawEvent::EnterSpan(span),
            Lowered::LeaveSpan(span) => RawEvent::LeaveSpan(span),
            Lowered::Text(kind, text) => RawEvent::Text(*kind, text),
        }
    }

    fn into_owned(self) -> Lowered<'static> {
        let owned = |attribute: &RawAttribute<'_>| attribute.clone().into_owned();
        match self {
            Lowered::EnterBlock(block) => Lowered::EnterBlock(block.map_attributes(owned)),
            Lowered::LeaveBlock(block) => Lowered::LeaveBlock(block.map_attributes(owned)),
            Lowered::EnterSpan(span) => Lowered::EnterSpan(span.map_attributes(owned)),
            Lowered::LeaveSpan(span) => Lowered::LeaveSpan(span.map_attributes(owned)),
            Lowered::Text(kind, text) => Lowered::Text(kind, Cow::Owned(text.into_owned())),
        }
    }
}

/// An element opened by a pulldown-cmark start event. Indices point at the
/// enter event in the output; leave events copy that (possibly patched)
/// record.
#[derive(Debug)]
enum Open {
    Element(usize),
    TableHead { thead: usize, tr: usize },
    Table(TableState),
    /// Raw HTML collected while HTML blocks are disabled; it is re-read as
    /// paragraph text once the block ends.
    DemotedHtml(String),
    Unsupported,
}

#[derive(Debug)]
struct TableState {
    enter: usize,
    aligns: Vec<Align>,
    column: usize,
    head_rows: u32,
    body_rows: u32,
    tbody: Option<usize>,
}

struct Lowering<'a> {
    input: &'a str,
    flags: ParserFlags,
    out: Vec<Lowered<'a>>,
    open: Vec<Open>,
    /// Text not yet emitted. Adjacent normal runs are merged; entity
    /// references stay separate so autolinks can be matched across them.
    pending: Vec<(TextType, String)>,
    /// Output indices of paragraph enter/leave events wrapping disabled
    /// HTML blocks directly inside list items, in ascending order. Tight
    /// lists drop them when they close.
    item_paragraphs: Vec<usize>,
}

impl<'a> Lowering<'a> {
    fn new(input: &'a str, flags: ParserFlags) -> Self {
        Self {
            input,
            flags,
            out: Vec::new(),
            open: Vec::new(),
            pending: Vec::new(),
            item_paragraphs: Vec::new(),
        }
    }

    fn run<I>(mut self, events: I, sink: &mut dyn Sink) -> Result<RunStatus, TokenizerFault>
    where
        I: IntoIterator<Item = (Event<'a>, Range<usize>)>,
    {
        self.out.push(Lowered::EnterBlock(Block::Doc));

        for (event, range) in events {
            self.lower(event, range)?;
            if self.open.is_empty() && self.deliver(sink).is_break() {
                return Ok(RunStatus::Aborted);
            }
        }

        self.flush_text();
        if !self.open.is_empty() {
            return Err(TokenizerFault::Unbalanced(format!(
                "{} elements left open at end of input",
                self.open.len()
            )));
        }
        self.out.push(Lowered::LeaveBlock(Block::Doc));
        if self.deliver(sink).is_break() {
            return Ok(RunStatus::Aborted);
        }
        Ok(RunStatus::Finished)
    }

    /// Hand over everything lowered so far. Only safe with nothing open,
    /// since open elements are patched through their output index.
    fn deliver(&mut self, sink: &mut dyn Sink) -> ControlFlow<()> {
        for event in self.out.drain(..) {
            sink.accept(event.as_raw())?;
        }
        ControlFlow::Continue(())
    }

    /// Lower the whole input without delivering anything.
    fn lower_all(&mut self) -> Result<(), TokenizerFault> {
        let input = self.input;
        for (event, range) in Parser::new_ext(input, options(self.flags)).into_offset_iter() {
            self.lower(event, range)?;
        }
        self.flush_text();
        Ok(())
    }

    fn lower(&mut self, event: Event<'a>, range: Range<usize>) -> Result<(), TokenizerFault> {
        match event {
            Event::Start(tag) => {
                self.flush_text();
                self.start(tag, range);
            }
            Event::End(_) => {
                self.flush_text();
                self.end()?;
            }
            Event::Text(text) => self.text(text, range),
            Event::Code(code) => self.inline_leaf(Span::Code, TextType::Code, code),
            Event::InlineMath(math) => self.inline_leaf(Span::LatexMath, TextType::LatexMath, math),
            Event::DisplayMath(math) => {
                self.inline_leaf(Span::LatexMathDisplay, TextType::LatexMath, math)
            }
            Event::Html(html) => match self.open.last_mut() {
                Some(Open::DemotedHtml(collected)) => collected.push_str(&html),
                _ => self.emit_text(TextType::Html, cow(html)),
            },
            Event::InlineHtml(html) => {
                if self.flags.contains(ParserFlags::NO_HTML_SPANS) {
                    self.push_normal(&html);
                } else {
                    self.emit_text(TextType::Html, cow(html));
                }
            }
            Event::SoftBreak => self.emit_text(TextType::SoftBr, Cow::Borrowed("\n")),
            Event::HardBreak => self.emit_text(TextType::Br, Cow::Borrowed("\n")),
            Event::Rule => {
                self.flush_text();
                self.out.push(Lowered::EnterBlock(Block::Hr));
                self.out.push(Lowered::LeaveBlock(Block::Hr));
            }
            Event::TaskListMarker(checked) => self.task_marker(checked, range),
            _ => {}
        }
        Ok(())
    }

    fn start(&mut self, tag: Tag<'a>, range: Range<usize>) {
        let open = match tag {
            Tag::Paragraph => {
                self.mark_enclosing_list_loose();
                self.enter_block(Block::P)
            }
            Tag::Heading { level, .. } => self.enter_block(Block::H(HeadingDetail {
                level: level as u8,
            })),
            Tag::BlockQuote(_) => self.enter_block(Block::Quote),
            Tag::CodeBlock(kind) => {
                let detail = self.code_block_detail(kind, &range);
                self.enter_block(Block::Code(detail))
            }
            Tag::HtmlBlock if self.flags.contains(ParserFlags::NO_HTML_BLOCKS) => {
                Open::DemotedHtml(String::new())
            }
            Tag::HtmlBlock => self.enter_block(Block::Html),
            Tag::List(Some(start)) => {
                self.enter_block(Block::Ol(OrderedListDetail {
                    start: u32::try_from(start).unwrap_or(u32::MAX),
                    is_tight: true,
                    mark_delimiter: self.ordered_delimiter(range.start),
                }))
            }
            Tag::List(None) => self.enter_block(Block::Ul(UnorderedListDetail {
                is_tight: true,
                mark: self.bullet_mark(range.start),
            })),
            Tag::Item => self.enter_block(Block::Li(ListItemDetail::default())),
            Tag::Table(alignments) => {
                let enter = self.push_enter_block(Block::Table(TableDetail::default()));
                Open::Table(TableState {
                    enter,
                    aligns: alignments.iter().map(|a| align(*a)).collect(),
                    column: 0,
                    head_rows: 0,
                    body_rows: 0,
                    tbody: None,
                })
            }
            Tag::TableHead => {
                if let Some(table) = self.current_table() {
                    table.head_rows += 1;
                    table.column = 0;
                }
                let thead = self.push_enter_block(Block::Thead);
                let tr = self.push_enter_block(Block::Tr);
                Open::TableHead { thead, tr }
            }
            Tag::TableRow => {
                let needs_tbody = match self.current_table() {
                    Some(table) => {
                        table.body_rows += 1;
                        table.column = 0;
                        table.tbody.is_none()
                    }
                    None => false,
                };
                if needs_tbody {
                    let tbody = self.push_enter_block(Block::Tbody);
                    if let Some(table) = self.current_table() {
                        table.tbody = Some(tbody);
                    }
                }
                self.enter_block(Block::Tr)
            }
            Tag::TableCell => {
                let in_head = matches!(self.open.last(), Some(Open::TableHead { .. }));
                let align = match self.current_table() {
                    Some(table) => {
                        let align = table.aligns.get(table.column).copied().unwrap_or_default();
                        table.column += 1;
                        align
                    }
                    None => Align::Default,
                };
                let detail = CellDetail { align };
                self.enter_block(if in_head {
                    Block::Th(detail)
                } else {
                    Block::Td(detail)
                })
            }
            Tag::Emphasis => {
                let span = if self.is_underline(range.start) {
                    Span::U
                } else {
                    Span::Em
                };
                self.enter_span(span)
            }
            Tag::Strong => {
                let span = if self.is_underline(range.start) {
                    Span::U
                } else {
                    Span::Strong
                };
                self.enter_span(span)
            }
            Tag::Strikethrough => self.enter_span(Span::Del),
            Tag::Link {
                link_type,
                dest_url,
                title,
                ..
            } => {
                let span = match link_type {
                    LinkType::WikiLink { .. } => Span::WikiLink(WikiLinkDetail {
                        target: RawAttribute::literal(cow(dest_url)),
                    }),
                    LinkType::Email => Span::A(LinkDetail {
                        href: RawAttribute::literal(format!("mailto:{dest_url}")),
                        title: optional_literal(title),
                    }),
                    _ => {
                        let (href, title) =
                            self.link_attributes(link_type, dest_url, title, &range);
                        Span::A(LinkDetail { href, title })
                    }
                };
                self.enter_span(span)
            }
            Tag::Image {
                link_type,
                dest_url,
                title,
                ..
            } => {
                let (src, title) = self.link_attributes(link_type, dest_url, title, &range);
                self.enter_span(Span::Img(ImageDetail { src, title }))
            }
            _ => Open::Unsupported,
        };
        self.open.push(open);
    }

    fn end(&mut self) -> Result<(), TokenizerFault> {
        let open = self.open.pop().ok_or_else(|| {
            TokenizerFault::Unbalanced("end event without a matching start".to_string())
        })?;
        match open {
            Open::Element(enter) => {
                self.unwrap_tight_items(enter);
                self.leave(enter);
            }
            Open::TableHead { thead, tr } => {
                self.leave(tr);
                self.leave(thead);
            }
            Open::Table(table) => {
                if let Some(tbody) = table.tbody {
                    self.leave(tbody);
                }
                if let Some(Lowered::EnterBlock(Block::Table(detail))) = self.out.get_mut(table.enter)
                {
                    detail.col_count = u32::try_from(table.aligns.len()).unwrap_or(u32::MAX);
                    detail.head_row_count = table.head_rows;
                    detail.body_row_count = table.body_rows;
                }
                self.leave(table.enter);
            }
            Open::DemotedHtml(html) => self.relower_html(&html),
            Open::Unsupported => {}
        }
        Ok(())
    }

    fn text(&mut self, text: CowStr<'a>, range: Range<usize>) {
        if self.inside_block(BlockType::Code) {
            self.emit_text(TextType::Code, cow(text));
            return;
        }

        if let Some(source) = self.input.get(range)
            && source != &*text
            && is_entity_reference(source)
        {
            self.pending.push((TextType::Entity, source.to_string()));
            return;
        }

        let mut runs = text.split('\0');
        if let Some(first) = runs.next() {
            self.push_normal(first);
        }
        for run in runs {
            self.emit_text(TextType::NullChar, Cow::Borrowed("\0"));
            self.push_normal(run);
        }
    }

    fn push_normal(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        match self.pending.last_mut() {
            Some((TextType::Normal, run)) => run.push_str(text),
            _ => self.pending.push((TextType::Normal, text.to_string())),
        }
    }

    fn inline_leaf(&mut self, span: Span<RawAttribute<'a>>, kind: TextType, text: CowStr<'a>) {
        self.flush_text();
        self.out.push(Lowered::EnterSpan(span.clone()));
        self.out.push(Lowered::Text(kind, cow(text)));
        self.out.push(Lowered::LeaveSpan(span));
    }

    /// Re-read a disabled HTML block the way a paragraph would be read:
    /// tags become inline HTML (or plain text without HTML spans) and the
    /// markup between them is parsed as inlines. Blank lines inside the
    /// block separate paragraphs.
    fn relower_html(&mut self, html: &str) {
        let in_item = self.directly_in_list_item();
        let lines: Vec<&str> = html.lines().collect();
        for group in lines.split(|line| line.trim().is_empty()) {
            if group.is_empty() {
                continue;
            }
            if in_item {
                self.item_paragraphs.push(self.out.len());
            }
            self.out.push(Lowered::EnterBlock(Block::P));
            match paragraph_inlines(group, self.flags) {
                Some(inlines) => self.out.extend(inlines),
                None => {
                    for (i, line) in group.iter().enumerate() {
                        if i > 0 {
                            self.out.push(Lowered::Text(TextType::SoftBr, Cow::Borrowed("\n")));
                        }
                        let line = line.trim().to_string();
                        self.out.push(Lowered::Text(TextType::Normal, Cow::Owned(line)));
                    }
                }
            }
            if in_item {
                self.item_paragraphs.push(self.out.len());
            }
            self.out.push(Lowered::LeaveBlock(Block::P));
        }
    }

    /// Once a list closes, paragraphs added for disabled HTML blocks in its
    /// items are removed again if the list turned out tight.
    fn unwrap_tight_items(&mut self, enter: usize) {
        let tight = match self.out.get(enter) {
            Some(Lowered::EnterBlock(Block::Ul(detail))) => detail.is_tight,
            Some(Lowered::EnterBlock(Block::Ol(detail))) => detail.is_tight,
            _ => return,
        };
        let first = self.item_paragraphs.partition_point(|&index| index < enter);
        let inside = self.item_paragraphs.split_off(first);
        if tight {
            for index in inside.into_iter().rev() {
                self.out.remove(index);
            }
        }
    }

    fn task_marker(&mut self, checked: bool, range: Range<usize>) {
        let bytes = self.input.as_bytes();
        let (mark, offset) = match (bytes.get(range.start), bytes.get(range.start + 1)) {
            (Some(b'['), Some(&m @ (b' ' | b'x' | b'X'))) => (m as char, range.start + 1),
            _ => (if checked { 'x' } else { ' ' }, range.start + 1),
        };

        let item = self.open.iter().rev().find_map(|open| match open {
            Open::Element(index)
                if matches!(self.out.get(*index), Some(Lowered::EnterBlock(Block::Li(_)))) =>
            {
                Some(*index)
            }
            _ => None,
        });
        if let Some(index) = item
            && let Some(Lowered::EnterBlock(Block::Li(detail))) = self.out.get_mut(index)
        {
            detail.task = Some(TaskMark { mark, offset });
        }
    }

    fn enter_block(&mut self, block: Block<RawAttribute<'a>>) -> Open {
        Open::Element(self.push_enter_block(block))
    }

    fn push_enter_block(&mut self, block: Block<RawAttribute<'a>>) -> usize {
        self.out.push(Lowered::EnterBlock(block));
        self.out.len() - 1
    }

    fn enter_span(&mut self, span: Span<RawAttribute<'a>>) -> Open {
        self.out.push(Lowered::EnterSpan(span));
        Open::Element(self.out.len() - 1)
    }

    fn leave(&mut self, enter: usize) {
        let event = match self.out.get(enter) {
            Some(Lowered::EnterBlock(block)) => Lowered::LeaveBlock(block.clone()),
            Some(Lowered::EnterSpan(span)) => Lowered::LeaveSpan(span.clone()),
            _ => return,
        };
        self.out.push(event);
    }

    fn emit_text(&mut self, kind: TextType, text: Cow<'a, str>) {
        self.flush_text();
        self.out.push(Lowered::Text(kind, text));
    }

    /// Deliver coalesced normal text, splitting out permissive autolinks.
    fn flush_text(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let mut pieces = std::mem::take(&mut self.pending);
        if self.flags.contains(ParserFlags::COLLAPSE_WHITESPACE) {
            for (kind, text) in &mut pieces {
                if *kind == TextType::Normal {
                    *text = collapse_whitespace(text);
                }
            }
        }

        let autolink_flags = self.flags & ParserFlags::PERMISSIVE_AUTOLINKS;
        if autolink_flags.is_empty() || self.inside_link() {
            for (kind, text) in pieces {
                self.out.push(Lowered::Text(kind, Cow::Owned(text)));
            }
            return;
        }

        let mut joined = String::new();
        let mut bounds = Vec::with_capacity(pieces.len());
        for (kind, text) in &pieces {
            let start = joined.len();
            joined.push_str(text);
            bounds.push((*kind, start..joined.len()));
        }

        let mut cursor = 0;
        for link in find_autolinks(&joined, autolink_flags) {
            let start = outside_entities(&bounds, link.range.start, true);
            let end = outside_entities(&bounds, link.range.end, false);
            if start >= end || start < cursor {
                continue;
            }
            self.push_pieces(&joined, &bounds, cursor..start);

            let href = std::iter::once((TextType::Normal, link.prefix))
                .chain(pieces_in(&joined, &bounds, start..end));
            let span = Span::A(LinkDetail {
                href: RawAttribute::from_pieces(href),
                title: RawAttribute::absent(),
            });
            self.out.push(Lowered::EnterSpan(span.clone()));
            self.push_pieces(&joined, &bounds, start..end);
            self.out.push(Lowered::LeaveSpan(span));
            cursor = end;
        }
        self.push_pieces(&joined, &bounds, cursor..joined.len());
    }

    fn push_pieces(
        &mut self,
        joined: &str,
        bounds: &[(TextType, Range<usize>)],
        range: Range<usize>,
    ) {
        for (kind, text) in pieces_in(joined, bounds, range) {
            self.out.push(Lowered::Text(kind, Cow::Owned(text.to_string())));
        }
    }

    fn open_kinds(&self) -> impl Iterator<Item = &Lowered<'a>> {
        self.open.iter().filter_map(|open| match open {
            Open::Element(index) => self.out.get(*index),
            _ => None,
        })
    }

    fn inside_block(&self, kind: BlockType) -> bool {
        self.open_kinds()
            .any(|event| matches!(event, Lowered::EnterBlock(block) if block.kind() == kind))
    }

    fn inside_link(&self) -> bool {
        self.open_kinds().any(|event| {
            matches!(
                event,
                Lowered::EnterSpan(span)
                    if matches!(span.kind(), SpanType::A | SpanType::Img | SpanType::WikiLink)
            )
        })
    }

    fn current_table(&mut self) -> Option<&mut TableState> {
        self.open.iter_mut().rev().find_map(|open| match open {
            Open::Table(table) => Some(table),
            _ => None,
        })
    }

    fn directly_in_list_item(&self) -> bool {
        let Some(Open::Element(item)) = self.open.last() else {
            return false;
        };
        matches!(self.out.get(*item), Some(Lowered::EnterBlock(Block::Li(_))))
    }

    /// A paragraph directly inside a list item makes the list loose.
    fn mark_enclosing_list_loose(&mut self) {
        let [.., Open::Element(list), Open::Element(item)] = self.open.as_slice() else {
            return;
        };
        if !matches!(self.out.get(*item), Some(Lowered::EnterBlock(Block::Li(_)))) {
            return;
        }
        match self.out.get_mut(*list) {
            Some(Lowered::EnterBlock(Block::Ul(detail))) => detail.is_tight = false,
            Some(Lowered::EnterBlock(Block::Ol(detail))) => detail.is_tight = false,
            _ => {}
        }
    }

    /// Link and image attributes as written in the source, so entity
    /// references keep their own substrings. Reference links and anything
    /// that cannot be matched back to the source get the decoded values.
    fn link_attributes(
        &self,
        link_type: LinkType,
        dest: CowStr<'a>,
        title: CowStr<'a>,
        range: &Range<usize>,
    ) -> (RawAttribute<'a>, RawAttribute<'a>) {
        let raw = match link_type {
            LinkType::Inline => self
                .input
                .get(range.clone())
                .and_then(|source| inline_link_source(source, &dest, &title)),
            _ => None,
        };
        match raw {
            Some((raw_dest, raw_title)) => {
                (optional_markdown(raw_dest), optional_markdown(raw_title))
            }
            None => (optional_literal(dest), optional_literal(title)),
        }
    }

    fn code_block_detail(
        &self,
        kind: CodeBlockKind<'a>,
        range: &Range<usize>,
    ) -> CodeBlockDetail<RawAttribute<'a>> {
        let CodeBlockKind::Fenced(decoded) = kind else {
            return CodeBlockDetail {
                fence_char: None,
                info: RawAttribute::absent(),
                lang: RawAttribute::absent(),
            };
        };

        if let Some((fence_char, raw_info)) = fence_line(self.input, range) {
            let lang = raw_info.split_whitespace().next().unwrap_or("");
            return CodeBlockDetail {
                fence_char: Some(fence_char),
                info: optional_markdown(raw_info),
                lang: optional_markdown(lang),
            };
        }

        let info = cow(decoded);
        let lang = info.split_whitespace().next().unwrap_or("").to_string();
        CodeBlockDetail {
            fence_char: Some('`'),
            info: optional_literal_cow(info),
            lang: optional_literal_cow(Cow::Owned(lang)),
        }
    }

    fn bullet_mark(&self, at: usize) -> char {
        match self.marker_bytes(at).next() {
            Some(&b @ (b'-' | b'*' | b'+')) => b as char,
            _ => '-',
        }
    }

    fn ordered_delimiter(&self, at: usize) -> char {
        match self.marker_bytes(at).find(|b| !b.is_ascii_digit()) {
            Some(&b @ (b'.' | b')')) => b as char,
            _ => '.',
        }
    }

    fn marker_bytes(&self, at: usize) -> impl Iterator<Item = &u8> {
        self.input
            .as_bytes()
            .get(at..)
            .unwrap_or_default()
            .iter()
            .skip_while(|b| matches!(b, b' ' | b'\t'))
    }

    fn is_underline(&self, at: usize) -> bool {
        self.flags.contains(ParserFlags::UNDERLINE) && self.input.as_bytes().get(at) == Some(&b'_')
    }
}

/// Parse the lines of a disabled HTML block as the continuation of a
/// paragraph and return its inline events.
///
/// A placeholder first line plus a four-space indent on every line keeps
/// the lines from opening blocks of their own.
fn paragraph_inlines(lines: &[&str], flags: ParserFlags) -> Option<Vec<Lowered<'static>>> {
    const LEAD: &str = "x";

    let mut source = format!("{LEAD}\n");
    for line in lines {
        source.push_str("    ");
        source.push_str(line.trim_start());
        source.push('\n');
    }

    let mut nested = Lowering::new(&source, flags);
    nested.lower_all().ok()?;
    let events = nested.out;

    let [
        Lowered::EnterBlock(Block::P),
        Lowered::Text(TextType::Normal, lead),
        Lowered::Text(TextType::SoftBr, _),
        inlines @ ..,
        Lowered::LeaveBlock(Block::P),
    ] = events.as_slice()
    else {
        return None;
    };
    let nested_blocks = inlines
        .iter()
        .any(|event| matches!(event, Lowered::EnterBlock(_) | Lowered::LeaveBlock(_)));
    if lead != LEAD || nested_blocks {
        return None;
    }
    Some(inlines.iter().cloned().map(Lowered::into_owned).collect())
}

/// Split an inline link or image, `[label](dest "title")`, into its raw
/// destination and title. The split is accepted only when both decode to
/// what pulldown-cmark reported.
fn inline_link_source<'s>(
    source: &'s str,
    dest: &str,
    title: &str,
) -> Option<(&'s str, &'s str)> {
    let body = source.strip_suffix(')')?;
    body.rmatch_indices("](")
        .filter_map(|(at, _)| split_destination(&body[at + 2..]))
        .find(|(raw_dest, raw_title)| decoded(raw_dest) == dest && decoded(raw_title) == title)
}

fn split_destination(rest: &str) -> Option<(&str, &str)> {
    let rest = rest.trim_start();
    let (dest, after) = match rest.strip_prefix('<') {
        Some(inner) => {
            let end = unescaped(inner, |c| c == '>' || c == '\n')?;
            if !inner[end..].starts_with('>') {
                return None;
            }
            (&inner[..end], &inner[end + 1..])
        }
        None => {
            let mut depth = 0usize;
            let mut end = rest.len();
            let mut chars = rest.char_indices();
            while let Some((i, c)) = chars.next() {
                match c {
                    '\\' => {
                        chars.next();
                    }
                    '(' => depth += 1,
                    ')' => depth = depth.checked_sub(1)?,
                    c if c.is_ascii_whitespace() => {
                        end = i;
                        break;
                    }
                    _ => {}
                }
            }
            (&rest[..end], &rest[end..])
        }
    };

    let after = after.trim();
    let title = match after.chars().next() {
        None => "",
        Some(open @ ('"' | '\'' | '(')) => {
            let close = if open == '(' { ')' } else { open };
            let inner = after[1..].strip_suffix(close)?;
            if unescaped(inner, |c| c == close).is_some() {
                return None;
            }
            inner
        }
        Some(_) => return None,
    };
    Some((dest, title))
}

/// Byte index of the first character matching `stop` that is not
/// backslash-escaped.
fn unescaped(text: &str, stop: impl Fn(char) -> bool) -> Option<usize> {
    let mut chars = text.char_indices();
    while let Some((i, c)) = chars.next() {
        if c == '\\' {
            chars.next();
        } else if stop(c) {
            return Some(i);
        }
    }
    None
}

fn decoded(raw: &str) -> String {
    RawAttribute::from_markdown(raw)
        .decompose()
        .decoded_text()
        .unwrap_or_default()
}

/// Move `at` out of any entity piece it falls inside: forward to the
/// piece's end, or back to its start.
fn outside_entities(bounds: &[(TextType, Range<usize>)], at: usize, forward: bool) -> usize {
    bounds
        .iter()
        .find(|(kind, range)| *kind != TextType::Normal && range.start < at && at < range.end)
        .map_or(at, |(_, range)| if forward { range.end } else { range.start })
}

fn pieces_in<'t>(
    joined: &'t str,
    bounds: &'t [(TextType, Range<usize>)],
    range: Range<usize>,
) -> impl Iterator<Item = (TextType, &'t str)> + 't {
    bounds.iter().filter_map(move |(kind, piece)| {
        let start = piece.start.max(range.start);
        let end = piece.end.min(range.end);
        (start < end).then(|| (*kind, &joined[start..end]))
    })
}

/// The fence character and trimmed info string of the fenced code block
/// starting in `range`.
fn fence_line<'a>(input: &'a str, range: &Range<usize>) -> Option<(char, &'a str)> {
    let block = input.get(range.clone())?;
    let fence_start = block.trim_start_matches([' ', '\t']);
    let fence_char = fence_start.chars().next().filter(|c| matches!(c, '`' | '~'))?;
    let after_fence = fence_start.trim_start_matches(fence_char);
    let line = after_fence.split('\n').next().unwrap_or_default();
    Some((fence_char, line.trim()))
}

fn align(alignment: Alignment) -> Align {
    match alignment {
        Alignment::None => Align::Default,
        Alignment::Left => Align::Left,
        Alignment::Center => Align::Center,
        Alignment::Right => Align::Right,
    }
}

fn cow(text: CowStr<'_>) -> Cow<'_, str> {
    match text {
        CowStr::Borrowed(text) => Cow::Borrowed(text),
        other => Cow::Owned(other.to_string()),
    }
}

/// Empty attribute text means the attribute is absent.
fn optional_literal(text: CowStr<'_>) -> RawAttribute<'_> {
    optional_literal_cow(cow(text))
}

fn optional_literal_cow(text: Cow<'_, str>) -> RawAttribute<'_> {
    if text.is_empty() {
        RawAttribute::absent()
    } else {
        RawAttribute::literal(text)
    }
}

fn optional_markdown(raw: &str) -> RawAttribute<'_> {
    if raw.is_empty() {
        RawAttribute::absent()
    } else {
        RawAttribute::from_markdown(raw)
    }
}

fn collapse_whitespace(text: &str) -> String {
    let mut collapsed = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_ascii_whitespace() {
            if !in_space {
                collapsed.push(' ');
            }
            in_space = true;
        } else {
            collapsed.push(c);
            in_space = false;
        }
    }
    collapsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{Attribute, Substring};
    use std::cell::Cell;
    use crate::event::Event as RelayEvent;
    use pretty_assertions::assert_eq;

    /// Tokenize and render every event on one line, for compact assertions.
    fn trace(input: &str, flags: ParserFlags) -> Vec<String> {
        let mut lines = Vec::new();
        let mut sink = |raw: RawEvent<'_>| {
            lines.push(match RelayEvent::from_raw(raw) {
                RelayEvent::EnterBlock(block) => format!("enter {:?}", block.kind()),
                RelayEvent::LeaveBlock(block) => format!("leave {:?}", block.kind()),
                RelayEvent::EnterSpan(span) => format!("enter {:?}", span.kind()),
                RelayEvent::LeaveSpan(span) => format!("leave {:?}", span.kind()),
                RelayEvent::Text(kind, text) => format!("{kind:?} {text:?}"),
            });
            ControlFlow::Continue(())
        };
        let status = PulldownTokenizer.tokenize(input, flags, &mut sink).unwrap();
        assert_eq!(status, RunStatus::Finished);
        lines
    }

    fn collect(input: &str, flags: ParserFlags) -> Vec<RelayEvent<'static>> {
        let mut events = Vec::new();
        let mut sink = |raw: RawEvent<'_>| {
            let event = match RelayEvent::from_raw(raw) {
                RelayEvent::Text(kind, text) => {
                    RelayEvent::Text(kind, Box::leak(text.to_string().into_boxed_str()))
                }
                RelayEvent::EnterBlock(b) => RelayEvent::EnterBlock(b),
                RelayEvent::LeaveBlock(b) => RelayEvent::LeaveBlock(b),
                RelayEvent::EnterSpan(s) => RelayEvent::EnterSpan(s),
                RelayEvent::LeaveSpan(s) => RelayEvent::LeaveSpan(s),
            };
            events.push(event);
            ControlFlow::Continue(())
        };
        PulldownTokenizer.tokenize(input, flags, &mut sink).unwrap();
        events
    }

    #[test]
    fn heading_and_emphasis() {
        assert_eq!(
            trace("# Hi\n\n*world*\n", ParserFlags::empty()),
            vec![
                "enter Doc",
                "enter H",
                "Normal \"Hi\"",
                "leave H",
                "enter P",
                "enter Em",
                "Normal \"world\"",
                "leave Em",
                "leave P",
                "leave Doc",
            ]
        );
    }

    #[test]
    fn entities_are_reported_encoded() {
        assert_eq!(
            trace("a &amp; b\n", ParserFlags::empty()),
            vec![
                "enter Doc",
                "enter P",
                "Normal \"a \"",
                "Entity \"&amp;\"",
                "Normal \" b\"",
                "leave P",
                "leave Doc",
            ]
        );
    }

    #[test]
    fn fenced_code_info_and_lang() {
        let events = collect("~~~python extra\nprint(1)\n~~~\n", ParserFlags::empty());
        let RelayEvent::EnterBlock(Block::Code(detail)) = &events[1] else {
            panic!("expected code block, got {:?}", events[1]);
        };
        assert_eq!(detail.fence_char, Some('~'));
        assert_eq!(detail.info.raw_text().as_deref(), Some("python extra"));
        assert_eq!(detail.lang.raw_text().as_deref(), Some("python"));
        assert_eq!(
            events[2],
            RelayEvent::Text(TextType::Code, "print(1)\n")
        );
    }

    #[test]
    fn fenced_code_without_info_has_absent_attributes() {
        let events = collect("```\nx\n```\n", ParserFlags::empty());
        let RelayEvent::EnterBlock(Block::Code(detail)) = &events[1] else {
            panic!("expected code block");
        };
        assert_eq!(detail.fence_char, Some('`'));
        assert_eq!(detail.info, Attribute::Absent);
        assert_eq!(detail.lang, Attribute::Absent);
    }

    #[test]
    fn indented_code_has_no_fence() {
        let events = collect("    let x = 1;\n", ParserFlags::empty());
        let RelayEvent::EnterBlock(Block::Code(detail)) = &events[1] else {
            panic!("expected code block");
        };
        assert_eq!(detail.fence_char, None);
        assert!(detail.info.is_absent());
    }

    #[test]
    fn list_details_come_from_the_source() {
        let events = collect("3) one\n4) two\n", ParserFlags::empty());
        assert_eq!(
            events[1],
            RelayEvent::EnterBlock(Block::Ol(OrderedListDetail {
                start: 3,
                is_tight: true,
                mark_delimiter: ')',
            }))
        );

        let events = collect("* a\n\n* b\n", ParserFlags::empty());
        let expected = Block::Ul(UnorderedListDetail {
            is_tight: false,
            mark: '*',
        });
        assert_eq!(events[1], RelayEvent::EnterBlock(expected.clone()));
        assert_eq!(events.iter().rev().nth(1), Some(&RelayEvent::LeaveBlock(expected)));
    }

    #[test]
    fn task_marks_are_folded_into_items() {
        let events = collect("- [x] done\n- [ ] todo\n", ParserFlags::TASKLISTS);
        let tasks: Vec<_> = events
            .iter()
            .filter_map(|event| match event {
                RelayEvent::EnterBlock(Block::Li(detail)) => detail.task,
                _ => None,
            })
            .collect();
        assert_eq!(
            tasks,
            vec![
                TaskMark { mark: 'x', offset: 3 },
                TaskMark { mark: ' ', offset: 14 },
            ]
        );
    }

    #[test]
    fn tables_get_sections_and_counts() {
        let input = "| a | b |\n|:--|--:|\n| 1 | 2 |\n| 3 | 4 |\n";
        let events = collect(input, ParserFlags::TABLES);
        assert_eq!(
            events[1],
            RelayEvent::EnterBlock(Block::Table(TableDetail {
                col_count: 2,
                head_row_count: 1,
                body_row_count: 2,
            }))
        );
        let kinds: Vec<String> = trace(input, ParserFlags::TABLES)
            .into_iter()
            .filter(|line| line.starts_with("enter"))
            .collect();
        assert_eq!(
            kinds,
            vec![
                "enter Doc", "enter Table", "enter Thead", "enter Tr", "enter Th", "enter Th",
                "enter Tbody", "enter Tr", "enter Td", "enter Td", "enter Tr", "enter Td",
                "enter Td",
            ]
        );
        assert!(events.contains(&RelayEvent::EnterBlock(Block::Th(CellDetail {
            align: Align::Left
        }))));
        assert!(events.contains(&RelayEvent::EnterBlock(Block::Td(CellDetail {
            align: Align::Right
        }))));
    }

    #[test]
    fn underscores_become_underline_when_enabled() {
        let lines = trace("_u_ *e*\n", ParserFlags::UNDERLINE);
        assert!(lines.contains(&"enter U".to_string()));
        assert!(lines.contains(&"enter Em".to_string()));

        let lines = trace("_e_\n", ParserFlags::empty());
        assert!(lines.contains(&"enter Em".to_string()));
    }

    #[test]
    fn inline_code_and_breaks() {
        assert_eq!(
            trace("a `b`  \nc\nd\n", ParserFlags::empty()),
            vec![
                "enter Doc",
                "enter P",
                "Normal \"a \"",
                "enter Code",
                "Code \"b\"",
                "leave Code",
                "Br \"\\n\"",
                "Normal \"c\"",
                "SoftBr \"\\n\"",
                "Normal \"d\"",
                "leave P",
                "leave Doc",
            ]
        );
    }

    #[test]
    fn raw_html_can_be_demoted_to_text() {
        let lines = trace("a <b>x</b>\n", ParserFlags::empty());
        assert!(lines.contains(&"Html \"<b>\"".to_string()));

        let lines = trace("a <b>x</b>\n", ParserFlags::NO_HTML_SPANS);
        assert!(lines.contains(&"Normal \"a <b>x</b>\"".to_string()));
    }

    #[test]
    fn html_blocks_become_paragraphs_when_disabled() {
        assert_eq!(
            trace("<div>\nhi *x*\n</div>\n", ParserFlags::NO_HTML_BLOCKS),
            vec![
                "enter Doc",
                "enter P",
                "Html \"<div>\"",
                "SoftBr \"\\n\"",
                "Normal \"hi \"",
                "enter Em",
                "Normal \"x\"",
                "leave Em",
                "SoftBr \"\\n\"",
                "Html \"</div>\"",
                "leave P",
                "leave Doc",
            ]
        );
    }

    #[test]
    fn disabled_html_blocks_and_spans_leave_tags_as_text() {
        let lines = trace("<div>\nhi *x*\n</div>\n", ParserFlags::NO_HTML);
        assert_eq!(lines[2], "Normal \"<div>\"");
        assert_eq!(lines[9], "Normal \"</div>\"");
        assert!(lines.contains(&"enter Em".to_string()));
        assert!(!lines.iter().any(|line| line.starts_with("Html")));
    }

    #[test]
    fn blank_lines_split_a_disabled_html_block() {
        let lines = trace("<pre>\na\n\nb\n</pre>\n", ParserFlags::NO_HTML_BLOCKS);
        let paragraphs = lines.iter().filter(|line| *line == "enter P").count();
        assert_eq!(paragraphs, 2);
        assert!(lines.contains(&"Html \"<pre>\"".to_string()));
        assert!(lines.contains(&"Html \"</pre>\"".to_string()));
    }

    #[test]
    fn html_blocks_in_tight_items_stay_unwrapped() {
        assert_eq!(
            trace("- <div>\n- b\n", ParserFlags::NO_HTML_BLOCKS),
            vec![
                "enter Doc",
                "enter Ul",
                "enter Li",
                "Html \"<div>\"",
                "leave Li",
                "enter Li",
                "Normal \"b\"",
                "leave Li",
                "leave Ul",
                "leave Doc",
            ]
        );
    }

    #[test]
    fn html_blocks_in_loose_items_become_paragraphs() {
        let lines = trace("- <div>\n\n- b\n", ParserFlags::NO_HTML_BLOCKS);
        assert_eq!(lines[2..6], ["enter Li", "enter P", "Html \"<div>\"", "leave P"]);
    }

    #[test]
    fn nul_bytes_are_reported_as_null_chars() {
        assert_eq!(
            trace("a\0b\n", ParserFlags::empty()),
            vec![
                "enter Doc",
                "enter P",
                "Normal \"a\"",
                "NullChar \"\\0\"",
                "Normal \"b\"",
                "leave P",
                "leave Doc",
            ]
        );
    }

    #[test]
    fn link_attributes_keep_entities_from_the_source() {
        let events = collect("[a](/x&amp;y \"t&lt;\")\n", ParserFlags::empty());
        let RelayEvent::EnterSpan(Span::A(detail)) = &events[2] else {
            panic!("expected link, got {:?}", events[2]);
        };
        assert_eq!(
            detail.href.substrings(),
            &[
                Substring::new(TextType::Normal, "/x"),
                Substring::new(TextType::Entity, "&amp;"),
                Substring::new(TextType::Normal, "y"),
            ]
        );
        assert_eq!(
            detail.title.substrings(),
            &[
                Substring::new(TextType::Normal, "t"),
                Substring::new(TextType::Entity, "&lt;"),
            ]
        );
    }

    #[test]
    fn image_sources_keep_entities_and_escapes() {
        let events = collect("![i](<a b&copy;\\).png>)\n", ParserFlags::empty());
        let RelayEvent::EnterSpan(Span::Img(detail)) = &events[2] else {
            panic!("expected image, got {:?}", events[2]);
        };
        assert_eq!(
            detail.src.substrings(),
            &[
                Substring::new(TextType::Normal, "a b"),
                Substring::new(TextType::Entity, "&copy;"),
                Substring::new(TextType::Normal, ").png"),
            ]
        );
        assert!(detail.title.is_absent());
    }

    #[test]
    fn empty_link_destination_is_absent() {
        for input in ["[a]()\n", "[a](<>)\n"] {
            let events = collect(input, ParserFlags::empty());
            let RelayEvent::EnterSpan(Span::A(detail)) = &events[2] else {
                panic!("{input:?}: expected link, got {:?}", events[2]);
            };
            assert_eq!(detail.href, Attribute::Absent, "{input:?}");
            assert_eq!(detail.title, Attribute::Absent, "{input:?}");
        }
    }

    #[test]
    fn reference_links_carry_decoded_targets() {
        let events = collect("[a][r]\n\n[r]: /x&amp;y\n", ParserFlags::empty());
        let RelayEvent::EnterSpan(Span::A(detail)) = &events[2] else {
            panic!("expected link, got {:?}", events[2]);
        };
        assert_eq!(detail.href.substrings(), &[Substring::new(TextType::Normal, "/x&y")]);
    }

    #[test]
    fn permissive_autolinks_wrap_bare_urls() {
        let events = collect("see https://x.io now\n", ParserFlags::PERMISSIVE_URL_AUTOLINKS);
        let RelayEvent::EnterSpan(Span::A(detail)) = &events[3] else {
            panic!("expected link, got {:?}", events[3]);
        };
        assert_eq!(detail.href.raw_text().as_deref(), Some("https://x.io"));
        assert!(detail.title.is_absent());
        assert_eq!(events[4], RelayEvent::Text(TextType::Normal, "https://x.io"));
    }

    #[test]
    fn permissive_autolinks_run_through_entities() {
        let input = "see https://a.io/?x&amp;y now\n";
        assert_eq!(
            trace(input, ParserFlags::PERMISSIVE_URL_AUTOLINKS),
            vec![
                "enter Doc",
                "enter P",
                "Normal \"see \"",
                "enter A",
                "Normal \"https://a.io/?x\"",
                "Entity \"&amp;\"",
                "Normal \"y\"",
                "leave A",
                "Normal \" now\"",
                "leave P",
                "leave Doc",
            ]
        );

        let events = collect(input, ParserFlags::PERMISSIVE_URL_AUTOLINKS);
        let RelayEvent::EnterSpan(Span::A(detail)) = &events[3] else {
            panic!("expected link, got {:?}", events[3]);
        };
        assert_eq!(
            detail.href.substrings(),
            &[
                Substring::new(TextType::Normal, "https://a.io/?x"),
                Substring::new(TextType::Entity, "&amp;"),
                Substring::new(TextType::Normal, "y"),
            ]
        );
    }

    #[test]
    fn autolinks_never_end_inside_an_entity() {
        assert_eq!(
            trace("https://a.io&amp;\n", ParserFlags::PERMISSIVE_URL_AUTOLINKS),
            vec![
                "enter Doc",
                "enter P",
                "enter A",
                "Normal \"https://a.io\"",
                "leave A",
                "Entity \"&amp;\"",
                "leave P",
                "leave Doc",
            ]
        );
    }

    #[test]
    fn www_autolinks_get_a_scheme_in_the_href() {
        let events = collect("go www.x.io\n", ParserFlags::PERMISSIVE_WWW_AUTOLINKS);
        let RelayEvent::EnterSpan(Span::A(detail)) = &events[3] else {
            panic!("expected link, got {:?}", events[3]);
        };
        assert_eq!(detail.href.raw_text().as_deref(), Some("http://www.x.io"));
        assert_eq!(events[4], RelayEvent::Text(TextType::Normal, "www.x.io"));
    }

    #[test]
    fn math_spans() {
        let lines = trace("$x$ and $$y$$\n", ParserFlags::LATEX_MATH_SPANS);
        assert!(lines.contains(&"enter LatexMath".to_string()));
        assert!(lines.contains(&"enter LatexMathDisplay".to_string()));
        assert!(lines.contains(&"LatexMath \"x\"".to_string()));
    }

    #[test]
    fn wiki_links_carry_their_target() {
        let events = collect("[[Some Page]]\n", ParserFlags::WIKILINKS);
        let target = events.iter().find_map(|event| match event {
            RelayEvent::EnterSpan(Span::WikiLink(detail)) => detail.target.raw_text(),
            _ => None,
        });
        assert_eq!(target.as_deref(), Some("Some Page"));
    }

    #[test]
    fn collapse_whitespace_merges_runs() {
        assert_eq!(collapse_whitespace("a \t b"), "a b");
    }

    #[test]
    fn blocks_are_delivered_as_soon_as_they_close() {
        let input = "first\n\nsecond\n";
        let pulled = Cell::new(0);
        let events = Parser::new_ext(input, Options::empty())
            .into_offset_iter()
            .inspect(|_| pulled.set(pulled.get() + 1));
        let mut delivered_at = Vec::new();
        let mut sink = |_: RawEvent<'_>| {
            delivered_at.push(pulled.get());
            ControlFlow::Continue(())
        };

        let status = Lowering::new(input, ParserFlags::empty())
            .run(events, &mut sink)
            .unwrap();

        assert_eq!(status, RunStatus::Finished);
        assert_eq!(delivered_at, vec![3, 3, 3, 3, 6, 6, 6, 6]);
    }

    #[test]
    fn sink_break_aborts_the_run() {
        let mut seen = 0;
        let mut sink = |_: RawEvent<'_>| {
            seen += 1;
            if seen == 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        };
        let status = PulldownTokenizer
            .tokenize("# a\n\nb\n", ParserFlags::empty(), &mut sink)
            .unwrap();
        assert_eq!(status, RunStatus::Aborted);
        assert_eq!(seen, 2);
    }
}
