//! # HTML rendering
//!
//! [`HtmlRenderer`] is the handler behind HTML mode. It appends markup for
//! every event to a [`DynamicBuffer`] it owns, following md4c-html's
//! output conventions, and hands the buffer over when the parse is done.
//!
//! No user code runs per event, so the renderer never cancels a parse. Its
//! only failure is running out of buffer space.

use std::borrow::Cow;

use log::debug;

use crate::attribute::Attribute;
use crate::buffer::{DynamicBuffer, ResourceError};
use crate::dispatch::{Flow, Handler};
use crate::entity::resolve_entity;
use crate::event::{Align, Block, CellDetail, Span, TextType};
use crate::flags::RendererFlags;

const REPLACEMENT: &str = "\u{FFFD}";

/// Characters kept as-is inside `href` and `src` values.
const URL_SAFE: &[u8] = b"~-_.+!*(),%#@?=;:/,+$";

#[derive(Debug, Clone, Copy)]
enum Escape {
    Html,
    Url,
}

#[derive(Debug)]
pub struct HtmlRenderer {
    out: DynamicBuffer,
    flags: RendererFlags,
    /// Depth of open images. Inside one, only plain text is written since
    /// it lands in the `alt` attribute.
    image_nesting: usize,
}

impl HtmlRenderer {
    pub fn new(flags: RendererFlags) -> Result<Self, ResourceError> {
        Ok(Self {
            out: DynamicBuffer::new()?,
            flags,
            image_nesting: 0,
        })
    }

    pub fn as_str(&self) -> &str {
        self.out.as_str()
    }

    pub fn into_buffer(self) -> DynamicBuffer {
        self.out
    }

    fn xhtml(&self) -> bool {
        self.flags.contains(RendererFlags::XHTML)
    }

    fn raw(&mut self, text: &str) -> Result<(), ResourceError> {
        self.out.append(text)
    }

    fn escaped(&mut self, text: &str, escape: Escape) -> Result<(), ResourceError> {
        match escape {
            Escape::Html => {
                let encoded = html_escape::encode_double_quoted_attribute(text);
                self.out.append(&encoded)
            }
            Escape::Url => self.out.append(&url_escape(text)),
        }
    }

    fn entity(&mut self, entity: &str, escape: Escape) -> Result<(), ResourceError> {
        if self.flags.contains(RendererFlags::VERBATIM_ENTITIES) {
            return self.raw(entity);
        }
        let resolved = resolve_entity(entity);
        self.escaped(&resolved, escape)
    }

    fn attribute(&mut self, attribute: &Attribute, escape: Escape) -> Result<(), ResourceError> {
        for substring in attribute.substrings() {
            match substring.kind {
                TextType::NullChar => self.raw(REPLACEMENT)?,
                TextType::Entity => self.entity(&substring.text, escape)?,
                _ => self.escaped(&substring.text, escape)?,
            }
        }
        Ok(())
    }

    /// ` name="value"`, skipped when the attribute is absent.
    fn optional_attribute(
        &mut self,
        name: &str,
        attribute: &Attribute,
        escape: Escape,
    ) -> Result<(), ResourceError> {
        if attribute.is_absent() {
            return Ok(());
        }
        self.raw(" ")?;
        self.raw(name)?;
        self.raw("=\"")?;
        self.attribute(attribute, escape)?;
        self.raw("\"")
    }

    fn open_cell(&mut self, tag: &str, detail: &CellDetail) -> Result<(), ResourceError> {
        self.raw(tag)?;
        match detail.align {
            Align::Default => {}
            Align::Left => self.raw(" align=\"left\"")?,
            Align::Center => self.raw(" align=\"center\"")?,
            Align::Right => self.raw(" align=\"right\"")?,
        }
        self.raw(">")
    }
}

impl Handler for HtmlRenderer {
    type Error = ResourceError;

    fn enter_block(&mut self, block: &Block) -> Result<Flow, ResourceError> {
        if self.flags.contains(RendererFlags::DEBUG) {
            debug!("Entering block {:?}", block.kind());
        }
        match block {
            Block::Doc | Block::Html => {}
            Block::Quote => self.raw("<blockquote>\n")?,
            Block::Ul(_) => self.raw("<ul>\n")?,
            Block::Ol(detail) if detail.start == 1 => self.raw("<ol>\n")?,
            Block::Ol(detail) => self.raw(&format!("<ol start=\"{}\">\n", detail.start))?,
            Block::Li(detail) => match detail.task {
                Some(task) => {
                    self.raw(
                        "<li class=\"task-list-item\">\
                         <input type=\"checkbox\" class=\"task-list-item-checkbox\" disabled",
                    )?;
                    if task.is_checked() {
                        self.raw(" checked")?;
                    }
                    self.raw(if self.xhtml() { " />" } else { ">" })?;
                }
                None => self.raw("<li>")?,
            },
            Block::Hr => self.raw(if self.xhtml() { "<hr />\n" } else { "<hr>\n" })?,
            Block::H(detail) => self.raw(&format!("<h{}>", detail.level))?,
            Block::Code(detail) => {
                self.raw("<pre><code")?;
                if !detail.lang.is_absent() {
                    self.raw(" class=\"language-")?;
                    self.attribute(&detail.lang, Escape::Html)?;
                    self.raw("\"")?;
                }
                self.raw(">")?;
            }
            Block::P => self.raw("<p>")?,
            Block::Table(_) => self.raw("<table>\n")?,
            Block::Thead => self.raw("<thead>\n")?,
            Block::Tbody => self.raw("<tbody>\n")?,
            Block::Tr => self.raw("<tr>\n")?,
            Block::Th(detail) => self.open_cell("<th", detail)?,
            Block::Td(detail) => self.open_cell("<td", detail)?,
        }
        Ok(Flow::Continue)
    }

    fn leave_block(&mut self, block: &Block) -> Result<Flow, ResourceError> {
        if self.flags.contains(RendererFlags::DEBUG) {
            debug!("Leaving block {:?}", block.kind());
        }
        let close: Cow<'static, str> = match block {
            Block::Doc | Block::Html | Block::Hr => return Ok(Flow::Continue),
            Block::Quote => "</blockquote>\n".into(),
            Block::Ul(_) => "</ul>\n".into(),
            Block::Ol(_) => "</ol>\n".into(),
            Block::Li(_) => "</li>\n".into(),
            Block::H(detail) => format!("</h{}>\n", detail.level).into(),
            Block::Code(_) => "</code></pre>\n".into(),
            Block::P => "</p>\n".into(),
            Block::Table(_) => "</table>\n".into(),
            Block::Thead => "</thead>\n".into(),
            Block::Tbody => "</tbody>\n".into(),
            Block::Tr => "</tr>\n".into(),
            Block::Th(_) => "</th>\n".into(),
            Block::Td(_) => "</td>\n".into(),
        };
        self.raw(&close)?;
        Ok(Flow::Continue)
    }

    fn enter_span(&mut self, span: &Span) -> Result<Flow, ResourceError> {
        if self.flags.contains(RendererFlags::DEBUG) {
            debug!("Entering span {:?}", span.kind());
        }
        let inside_image = self.image_nesting > 0;
        if matches!(span, Span::Img(_)) {
            self.image_nesting += 1;
        }
        if inside_image {
            return Ok(Flow::Continue);
        }

        match span {
            Span::Em => self.raw("<em>")?,
            Span::Strong => self.raw("<strong>")?,
            Span::U => self.raw("<u>")?,
            Span::A(link) => {
                self.raw("<a href=\"")?;
                self.attribute(&link.href, Escape::Url)?;
                self.raw("\"")?;
                self.optional_attribute("title", &link.title, Escape::Html)?;
                self.raw(">")?;
            }
            Span::Img(image) => {
                self.raw("<img src=\"")?;
                self.attribute(&image.src, Escape::Url)?;
                self.raw("\" alt=\"")?;
            }
            Span::Code => self.raw("<code>")?,
            Span::Del => self.raw("<del>")?,
            Span::LatexMath => self.raw("<x-equation>")?,
            Span::LatexMathDisplay => self.raw("<x-equation type=\"display\">")?,
            Span::WikiLink(wiki) => {
                self.raw("<x-wikilink data-target=\"")?;
                self.attribute(&wiki.target, Escape::Html)?;
                self.raw("\">")?;
            }
        }
        Ok(Flow::Continue)
    }

    fn leave_span(&mut self, span: &Span) -> Result<Flow, ResourceError> {
        if self.flags.contains(RendererFlags::DEBUG) {
            debug!("Leaving span {:?}", span.kind());
        }
        if matches!(span, Span::Img(_)) {
            self.image_nesting = self.image_nesting.saturating_sub(1);
        }
        if self.image_nesting > 0 {
            return Ok(Flow::Continue);
        }

        match span {
            Span::Em => self.raw("</em>")?,
            Span::Strong => self.raw("</strong>")?,
            Span::U => self.raw("</u>")?,
            Span::A(_) => self.raw("</a>")?,
            Span::Img(image) => {
                self.raw("\"")?;
                self.optional_attribute("title", &image.title, Escape::Html)?;
                self.raw(if self.xhtml() { " />" } else { ">" })?;
            }
            Span::Code => self.raw("</code>")?,
            Span::Del => self.raw("</del>")?,
            Span::LatexMath | Span::LatexMathDisplay => self.raw("</x-equation>")?,
            Span::WikiLink(_) => self.raw("</x-wikilink>")?,
        }
        Ok(Flow::Continue)
    }

    fn text(&mut self, kind: TextType, text: &str) -> Result<Flow, ResourceError> {
        let in_image = self.image_nesting > 0;
        match kind {
            TextType::NullChar => self.raw(REPLACEMENT)?,
            TextType::Br if in_image => self.raw(" ")?,
            TextType::Br => self.raw(if self.xhtml() { "<br />\n" } else { "<br>\n" })?,
            TextType::SoftBr => self.raw(if in_image { " " } else { "\n" })?,
            TextType::Html => self.raw(text)?,
            TextType::Entity => self.entity(text, Escape::Html)?,
            TextType::Normal | TextType::Code | TextType::LatexMath => {
                self.escaped(text, Escape::Html)?
            }
        }
        Ok(Flow::Continue)
    }
}

fn url_escape(text: &str) -> Cow<'_, str> {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";

    let is_safe = |b: u8| b.is_ascii_alphanumeric() || URL_SAFE.contains(&b);
    if text.bytes().all(is_safe) {
        return Cow::Borrowed(text);
    }

    let mut escaped = String::with_capacity(text.len() + 8);
    for b in text.bytes() {
        if is_safe(b) {
            escaped.push(b as char);
        } else if b == b'&' {
            escaped.push_str("&amp;");
        } else {
            escaped.push('%');
            escaped.push(HEX[usize::from(b >> 4)] as char);
            escaped.push(HEX[usize::from(b & 0x0f)] as char);
        }
    }
    Cow::Owned(escaped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::Substring;
    use crate::event::{ImageDetail, LinkDetail, ListItemDetail, TaskMark};
    use crate::flags::ParserFlags;
    use crate::to_html;
    use insta::assert_snapshot;
    use rstest::rstest;

    fn render(input: &str) -> String {
        to_html(input, ParserFlags::DIALECT_GITHUB, RendererFlags::empty()).unwrap()
    }

    fn present(text: &str) -> Attribute {
        Attribute::Present(vec![Substring::new(TextType::Normal, text)])
    }

    #[test]
    fn heading_and_paragraph() {
        assert_snapshot!(render("# Hi\n\n*world*\n"), @r"
        <h1>Hi</h1>
        <p><em>world</em></p>
        ");
    }

    #[test]
    fn code_block_with_language() {
        assert_snapshot!(render("```rust\nlet a = 1 < 2;\n```\n"), @r#"
        <pre><code class="language-rust">let a = 1 &lt; 2;
        </code></pre>
        "#);
    }

    #[test]
    fn ordered_list_start() {
        assert_snapshot!(render("3. a\n4. b\n"), @r#"
        <ol start="3">
        <li>a</li>
        <li>b</li>
        </ol>
        "#);
    }

    #[test]
    fn task_list_items() {
        assert_snapshot!(render("- [x] done\n- [ ] todo\n"), @r#"
        <ul>
        <li class="task-list-item"><input type="checkbox" class="task-list-item-checkbox" disabled checked>done</li>
        <li class="task-list-item"><input type="checkbox" class="task-list-item-checkbox" disabled>todo</li>
        </ul>
        "#);
    }

    #[test]
    fn table_alignment() {
        assert_snapshot!(render("| a | b |\n|:-:|--:|\n| 1 | 2 |\n"), @r#"
        <table>
        <thead>
        <tr>
        <th align="center">a</th>
        <th align="right">b</th>
        </tr>
        </thead>
        <tbody>
        <tr>
        <td align="center">1</td>
        <td align="right">2</td>
        </tr>
        </tbody>
        </table>
        "#);
    }

    #[rstest]
    #[case("a &amp; b\n", "<p>a &amp; b</p>\n")]
    #[case("&copy; &bogus;\n", "<p>\u{a9} &amp;bogus;</p>\n")]
    #[case("<b>raw</b>\n", "<p><b>raw</b></p>\n")]
    #[case("~~gone~~\n", "<p><del>gone</del></p>\n")]
    #[case("a  \nb\n", "<p>a<br>\nb</p>\n")]
    #[case("[x](/a b \"t\")\n", "<p>[x](/a b &quot;t&quot;)</p>\n")]
    #[case("[x](</a b> \"t\")\n", "<p><a href=\"/a%20b\" title=\"t\">x</a></p>\n")]
    #[case("![*alt*](/i.png)\n", "<p><img src=\"/i.png\" alt=\"alt\"></p>\n")]
    #[case("www.example.com\n", "<p><a href=\"http://www.example.com\">www.example.com</a></p>\n")]
    fn renders(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(render(input), expected);
    }

    #[test]
    fn xhtml_self_closes() {
        let html = to_html("a  \nb\n\n***\n", ParserFlags::empty(), RendererFlags::XHTML).unwrap();
        assert_eq!(html, "<p>a<br />\nb</p>\n<hr />\n");
    }

    #[test]
    fn verbatim_entities_skip_decoding() {
        let html = to_html(
            "&copy;\n",
            ParserFlags::empty(),
            RendererFlags::VERBATIM_ENTITIES,
        )
        .unwrap();
        assert_eq!(html, "<p>&copy;</p>\n");
    }

    #[test]
    fn bom_is_skipped() {
        let input = "\u{feff}hi\n";
        let skipped = to_html(input, ParserFlags::empty(), RendererFlags::SKIP_UTF8_BOM).unwrap();
        assert_eq!(skipped, "<p>hi</p>\n");
    }

    #[test]
    fn image_alt_text_is_flat() {
        let mut renderer = HtmlRenderer::new(RendererFlags::empty()).unwrap();
        let image = Span::Img(ImageDetail {
            src: present("/a b.png"),
            title: present("T"),
        });
        renderer.enter_span(&image).unwrap();
        renderer.enter_span(&Span::Strong).unwrap();
        renderer.text(TextType::Normal, "x").unwrap();
        renderer.text(TextType::SoftBr, "\n").unwrap();
        renderer.text(TextType::Normal, "\"y\"").unwrap();
        renderer.leave_span(&Span::Strong).unwrap();
        renderer.leave_span(&image).unwrap();

        assert_eq!(
            renderer.as_str(),
            "<img src=\"/a%20b.png\" alt=\"x &quot;y&quot;\" title=\"T\">"
        );
    }

    #[test]
    fn attributes_resolve_entities_per_substring() {
        let mut renderer = HtmlRenderer::new(RendererFlags::empty()).unwrap();
        let link = Span::A(LinkDetail {
            href: Attribute::Present(vec![
                Substring::new(TextType::Normal, "/q?a=1"),
                Substring::new(TextType::Entity, "&amp;"),
                Substring::new(TextType::Normal, "b=\u{e9}"),
            ]),
            title: Attribute::Present(vec![
                Substring::new(TextType::Entity, "&lt;"),
                Substring::new(TextType::NullChar, "\0"),
            ]),
        });
        renderer.enter_span(&link).unwrap();
        renderer.leave_span(&link).unwrap();

        assert_eq!(
            renderer.as_str(),
            "<a href=\"/q?a=1&amp;b=%C3%A9\" title=\"&lt;\u{fffd}\"></a>"
        );
    }

    #[test]
    fn task_items_honor_xhtml() {
        let mut renderer = HtmlRenderer::new(RendererFlags::XHTML).unwrap();
        let item = Block::Li(ListItemDetail {
            task: Some(TaskMark {
                mark: 'X',
                offset: 3,
            }),
        });
        renderer.enter_block(&item).unwrap();
        renderer.leave_block(&item).unwrap();
        assert_eq!(
            renderer.as_str(),
            "<li class=\"task-list-item\"><input type=\"checkbox\" \
             class=\"task-list-item-checkbox\" disabled checked /></li>\n"
        );
    }

    #[test]
    fn url_escape_keeps_safe_bytes() {
        assert_eq!(url_escape("/a-b_c.d?x=1#y"), "/a-b_c.d?x=1#y");
        assert_eq!(url_escape("a b"), "a%20b");
        assert_eq!(url_escape("<&>"), "%3C&amp;%3E");
    }
}
