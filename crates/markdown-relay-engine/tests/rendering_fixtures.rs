use markdown_relay_engine::{
    Block, Flow, Handler, ParseSession, ParserFlags, RendererFlags, Span, TextType, to_html,
};
use pretty_assertions::assert_eq;

#[test]
fn fixture_heading_paragraph() {
    assert_fixture("basics/heading_paragraph");
}

#[test]
fn fixture_quote_list_rule() {
    assert_fixture("blocks/quote_list_rule");
}

#[test]
fn fixture_fences() {
    assert_fixture("code/fences");
}

#[test]
fn fixture_links_images() {
    assert_fixture("inline/links_images");
}

fn assert_fixture(name: &str) {
    let read = |ext: &str| {
        std::fs::read_to_string(format!(
            "{}/tests/fixtures/{name}.{ext}",
            env!("CARGO_MANIFEST_DIR")
        ))
        .unwrap()
    };
    let md = read("md");

    assert_well_nested(&md);

    let html = to_html(&md, ParserFlags::DIALECT_GITHUB, RendererFlags::empty()).unwrap();
    assert_eq!(html, read("html"));
}

/// Tracks open blocks and spans and fails on any leave that does not match
/// the innermost open element.
#[derive(Default)]
struct NestingCheck {
    open: Vec<String>,
    max_depth: usize,
    closed_root: bool,
}

impl Handler for NestingCheck {
    type Error = String;

    fn enter_block(&mut self, block: &Block) -> Result<Flow, String> {
        if self.closed_root {
            return Err("event after the document closed".to_string());
        }
        if self.open.is_empty() && *block != Block::Doc {
            return Err(format!("first block is {:?}", block.kind()));
        }
        self.open.push(format!("block {:?}", block.kind()));
        self.max_depth = self.max_depth.max(self.open.len());
        Ok(Flow::Continue)
    }

    fn leave_block(&mut self, block: &Block) -> Result<Flow, String> {
        self.close(format!("block {:?}", block.kind()))?;
        if self.open.is_empty() {
            self.closed_root = true;
        }
        Ok(Flow::Continue)
    }

    fn enter_span(&mut self, span: &Span) -> Result<Flow, String> {
        self.open.push(format!("span {:?}", span.kind()));
        self.max_depth = self.max_depth.max(self.open.len());
        Ok(Flow::Continue)
    }

    fn leave_span(&mut self, span: &Span) -> Result<Flow, String> {
        self.close(format!("span {:?}", span.kind()))?;
        Ok(Flow::Continue)
    }

    fn text(&mut self, _kind: TextType, _text: &str) -> Result<Flow, String> {
        if self.open.is_empty() {
            return Err("text outside the document".to_string());
        }
        Ok(Flow::Continue)
    }
}

impl NestingCheck {
    fn close(&mut self, expected: String) -> Result<(), String> {
        match self.open.pop() {
            Some(top) if top == expected => Ok(()),
            Some(top) => Err(format!("closed {expected} while {top} was open")),
            None => Err(format!("closed {expected} with nothing open")),
        }
    }
}

fn assert_well_nested(md: &str) {
    let mut check = NestingCheck::default();
    ParseSession::new(ParserFlags::DIALECT_GITHUB)
        .parse(md, &mut check)
        .unwrap();
    assert!(check.open.is_empty(), "left open: {:?}", check.open);
    assert!(check.closed_root);
}

/// Every input, however odd, yields a balanced stream rooted at `Doc`.
#[test]
fn streams_are_well_nested() {
    let inputs = [
        "",
        "plain",
        "> > deep\n> quote",
        "- a\n  - b\n    - c\n\n  d\n",
        "| a |\n|---|\n| *b* |\n| `c` |\n",
        "***strong em*** ~~del~~ [l](u) ![i](s) <span>x</span>",
        "<div>\nraw\n</div>\n\ntext",
        "- [ ] task\n- [x] done\n",
        "```\nunterminated",
        "\0 and &amp; and &#0;",
        "$x$ and $$y$$ and [[wiki]]",
        "see https://a.io/?x&amp;y and [l](/x&amp;y \"t\") and ![i](<s&lt;>)",
        "- <div>\n- b\n\n  <pre>\n\n  </pre>\n",
    ];
    let flags = ParserFlags::DIALECT_GITHUB
        | ParserFlags::LATEX_MATH_SPANS
        | ParserFlags::WIKILINKS
        | ParserFlags::UNDERLINE;

    for flags in [flags, flags | ParserFlags::NO_HTML] {
        for input in inputs {
            let mut check = NestingCheck::default();
            ParseSession::new(flags)
                .parse(input, &mut check)
                .unwrap_or_else(|e| panic!("{input:?}: {e:?}"));
            assert!(check.closed_root, "{input:?} never closed the document");
            assert!(check.open.is_empty(), "{input:?} left open: {:?}", check.open);
        }
    }
}
