//! # Document tree
//!
//! [`DomBuilder`] is a handler that turns the event stream into an owned
//! tree of [`Node`]s. Building the tree is slower than handling events as
//! they come, but some jobs (restructuring a document, walking it more than
//! once) are much easier with the whole tree at hand.
//!
//! A tree can be replayed into any other handler with [`Node::replay`], so
//! it can still be rendered to HTML afterwards.

use serde::Serialize;

use crate::buffer::ResourceError;
use crate::dispatch::{Flow, Handler};
use crate::event::{Block, Span, TextType};
use crate::flags::RendererFlags;
use crate::html::HtmlRenderer;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Node {
    Block { block: Block, children: Vec<Node> },
    Span { span: Span, children: Vec<Node> },
    Text { kind: TextType, text: String },
}

impl Node {
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Block { children, .. } | Node::Span { children, .. } => children,
            Node::Text { .. } => &[],
        }
    }

    /// Concatenated text of this node and everything below it.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Node::Text { text, .. } => out.push_str(text),
            _ => self.children().iter().for_each(|child| child.collect_text(out)),
        }
    }

    /// Feed this subtree to `handler` as the event stream it was built from.
    pub fn replay<H: Handler + ?Sized>(&self, handler: &mut H) -> Result<Flow, H::Error> {
        let (enter, leave) = match self {
            Node::Text { kind, text } => return handler.text(*kind, text),
            Node::Block { block, .. } => (handler.enter_block(block)?, Some(block)),
            Node::Span { span, .. } => (handler.enter_span(span)?, None),
        };
        if enter == Flow::Stop {
            return Ok(Flow::Stop);
        }

        for child in self.children() {
            if child.replay(handler)? == Flow::Stop {
                return Ok(Flow::Stop);
            }
        }

        match (self, leave) {
            (_, Some(block)) => handler.leave_block(block),
            (Node::Span { span, .. }, None) => handler.leave_span(span),
            _ => Ok(Flow::Continue),
        }
    }

    /// Render this subtree as HTML.
    pub fn to_html(&self, flags: RendererFlags) -> Result<String, ResourceError> {
        let mut renderer = HtmlRenderer::new(flags)?;
        self.replay(&mut renderer)?;
        Ok(renderer.into_buffer().into_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    #[error("Leave event with no open node")]
    Unbalanced,
    #[error("Text event outside any block")]
    OrphanText,
    #[error("Second root block opened")]
    MultipleRoots,
}

/// Builds a [`Node`] tree from events.
#[derive(Debug, Default)]
pub struct DomBuilder {
    stack: Vec<Node>,
    root: Option<Node>,
}

impl DomBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The finished tree, once the root block has been closed.
    pub fn into_root(self) -> Option<Node> {
        self.root
    }

    fn open(&mut self, node: Node) -> Result<Flow, DomError> {
        if self.stack.is_empty() && self.root.is_some() {
            return Err(DomError::MultipleRoots);
        }
        self.stack.push(node);
        Ok(Flow::Continue)
    }

    fn close(&mut self) -> Result<Flow, DomError> {
        let node = self.stack.pop().ok_or(DomError::Unbalanced)?;
        match self.stack.last_mut() {
            Some(Node::Block { children, .. } | Node::Span { children, .. }) => children.push(node),
            Some(Node::Text { .. }) => return Err(DomError::Unbalanced),
            None => self.root = Some(node),
        }
        Ok(Flow::Continue)
    }
}

impl Handler for DomBuilder {
    type Error = DomError;

    fn enter_block(&mut self, block: &Block) -> Result<Flow, DomError> {
        self.open(Node::Block {
            block: block.clone(),
            children: Vec::new(),
        })
    }

    fn leave_block(&mut self, _block: &Block) -> Result<Flow, DomError> {
        self.close()
    }

    fn enter_span(&mut self, span: &Span) -> Result<Flow, DomError> {
        self.open(Node::Span {
            span: span.clone(),
            children: Vec::new(),
        })
    }

    fn leave_span(&mut self, _span: &Span) -> Result<Flow, DomError> {
        self.close()
    }

    fn text(&mut self, kind: TextType, text: &str) -> Result<Flow, DomError> {
        match self.stack.last_mut() {
            Some(Node::Block { children, .. } | Node::Span { children, .. }) => {
                children.push(Node::Text {
                    kind,
                    text: text.to_string(),
                });
                Ok(Flow::Continue)
            }
            _ => Err(DomError::OrphanText),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::HeadingDetail;
    use crate::flags::ParserFlags;
    use crate::parse_dom;
    use pretty_assertions::assert_eq;

    fn text(kind: TextType, text: &str) -> Node {
        Node::Text {
            kind,
            text: text.to_string(),
        }
    }

    #[test]
    fn builds_the_document_tree() {
        let root = parse_dom("# Hi\n\n*world*\n", ParserFlags::empty()).unwrap();

        assert_eq!(
            root,
            Node::Block {
                block: Block::Doc,
                children: vec![
                    Node::Block {
                        block: Block::H(HeadingDetail { level: 1 }),
                        children: vec![text(TextType::Normal, "Hi")],
                    },
                    Node::Block {
                        block: Block::P,
                        children: vec![Node::Span {
                            span: Span::Em,
                            children: vec![text(TextType::Normal, "world")],
                        }],
                    },
                ],
            }
        );
        assert_eq!(root.text_content(), "Hiworld");
    }

    #[test]
    fn leave_without_enter_is_unbalanced() {
        let mut builder = DomBuilder::new();
        assert_eq!(builder.leave_block(&Block::P), Err(DomError::Unbalanced));
    }

    #[test]
    fn text_needs_an_open_node() {
        let mut builder = DomBuilder::new();
        assert_eq!(
            builder.text(TextType::Normal, "loose"),
            Err(DomError::OrphanText)
        );
    }

    #[test]
    fn only_one_root() {
        let mut builder = DomBuilder::new();
        builder.enter_block(&Block::Doc).unwrap();
        builder.leave_block(&Block::Doc).unwrap();
        assert_eq!(builder.enter_block(&Block::Doc), Err(DomError::MultipleRoots));
    }

    #[test]
    fn replayed_tree_renders_like_the_source() {
        let input = "> quote with `code`\n\n1. one\n2. two\n";
        let root = parse_dom(input, ParserFlags::empty()).unwrap();
        let direct = crate::to_html(input, ParserFlags::empty(), RendererFlags::empty()).unwrap();

        assert_eq!(root.to_html(RendererFlags::empty()).unwrap(), direct);
    }

    #[test]
    fn serializes_with_typed_records() {
        let node = Node::Block {
            block: Block::H(HeadingDetail { level: 2 }),
            children: vec![text(TextType::Normal, "x")],
        };
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "Block": {
                    "block": {"type": "H", "level": 2},
                    "children": [{"Text": {"kind": "Normal", "text": "x"}}]
                }
            })
        );
    }
}
