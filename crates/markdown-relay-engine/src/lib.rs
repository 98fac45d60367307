//! Typed event bridge between a streaming Markdown tokenizer and the code
//! that consumes its output.
//!
//! A [`ParseSession`] runs the tokenizer and hands every enter/leave/text
//! event to a [`Handler`] as a typed record. Attributes (link targets, code
//! fence info strings, ...) arrive already split into [`Substring`]s, with
//! entity references kept apart so the consumer decides how to decode them.
//!
//! Two handlers ship with the crate: [`HtmlRenderer`], which writes HTML
//! into a [`DynamicBuffer`], and [`DomBuilder`], which collects a [`Node`]
//! tree.
//!
//! ```
//! use markdown_relay_engine::{to_html, ParserFlags, RendererFlags};
//!
//! let html = to_html("# Hi\n\n*world*\n", ParserFlags::empty(), RendererFlags::empty()).unwrap();
//! assert_eq!(html, "<h1>Hi</h1>\n<p><em>world</em></p>\n");
//! ```

pub mod attribute;
pub mod buffer;
pub mod dispatch;
pub mod dom;
pub mod entity;
pub mod error;
pub mod event;
pub mod flags;
pub mod html;
pub mod session;
pub mod tokenizer;

// Re-export key types for easier usage
pub use attribute::{Attribute, RawAttribute, Substring};
pub use buffer::{DynamicBuffer, ResourceError};
pub use dispatch::{Callbacks, DispatchOutcome, Dispatcher, Flow, Halt, Handler};
pub use dom::{DomBuilder, DomError, Node};
pub use entity::resolve_entity;
pub use error::Error;
pub use event::*;
pub use flags::{ParserFlags, RendererFlags};
pub use html::HtmlRenderer;
pub use session::{Completion, ParseSession, State, parse_dom, to_html};
pub use tokenizer::{PulldownTokenizer, RunStatus, Sink, Tokenizer, TokenizerFault};
