//! # Parse sessions
//!
//! A [`ParseSession`] drives one parse: it checks the handler, runs the
//! tokenizer with a [`Dispatcher`] as its sink and folds the three ways a
//! run can end (tokenizer status, handler cancellation, handler failure)
//! into one result.
//!
//! A session is single use. It moves `Idle -> Running` and then to exactly
//! one of `Completed`, `Cancelled` or `Failed`; a second `parse` call is an
//! argument error. Independent sessions share nothing and can run on
//! different threads at the same time.

use log::{debug, warn};

use crate::buffer::DynamicBuffer;
use crate::dispatch::{Dispatcher, Halt, Handler};
use crate::dom::{DomBuilder, DomError, Node};
use crate::error::Error;
use crate::flags::{ParserFlags, RendererFlags};
use crate::html::HtmlRenderer;
use crate::tokenizer::{PulldownTokenizer, RunStatus, Tokenizer, TokenizerFault};

const UTF8_BOM: char = '\u{feff}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

/// How a successful parse ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The whole document was delivered.
    Finished,
    /// A handler answered [`Flow::Stop`](crate::Flow::Stop).
    Cancelled,
}

#[derive(Debug)]
pub struct ParseSession<T = PulldownTokenizer> {
    flags: ParserFlags,
    tokenizer: T,
    state: State,
}

impl ParseSession {
    pub fn new(flags: ParserFlags) -> Self {
        Self::with_tokenizer(flags, PulldownTokenizer)
    }
}

impl<T: Tokenizer> ParseSession<T> {
    pub fn with_tokenizer(flags: ParserFlags, tokenizer: T) -> Self {
        Self {
            flags,
            tokenizer,
            state: State::Idle,
        }
    }

    pub fn flags(&self) -> ParserFlags {
        self.flags
    }

    pub fn state(&self) -> State {
        self.state
    }

    fn transition(&mut self, to: State) {
        debug!("Parse session {:?} -> {:?}", self.state, to);
        self.state = to;
    }

    /// Parse `input`, delivering every event to `handler`.
    ///
    /// Handler errors come back unchanged as [`Error::Handler`]. When both a
    /// handler error and a tokenizer status are available, the handler error
    /// wins.
    pub fn parse<H: Handler + ?Sized>(
        &mut self,
        input: &str,
        handler: &mut H,
    ) -> Result<Completion, Error<H::Error>> {
        if self.state != State::Idle {
            return Err(Error::InvalidArgument(format!(
                "parse session already used (state {:?})",
                self.state
            )));
        }
        handler.check().map_err(Error::InvalidArgument)?;

        self.transition(State::Running);
        let mut dispatcher = Dispatcher::new(handler);
        let status = self.tokenizer.tokenize(input, self.flags, &mut dispatcher);
        let delivered = dispatcher.delivered();
        let halt = dispatcher.into_halt();
        debug!("Tokenizer delivered {delivered} events");

        let result = match (halt, status) {
            (Some(Halt::Failed(e)), _) => Err(Error::Handler(e)),
            (Some(Halt::Cancelled), _) => Ok(Completion::Cancelled),
            (None, Ok(RunStatus::Finished)) => Ok(Completion::Finished),
            (None, Ok(RunStatus::Aborted)) => Err(Error::Parse(TokenizerFault::Other(
                "tokenizer stopped without being asked to".to_string(),
            ))),
            (None, Err(fault)) => {
                warn!("Tokenizer fault: {fault}");
                Err(Error::Parse(fault))
            }
        };

        self.transition(match &result {
            Ok(Completion::Finished) => State::Completed,
            Ok(Completion::Cancelled) => State::Cancelled,
            Err(_) => State::Failed,
        });
        result
    }

    /// Parse `input` and render it into a fresh HTML buffer.
    pub fn render_html(
        &mut self,
        input: &str,
        renderer_flags: RendererFlags,
    ) -> Result<DynamicBuffer, Error> {
        let input = if renderer_flags.contains(RendererFlags::SKIP_UTF8_BOM) {
            input.strip_prefix(UTF8_BOM).unwrap_or(input)
        } else {
            input
        };

        let mut renderer = HtmlRenderer::new(renderer_flags)?;
        self.parse(input, &mut renderer).map_err(|e| match e {
            Error::Handler(resource) => Error::Resource(resource),
            Error::InvalidArgument(message) => Error::InvalidArgument(message),
            Error::Resource(resource) => Error::Resource(resource),
            Error::Parse(fault) => Error::Parse(fault),
        })?;
        Ok(renderer.into_buffer())
    }
}

/// Render `input` to an HTML string with the default tokenizer.
pub fn to_html(
    input: &str,
    parser_flags: ParserFlags,
    renderer_flags: RendererFlags,
) -> Result<String, Error> {
    let buffer = ParseSession::new(parser_flags).render_html(input, renderer_flags)?;
    Ok(buffer.into_string())
}

/// Parse `input` into a document tree rooted at the `Doc` block.
pub fn parse_dom(input: &str, flags: ParserFlags) -> Result<Node, Error<DomError>> {
    let mut builder = DomBuilder::new();
    ParseSession::new(flags).parse(input, &mut builder)?;
    builder
        .into_root()
        .ok_or(Error::Handler(DomError::Unbalanced))
}
