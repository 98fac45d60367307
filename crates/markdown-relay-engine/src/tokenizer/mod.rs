//! # Tokenizer contract
//!
//! A tokenizer turns Markdown source into the strictly nested
//! enter/leave/text event stream and pushes every event into a [`Sink`].
//! The sink answers each event with [`ControlFlow`]; on `Break` the
//! tokenizer stops at once and reports [`RunStatus::Aborted`].
//!
//! [`PulldownTokenizer`] is the implementation used by default.

mod autolink;
mod pulldown;

use std::ops::ControlFlow;

pub use pulldown::PulldownTokenizer;

use crate::event::RawEvent;
use crate::flags::ParserFlags;

/// Receives events from a tokenizer, one call per event.
pub trait Sink {
    fn accept(&mut self, event: RawEvent<'_>) -> ControlFlow<()>;
}

impl<F> Sink for F
where
    F: FnMut(RawEvent<'_>) -> ControlFlow<()>,
{
    fn accept(&mut self, event: RawEvent<'_>) -> ControlFlow<()> {
        self(event)
    }
}

/// How a tokenizer run ended, when it did not fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every event was delivered.
    Finished,
    /// The sink asked to stop.
    Aborted,
}

/// An internal tokenizer failure. Markdown has no invalid syntax, so these
/// point at a fault in the tokenizer rather than at the input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenizerFault {
    #[error("Input of {0} bytes exceeds the tokenizer limit")]
    InputTooLarge(usize),
    #[error("Unbalanced event stream: {0}")]
    Unbalanced(String),
    #[error("Malformed attribute: {0}")]
    MalformedAttribute(String),
    #[error("{0}")]
    Other(String),
}

pub trait Tokenizer {
    fn tokenize(
        &self,
        input: &str,
        flags: ParserFlags,
        sink: &mut dyn Sink,
    ) -> Result<RunStatus, TokenizerFault>;
}

impl<T: Tokenizer + ?Sized> Tokenizer for &T {
    fn tokenize(
        &self,
        input: &str,
        flags: ParserFlags,
        sink: &mut dyn Sink,
    ) -> Result<RunStatus, TokenizerFault> {
        (**self).tokenize(input, flags, sink)
    }
}
