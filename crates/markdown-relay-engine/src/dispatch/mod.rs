//! # Event dispatch
//!
//! [`Dispatcher`] sits between a tokenizer and a [`Handler`]. For every raw
//! event it builds the typed record (decomposing attributes while their
//! memory is still valid), calls the matching handler method and turns the
//! answer into a [`DispatchOutcome`].
//!
//! Handlers answer with `Ok(Flow::Continue)`, `Ok(Flow::Stop)` to cancel
//! the parse without error, or `Err(e)` to abort it with their own error.
//! Stopping and failing are separate channels, so a handler never has to
//! encode "stop, all is well" as an error value.

mod callbacks;

use std::ops::ControlFlow;

use log::trace;

pub use callbacks::Callbacks;

use crate::event::{Block, Event, RawEvent, Span, TextType};
use crate::tokenizer::Sink;

/// A handler's answer to one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flow {
    #[default]
    Continue,
    /// Cancel the parse. The parse still counts as successful.
    Stop,
}

/// Receives the typed events of a parse.
///
/// Every method defaults to ignoring its event, so an implementation only
/// overrides the ones it cares about.
pub trait Handler {
    type Error;

    /// Validate the handler before any event is delivered. An `Err` aborts
    /// the parse with [`crate::Error::InvalidArgument`].
    fn check(&self) -> Result<(), String> {
        Ok(())
    }

    fn enter_block(&mut self, _block: &Block) -> Result<Flow, Self::Error> {
        Ok(Flow::Continue)
    }

    fn leave_block(&mut self, _block: &Block) -> Result<Flow, Self::Error> {
        Ok(Flow::Continue)
    }

    fn enter_span(&mut self, _span: &Span) -> Result<Flow, Self::Error> {
        Ok(Flow::Continue)
    }

    fn leave_span(&mut self, _span: &Span) -> Result<Flow, Self::Error> {
        Ok(Flow::Continue)
    }

    fn text(&mut self, _kind: TextType, _text: &str) -> Result<Flow, Self::Error> {
        Ok(Flow::Continue)
    }
}

impl<H: Handler + ?Sized> Handler for &mut H {
    type Error = H::Error;

    fn check(&self) -> Result<(), String> {
        (**self).check()
    }

    fn enter_block(&mut self, block: &Block) -> Result<Flow, Self::Error> {
        (**self).enter_block(block)
    }

    fn leave_block(&mut self, block: &Block) -> Result<Flow, Self::Error> {
        (**self).leave_block(block)
    }

    fn enter_span(&mut self, span: &Span) -> Result<Flow, Self::Error> {
        (**self).enter_span(span)
    }

    fn leave_span(&mut self, span: &Span) -> Result<Flow, Self::Error> {
        (**self).leave_span(span)
    }

    fn text(&mut self, kind: TextType, text: &str) -> Result<Flow, Self::Error> {
        (**self).text(kind, text)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum DispatchOutcome<E> {
    Continue,
    Cancel,
    Fail(E),
}

/// Why a dispatcher stopped accepting events.
#[derive(Debug, PartialEq, Eq)]
pub enum Halt<E> {
    Cancelled,
    Failed(E),
}

pub struct Dispatcher<'h, H: Handler + ?Sized> {
    handler: &'h mut H,
    halted: bool,
    halt: Option<Halt<H::Error>>,
    delivered: usize,
}

impl<'h, H: Handler + ?Sized> Dispatcher<'h, H> {
    pub fn new(handler: &'h mut H) -> Self {
        Self {
            handler,
            halted: false,
            halt: None,
            delivered: 0,
        }
    }

    /// Deliver one event.
    ///
    /// Once an event has been answered with `Cancel` or `Fail`, every later
    /// event is refused with `Cancel` and never reaches the handler.
    pub fn dispatch(&mut self, raw: RawEvent<'_>) -> DispatchOutcome<H::Error> {
        if self.halted {
            return DispatchOutcome::Cancel;
        }

        let event = Event::from_raw(raw);
        trace!("Dispatching {event:?}");
        let answer = match &event {
            Event::EnterBlock(block) => self.handler.enter_block(block),
            Event::LeaveBlock(block) => self.handler.leave_block(block),
            Event::EnterSpan(span) => self.handler.enter_span(span),
            Event::LeaveSpan(span) => self.handler.leave_span(span),
            Event::Text(kind, text) => self.handler.text(*kind, text),
        };
        self.delivered += 1;

        match answer {
            Ok(Flow::Continue) => DispatchOutcome::Continue,
            Ok(Flow::Stop) => {
                self.halted = true;
                DispatchOutcome::Cancel
            }
            Err(e) => {
                self.halted = true;
                DispatchOutcome::Fail(e)
            }
        }
    }

    /// Number of events the handler has seen.
    pub fn delivered(&self) -> usize {
        self.delivered
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// The reason the dispatcher stopped, if it did while acting as a
    /// [`Sink`].
    pub fn into_halt(self) -> Option<Halt<H::Error>> {
        self.halt
    }
}

impl<H: Handler + ?Sized> Sink for Dispatcher<'_, H> {
    fn accept(&mut self, event: RawEvent<'_>) -> ControlFlow<()> {
        match self.dispatch(event) {
            DispatchOutcome::Continue => ControlFlow::Continue(()),
            DispatchOutcome::Cancel => {
                if self.halt.is_none() {
                    self.halt = Some(Halt::Cancelled);
                }
                ControlFlow::Break(())
            }
            DispatchOutcome::Fail(e) => {
                self.halt = Some(Halt::Failed(e));
                ControlFlow::Break(())
            }
        }
    }
}
