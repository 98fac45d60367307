use super::{Flow, Handler};
use crate::event::{Block, Span, TextType};

type BlockFn<'a, E> = Box<dyn FnMut(&Block) -> Result<Flow, E> + 'a>;
type SpanFn<'a, E> = Box<dyn FnMut(&Span) -> Result<Flow, E> + 'a>;
type TextFn<'a, E> = Box<dyn FnMut(TextType, &str) -> Result<Flow, E> + 'a>;

/// A handler assembled from five closures, one per event category.
///
/// Every slot must be filled before parsing; a session rejects a table
/// with empty slots with an argument error before the tokenizer starts.
///
/// ```
/// use markdown_relay_engine::{Callbacks, Flow, ParseSession, ParserFlags};
///
/// let mut words = Vec::new();
/// let mut callbacks = Callbacks::<std::convert::Infallible>::new()
///     .on_enter_block(|_| Ok(Flow::Continue))
///     .on_leave_block(|_| Ok(Flow::Continue))
///     .on_enter_span(|_| Ok(Flow::Continue))
///     .on_leave_span(|_| Ok(Flow::Continue))
///     .on_text(|_, text| {
///         words.push(text.to_string());
///         Ok(Flow::Continue)
///     });
///
/// ParseSession::new(ParserFlags::empty())
///     .parse("hello *there*", &mut callbacks)
///     .unwrap();
/// drop(callbacks);
/// assert_eq!(words, ["hello ", "there"]);
/// ```
pub struct Callbacks<'a, E> {
    enter_block: Option<BlockFn<'a, E>>,
    leave_block: Option<BlockFn<'a, E>>,
    enter_span: Option<SpanFn<'a, E>>,
    leave_span: Option<SpanFn<'a, E>>,
    text: Option<TextFn<'a, E>>,
}

impl<E> Default for Callbacks<'_, E> {
    fn default() -> Self {
        Self {
            enter_block: None,
            leave_block: None,
            enter_span: None,
            leave_span: None,
            text: None,
        }
    }
}

impl<'a, E> Callbacks<'a, E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_enter_block(mut self, f: impl FnMut(&Block) -> Result<Flow, E> + 'a) -> Self {
        self.enter_block = Some(Box::new(f));
        self
    }

    pub fn on_leave_block(mut self, f: impl FnMut(&Block) -> Result<Flow, E> + 'a) -> Self {
        self.leave_block = Some(Box::new(f));
        self
    }

    pub fn on_enter_span(mut self, f: impl FnMut(&Span) -> Result<Flow, E> + 'a) -> Self {
        self.enter_span = Some(Box::new(f));
        self
    }

    pub fn on_leave_span(mut self, f: impl FnMut(&Span) -> Result<Flow, E> + 'a) -> Self {
        self.leave_span = Some(Box::new(f));
        self
    }

    pub fn on_text(mut self, f: impl FnMut(TextType, &str) -> Result<Flow, E> + 'a) -> Self {
        self.text = Some(Box::new(f));
        self
    }

    /// Names of the slots that have no callback.
    pub fn missing(&self) -> Vec<&'static str> {
        [
            ("enter_block", self.enter_block.is_none()),
            ("leave_block", self.leave_block.is_none()),
            ("enter_span", self.enter_span.is_none()),
            ("leave_span", self.leave_span.is_none()),
            ("text", self.text.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, missing)| missing.then_some(name))
        .collect()
    }
}

impl<E> Handler for Callbacks<'_, E> {
    type Error = E;

    fn check(&self) -> Result<(), String> {
        let missing = self.missing();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(format!("missing callback: {}", missing.join(", ")))
        }
    }

    fn enter_block(&mut self, block: &Block) -> Result<Flow, E> {
        self.enter_block.as_mut().map_or(Ok(Flow::Continue), |f| f(block))
    }

    fn leave_block(&mut self, block: &Block) -> Result<Flow, E> {
        self.leave_block.as_mut().map_or(Ok(Flow::Continue), |f| f(block))
    }

    fn enter_span(&mut self, span: &Span) -> Result<Flow, E> {
        self.enter_span.as_mut().map_or(Ok(Flow::Continue), |f| f(span))
    }

    fn leave_span(&mut self, span: &Span) -> Result<Flow, E> {
        self.leave_span.as_mut().map_or(Ok(Flow::Continue), |f| f(span))
    }

    fn text(&mut self, kind: TextType, text: &str) -> Result<Flow, E> {
        self.text.as_mut().map_or(Ok(Flow::Continue), |f| f(kind, text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    #[test]
    fn empty_table_reports_every_slot() {
        let callbacks = Callbacks::<Infallible>::new();
        assert_eq!(
            callbacks.check(),
            Err(
                "missing callback: enter_block, leave_block, enter_span, leave_span, text"
                    .to_string()
            )
        );
    }

    #[test]
    fn full_table_passes_the_check() {
        let callbacks = Callbacks::<Infallible>::new()
            .on_enter_block(|_| Ok(Flow::Continue))
            .on_leave_block(|_| Ok(Flow::Continue))
            .on_enter_span(|_| Ok(Flow::Continue))
            .on_leave_span(|_| Ok(Flow::Continue))
            .on_text(|_, _| Ok(Flow::Continue));
        assert_eq!(callbacks.check(), Ok(()));
        assert!(callbacks.missing().is_empty());
    }

    #[test]
    fn closures_see_their_events() {
        let mut texts = Vec::new();
        {
            let mut callbacks = Callbacks::<Infallible>::new().on_text(|kind, text| {
                texts.push((kind, text.to_string()));
                Ok(Flow::Stop)
            });
            assert_eq!(callbacks.text(TextType::Code, "x"), Ok(Flow::Stop));
            assert_eq!(callbacks.check(), Err("missing callback: enter_block, leave_block, enter_span, leave_span".to_string()));
        }
        assert_eq!(texts, vec![(TextType::Code, "x".to_string())]);
    }
}
