use std::convert::Infallible;

use crate::buffer::ResourceError;
use crate::tokenizer::TokenizerFault;

/// Everything a parse can fail with.
///
/// `E` is the error type of the handler driving the parse. Rendering to HTML
/// runs no user code, so it uses the default `Infallible`.
///
/// Cancellation is not an error: a handler that stops the parse early gets
/// `Ok(Completion::Cancelled)` back from the session.
#[derive(Debug, thiserror::Error)]
pub enum Error<E = Infallible> {
    /// The call itself was malformed, e.g. a callback slot was left empty
    /// or the session was already used. Raised before tokenizing starts.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error(
        "Tokenizer failure: {0} (markdown has no invalid syntax, so this is a fault in the tokenizer, not in the input)"
    )]
    Parse(#[from] TokenizerFault),
    /// A handler's own error, passed through unchanged.
    #[error(transparent)]
    Handler(E),
}

impl<E> Error<E> {
    pub fn is_handler(&self) -> bool {
        matches!(self, Error::Handler(_))
    }

    pub fn into_handler(self) -> Option<E> {
        match self {
            Error::Handler(e) => Some(e),
            _ => None,
        }
    }

    /// Convert the handler error type, keeping every other variant.
    pub fn map_handler<F>(self, f: impl FnOnce(E) -> F) -> Error<F> {
        match self {
            Error::InvalidArgument(message) => Error::InvalidArgument(message),
            Error::Resource(e) => Error::Resource(e),
            Error::Parse(e) => Error::Parse(e),
            Error::Handler(e) => Error::Handler(f(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("handler said no")]
    struct Refusal;

    #[test]
    fn handler_errors_display_unchanged() {
        let error: Error<Refusal> = Error::Handler(Refusal);
        assert_eq!(error.to_string(), "handler said no");
        assert!(error.is_handler());
    }

    #[test]
    fn parse_errors_explain_themselves() {
        let error: Error = TokenizerFault::Other("refcount".to_string()).into();
        let message = error.to_string();
        assert!(message.contains("refcount"));
        assert!(message.contains("no invalid syntax"));
    }

    #[test]
    fn map_handler_keeps_other_variants() {
        let error: Error<Refusal> = Error::InvalidArgument("missing".to_string());
        let mapped: Error<String> = error.map_handler(|e| e.to_string());
        assert!(matches!(mapped, Error::InvalidArgument(m) if m == "missing"));

        let error: Error<Refusal> = Error::Handler(Refusal);
        assert_eq!(
            error.map_handler(|e| e.to_string()).into_handler().as_deref(),
            Some("handler said no")
        );
    }
}
