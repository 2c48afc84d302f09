use reqwest::{Request, StatusCode};

use crate::error::GenerationError;

pub mod gemini;

/// An `HTTPProvider` knows one vendor's streaming wire format.
///
/// It turns a prompt into an HTTP request, turns each decoded stream event
/// into an optional text fragment, and classifies non-success responses.
pub trait HTTPProvider: Send + Sync {
    /// Builds the streaming request for a prompt
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::MissingConfiguration`] if the provider is not
    /// usable (no API key, bad base URL).
    fn accept(&self, prompt: &str) -> Result<Request, GenerationError>;

    /// Parses the data payload of one stream event
    ///
    /// `Ok(None)` means the event carried no text (metadata, keep-alive).
    ///
    /// # Errors
    ///
    /// Returns a terminal error when the event reports a failure, such as a
    /// safety block, or when the payload cannot be decoded.
    fn parse_event(&self, data: &str) -> Result<Option<String>, GenerationError>;

    /// Maps a non-success HTTP status and body to a classified error
    fn classify_failure(&self, status: StatusCode, body: &str) -> GenerationError;
}
