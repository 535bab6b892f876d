//! Error types for the compextract library.

use std::io;
use thiserror::Error;

/// Result type alias for compextract operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while processing a document.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No document path or URL was supplied.
    #[error("Document path is missing")]
    MissingDocument,

    /// The file format is not a supported document or image type.
    #[error("Unknown file format: not a PDF or supported image")]
    UnknownFormat,

    /// The document analysis (OCR) service failed.
    #[error("Document analysis failed: {0}")]
    Analysis(String),

    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(String),

    /// A service returned a status that should be retried later.
    #[error("Service unavailable ({status}): {message}")]
    ServiceUnavailable {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// A service call did not complete within its timeout.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The language model failed for a reason other than content filtering.
    #[error("LLM error: {0}")]
    Llm(String),

    /// The language model answered with a shape that does not match the schema.
    #[error("Response does not match schema '{schema}': {message}")]
    Schema {
        /// Name of the expected response schema
        schema: &'static str,
        /// Deserialization failure
        message: String,
    },

    /// A persisted checkpoint could not be read back.
    #[error("Malformed checkpoint: {0}")]
    Checkpoint(String),

    /// The extraction state machine received an event it cannot handle.
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// A table refers to a page the document does not have.
    #[error("Page {0} is out of range (last page is {1})")]
    PageOutOfRange(u32, u32),

    /// Page rasterization failed.
    #[error("Rendering error: {0}")]
    Render(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the failure is transient and the request may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Timeout(_) | Error::Http(_) | Error::ServiceUnavailable { .. }
        )
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout(err.to_string())
        } else {
            Error::Http(err.to_string())
        }
    }
}
