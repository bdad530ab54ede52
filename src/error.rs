//! Error types for docfetch
//!
//! This module provides the error taxonomy for the library:
//! - Per-item batch failures ([`FetchError`]), each recoverable when the caller
//!   supplies an error handler
//! - Transport-level failures ([`TransportError`]) reported by a [`Transport`](crate::transport::Transport)
//! - Parser rejections ([`ParseError`]) and invalid selectors ([`SelectorError`])
//! - Context attachment refusals ([`AttachError`]) and deadline arming
//!   failures ([`ArmError`])
//! - Item normalization failures ([`ItemError`])
//! - The crate-level [`Error`] used by constructors and configuration

use thiserror::Error;
use url::Url;

/// Result type alias for docfetch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error raised by a caller's document processor
///
/// Processors may fail with any error type; the batch routes it through the
/// error handler as [`FetchError::Processor`].
pub type ProcessorError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for docfetch
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "request_timeout")
        key: Option<String>,
    },

    /// A per-item failure surfaced outside of a batch
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Attaching a request to a cancellation context failed
    #[error("context error: {0}")]
    Attach(#[from] AttachError),

    /// Arming a context deadline failed
    #[error("context error: {0}")]
    Arm(#[from] ArmError),

    /// Item normalization failed
    #[error("item error: {0}")]
    Item(#[from] ItemError),

    /// Network error from the HTTP client
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Machine-readable error code
    pub fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Fetch(e) => e.error_code(),
            Error::Attach(AttachError::AlreadyExpired) => "already_expired",
            Error::Arm(ArmError::NoRuntime) => "no_runtime",
            Error::Item(_) => "item_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::Other(_) => "internal_error",
        }
    }
}

/// Failure of a single URL within a batch
///
/// Every variant is recoverable when the batch has an error handler. Without
/// one, the first `FetchError` stops the batch.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The input string is not a valid absolute http(s) URL
    #[error("Invalid URL {raw}")]
    InvalidUrl {
        /// The raw input as supplied by the caller
        raw: String,
        /// Why it was rejected
        reason: String,
    },

    /// The transport failed, timed out, or the request was aborted
    #[error("XMLHttpRequest experienced an error ({url}): {source}")]
    Transport {
        /// The URL that was requested
        url: Url,
        /// The transport failure
        #[source]
        source: TransportError,
    },

    /// The transport succeeded but returned no body
    #[error("request failed unexpectedly ({url}): empty response")]
    EmptyResponse {
        /// The URL that was requested
        url: Url,
    },

    /// The response could not be turned into a document
    #[error("could not parse document from {url}: {source}")]
    Parse {
        /// The URL that was requested
        url: Url,
        /// The parser's rejection
        #[source]
        source: ParseError,
    },

    /// The caller's document processor failed
    #[error("document processor failed for {url}: {source}")]
    Processor {
        /// The URL whose document was being processed
        url: Url,
        /// The error raised by the processor
        #[source]
        source: ProcessorError,
    },
}

impl FetchError {
    /// The parsed URL this failure belongs to, if the input parsed at all
    pub fn url(&self) -> Option<&Url> {
        match self {
            FetchError::InvalidUrl { .. } => None,
            FetchError::Transport { url, .. }
            | FetchError::EmptyResponse { url }
            | FetchError::Parse { url, .. }
            | FetchError::Processor { url, .. } => Some(url),
        }
    }

    /// Whether the request was aborted by an expiring context
    pub fn is_aborted(&self) -> bool {
        matches!(
            self,
            FetchError::Transport {
                source: TransportError::Aborted,
                ..
            }
        )
    }

    /// Machine-readable error code
    pub fn error_code(&self) -> &str {
        match self {
            FetchError::InvalidUrl { .. } => "invalid_url",
            FetchError::Transport { source, .. } => source.error_code(),
            FetchError::EmptyResponse { .. } => "empty_response",
            FetchError::Parse { .. } => "parse_error",
            FetchError::Processor { .. } => "processor_error",
        }
    }
}

/// Failure reported by the HTTP transport
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Could not connect to the remote host
    #[error("connection failed: {0}")]
    Connect(String),

    /// The transport's own timeout elapsed
    #[error("request timed out")]
    Timeout,

    /// The request was aborted before it completed
    #[error("request aborted")]
    Aborted,

    /// The server answered with a non-success status and the transport was
    /// configured to reject those
    #[error("HTTP status {0}")]
    Status(u16),

    /// The body exceeded the configured size limit
    #[error("response body exceeds {limit} bytes")]
    BodyTooLarge {
        /// The configured limit in bytes
        limit: u64,
    },

    /// Any other transport failure
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Machine-readable error code
    pub fn error_code(&self) -> &str {
        match self {
            TransportError::Connect(_) => "connect_failed",
            TransportError::Timeout => "timeout",
            TransportError::Aborted => "aborted",
            TransportError::Status(_) => "http_status",
            TransportError::BodyTooLarge { .. } => "body_too_large",
            TransportError::Other(_) => "transport_error",
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else {
            TransportError::Other(e.to_string())
        }
    }
}

/// The parser refused a response
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The response carried no body
    #[error("response body is empty")]
    EmptyBody,

    /// The response is not a document (e.g. an image or JSON payload)
    #[error("content type {content_type} is not a document")]
    NotADocument {
        /// The content type the server declared
        content_type: String,
    },
}

/// A CSS selector passed to a [`Document`](crate::document::Document) query is invalid
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid selector {selector:?}: {reason}")]
pub struct SelectorError {
    /// The selector as given
    pub selector: String,
    /// Why it was rejected
    pub reason: String,
}

/// Attaching a request to a [`CancellationContext`](crate::context::CancellationContext) failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AttachError {
    /// The context's deadline already fired; no further requests may be sent
    #[error("context deadline expired; no further requests allowed")]
    AlreadyExpired,
}

/// Arming a [`CancellationContext`](crate::context::CancellationContext) deadline failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ArmError {
    /// The context was created outside a Tokio runtime and `arm` was called
    /// outside one too, so there is nowhere to run the timer
    #[error("no Tokio runtime available to run the deadline timer")]
    NoRuntime,
}

/// Item normalization failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemError {
    /// Neither the item's type nor the fallback type exist in the schema
    #[error("item type {item_type} is unknown and fallback type {fallback} is not in the schema")]
    UnknownItemType {
        /// The item type the record declared
        item_type: String,
        /// The fallback type that was tried
        fallback: String,
    },

    /// A list-valued field was not a list
    #[error("field {field} must be an array")]
    NotAnArray {
        /// The offending field
        field: String,
    },
}
