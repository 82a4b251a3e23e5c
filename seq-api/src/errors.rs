//! Unified error types for the `seq-api` crate.
//!
//! Every failure surfaces as the single top-level [`Error`] enum (plus the
//! [`Result`] alias). Failures are grouped so callers can branch without string
//! matching:
//! - [`Error::Navigation`]: local contract violations (missing link, bad
//!   template parameters). Never sent over the wire.
//! - [`Error::Request`]: HTTP transport failures, non-success statuses and
//!   undecodable bodies.
//! - [`Error::Stream`]: WebSocket failures, abnormal closes and observer
//!   failures in broadcast streams.
//!
//! Use [`Error::status_code`] to ask "did the server answer with a status?".

use std::sync::Arc;

use reqwest::StatusCode;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Boxed error returned by stream observers and custom deserializers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// --- Build-Time Error ---

/// Errors that can occur while building a [`crate::SeqApiClient`].
#[derive(Debug, Error)]
pub enum BuildError {
    /// The server URL is not an absolute `http(s)` URL.
    #[error("Invalid server URL `{url}`: {reason}")]
    ServerUrl {
        /// The rejected input.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The API key cannot be sent as an HTTP header value.
    #[error("API key contains characters that are not valid in an HTTP header")]
    ApiKey,

    /// Failed to build the HTTP client (reqwest configuration).
    #[error("Failed to build the HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

// --- The Main Operational Error Enum ---

/// The crate's top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// The caller asked for a navigation the resource does not allow.
    #[error("Navigation error: {0}")]
    Navigation(#[from] NavigationError),

    /// HTTP request/response failed (transport, server status, JSON).
    #[error("Request failed: {0}")]
    Request(#[from] RequestError),

    /// WebSocket streaming failed.
    #[error("Stream failed: {0}")]
    Stream(#[from] StreamError),

    /// URL parsing failed while preparing a request.
    #[error("Failed to parse URL: {0}")]
    Parse(#[from] url::ParseError),

    /// Building the client failed.
    #[error("Client build failed: {0}")]
    Build(#[from] BuildError),

    /// The failure of a fetch that several callers were waiting on. Each of
    /// them receives the same underlying error.
    #[error(transparent)]
    Shared(Arc<Error>),
}

impl Error {
    /// HTTP status returned by the server, if the failure carries one.
    ///
    /// Covers plain HTTP calls and WebSocket handshakes the server rejected.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Error::Shared(inner) => inner.status_code(),
            Error::Request(RequestError::Server { status, .. }) => Some(*status),
            Error::Request(RequestError::Transport(e)) => e.status(),
            Error::Stream(StreamError::Socket(tungstenite::Error::Http(response))) => {
                StatusCode::from_u16(response.status().as_u16()).ok()
            }
            _ => None,
        }
    }

    /// Message supplied by the server in its error payload, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Error::Shared(inner) => inner.server_message(),
            Error::Request(RequestError::Server { message, .. }) => Some(message),
            Error::Stream(StreamError::Closed { description, .. }) => Some(description),
            _ => None,
        }
    }

    /// True for local contract violations that no retry can fix.
    pub fn is_contract_violation(&self) -> bool {
        match self {
            Error::Navigation(_) => true,
            Error::Shared(inner) => inner.is_contract_violation(),
            _ => false,
        }
    }
}

// --- Navigation (contract) Errors ---

/// Local errors raised before any I/O when a link cannot be followed.
#[derive(Debug, Error)]
pub enum NavigationError {
    /// The resource does not advertise the requested link.
    #[error("Link `{link}` is not available (available: {})", available.join(", "))]
    LinkNotAvailable {
        /// Requested link name.
        link: String,
        /// Link names the resource does advertise.
        available: Vec<String>,
    },

    /// Parameters were supplied that the template does not declare.
    #[error("URI template `{template}` does not declare parameter(s): {}", names.join(", "))]
    UndeclaredParameters {
        /// The link template.
        template: String,
        /// The offending parameter names, sorted.
        names: Vec<String>,
    },

    /// The link template is not a valid URI template.
    #[error("Malformed URI template `{template}`: {reason}")]
    MalformedTemplate {
        /// The link template.
        template: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The resolved URI still contains required fields that were not supplied.
    #[error("URI `{uri}` has unresolved template fields")]
    UnresolvedFields {
        /// The partially resolved URI.
        uri: String,
    },
}

// --- Consolidated Request Error ---

/// Transport and server-side HTTP errors.
#[derive(Debug, Error)]
pub enum RequestError {
    /// Network/protocol failure from reqwest (timeouts, TLS, I/O, etc.).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server returned a non-success status.
    #[error("Server responded with an error: {status} - {message}")]
    Server {
        /// The HTTP status code returned by the server.
        status: StatusCode,
        /// The server-supplied error message, or the canonical reason phrase.
        message: String,
    },

    /// JSON decoding failed when parsing a server response.
    #[error("JSON decode error: {message}")]
    DecodeJson {
        /// Error message from the JSON deserializer.
        message: String,
    },

    /// The request payload could not be serialized.
    #[error("JSON encode error: {message}")]
    EncodeJson {
        /// Error message from the JSON serializer.
        message: String,
    },
}

// --- Streaming Errors ---

/// Failures of the WebSocket streaming subsystem.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The WebSocket handshake or an I/O operation failed.
    #[error("WebSocket error: {0}")]
    Socket(#[from] tungstenite::Error),

    /// The peer closed the socket with a status other than normal closure.
    #[error("WebSocket closed with status {code}: {description}")]
    Closed {
        /// The close code sent by the peer.
        code: u16,
        /// The close reason sent by the peer.
        description: String,
    },

    /// An inbound message could not be turned into a value.
    #[error("Failed to decode stream message: {0}")]
    Decode(BoxError),

    /// The stream was disposed; no further subscriptions are accepted.
    #[error("The stream has been disposed")]
    Disposed,

    /// One or more observers failed while a value was being delivered.
    #[error("{} observer(s) failed during delivery: {}", failures.len(), join_failures(failures))]
    Delivery {
        /// Every failure captured for the value, in subscriber order.
        failures: Vec<BoxError>,
    },
}

fn join_failures(failures: &[BoxError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A specialized `Result` type for `seq-api` operations.
pub type Result<T> = std::result::Result<T, Error>;

// Ergonomic "Staircase" From Implementations ---
macro_rules! impl_from_for_error {
    ($from_type:ty, $to_variant:path) => {
        impl From<$from_type> for Error {
            fn from(err: $from_type) -> Self {
                $to_variant(err.into())
            }
        }
    };
}

impl_from_for_error!(reqwest::Error, Error::Request);
impl_from_for_error!(tungstenite::Error, Error::Stream);

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Request(RequestError::DecodeJson {
            message: err.to_string(),
        })
    }
}
