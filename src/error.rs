//! Error types for the request pipeline.
//!
//! Every stage of a request (descriptor construction, encoding, the transport
//! call, status validation and model decoding) reports failures through the
//! single [`Error`] enum. Errors that carry a server response keep the raw
//! body so callers can inspect error payloads.

use bytes::Bytes;
use http::{HeaderMap, StatusCode};

/// The main error type for the request pipeline.
///
/// # Examples
///
/// ```no_run
/// use cachet::{Client, Error, Request};
///
/// # async fn example() -> Result<(), Error> {
/// let client = Client::builder().build()?;
/// let request = Request::<serde_json::Value>::new("https://api.example.com/teams")?;
///
/// match client.models(&request).await {
///     Ok(response) => println!("Success: {:?}", response.result),
///     Err(Error::HttpError { status, raw_response, .. }) => {
///         eprintln!("HTTP error {}: {} bytes", status, raw_response.len());
///     }
///     Err(Error::DecodeFailed { path, message }) => {
///         eprintln!("Failed to decode at {:?}: {}", path, message);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The descriptor's URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Invalid configuration was provided.
    ///
    /// Raised for invalid header names or values, invalid custom method
    /// names and transport construction failures.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// A body-carrying parameter variant was combined with a method that
    /// cannot carry a body.
    #[error("Can't encode {params} params for a {method} request")]
    UnsupportedBodyForMethod {
        /// The request method
        method: String,
        /// The kind of parameters that were supplied
        params: &'static str,
    },

    /// A local-cache-only read was requested for a descriptor that disabled
    /// its local cache.
    #[error("Local cache was disabled in request")]
    CachePolicyConflict,

    /// The transport has nothing stored for a local-cache-only request.
    #[error("Resource unavailable in local cache")]
    ResourceUnavailable,

    /// A network-level error occurred (connection failed, DNS lookup failed, etc.).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The transport call took longer than the descriptor's timeout.
    #[error("Request timed out")]
    Timeout,

    /// The transport produced a response that is not an HTTP response.
    #[error("Non-HTTP response: {0}")]
    NonHttpResponse(String),

    /// The transport failed without a more specific reason.
    #[error("Undefined transport failure: {0}")]
    UndefinedTransportFailure(String),

    /// The server answered with a status outside `200..400`.
    ///
    /// The raw body is preserved so callers can inspect the server's error
    /// payload.
    #[error("HTTP error {status}: {} bytes", .raw_response.len())]
    HttpError {
        /// The HTTP status code
        status: StatusCode,
        /// The raw response body
        raw_response: Bytes,
        /// The response headers
        headers: HeaderMap,
    },

    /// The response body could not be decoded into the requested model.
    ///
    /// Covers malformed bytes, missing path segments and type mismatches.
    #[error("Unable to decode model{}: {message}", display_path(.path))]
    DecodeFailed {
        /// The path that was being decoded, if any
        path: Option<String>,
        /// What went wrong
        message: String,
    },

    /// The request body could not be serialized.
    #[error("Failed to serialize request: {0}")]
    SerializationFailed(String),

    /// An interceptor rejected or failed to transform the request.
    #[error("Interceptor failed: {0}")]
    InterceptorFailed(String),

    /// The background decode task panicked or was cancelled.
    #[error("Decode task failed: {0}")]
    DecodeTaskFailed(String),
}

impl Error {
    pub(crate) fn decode(message: impl Into<String>) -> Self {
        Error::DecodeFailed {
            path: None,
            message: message.into(),
        }
    }

    pub(crate) fn with_path(self, path: Option<&str>) -> Self {
        match self {
            Error::DecodeFailed { path: None, message } => Error::DecodeFailed {
                path: path.map(str::to_string),
                message,
            },
            other => other,
        }
    }

    /// Returns `true` if this error reports an empty local cache.
    ///
    /// # Examples
    ///
    /// ```
    /// use cachet::Error;
    ///
    /// assert!(Error::ResourceUnavailable.is_cache_miss());
    /// assert!(!Error::Timeout.is_cache_miss());
    /// ```
    pub fn is_cache_miss(&self) -> bool {
        matches!(self, Error::ResourceUnavailable)
    }

    /// Returns the HTTP status code if this error has one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::HttpError { status, .. } => Some(*status),
            Error::Network(e) => e.status(),
            _ => None,
        }
    }

    /// Returns the raw response body if this error has one.
    pub fn raw_response(&self) -> Option<&[u8]> {
        match self {
            Error::HttpError { raw_response, .. } => Some(&raw_response[..]),
            _ => None,
        }
    }
}

fn display_path(path: &Option<String>) -> String {
    match path {
        Some(path) => format!(" at \"{}\"", path),
        None => String::new(),
    }
}

/// A specialized `Result` type for the request pipeline.
pub type Result<T> = std::result::Result<T, Error>;

/// The outcome of one element of a batch.
///
/// Batches never fail as a whole; each slot carries its own result, in the
/// same order as the input descriptors.
pub type BatchResult<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_display_includes_path() {
        let err = Error::decode("missing key").with_path(Some("teams[0]/players"));
        assert_eq!(
            err.to_string(),
            "Unable to decode model at \"teams[0]/players\": missing key"
        );

        let err = Error::decode("not an array");
        assert_eq!(err.to_string(), "Unable to decode model: not an array");
    }

    #[test]
    fn test_with_path_keeps_existing_path() {
        let err = Error::decode("x")
            .with_path(Some("inner"))
            .with_path(Some("outer"));
        match err {
            Error::DecodeFailed { path, .. } => assert_eq!(path.as_deref(), Some("inner")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_http_error_accessors() {
        let err = Error::HttpError {
            status: StatusCode::NOT_FOUND,
            raw_response: Bytes::from_static(b"{\"error\":\"missing\"}"),
            headers: HeaderMap::new(),
        };
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(err.raw_response(), Some(&b"{\"error\":\"missing\"}"[..]));
        assert!(!err.is_cache_miss());
    }
}
