//! Error types for the resource client.
//!
//! # Design
//! `NotFound` gets a dedicated variant because callers frequently distinguish
//! "the resource does not exist" from every other client error. Every HTTP
//! failure carries an [`HttpFailure`] with the status, the request URL and
//! the untouched response, so callers can branch on the body themselves.
//! Error bodies are never decoded.
//!
//! Decode failures on successful responses are not errors at all: the caller
//! gets the raw body back instead.

use crate::http::HttpResponse;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Context attached to every 4xx/5xx error.
#[derive(Debug, Clone)]
pub struct HttpFailure {
    pub status: u16,
    pub url: String,
    pub response: HttpResponse,
}

impl HttpFailure {
    /// Raw, undecoded response body.
    pub fn body(&self) -> &[u8] {
        &self.response.body
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required construction option was missing.
    #[error("{0} is required")]
    ImproperlyConfigured(String),

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Attribute names starting with `_` never resolve to a path segment.
    #[error("unknown attribute: {0}")]
    UnknownAttribute(String),

    /// The server returned 404.
    #[error("Client Error {}: {}", .0.status, .0.url)]
    NotFound(HttpFailure),

    /// The server returned a 4xx status other than 404.
    #[error("Client Error {}: {}", .0.status, .0.url)]
    Client(HttpFailure),

    /// The server returned a 5xx status.
    #[error("Server Error {}: {}", .0.status, .0.url)]
    Server(HttpFailure),

    /// No codec is registered under the requested name or content type.
    #[error("no serializer available for {0}")]
    SerializerNotAvailable(String),

    /// An outgoing body could not be encoded.
    #[error("encoding failed: {0}")]
    Encode(String),

    /// A codec could not decode a payload. Resources never surface this for
    /// successful responses; it only reaches callers using a codec directly.
    #[error("decoding failed: {0}")]
    Decode(String),

    /// The transport failed before a response was received.
    #[error("transport error: {0}")]
    Transport(String),

    /// The redirect helper was given a response without a `location` header.
    #[error("response has no location header")]
    MissingLocation,
}

impl Error {
    /// True for every 4xx status, including 404.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::Client(_))
    }

    pub fn is_server_error(&self) -> bool {
        matches!(self, Error::Server(_))
    }

    /// HTTP context for 4xx/5xx errors.
    pub fn failure(&self) -> Option<&HttpFailure> {
        match self {
            Error::NotFound(f) | Error::Client(f) | Error::Server(f) => Some(f),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        self.failure().map(|f| f.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(status: u16) -> HttpFailure {
        HttpFailure {
            status,
            url: "http://example/api/v1/test".to_string(),
            response: HttpResponse {
                status,
                headers: Vec::new(),
                body: b"{\"detail\":\"nope\"}".to_vec(),
            },
        }
    }

    #[test]
    fn not_found_is_a_client_error() {
        let err = Error::NotFound(failure(404));
        assert!(err.is_client_error());
        assert!(!err.is_server_error());
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn display_includes_status_and_url() {
        let err = Error::Server(failure(502));
        assert_eq!(err.to_string(), "Server Error 502: http://example/api/v1/test");
        let err = Error::Client(failure(403));
        assert_eq!(err.to_string(), "Client Error 403: http://example/api/v1/test");
    }

    #[test]
    fn failure_exposes_raw_body() {
        let err = Error::Client(failure(400));
        assert_eq!(err.failure().unwrap().body(), b"{\"detail\":\"nope\"}");
    }

    #[test]
    fn non_http_errors_have_no_status() {
        let err = Error::ImproperlyConfigured("base_url".to_string());
        assert_eq!(err.to_string(), "base_url is required");
        assert!(err.status().is_none());
        assert!(!err.is_client_error());
    }
}
