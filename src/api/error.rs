use thiserror::Error;

/// Result alias for engine API calls.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Failure of a single engine API call.
///
/// Error bodies returned by the engine are never parsed; a non-2xx reply is
/// reported with the operation name and status code only.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The engine answered with a non-success status
    #[error("{op} failed: {status}")]
    Http { op: &'static str, status: u16 },

    /// The request never produced a response (DNS, connect, TLS, reset...)
    #[error("{op} failed: {source}")]
    Transport {
        op: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The response body could not be decoded as the expected JSON shape
    #[error("{op} failed: invalid response body: {source}")]
    Decode {
        op: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid base URL '{0}'")]
    InvalidBaseUrl(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}
