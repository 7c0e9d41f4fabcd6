//! Error types surfaced by the request layer and the change-set pipeline.

use thiserror::Error;

/// Errors produced while talking to the hosting service or assembling
/// pull-request data from its responses.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// The server rejected the supplied credentials.
    #[error("authentication failed: {message}")]
    Authentication {
        /// Server-provided detail for the 401/403 response.
        message: String,
    },

    /// The access token has expired.
    ///
    /// Recovered internally by the executor's refresh protocol; callers only
    /// see this variant when no refresh token is available or the refresh
    /// itself failed.
    #[error("access token expired: {message}")]
    CredentialExpired {
        /// Server-provided detail for the expiry response.
        message: String,
    },

    /// The API rate limit has been exhausted.
    #[error("rate limit exceeded: {message}")]
    RateLimitExceeded {
        /// Server-provided rate limit message.
        message: String,
    },

    /// The server returned a non-authentication error status.
    #[error("request failed with status {status}: {message}")]
    RequestFailed {
        /// HTTP status code of the failed response.
        status: u16,
        /// Server-provided error message, or a generic fallback.
        message: String,
    },

    /// A response body could not be decoded into the expected type.
    #[error("response deserialisation failed: {message}")]
    Deserialization {
        /// Decoder error detail.
        message: String,
    },

    /// The fetched commit list could not be shaped into a graph.
    #[error("commit graph construction failed: {message}")]
    GraphConstruction {
        /// Description of the structural problem.
        message: String,
    },

    /// A unified diff returned by the server could not be parsed.
    #[error("diff parsing failed: {message}")]
    DiffParse {
        /// Parser error detail.
        message: String,
    },

    /// The operation was cancelled through its cancellation token.
    ///
    /// Distinguished from true failures so callers can suppress error
    /// display for user-initiated aborts.
    #[error("operation cancelled")]
    Cancelled,

    /// The transport failed before a response was received.
    #[error("network error: {message}")]
    Network {
        /// Transport-level error detail.
        message: String,
    },

    /// A URL could not be parsed or constructed.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// Returns true when the error represents cancellation rather than a
    /// genuine failure.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
