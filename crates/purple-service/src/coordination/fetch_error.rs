use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// An error that happens when fetching a value from the backend.
///
/// This error is cloned into every caller that joined the failed computation, which is why it
/// only carries rendered details instead of the underlying error sources.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The resource does not exist on the backend.
    #[error("not found")]
    NotFound,
    /// The backend rejected the request because it lacks valid credentials (`401`).
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// The backend understood the credentials but refused access (`403`).
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// The request did not complete within the given time.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    /// The backend answered with an unexpected status code.
    #[error("unexpected response: {0}")]
    Status(String),
    /// The request could not be sent, for instance because of connection loss or DNS resolution.
    #[error("request failed: {0}")]
    Transport(String),
    /// The response was received, but could not be understood.
    #[error("malformed: {0}")]
    Malformed(String),
    /// The computation was dropped before it produced a result.
    #[error("computation dropped before completing")]
    Canceled,
}

impl FetchError {
    /// Infers the error from a non-successful HTTP status code.
    pub fn from_status(status: StatusCode) -> Self {
        debug_assert!(!status.is_success());

        match status {
            StatusCode::UNAUTHORIZED => Self::Unauthorized(status.to_string()),
            StatusCode::FORBIDDEN => Self::Forbidden(status.to_string()),
            StatusCode::NOT_FOUND | StatusCode::GONE => Self::NotFound,
            _ => Self::Status(status.to_string()),
        }
    }

    /// Converts a [`reqwest::Error`] into a [`FetchError`].
    ///
    /// `timeout` is the configured request timeout, reported when the client gave up waiting.
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else if let Some(status) = err.status() {
            Self::from_status(status)
        } else if err.is_decode() {
            Self::Malformed(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }

    /// A short, static name of the error kind, used for metrics tags.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::Timeout(_) => "timeout",
            Self::Status(_) => "status",
            Self::Transport(_) => "transport",
            Self::Malformed(_) => "malformed",
            Self::Canceled => "canceled",
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// The outcome of a coordinated computation, containing either `Ok(T)` or the reason why the
/// value could not be fetched.
pub type FetchResult<T = ()> = Result<T, FetchError>;
