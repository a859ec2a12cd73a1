use super::normalize::RecordShape;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    /// Socket, TLS or connection failure. The only retryable kind.
    #[error("network error: {0}")]
    Network(String),

    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("video not found or not accessible: {0}")]
    VideoNotFound(String),

    #[error("comments are disabled for this video")]
    CommentsDisabled,

    #[error("platform API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("unexpected response body: {0}")]
    Decode(String),

    #[error("browser session error: {0}")]
    Browser(String),

    #[error("{0}")]
    Other(String),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Network(_))
    }

    /// Errors the platform reports about the video itself. These end the
    /// stream cleanly rather than failing the run.
    pub fn ends_stream(&self) -> bool {
        matches!(
            self,
            FetchError::VideoNotFound(_) | FetchError::CommentsDisabled | FetchError::Api { .. }
        )
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() || err.is_request() {
            FetchError::Network(err.to_string())
        } else if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Other(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Decode(err.to_string())
    }
}

/// A platform comment source driven by the fetch loop.
///
/// Items are handed over as raw JSON and normalized by the loop through the
/// connector's [`RecordShape`]s, so a malformed item can be skipped without
/// involving the connector.
#[async_trait]
pub trait Connector: Send {
    fn comment_shape(&self) -> &RecordShape;

    fn reply_shape(&self) -> &RecordShape;

    /// Next page of top-level items, sized by `wanted` where the platform
    /// allows it. `Ok(None)` means the source is exhausted.
    async fn next_page(&mut self, wanted: usize) -> Result<Option<Vec<Value>>, FetchError>;

    /// Every reply of a top-level item, in platform order.
    async fn replies(&mut self, parent: &Value) -> Result<Vec<Value>, FetchError>;
}
