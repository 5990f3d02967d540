use thiserror::Error;

/// Everything that can go wrong during a single bookmark submission. The
/// `Display` output is the message shown to the user.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Server returned invalid JSON")]
    InvalidJsonResponse,
    #[error("{0}")]
    ServerRejected(String),
    #[error("{0}")]
    TransportFailure(String),
}

impl From<reqwest::Error> for SubmitError {
    fn from(error: reqwest::Error) -> Self {
        SubmitError::TransportFailure(crate::unpack_error(&error))
    }
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed connection closed")]
    ConnectionClosed,
    #[error("tried to join topic {0} more than once")]
    AlreadyJoined(String),
    #[error("malformed frame: {0}")]
    Frame(#[from] serde_json::Error),
}
