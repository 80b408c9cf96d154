/// Failure reported by a [`TaskSource`](crate::source::TaskSource) collaborator.
///
/// The engine never treats these as fatal: population fetches fall back to
/// the last good data and log fetches are skipped per task.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("not configured: {0}")]
    NotConfigured(String),
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;
