use thiserror::Error;

/// Failure of one best-effort pipeline stage. Stages degrade to placeholders
/// or the durable fallback; none of these abort downstream stages. An absent
/// capability is not an error: builders return `None` instead.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("upstream rejected the request: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for StageError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
