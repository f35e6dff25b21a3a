use thiserror::Error;

/// Outcome of a call to a remote collaborator that did not succeed
#[derive(Debug, Error)]
pub enum ExternalError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("response is missing key `{0}`")]
    MissingKey(String),

    #[error("expected {expected} items, got {got}")]
    Shape { expected: usize, got: usize },
}

impl ExternalError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ExternalError::Transport(_) | ExternalError::RateLimited(_) => true,
            ExternalError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ExternalError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ExternalError::Malformed(e.to_string())
        } else {
            ExternalError::Transport(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ExternalError::Transport("timeout".into()).is_transient());
        assert!(ExternalError::RateLimited("429".into()).is_transient());
        assert!(ExternalError::Status { status: 503, body: String::new() }.is_transient());
        assert!(!ExternalError::Status { status: 400, body: String::new() }.is_transient());
        assert!(!ExternalError::Malformed("not json".into()).is_transient());
        assert!(!ExternalError::MissingKey("impact".into()).is_transient());
    }
}
