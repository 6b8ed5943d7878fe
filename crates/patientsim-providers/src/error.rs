//! Provider failures. The orchestrator treats every variant as an upstream error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to parse completion response: {0}")]
    Parse(String),

    #[error("no response content received")]
    EmptyCompletion,

    #[error("request cancelled")]
    Cancelled,
}

impl ProviderError {
    /// Whether retrying the same request later might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Transport(e) => e.is_timeout() || e.is_connect(),
            ProviderError::Status { status, .. } => *status == 429 || *status >= 500,
            ProviderError::Parse(_) | ProviderError::EmptyCompletion => false,
            ProviderError::Cancelled => false,
        }
    }
}
