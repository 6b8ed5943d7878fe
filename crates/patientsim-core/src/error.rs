//! Error taxonomy for a doctor turn.
//!
//! Every failure of the orchestrator falls into one of four kinds. Only
//! `Upstream` can happen after the completion provider has been called, and
//! none of them leave a partially-updated transcript in the session store.

use thiserror::Error;

use crate::persona::PersonaError;

/// Coarse classification of a [`ChatError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller-fixable input problem (empty message, missing bootstrap fields).
    Validation,
    /// Caller referenced something that does not exist (unknown prompt id).
    NotFound,
    /// The completion backend failed, timed out, was cancelled, or replied empty.
    Upstream,
    /// Anything else.
    Unexpected,
}

impl ErrorKind {
    /// Conventional HTTP status class for this kind, for callers that front
    /// the service with a web layer.
    pub fn status_hint(self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Upstream => 502,
            ErrorKind::Unexpected => 500,
        }
    }

    /// Whether the caller can fix the request and retry.
    pub fn is_client_fault(self) -> bool {
        matches!(self, ErrorKind::Validation | ErrorKind::NotFound)
    }
}

/// Failure of a single doctor turn.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Upstream service error: {0}")]
    Upstream(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl ChatError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChatError::Validation(_) => ErrorKind::Validation,
            ChatError::NotFound(_) => ErrorKind::NotFound,
            ChatError::Upstream(_) => ErrorKind::Upstream,
            ChatError::Unexpected(_) => ErrorKind::Unexpected,
        }
    }

    /// Message safe to show to the client. Unexpected errors are not detailed.
    pub fn public_message(&self) -> String {
        match self {
            ChatError::Unexpected(_) => "An unexpected error occurred.".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<PersonaError> for ChatError {
    fn from(e: PersonaError) -> Self {
        ChatError::Unexpected(e.to_string())
    }
}
