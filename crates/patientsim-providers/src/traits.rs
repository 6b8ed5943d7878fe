//! Completion provider trait: the seam between the orchestrator and the
//! generative backend.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use patientsim_core::types::{GenerationConfig, Turn};

use crate::error::ProviderError;

/// A chat completion backend.
///
/// The main implementation is `HttpProvider`, which handles OpenAI-compatible
/// and Azure OpenAI endpoints.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Produce the next assistant reply for `transcript`.
    ///
    /// Returns the reply text trimmed of surrounding whitespace. Empty or
    /// missing content is an error, never an empty string. Must return
    /// promptly with [`ProviderError::Cancelled`] once `cancel` fires.
    async fn complete(
        &self,
        transcript: &[Turn],
        config: &GenerationConfig,
        cancel: &CancellationToken,
    ) -> Result<String, ProviderError>;

    /// Model (or deployment) name, for logging.
    fn model(&self) -> &str;

    /// Display name for logging.
    fn display_name(&self) -> &str;
}
