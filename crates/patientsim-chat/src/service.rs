//! Chat service: one doctor turn through the patient simulator.
//!
//! Resolves (or bootstraps) the session transcript, appends the doctor's
//! message, bounds the transcript, asks the completion provider for the
//! patient's reply, and stores the grown transcript. Nothing is written back
//! unless the whole turn succeeds.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use patientsim_core::config::ChatConfig;
use patientsim_core::error::ChatError;
use patientsim_core::persona::PersonaCatalog;
use patientsim_core::session::SessionStore;
use patientsim_core::types::{
    ChatRequest, ChatResponse, GenerationConfig, SessionId, Transcript, Turn,
};
use patientsim_core::utils::truncate_string;
use patientsim_providers::{CompletionProvider, ProviderError};

const MISSING_BOOTSTRAP: &str = "Prompt ID, Age, and Gender are required for the first message.";
const EMPTY_MESSAGE: &str = "Doctor message cannot be empty.";
const INVALID_PROMPT: &str = "Invalid prompt ID provided.";

/// How much of the doctor's message goes into debug logs.
const LOG_PREVIEW_CHARS: usize = 80;

// ─────────────────────────────────────────────
// ChatService
// ─────────────────────────────────────────────

/// The conversation orchestrator.
///
/// Cheap to share behind an `Arc`; every collaborator is itself shared, and a
/// turn holds no lock while it waits on the provider.
pub struct ChatService {
    store: Arc<dyn SessionStore>,
    personas: Arc<dyn PersonaCatalog>,
    provider: Arc<dyn CompletionProvider>,
    /// Transcript cap, system turn included.
    max_turns: usize,
    generation: GenerationConfig,
    /// Zero disables the timeout.
    request_timeout: Duration,
}

impl std::fmt::Debug for ChatService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatService")
            .field("provider", &self.provider.display_name())
            .field("model", &self.provider.model())
            .field("max_turns", &self.max_turns)
            .field("sessions", &self.store.len())
            .finish()
    }
}

impl ChatService {
    /// Create a service from its collaborators and the `chat` config section.
    pub fn new(
        store: Arc<dyn SessionStore>,
        personas: Arc<dyn PersonaCatalog>,
        provider: Arc<dyn CompletionProvider>,
        config: &ChatConfig,
    ) -> Self {
        Self {
            store,
            personas,
            provider,
            max_turns: config.max_turns.max(1),
            generation: config.generation.clone(),
            request_timeout: config.request_timeout(),
        }
    }

    /// The session store this service reads and writes.
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Process a single doctor turn and return the patient's reply.
    ///
    /// Validation and persona lookup happen before any provider call. On any
    /// failure the stored transcript for the session is left exactly as it
    /// was. Cancelling `cancel` aborts the turn with an upstream error.
    pub async fn process_turn(
        &self,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> Result<ChatResponse, ChatError> {
        if request.message.trim().is_empty() {
            return Err(ChatError::Validation(EMPTY_MESSAGE.into()));
        }

        let (session_id, mut transcript) = self.resolve_session(&request).await?;

        debug!(
            session_id = %session_id,
            message = %truncate_string(&request.message, LOG_PREVIEW_CHARS),
            "doctor turn"
        );

        transcript.push(Turn::user(request.message));
        let mut transcript = transcript.bounded(self.max_turns);

        let reply = self.complete(&session_id, &transcript, &cancel).await?;

        transcript.push(Turn::assistant(reply.clone()));
        let turns = transcript.len();
        self.store.put(&session_id, transcript);

        info!(session_id = %session_id, turns = turns, "patient replied");

        Ok(ChatResponse {
            session_id,
            reply,
        })
    }

    /// The stored transcript on a hit, or a fresh `[system]` transcript under
    /// a newly minted id.
    async fn resolve_session(
        &self,
        request: &ChatRequest,
    ) -> Result<(SessionId, Transcript), ChatError> {
        if let Some(ref id) = request.session_id {
            if let Some(transcript) = self.store.get(id) {
                debug!(session_id = %id, turns = transcript.len(), "session resumed");
                return Ok((id.clone(), transcript));
            }
            info!(session_id = %id, "unknown or expired session, starting a new one");
        }

        let (Some(prompt_id), Some(age), Some(gender)) =
            (request.prompt_id, request.age, request.gender)
        else {
            return Err(ChatError::Validation(MISSING_BOOTSTRAP.into()));
        };

        let persona = match self.personas.lookup(prompt_id).await {
            Ok(Some(persona)) => persona,
            Ok(None) => {
                warn!(prompt_id = prompt_id, "unknown persona");
                return Err(ChatError::NotFound(INVALID_PROMPT.into()));
            }
            Err(e) => {
                error!(prompt_id = prompt_id, error = %e, "persona catalog unavailable");
                return Err(e.into());
            }
        };

        let session_id = SessionId::generate();
        info!(
            session_id = %session_id,
            persona = %persona.name,
            age = age,
            gender = %gender,
            "new session"
        );

        Ok((
            session_id,
            Transcript::with_system(persona.compose_system_prompt(age, gender)),
        ))
    }

    /// Ask the provider for the reply under the cancel token and the request
    /// timeout.
    async fn complete(
        &self,
        session_id: &SessionId,
        transcript: &Transcript,
        cancel: &CancellationToken,
    ) -> Result<String, ChatError> {
        if cancel.is_cancelled() {
            debug!(session_id = %session_id, "turn cancelled before completion call");
            return Err(upstream(session_id, ProviderError::Cancelled));
        }

        debug!(
            session_id = %session_id,
            provider = self.provider.display_name(),
            model = self.provider.model(),
            turns = transcript.len(),
            "requesting completion"
        );

        let call = self
            .provider
            .complete(transcript.turns(), &self.generation, cancel);

        let result = if self.request_timeout.is_zero() {
            call.await
        } else {
            match tokio::time::timeout(self.request_timeout, call).await {
                Ok(result) => result,
                Err(_) => {
                    // Dropping the future aborts the in-flight request.
                    error!(
                        session_id = %session_id,
                        timeout_secs = self.request_timeout.as_secs_f64(),
                        "completion timed out"
                    );
                    return Err(ChatError::Upstream(format!(
                        "completion timed out after {}s",
                        self.request_timeout.as_secs_f64()
                    )));
                }
            }
        };

        let reply = result.map_err(|e| upstream(session_id, e))?;
        let reply = reply.trim();
        if reply.is_empty() {
            return Err(upstream(session_id, ProviderError::EmptyCompletion));
        }
        Ok(reply.to_string())
    }
}

fn upstream(session_id: &SessionId, e: ProviderError) -> ChatError {
    match e {
        ProviderError::Cancelled => {
            info!(session_id = %session_id, "turn cancelled");
        }
        ref other => {
            error!(
                session_id = %session_id,
                transient = other.is_transient(),
                error = %other,
                "completion failed"
            );
        }
    }
    ChatError::Upstream(e.to_string())
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
