//! Core types for patientsim: turns, transcripts, session ids, and the
//! request/response shapes exchanged with the doctor-facing client.
//!
//! Turns serialize in the OpenAI chat completions format so a transcript can
//! be handed to any compatible backend without conversion.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ChatError;

// ─────────────────────────────────────────────
// Turns
// ─────────────────────────────────────────────

/// One utterance in a transcript.
///
/// Each variant maps to a `role` field value.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Turn {
    /// Persona instructions. Always at index 0 of a transcript.
    System { content: String },
    /// The doctor's message.
    User { content: String },
    /// The simulated patient's reply.
    Assistant { content: String },
}

/// Role tag of a [`Turn`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Turn {
    /// Create a system turn.
    pub fn system(content: impl Into<String>) -> Self {
        Turn::System {
            content: content.into(),
        }
    }

    /// Create a user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Turn::User {
            content: content.into(),
        }
    }

    /// Create an assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Turn::Assistant {
            content: content.into(),
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Turn::System { .. } => Role::System,
            Turn::User { .. } => Role::User,
            Turn::Assistant { .. } => Role::Assistant,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Turn::System { content } | Turn::User { content } | Turn::Assistant { content } => {
                content
            }
        }
    }
}

// ─────────────────────────────────────────────
// Transcript
// ─────────────────────────────────────────────

/// Default maximum number of turns kept in a transcript (system turn included).
pub const DEFAULT_MAX_TURNS: usize = 25;

/// Ordered, append-only sequence of turns for one session.
///
/// Transcripts are value snapshots: the session store hands out clones and
/// takes ownership of whatever is written back.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    /// Start a transcript with the persona's system turn.
    pub fn with_system(prompt: impl Into<String>) -> Self {
        Transcript {
            turns: vec![Turn::system(prompt)],
        }
    }

    /// Append a turn at the end.
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The system turn, if the transcript has one at index 0.
    pub fn system_turn(&self) -> Option<&Turn> {
        self.turns.first().filter(|t| t.role() == Role::System)
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Bound the transcript to at most `max_turns` turns.
    ///
    /// Turn 0 is always kept; the oldest turns after it are dropped so the
    /// most recent `max_turns - 1` remain. A cap below 1 is treated as 1.
    pub fn bounded(mut self, max_turns: usize) -> Self {
        let cap = max_turns.max(1);
        if self.turns.len() > cap {
            let drop_end = self.turns.len() - (cap - 1);
            self.turns.drain(1..drop_end);
        }
        self
    }
}

impl From<Vec<Turn>> for Transcript {
    fn from(turns: Vec<Turn>) -> Self {
        Transcript { turns }
    }
}

// ─────────────────────────────────────────────
// Session identifier
// ─────────────────────────────────────────────

/// Opaque session token handed to the client on the first turn.
///
/// Minted as a random UUID v4 (hyphenated, lowercase): unguessable and
/// URL-safe. Client-supplied ids are accepted verbatim; an unknown id is
/// simply a cache miss.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Mint a fresh random session id.
    pub fn generate() -> Self {
        SessionId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        SessionId(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        SessionId(s.to_string())
    }
}

// ─────────────────────────────────────────────
// Patient attributes
// ─────────────────────────────────────────────

/// Accepted patient ages (inclusive).
pub const AGE_RANGE: std::ops::RangeInclusive<u32> = 10..=110;

/// Patient gender as accepted at the request boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            _ => Err(ChatError::Validation(
                "Gender must be either 'male' or 'female'.".into(),
            )),
        }
    }
}

// ─────────────────────────────────────────────
// Generation config
// ─────────────────────────────────────────────

/// Sampling parameters sent with every completion call.
///
/// Defaults keep the patient's answers short and near-deterministic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationConfig {
    pub temperature: f64,
    pub top_p: f64,
    pub max_output_tokens: u32,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            top_p: 0.95,
            max_output_tokens: 200,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }
}

// ─────────────────────────────────────────────
// Doctor-facing request / response
// ─────────────────────────────────────────────

/// Wire shape of an inbound doctor message (camelCase JSON).
///
/// Every field except `message` is optional; bootstrap fields only matter on
/// the first turn of a session.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequestDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_prompt_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default)]
    pub message: String,
}

/// A validated doctor turn, ready for the orchestrator.
#[derive(Clone, Debug, PartialEq)]
pub struct ChatRequest {
    pub session_id: Option<SessionId>,
    pub prompt_id: Option<u32>,
    pub age: Option<u32>,
    pub gender: Option<Gender>,
    pub message: String,
}

impl ChatRequest {
    /// A continuation turn for an existing session.
    pub fn follow_up(session_id: SessionId, message: impl Into<String>) -> Self {
        ChatRequest {
            session_id: Some(session_id),
            prompt_id: None,
            age: None,
            gender: None,
            message: message.into(),
        }
    }

    /// The first turn of a new session.
    pub fn bootstrap(prompt_id: u32, age: u32, gender: Gender, message: impl Into<String>) -> Self {
        ChatRequest {
            session_id: None,
            prompt_id: Some(prompt_id),
            age: Some(age),
            gender: Some(gender),
            message: message.into(),
        }
    }
}

impl TryFrom<ChatRequestDto> for ChatRequest {
    type Error = ChatError;

    /// Boundary validation: age range, gender literal, non-empty message.
    fn try_from(dto: ChatRequestDto) -> Result<Self, Self::Error> {
        if dto.message.trim().is_empty() {
            return Err(ChatError::Validation("Doctor message is required.".into()));
        }
        if let Some(age) = dto.age {
            if !AGE_RANGE.contains(&age) {
                return Err(ChatError::Validation(
                    "Age must be between 10 and 110.".into(),
                ));
            }
        }
        let gender = dto.gender.as_deref().map(str::parse::<Gender>).transpose()?;
        let session_id = dto
            .session_id
            .filter(|s| !s.trim().is_empty())
            .map(SessionId::from);

        Ok(ChatRequest {
            session_id,
            prompt_id: dto.selected_prompt_id,
            age: dto.age,
            gender,
            message: dto.message,
        })
    }
}

/// Reply returned to the client after a successful turn.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub session_id: SessionId,
    #[serde(rename = "patientReply")]
    pub reply: String,
}

// ─────────────────────────────────────────────
// Chat completion wire types
// ─────────────────────────────────────────────

/// Request body for an OpenAI-compatible chat completion API.
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<&'a str>,
    pub messages: &'a [Turn],
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: u32,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
}

impl<'a> ChatCompletionRequest<'a> {
    pub fn new(model: Option<&'a str>, messages: &'a [Turn], config: &GenerationConfig) -> Self {
        ChatCompletionRequest {
            model,
            messages,
            temperature: config.temperature,
            top_p: config.top_p,
            max_tokens: config.max_output_tokens,
            frequency_penalty: config.frequency_penalty,
            presence_penalty: config.presence_penalty,
        }
    }
}

/// Raw chat completion response. Used internally for deserialization.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: Option<String>,
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    pub usage: Option<UsageInfo>,
}

impl ChatCompletionResponse {
    /// Text of the first choice, if any.
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
    }
}

/// A single choice in a chat completion response.
#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: AssistantMessage,
    pub finish_reason: Option<String>,
}

/// The assistant message within a chat completion choice.
#[derive(Debug, Deserialize)]
pub struct AssistantMessage {
    pub content: Option<String>,
}

/// Token usage statistics from the backend.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UsageInfo {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
