//! Configuration schema.
//!
//! Hierarchy: `Config` → `ProviderConfig`, `ChatConfig`, `PersonasConfig`.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{GenerationConfig, DEFAULT_MAX_TURNS};

// ─────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────

/// Root configuration: loaded from `~/.patientsim/config.json` + env vars.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub chat: ChatConfig,
    pub personas: PersonasConfig,
}

// ─────────────────────────────────────────────
// Provider
// ─────────────────────────────────────────────

/// Connection settings for the completion backend.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderConfig {
    /// Registry name: `azure`, `openai`, `openrouter`, or `vllm`.
    pub name: String,
    /// API key for authentication.
    pub api_key: String,
    /// Endpoint base URL (overrides the registry default).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// Model name, or deployment name for Azure.
    pub model: String,
    /// Azure `api-version` query parameter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    /// Extra HTTP headers to send with each request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_headers: Option<HashMap<String, String>>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: "openai".to_string(),
            api_key: String::new(),
            api_base: None,
            model: "gpt-4o-mini".to_string(),
            api_version: None,
            extra_headers: None,
        }
    }
}

impl ProviderConfig {
    /// Whether this provider has a configured API key.
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

// ─────────────────────────────────────────────
// Chat
// ─────────────────────────────────────────────

/// Conversation and session-lifecycle settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatConfig {
    /// Maximum turns kept per transcript, system turn included.
    pub max_turns: usize,
    /// Idle minutes after which a session is forgotten (minimum 1).
    pub session_idle_minutes: u64,
    /// Upper bound on a single completion call, in seconds.
    pub request_timeout_secs: u64,
    /// How often the background sweeper purges expired sessions, in seconds.
    pub sweep_interval_secs: u64,
    /// Sampling parameters sent with every completion call.
    pub generation: GenerationConfig,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            session_idle_minutes: 30,
            request_timeout_secs: 60,
            sweep_interval_secs: 60,
            generation: GenerationConfig::default(),
        }
    }
}

impl ChatConfig {
    /// Sliding idle window; never shorter than one minute, so a zero setting
    /// cannot expire a session between its write and the next read.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_minutes.max(1).saturating_mul(60))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

// ─────────────────────────────────────────────
// Personas
// ─────────────────────────────────────────────

/// Where the persona catalog lives.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonasConfig {
    /// Path to `PatientPrompts.json` (`~` is expanded).
    pub path: String,
}

impl Default for PersonasConfig {
    fn default() -> Self {
        Self {
            path: "~/.patientsim/PatientPrompts.json".to_string(),
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.chat.max_turns, 25);
        assert_eq!(config.chat.idle_timeout(), Duration::from_secs(1800));
        assert_eq!(config.chat.generation.temperature, 0.3);
        assert_eq!(config.provider.name, "openai");
        assert!(!config.provider.is_configured());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"chat": {"maxTurns": 11, "generation": {"maxOutputTokens": 64}}}"#,
        )
        .unwrap();
        assert_eq!(config.chat.max_turns, 11);
        assert_eq!(config.chat.session_idle_minutes, 30);
        assert_eq!(config.chat.generation.max_output_tokens, 64);
        assert_eq!(config.chat.generation.top_p, 0.95);
    }

    #[test]
    fn test_sweep_interval_never_zero() {
        let chat = ChatConfig {
            sweep_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(chat.sweep_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_idle_timeout_at_least_one_minute() {
        let chat = ChatConfig {
            session_idle_minutes: 0,
            ..Default::default()
        };
        assert_eq!(chat.idle_timeout(), Duration::from_secs(60));
        assert_eq!(ChatConfig::default().idle_timeout(), Duration::from_secs(30 * 60));
    }

    #[test]
    fn test_serializes_camel_case() {
        let raw = serde_json::to_value(Config::default()).unwrap();
        assert!(raw["chat"].get("sessionIdleMinutes").is_some());
        assert!(raw["provider"].get("apiKey").is_some());
        assert!(raw["provider"].get("apiBase").is_none());
    }
}
