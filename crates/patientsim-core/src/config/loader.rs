//! Config loader: reads `~/.patientsim/config.json`, merges env vars, and
//! applies legacy migrations.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `~/.patientsim/config.json`
//! 3. Environment variables `PATIENTSIM_<SECTION>__<FIELD>` (override JSON)

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::schema::Config;

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    crate::utils::get_data_path().join("config.json")
}

/// Load configuration from the default path + env vars.
///
/// Falls back to `Config::default()` if the file doesn't exist or can't be parsed.
pub fn load_config(path: Option<&Path>) -> Config {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    load_config_from_path(&config_path)
}

/// Load config from a specific file path.
fn load_config_from_path(path: &Path) -> Config {
    if !path.exists() {
        info!("No config file found at {}, using defaults", path.display());
        return apply_env_overrides(Config::default());
    }

    debug!("Loading config from {}", path.display());

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file {}: {}", path.display(), e);
            return apply_env_overrides(Config::default());
        }
    };

    let mut raw: serde_json::Value = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            warn!("Failed to parse config JSON: {}", e);
            return apply_env_overrides(Config::default());
        }
    };

    migrate_config(&mut raw);

    let config: Config = match serde_json::from_value(raw) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to deserialize config: {}", e);
            return apply_env_overrides(Config::default());
        }
    };

    apply_env_overrides(config)
}

/// Save configuration to disk (pretty-printed JSON with camelCase keys).
pub fn save_config(config: &Config, path: Option<&Path>) -> std::io::Result<()> {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(config)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    std::fs::write(&config_path, json)?;
    debug!("Config saved to {}", config_path.display());
    Ok(())
}

/// Apply legacy config migrations.
///
/// Moves an `azureOpenAI { endpoint, apiKey, deployment }` block into
/// `provider` (as `name: "azure"`) unless `provider` is already set.
fn migrate_config(raw: &mut serde_json::Value) {
    let Some(obj) = raw.as_object_mut() else {
        return;
    };
    let Some(legacy) = obj.remove("azureOpenAI") else {
        return;
    };
    if obj.contains_key("provider") {
        debug!("Ignoring legacy azureOpenAI block, provider already configured");
        return;
    }

    let mut provider = serde_json::Map::new();
    provider.insert("name".into(), "azure".into());
    if let Some(endpoint) = legacy.get("endpoint") {
        provider.insert("apiBase".into(), endpoint.clone());
    }
    if let Some(key) = legacy.get("apiKey") {
        provider.insert("apiKey".into(), key.clone());
    }
    if let Some(deployment) = legacy.get("deployment") {
        provider.insert("model".into(), deployment.clone());
    }
    obj.insert("provider".into(), serde_json::Value::Object(provider));
    debug!("Migrated azureOpenAI → provider");
}

/// Apply environment variable overrides on top of a loaded config.
///
/// Env var format: `PATIENTSIM_<SECTION>__<FIELD>` (double underscore as delimiter).
///
/// Supported overrides:
/// - `PATIENTSIM_PROVIDER__NAME` → `provider.name`
/// - `PATIENTSIM_PROVIDER__API_KEY` → `provider.api_key`
/// - `PATIENTSIM_PROVIDER__API_BASE` → `provider.api_base`
/// - `PATIENTSIM_PROVIDER__MODEL` → `provider.model`
/// - `PATIENTSIM_PROVIDER__API_VERSION` → `provider.api_version`
/// - `PATIENTSIM_CHAT__MAX_TURNS` → `chat.max_turns`
/// - `PATIENTSIM_CHAT__SESSION_IDLE_MINUTES` → `chat.session_idle_minutes`
/// - `PATIENTSIM_CHAT__REQUEST_TIMEOUT_SECS` → `chat.request_timeout_secs`
/// - `PATIENTSIM_CHAT__SWEEP_INTERVAL_SECS` → `chat.sweep_interval_secs`
/// - `PATIENTSIM_CHAT__GENERATION__TEMPERATURE` → `chat.generation.temperature`
/// - `PATIENTSIM_CHAT__GENERATION__TOP_P` → `chat.generation.top_p`
/// - `PATIENTSIM_CHAT__GENERATION__MAX_OUTPUT_TOKENS` → `chat.generation.max_output_tokens`
/// - `PATIENTSIM_CHAT__GENERATION__FREQUENCY_PENALTY` → `chat.generation.frequency_penalty`
/// - `PATIENTSIM_CHAT__GENERATION__PRESENCE_PENALTY` → `chat.generation.presence_penalty`
/// - `PATIENTSIM_PERSONAS__PATH` → `personas.path`
///
/// Numeric values that fail to parse are ignored with a warning.
fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(val) = std::env::var("PATIENTSIM_PROVIDER__NAME") {
        config.provider.name = val;
    }
    if let Ok(val) = std::env::var("PATIENTSIM_PROVIDER__API_KEY") {
        config.provider.api_key = val;
    }
    if let Ok(val) = std::env::var("PATIENTSIM_PROVIDER__API_BASE") {
        config.provider.api_base = Some(val);
    }
    if let Ok(val) = std::env::var("PATIENTSIM_PROVIDER__MODEL") {
        config.provider.model = val;
    }
    if let Ok(val) = std::env::var("PATIENTSIM_PROVIDER__API_VERSION") {
        config.provider.api_version = Some(val);
    }

    if let Some(n) = env_number("PATIENTSIM_CHAT__MAX_TURNS") {
        config.chat.max_turns = n;
    }
    if let Some(n) = env_number("PATIENTSIM_CHAT__SESSION_IDLE_MINUTES") {
        config.chat.session_idle_minutes = n;
    }
    if let Some(n) = env_number("PATIENTSIM_CHAT__REQUEST_TIMEOUT_SECS") {
        config.chat.request_timeout_secs = n;
    }
    if let Some(n) = env_number("PATIENTSIM_CHAT__SWEEP_INTERVAL_SECS") {
        config.chat.sweep_interval_secs = n;
    }

    let generation = &mut config.chat.generation;
    if let Some(v) = env_number("PATIENTSIM_CHAT__GENERATION__TEMPERATURE") {
        generation.temperature = v;
    }
    if let Some(v) = env_number("PATIENTSIM_CHAT__GENERATION__TOP_P") {
        generation.top_p = v;
    }
    if let Some(n) = env_number("PATIENTSIM_CHAT__GENERATION__MAX_OUTPUT_TOKENS") {
        generation.max_output_tokens = n;
    }
    if let Some(v) = env_number("PATIENTSIM_CHAT__GENERATION__FREQUENCY_PENALTY") {
        generation.frequency_penalty = v;
    }
    if let Some(v) = env_number("PATIENTSIM_CHAT__GENERATION__PRESENCE_PENALTY") {
        generation.presence_penalty = v;
    }

    if let Ok(val) = std::env::var("PATIENTSIM_PERSONAS__PATH") {
        config.personas.path = val;
    }

    if config.chat.session_idle_minutes == 0 {
        warn!("sessionIdleMinutes is 0, sessions will idle out after 1 minute");
    }

    config
}

/// Parse a numeric env var; `None` when unset or malformed.
fn env_number<T: std::str::FromStr>(key: &str) -> Option<T> {
    let val = std::env::var(key).ok()?;
    match val.trim().parse() {
        Ok(n) => Some(n),
        Err(_) => {
            warn!("Ignoring {key}={val:?}: not a number");
            None
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
