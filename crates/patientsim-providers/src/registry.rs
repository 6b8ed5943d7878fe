//! Provider registry: static specs for the supported completion backends.
//!
//! Each `ProviderSpec` describes how to reach one backend: default endpoint,
//! how the request URL is built, and how the API key is sent.

use patientsim_core::config::ProviderConfig;

/// How the API key is attached to a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>`.
    Bearer,
    /// `api-key: <key>` (Azure OpenAI).
    ApiKeyHeader,
}

/// How the chat completions URL is derived from the API base.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UrlStyle {
    /// `{base}/chat/completions`, model in the body.
    OpenAi,
    /// `{base}/openai/deployments/{model}/chat/completions?api-version=…`.
    AzureDeployment,
}

/// Static specification describing one backend.
#[derive(Clone, Debug)]
pub struct ProviderSpec {
    /// Internal name used in config (e.g. `"azure"`).
    pub name: &'static str,
    /// Human-readable name for logs.
    pub display_name: &'static str,
    /// Environment variable consulted when the config has no API key.
    pub env_key: &'static str,
    /// Default API base URL, if the backend has a fixed one.
    pub default_api_base: Option<&'static str>,
    /// Default `api-version` for deployment-style URLs.
    pub default_api_version: Option<&'static str>,
    pub auth: AuthStyle,
    pub url_style: UrlStyle,
    /// Self-hosted; an API key is optional.
    pub is_local: bool,
}

/// Supported backends.
pub static PROVIDERS: &[ProviderSpec] = &[
    ProviderSpec {
        name: "azure",
        display_name: "Azure OpenAI",
        env_key: "AZURE_OPENAI_API_KEY",
        default_api_base: None,
        default_api_version: Some("2024-06-01"),
        auth: AuthStyle::ApiKeyHeader,
        url_style: UrlStyle::AzureDeployment,
        is_local: false,
    },
    ProviderSpec {
        name: "openai",
        display_name: "OpenAI",
        env_key: "OPENAI_API_KEY",
        default_api_base: Some("https://api.openai.com/v1"),
        default_api_version: None,
        auth: AuthStyle::Bearer,
        url_style: UrlStyle::OpenAi,
        is_local: false,
    },
    ProviderSpec {
        name: "openrouter",
        display_name: "OpenRouter",
        env_key: "OPENROUTER_API_KEY",
        default_api_base: Some("https://openrouter.ai/api/v1"),
        default_api_version: None,
        auth: AuthStyle::Bearer,
        url_style: UrlStyle::OpenAi,
        is_local: false,
    },
    ProviderSpec {
        name: "vllm",
        display_name: "vLLM",
        env_key: "VLLM_API_KEY",
        default_api_base: Some("http://localhost:8000/v1"),
        default_api_version: None,
        auth: AuthStyle::Bearer,
        url_style: UrlStyle::OpenAi,
        is_local: true,
    },
];

/// Find a provider spec by its config name (case-insensitive).
pub fn find_by_name(name: &str) -> Option<&'static ProviderSpec> {
    let name = name.trim().to_ascii_lowercase();
    PROVIDERS.iter().find(|s| s.name == name)
}

/// API key from config, falling back to the spec's environment variable.
pub fn resolve_api_key(config: &ProviderConfig, spec: &ProviderSpec) -> Option<String> {
    if config.is_configured() {
        return Some(config.api_key.clone());
    }
    std::env::var(spec.env_key).ok().filter(|k| !k.is_empty())
}

/// Comma-separated list of supported names, for error messages.
pub fn supported_names() -> String {
    PROVIDERS
        .iter()
        .map(|s| s.name)
        .collect::<Vec<_>>()
        .join(", ")
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_by_name() {
        assert_eq!(find_by_name("azure").unwrap().display_name, "Azure OpenAI");
        assert_eq!(find_by_name(" OpenAI ").unwrap().name, "openai");
        assert!(find_by_name("anthropic").is_none());
    }

    #[test]
    fn test_azure_uses_api_key_header_and_deployment_urls() {
        let spec = find_by_name("azure").unwrap();
        assert_eq!(spec.auth, AuthStyle::ApiKeyHeader);
        assert_eq!(spec.url_style, UrlStyle::AzureDeployment);
        assert!(spec.default_api_base.is_none());
        assert!(spec.default_api_version.is_some());
    }

    #[test]
    fn test_only_vllm_is_local() {
        let local: Vec<&str> = PROVIDERS.iter().filter(|s| s.is_local).map(|s| s.name).collect();
        assert_eq!(local, vec!["vllm"]);
    }

    #[test]
    fn test_resolve_api_key_prefers_config() {
        let spec = find_by_name("openrouter").unwrap();
        let config = ProviderConfig {
            api_key: "sk-or-config".into(),
            ..Default::default()
        };
        assert_eq!(resolve_api_key(&config, spec).as_deref(), Some("sk-or-config"));
    }

    #[test]
    fn test_resolve_api_key_env_fallback() {
        let spec = find_by_name("openai").unwrap();
        std::env::set_var("OPENAI_API_KEY", "sk-env-key");
        let key = resolve_api_key(&ProviderConfig::default(), spec);
        std::env::remove_var("OPENAI_API_KEY");
        assert_eq!(key.as_deref(), Some("sk-env-key"));
    }

    #[test]
    fn test_supported_names() {
        assert_eq!(supported_names(), "azure, openai, openrouter, vllm");
    }
}
