//! Generic HTTP completion provider for OpenAI-compatible APIs.
//!
//! Talks directly to a `/chat/completions` endpoint via `reqwest`, either the
//! plain OpenAI layout or Azure OpenAI's per-deployment layout.

use anyhow::{bail, Context};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use patientsim_core::config::ProviderConfig;
use patientsim_core::types::{
    ChatCompletionRequest, ChatCompletionResponse, GenerationConfig, Turn,
};

use crate::error::ProviderError;
use crate::registry::{self, AuthStyle, ProviderSpec, UrlStyle};
use crate::traits::CompletionProvider;

/// Transport-level ceiling; the orchestrator applies its own, usually shorter, timeout.
const HTTP_TIMEOUT_SECS: u64 = 120;

// ─────────────────────────────────────────────
// HttpProvider
// ─────────────────────────────────────────────

/// A completion provider that talks to an OpenAI-compatible HTTP API.
pub struct HttpProvider {
    /// HTTP client (shared, connection-pooled).
    client: reqwest::Client,
    /// API base URL (e.g. `"https://api.openai.com/v1"`).
    api_base: String,
    /// API key; empty for unauthenticated local backends.
    api_key: String,
    /// Model name, or deployment name for Azure.
    model: String,
    /// `api-version` query parameter for deployment-style URLs.
    api_version: Option<String>,
    /// Extra headers to send with each request.
    extra_headers: HeaderMap,
    spec: &'static ProviderSpec,
}

impl std::fmt::Debug for HttpProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProvider")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("provider", &self.spec.display_name)
            .finish()
    }
}

impl HttpProvider {
    /// Create a new HttpProvider.
    ///
    /// `api_base` resolution: config > spec default. Callers must make sure one
    /// of them is set (see [`create_provider`]).
    pub fn new(
        config: &ProviderConfig,
        spec: &'static ProviderSpec,
        api_key: String,
    ) -> Result<Self, ProviderError> {
        let api_base = config
            .api_base
            .clone()
            .or_else(|| spec.default_api_base.map(String::from))
            .unwrap_or_default();

        let mut extra_headers = HeaderMap::new();
        if let Some(ref headers) = config.extra_headers {
            for (key, value) in headers {
                if let (Ok(name), Ok(val)) = (
                    HeaderName::from_bytes(key.as_bytes()),
                    HeaderValue::from_str(value),
                ) {
                    extra_headers.insert(name, val);
                } else {
                    warn!("Invalid header: {}={}", key, value);
                }
            }
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;

        Ok(HttpProvider {
            client,
            api_base,
            api_key,
            model: config.model.clone(),
            api_version: config
                .api_version
                .clone()
                .or_else(|| spec.default_api_version.map(String::from)),
            extra_headers,
            spec,
        })
    }

    /// Build the full chat completions URL (without query string).
    fn completions_url(&self) -> String {
        let base = self.api_base.trim_end_matches('/');
        match self.spec.url_style {
            UrlStyle::OpenAi => format!("{}/chat/completions", base),
            UrlStyle::AzureDeployment => {
                format!("{}/openai/deployments/{}/chat/completions", base, self.model)
            }
        }
    }

    async fn send(
        &self,
        transcript: &[Turn],
        config: &GenerationConfig,
    ) -> Result<String, ProviderError> {
        let model = match self.spec.url_style {
            UrlStyle::OpenAi => Some(self.model.as_str()),
            UrlStyle::AzureDeployment => None,
        };
        let body = ChatCompletionRequest::new(model, transcript, config);

        let mut request = self
            .client
            .post(self.completions_url())
            .headers(self.extra_headers.clone())
            .json(&body);

        if let (UrlStyle::AzureDeployment, Some(version)) =
            (self.spec.url_style, self.api_version.as_deref())
        {
            request = request.query(&[("api-version", version)]);
        }

        if !self.api_key.is_empty() {
            request = match self.spec.auth {
                AuthStyle::Bearer => request.bearer_auth(&self.api_key),
                AuthStyle::ApiKeyHeader => request.header("api-key", &self.api_key),
            };
        }

        let response = request.send().await.map_err(|e| {
            error!(provider = self.spec.display_name, error = %e, "HTTP request failed");
            ProviderError::Transport(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(
                provider = self.spec.display_name,
                status = %status,
                body = %body,
                "API error"
            );
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let completion = response
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|e| {
                error!(provider = self.spec.display_name, error = %e, "Failed to parse completion");
                ProviderError::Parse(e.to_string())
            })?;

        debug!(
            provider = self.spec.display_name,
            finish_reason = completion
                .choices
                .first()
                .and_then(|c| c.finish_reason.as_deref())
                .unwrap_or("?"),
            total_tokens = completion.usage.as_ref().map_or(0, |u| u.total_tokens),
            "completion received"
        );

        match completion.first_content().map(str::trim) {
            Some(text) if !text.is_empty() => Ok(text.to_string()),
            _ => {
                warn!(provider = self.spec.display_name, "completion had no content");
                Err(ProviderError::EmptyCompletion)
            }
        }
    }
}

#[async_trait]
impl CompletionProvider for HttpProvider {
    async fn complete(
        &self,
        transcript: &[Turn],
        config: &GenerationConfig,
        cancel: &CancellationToken,
    ) -> Result<String, ProviderError> {
        debug!(
            provider = self.spec.display_name,
            model = %self.model,
            turns = transcript.len(),
            "Calling completion API"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(provider = self.spec.display_name, "completion cancelled");
                Err(ProviderError::Cancelled)
            }
            result = self.send(transcript, config) => result,
        }
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn display_name(&self) -> &str {
        self.spec.display_name
    }
}

// ─────────────────────────────────────────────
// Builder (convenience)
// ─────────────────────────────────────────────

/// Build an HttpProvider from the `provider` config section.
///
/// Fails when the name is unknown, no API key is available for a hosted
/// backend, or no endpoint can be determined.
pub fn create_provider(config: &ProviderConfig) -> anyhow::Result<HttpProvider> {
    let Some(spec) = registry::find_by_name(&config.name) else {
        bail!(
            "Unknown provider '{}'. Supported providers: {}.",
            config.name,
            registry::supported_names()
        );
    };

    let api_key = match registry::resolve_api_key(config, spec) {
        Some(key) => key,
        None if spec.is_local => String::new(),
        None => bail!(
            "No API key configured for {}. Set provider.apiKey or {}.",
            spec.display_name,
            spec.env_key
        ),
    };

    if config.api_base.is_none() && spec.default_api_base.is_none() {
        bail!(
            "{} requires provider.apiBase (your resource endpoint).",
            spec.display_name
        );
    }
    if config.model.trim().is_empty() {
        bail!("provider.model must not be empty");
    }

    debug!(
        provider = spec.display_name,
        model = %config.model,
        api_base = config.api_base.as_deref().unwrap_or("default"),
        "Creating completion provider"
    );

    HttpProvider::new(config, spec, api_key).context("failed to build HTTP client")
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
