//! Completion provider layer for patientsim.
//!
//! # Architecture
//!
//! - [`traits::CompletionProvider`]: trait the orchestrator calls once per turn
//! - [`registry`]: static specs for the supported backends
//! - [`http_provider::HttpProvider`]: OpenAI-compatible / Azure OpenAI HTTP client
//! - [`http_provider::create_provider`]: convenience builder from config

pub mod error;
pub mod http_provider;
pub mod registry;
pub mod traits;

pub use error::ProviderError;
pub use http_provider::{create_provider, HttpProvider};
pub use registry::{ProviderSpec, PROVIDERS};
pub use traits::CompletionProvider;
