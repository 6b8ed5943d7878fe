//! patientsim CLI: entry point.
//!
//! # Commands
//!
//! - `patientsim chat --prompt ID --age N --gender G [-m MESSAGE]`: talk to a simulated patient (single-shot or REPL)
//! - `patientsim personas`: list the patient personas in the catalog
//! - `patientsim status`: show configuration and provider status
//! - `patientsim onboard`: write the default config and a sample persona catalog

mod helpers;
mod onboard;
mod personas_cmd;
mod repl;
mod status;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;

use patientsim_chat::ChatService;
use patientsim_core::config::{load_config, Config};
use patientsim_core::error::ChatError;
use patientsim_core::persona::JsonPersonaCatalog;
use patientsim_core::session::{spawn_sweeper, MemorySessionStore, SessionStoreConfig};
use patientsim_core::types::{ChatRequest, ChatRequestDto, SessionId};
use patientsim_providers::create_provider;

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// 🩺 patientsim: practise history-taking with a simulated patient
#[derive(Parser)]
#[command(name = "patientsim", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Talk to a simulated patient (single-shot or interactive REPL)
    Chat {
        #[command(flatten)]
        patient: PatientArgs,

        /// Single message (non-interactive). Omit for REPL mode.
        #[arg(short, long)]
        message: Option<String>,

        /// Print the single-shot reply as JSON (`{"sessionId", "patientReply"}`)
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// List the patient personas in the catalog
    Personas,

    /// Show configuration and provider status
    Status,

    /// Write the default config and a sample persona catalog
    Onboard,
}

/// Who the patient is. Only used for the first message of a session.
#[derive(Args, Clone, Debug, Default)]
pub struct PatientArgs {
    /// Persona id from the catalog (see `patientsim personas`)
    #[arg(short, long = "prompt")]
    pub prompt_id: Option<u32>,

    /// Patient age (10-110)
    #[arg(short, long)]
    pub age: Option<u32>,

    /// Patient gender: male or female
    #[arg(short, long)]
    pub gender: Option<String>,
}

impl PatientArgs {
    /// Build a validated turn request, carrying the bootstrap fields along so a
    /// session that expired mid-conversation restarts with the same patient.
    pub fn request(&self, session: Option<&SessionId>, message: &str) -> Result<ChatRequest, ChatError> {
        ChatRequest::try_from(ChatRequestDto {
            session_id: session.map(|id| id.to_string()),
            selected_prompt_id: self.prompt_id,
            age: self.age,
            gender: self.gender.clone(),
            message: message.to_string(),
        })
    }
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Chat {
            patient,
            message,
            json,
            logs,
        } => {
            init_logging(logs);
            run_chat(patient, message, json).await
        }
        Commands::Personas => personas_cmd::run().await,
        Commands::Status => status::run(),
        Commands::Onboard => onboard::run(),
    }
}

// ─────────────────────────────────────────────
// Chat command
// ─────────────────────────────────────────────

async fn run_chat(patient: PatientArgs, message: Option<String>, json: bool) -> Result<()> {
    let config = load_config(None);
    let service = Arc::new(build_chat_service(&config)?);

    let shutdown = CancellationToken::new();
    let sweeper = spawn_sweeper(
        service.store().clone(),
        config.chat.sweep_interval(),
        shutdown.clone(),
    );

    let result = match message {
        Some(msg) => {
            // Single-shot mode
            info!(prompt_id = ?patient.prompt_id, "processing single message");
            let request = patient
                .request(None, &msg)
                .map_err(|e| anyhow::anyhow!(e.public_message()))?;
            match repl::send(&service, request).await {
                Ok(response) if json => {
                    println!("{}", serde_json::to_string_pretty(&response)?);
                    Ok(())
                }
                Ok(response) => {
                    helpers::print_response(&response.reply);
                    Ok(())
                }
                Err(e) => Err(anyhow::anyhow!(
                    "{} (status {})",
                    e.public_message(),
                    e.kind().status_hint()
                )),
            }
        }
        None => {
            // Interactive REPL mode
            repl::run(service, patient).await
        }
    };

    shutdown.cancel();
    let _ = sweeper.await;
    result
}

/// Build a `ChatService` from the loaded configuration.
pub fn build_chat_service(config: &Config) -> Result<ChatService> {
    let provider =
        create_provider(&config.provider).context("failed to create completion provider")?;

    let store = Arc::new(MemorySessionStore::new(SessionStoreConfig {
        idle_timeout: config.chat.idle_timeout(),
    }));

    let catalog_path = helpers::expand_tilde(&config.personas.path);
    let personas = Arc::new(JsonPersonaCatalog::new(catalog_path));

    Ok(ChatService::new(
        store,
        personas,
        Arc::new(provider),
        &config.chat,
    ))
}

/// Initialize tracing/logging.
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("patientsim=debug,info")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use patientsim_core::error::ErrorKind;
    use patientsim_core::types::Gender;

    fn patient() -> PatientArgs {
        PatientArgs {
            prompt_id: Some(2),
            age: Some(58),
            gender: Some("Female".into()),
        }
    }

    #[test]
    fn cli_parses_chat_flags() {
        let cli = Cli::try_parse_from([
            "patientsim", "chat", "--prompt", "1", "--age", "34", "--gender", "male", "-m", "Hi",
        ])
        .unwrap();
        match cli.command {
            Commands::Chat {
                patient, message, ..
            } => {
                assert_eq!(patient.prompt_id, Some(1));
                assert_eq!(patient.age, Some(34));
                assert_eq!(message.as_deref(), Some("Hi"));
            }
            _ => panic!("expected chat command"),
        }
    }

    #[test]
    fn request_carries_bootstrap_fields() {
        let id = SessionId::from("abc");
        let request = patient().request(Some(&id), "Where does it hurt?").unwrap();
        assert_eq!(request.session_id, Some(id));
        assert_eq!(request.prompt_id, Some(2));
        assert_eq!(request.gender, Some(Gender::Female));
    }

    #[test]
    fn request_rejects_out_of_range_age() {
        let args = PatientArgs {
            age: Some(7),
            ..patient()
        };
        let err = args.request(None, "Hello").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn request_rejects_unknown_gender() {
        let args = PatientArgs {
            gender: Some("other".into()),
            ..patient()
        };
        assert!(args.request(None, "Hello").is_err());
    }

    #[test]
    fn build_service_fails_without_api_key() {
        let mut config = Config::default();
        config.provider.name = "openrouter".into();
        config.provider.api_key.clear();
        std::env::remove_var("OPENROUTER_API_KEY");
        let err = build_chat_service(&config).unwrap_err();
        assert!(format!("{err:#}").contains("No API key"));
    }
}
