//! Interactive REPL: one doctor turn per line.
//!
//! Uses `rustyline` for readline-style editing with persistent history. The
//! session id is kept between lines; Ctrl-C while a reply is pending cancels
//! that turn only.

use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use rustyline::config::Configurer;
use rustyline::history::DefaultHistory;
use rustyline::{DefaultEditor, Editor};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use patientsim_chat::ChatService;
use patientsim_core::error::ChatError;
use patientsim_core::session::{SessionStore, SessionSummary};
use patientsim_core::types::{ChatRequest, ChatResponse, SessionId};

use crate::helpers;
use crate::PatientArgs;

/// Exit commands (case-insensitive match).
const EXIT_COMMANDS: &[&str] = &["exit", "quit", "/exit", "/quit", ":q"];

/// REPL meta-commands.
#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Exit,
    /// Drop the current session; the next line bootstraps a new patient.
    New,
    /// Print the current session id, turn count and timestamps.
    Session,
    Message(&'a str),
}

fn parse_line(input: &str) -> Option<Command<'_>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    if is_exit_command(trimmed) {
        return Some(Command::Exit);
    }
    match trimmed.to_lowercase().as_str() {
        "/new" => Some(Command::New),
        "/session" => Some(Command::Session),
        _ => Some(Command::Message(trimmed)),
    }
}

/// One-line description of a session for `/session`. `None` means the store
/// no longer holds it.
fn describe_session(summary: Option<&SessionSummary>) -> String {
    match summary {
        Some(s) => format!(
            "{} turns, started {}, last active {}",
            s.turns,
            s.created_at.format("%H:%M:%S UTC"),
            s.updated_at.format("%H:%M:%S UTC"),
        ),
        None => "expired; the next message starts a new patient".to_string(),
    }
}

/// Run one turn, cancelling it if Ctrl-C arrives before the reply.
pub async fn send(service: &ChatService, request: ChatRequest) -> Result<ChatResponse, ChatError> {
    let cancel = CancellationToken::new();
    let turn = service.process_turn(request, cancel.clone());
    tokio::pin!(turn);

    tokio::select! {
        result = &mut turn => result,
        _ = tokio::signal::ctrl_c() => {
            debug!("Ctrl-C, cancelling pending turn");
            cancel.cancel();
            turn.await
        }
    }
}

/// Run the interactive REPL loop.
pub async fn run(service: Arc<ChatService>, patient: PatientArgs) -> Result<()> {
    helpers::print_banner();

    let mut editor = create_editor()?;
    let mut session: Option<SessionId> = None;

    loop {
        // Read input
        let input = match editor.readline("Doctor: ") {
            Ok(line) => line,
            Err(rustyline::error::ReadlineError::Interrupted) => {
                // Ctrl-C at the prompt: exit cleanly
                break;
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                // Ctrl-D: exit cleanly
                break;
            }
            Err(e) => {
                eprintln!("Input error: {e}");
                break;
            }
        };

        let Some(command) = parse_line(&input) else {
            continue;
        };

        let message = match command {
            Command::Exit => {
                println!("\nGoodbye! 👋");
                break;
            }
            Command::New => {
                if let Some(id) = session.take() {
                    service.store().remove(&id);
                }
                println!("{}", "Starting a new patient on the next message.".dimmed());
                continue;
            }
            Command::Session => {
                match session {
                    Some(ref id) => {
                        let summary = service.store().summary(id);
                        println!("{}", id.as_str().cyan());
                        println!("{}", describe_session(summary.as_ref()).dimmed());
                    }
                    None => println!("{}", "(no session yet)".dimmed()),
                }
                continue;
            }
            Command::Message(text) => text,
        };

        let _ = editor.add_history_entry(input.as_str());

        let request = match patient.request(session.as_ref(), message) {
            Ok(request) => request,
            Err(e) => {
                helpers::print_error(&e);
                continue;
            }
        };

        debug!(session = ?session, "sending doctor turn");
        helpers::print_thinking();

        match send(&service, request).await {
            Ok(response) => {
                helpers::clear_thinking();
                if session.as_ref().is_some_and(|id| *id != response.session_id) {
                    println!("{}", "(previous session expired; started a new one)".dimmed());
                }
                session = Some(response.session_id);
                helpers::print_response(&response.reply);
            }
            Err(e) => {
                helpers::clear_thinking();
                helpers::print_error(&e);
            }
        }
    }

    // Save history
    save_history(&mut editor);

    Ok(())
}

/// Create a rustyline editor with history.
fn create_editor() -> Result<Editor<(), DefaultHistory>> {
    let mut editor = DefaultEditor::new()?;
    editor.set_max_history_size(1000)?;

    let history_path = history_path();
    if history_path.exists() {
        let _ = editor.load_history(&history_path);
        debug!("loaded REPL history from {}", history_path.display());
    }

    Ok(editor)
}

fn save_history(editor: &mut Editor<(), DefaultHistory>) {
    let path = history_path();
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Err(e) = editor.save_history(&path) {
        debug!("failed to save history: {e}");
    }
}

/// `~/.patientsim/history/cli_history`
fn history_path() -> std::path::PathBuf {
    patientsim_core::utils::get_data_path()
        .join("history")
        .join("cli_history")
}

fn is_exit_command(input: &str) -> bool {
    let lower = input.to_lowercase();
    EXIT_COMMANDS.contains(&lower.as_str())
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
