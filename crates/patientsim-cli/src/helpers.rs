//! Shared CLI helpers: path expansion, reply printing, banner.

use std::path::PathBuf;

use colored::Colorize;

use patientsim_core::error::ChatError;

/// Expand `~` at the start of a path to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs_next::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs_next::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

/// Print the patient's reply to stdout.
pub fn print_response(reply: &str) {
    println!();
    println!("{}", "🩺 Patient".cyan().bold());
    if reply.is_empty() {
        println!("{}", "(no reply)".dimmed());
    } else {
        println!("{reply}");
    }
    println!();
}

/// Print a failed turn with its status class.
pub fn print_error(error: &ChatError) {
    eprintln!(
        "\n❌ {} {}\n",
        format!("[{}]", error.kind().status_hint()).red(),
        error.public_message()
    );
}

/// Print the banner shown at REPL start.
pub fn print_banner() {
    let version = env!("CARGO_PKG_VERSION");
    println!();
    println!("{}  v{}", "🩺 patientsim".cyan().bold(), version.dimmed());
    println!(
        "{}",
        "Ask the patient a question. /new starts over, /session shows the id, \"exit\" quits."
            .dimmed()
    );
    println!();
}

/// Print a "waiting" placeholder while the reply is pending.
pub fn print_thinking() {
    eprint!("{}", "⠿ patient is answering... (Ctrl-C to cancel)".dimmed());
}

/// Clear the "waiting" placeholder.
pub fn clear_thinking() {
    eprint!("\r{}\r", " ".repeat(48));
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_tilde_home() {
        let result = expand_tilde("~/.patientsim/PatientPrompts.json");
        assert!(result.ends_with(".patientsim/PatientPrompts.json"));
        assert!(!result.starts_with("~"));
    }

    #[test]
    fn expand_tilde_no_tilde() {
        let result = expand_tilde("/etc/patientsim/PatientPrompts.json");
        assert_eq!(result, PathBuf::from("/etc/patientsim/PatientPrompts.json"));
    }

    #[test]
    fn expand_tilde_bare() {
        let result = expand_tilde("~");
        assert!(!result.to_string_lossy().contains('~'));
    }
}
