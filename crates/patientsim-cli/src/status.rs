//! `patientsim status`: show configuration and provider status.

use anyhow::Result;
use colored::Colorize;

use patientsim_core::config::{get_config_path, load_config};
use patientsim_providers::registry::{find_by_name, resolve_api_key, PROVIDERS};

/// Run the status command.
pub fn run() -> Result<()> {
    let config = load_config(None);
    let config_path = get_config_path();

    println!();
    println!("{}", "🩺 patientsim Status".cyan().bold());
    println!();

    // Config
    println!(
        "  {:<18} {} {}",
        "Config:".bold(),
        config_path.display(),
        found_marker(config_path.exists())
    );

    // Persona catalog
    let catalog = crate::helpers::expand_tilde(&config.personas.path);
    println!(
        "  {:<18} {} {}",
        "Personas:".bold(),
        catalog.display(),
        found_marker(catalog.exists())
    );

    // Provider
    let provider = &config.provider;
    let spec = find_by_name(&provider.name);
    println!(
        "  {:<18} {}",
        "Provider:".bold(),
        spec.map_or_else(
            || format!("{} {}", provider.name, "(unknown)".red()),
            |s| s.display_name.to_string()
        )
    );
    println!("  {:<18} {}", "Model:".bold(), provider.model);
    if let Some(base) = provider
        .api_base
        .as_deref()
        .or_else(|| spec.and_then(|s| s.default_api_base))
    {
        println!("  {:<18} {}", "Endpoint:".bold(), base);
    }

    // Chat parameters
    let chat = &config.chat;
    println!(
        "  {:<18} {}",
        "Sessions:".bold(),
        format!(
            "max_turns: {} | idle: {}m | timeout: {}s",
            chat.max_turns, chat.session_idle_minutes, chat.request_timeout_secs
        )
        .dimmed()
    );
    println!(
        "  {:<18} {}",
        "Sampling:".bold(),
        format!(
            "temp: {} | top_p: {} | max_tokens: {}",
            chat.generation.temperature, chat.generation.top_p, chat.generation.max_output_tokens
        )
        .dimmed()
    );

    // API keys
    println!();
    println!("  {}", "API keys:".bold());
    for spec in PROVIDERS {
        let active = spec.name == provider.name.trim().to_ascii_lowercase();
        let key_status = if active && resolve_api_key(provider, spec).is_some() {
            format!("{} (key set)", "✓".green())
        } else if std::env::var(spec.env_key).is_ok_and(|k| !k.is_empty()) {
            format!("{} ({} set)", "✓".green(), spec.env_key)
        } else if spec.is_local {
            format!("{}", "· not required".dimmed())
        } else {
            format!("{}", "· not configured".dimmed())
        };
        let marker = if active { "*" } else { " " };
        println!("   {marker}{:<20} {}", spec.display_name, key_status);
    }

    println!();

    Ok(())
}

fn found_marker(exists: bool) -> String {
    if exists {
        "✓".green().to_string()
    } else {
        "(not found)".red().to_string()
    }
}
