//! `patientsim personas`: list the patient personas in the catalog.

use anyhow::{Context, Result};
use colored::Colorize;

use patientsim_core::config::load_config;
use patientsim_core::persona::{JsonPersonaCatalog, PersonaCatalog, PersonaError, PersonaTemplate};
use patientsim_core::utils::truncate_string;

/// Width of the prompt preview column.
const PREVIEW_CHARS: usize = 60;

pub async fn run() -> Result<()> {
    let config = load_config(None);
    let catalog = JsonPersonaCatalog::new(crate::helpers::expand_tilde(&config.personas.path));

    let personas = match catalog.list().await {
        Ok(personas) => personas,
        Err(PersonaError::Missing { path }) => {
            println!();
            println!(
                "  {} no persona catalog at {}. Run `patientsim onboard` to create one.",
                "·".dimmed(),
                path.display()
            );
            println!();
            return Ok(());
        }
        Err(e) => return Err(e).context("failed to read persona catalog"),
    };

    println!();
    println!(
        "{}  {}",
        "🩺 Personas".cyan().bold(),
        catalog.path().display().to_string().dimmed()
    );
    println!();

    if personas.is_empty() {
        println!("  {}", "(catalog is empty)".dimmed());
    }
    for line in render(&personas) {
        println!("{line}");
    }
    println!();

    Ok(())
}

fn render(personas: &[PersonaTemplate]) -> Vec<String> {
    let mut sorted: Vec<&PersonaTemplate> = personas.iter().collect();
    sorted.sort_by_key(|p| p.id);
    sorted
        .into_iter()
        .map(|p| {
            let preview = p.system_prompt.split_whitespace().collect::<Vec<_>>().join(" ");
            format!(
                "  {:>4}  {:<22} {}",
                p.id,
                p.name,
                truncate_string(&preview, PREVIEW_CHARS).dimmed()
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_sorts_by_id() {
        let personas = vec![
            PersonaTemplate::new(7, "Gout", "Painful big toe."),
            PersonaTemplate::new(2, "Anemia", "Tired\nand pale."),
        ];
        colored::control::set_override(false);
        let lines = render(&personas);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("Anemia"));
        assert!(lines[0].contains("Tired and pale."));
        assert!(lines[1].trim_start().starts_with('7'));
    }
}
