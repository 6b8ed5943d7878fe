//! `patientsim onboard`: initialize configuration and the persona catalog.
//!
//! - Creates `~/.patientsim/config.json` with defaults
//! - Creates `PatientPrompts.json` with a few sample personas
//! - Creates the REPL history directory

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;

use patientsim_core::config::{get_config_path, load_config, save_config};
use patientsim_core::persona::{save_catalog, StaticPersonaCatalog};
use patientsim_core::utils::get_data_path;

use crate::helpers::expand_tilde;

/// Run the onboard command.
pub fn run() -> Result<()> {
    println!();
    println!("{}", "🩺 patientsim Setup".cyan().bold());
    println!();

    let config_path = get_config_path();

    // 1. Create config if it doesn't exist
    let config = load_config(None); // defaults + env
    if config_path.exists() {
        println!(
            "  {} config already exists at {}",
            "✓".green(),
            config_path.display()
        );
    } else {
        save_config(&config, Some(&config_path))
            .with_context(|| format!("failed to write {}", config_path.display()))?;
        println!(
            "  {} created config at {}",
            "✓".green(),
            config_path.display()
        );
    }

    // 2. Sample persona catalog
    let catalog_path = expand_tilde(&config.personas.path);
    if create_catalog(&catalog_path)? {
        println!(
            "  {} created persona catalog at {}",
            "✓".green(),
            catalog_path.display()
        );
    } else {
        println!(
            "  {} persona catalog already exists at {}",
            "✓".green(),
            catalog_path.display()
        );
    }

    // 3. History directory
    std::fs::create_dir_all(get_data_path().join("history"))?;

    println!();
    if config.provider.is_configured() {
        println!(
            "{}",
            "  Setup complete! Run `patientsim personas` to pick a patient.".green()
        );
    } else {
        println!(
            "{}",
            format!(
                "  Setup complete! Add provider.apiKey to {} before chatting.",
                config_path.display()
            )
            .yellow()
        );
    }
    println!();

    Ok(())
}

/// Write the sample catalog unless a file is already there.
///
/// Returns whether a file was written.
fn create_catalog(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    let sample = StaticPersonaCatalog::sample();
    save_catalog(sample.personas(), path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(true)
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use patientsim_core::persona::{JsonPersonaCatalog, PersonaCatalog};

    #[tokio::test]
    async fn create_catalog_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("PatientPrompts.json");

        assert!(create_catalog(&path).unwrap());

        let personas = JsonPersonaCatalog::new(&path).list().await.unwrap();
        assert_eq!(personas.len(), StaticPersonaCatalog::sample().personas().len());
    }

    #[test]
    fn create_catalog_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("PatientPrompts.json");
        std::fs::write(&path, r#"{"PatientPrompts": []}"#).unwrap();

        assert!(!create_catalog(&path).unwrap());
        // Should NOT overwrite
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            r#"{"PatientPrompts": []}"#
        );
    }
}
