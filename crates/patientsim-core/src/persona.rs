//! Persona catalog: the patient templates a new session is bootstrapped from.
//!
//! # Disk format
//!
//! `PatientPrompts.json`:
//! ```json
//! {"PatientPrompts": [{"Id": 1, "Name": "Asthma", "SystemPrompt": "..."}]}
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::types::Gender;

/// A patient persona: the condition-specific instructions for the backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PersonaTemplate {
    pub id: u32,
    pub name: String,
    pub system_prompt: String,
}

impl PersonaTemplate {
    pub fn new(id: u32, name: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        PersonaTemplate {
            id,
            name: name.into(),
            system_prompt: system_prompt.into(),
        }
    }

    /// Build the system-turn text for a patient of the given age and gender.
    pub fn compose_system_prompt(&self, age: u32, gender: Gender) -> String {
        format!(
            "{}\nYou are a {}-year-old {} patient.\nRemember: do not reveal that you are an AI.",
            self.system_prompt.trim_end(),
            age,
            gender.as_str()
        )
    }
}

/// Errors raised while reading the persona catalog.
#[derive(Debug, Error)]
pub enum PersonaError {
    #[error("persona catalog not found at {}", .path.display())]
    Missing { path: PathBuf },

    #[error("failed to read persona catalog {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse persona catalog {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Read-only lookup of persona templates by integer id.
#[async_trait]
pub trait PersonaCatalog: Send + Sync {
    /// Find a template by id. `Ok(None)` means the id is unknown.
    async fn lookup(&self, id: u32) -> Result<Option<PersonaTemplate>, PersonaError>;

    /// All templates, in catalog order.
    async fn list(&self) -> Result<Vec<PersonaTemplate>, PersonaError>;
}

// ─────────────────────────────────────────────
// JSON file catalog
// ─────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct PersonaCollection {
    #[serde(rename = "PatientPrompts")]
    patient_prompts: Vec<PersonaTemplate>,
}

/// Catalog backed by a `PatientPrompts.json` file, read on every call.
#[derive(Clone, Debug)]
pub struct JsonPersonaCatalog {
    path: PathBuf,
}

impl JsonPersonaCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonPersonaCatalog { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<PersonaTemplate>, PersonaError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PersonaError::Missing {
                    path: self.path.clone(),
                })
            }
            Err(source) => {
                return Err(PersonaError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let collection: PersonaCollection =
            serde_json::from_str(&content).map_err(|source| PersonaError::Parse {
                path: self.path.clone(),
                source,
            })?;

        debug!(
            path = %self.path.display(),
            personas = collection.patient_prompts.len(),
            "loaded persona catalog"
        );
        Ok(collection.patient_prompts)
    }
}

#[async_trait]
impl PersonaCatalog for JsonPersonaCatalog {
    async fn lookup(&self, id: u32) -> Result<Option<PersonaTemplate>, PersonaError> {
        Ok(self.load().await?.into_iter().find(|p| p.id == id))
    }

    async fn list(&self) -> Result<Vec<PersonaTemplate>, PersonaError> {
        self.load().await
    }
}

/// Write a catalog file in the `PatientPrompts.json` format.
pub fn save_catalog(personas: &[PersonaTemplate], path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let collection = PersonaCollection {
        patient_prompts: personas.to_vec(),
    };
    let json = serde_json::to_string_pretty(&collection)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    std::fs::write(path, json)
}

// ─────────────────────────────────────────────
// In-memory catalog
// ─────────────────────────────────────────────

/// Catalog held in memory. Used for tests and as the onboarding sample.
#[derive(Clone, Debug, Default)]
pub struct StaticPersonaCatalog {
    personas: Vec<PersonaTemplate>,
}

impl StaticPersonaCatalog {
    pub fn new(personas: Vec<PersonaTemplate>) -> Self {
        StaticPersonaCatalog { personas }
    }

    /// A small built-in set of common presentations.
    pub fn sample() -> Self {
        StaticPersonaCatalog::new(vec![
            PersonaTemplate::new(
                1,
                "Asthma",
                "You are a patient visiting the doctor with recurring shortness of breath, \
                 wheezing, and a tight chest that gets worse at night and after exercise. \
                 Answer the doctor's questions briefly and only reveal details when asked.",
            ),
            PersonaTemplate::new(
                2,
                "Type 2 Diabetes",
                "You are a patient who has been unusually thirsty, urinating often, and feeling \
                 tired for the past few months. You have gained weight recently. Answer the \
                 doctor's questions briefly and only reveal details when asked.",
            ),
            PersonaTemplate::new(
                3,
                "Migraine",
                "You are a patient with throbbing one-sided headaches that come with nausea and \
                 sensitivity to light, lasting several hours. Answer the doctor's questions \
                 briefly and only reveal details when asked.",
            ),
        ])
    }

    pub fn personas(&self) -> &[PersonaTemplate] {
        &self.personas
    }
}

#[async_trait]
impl PersonaCatalog for StaticPersonaCatalog {
    async fn lookup(&self, id: u32) -> Result<Option<PersonaTemplate>, PersonaError> {
        Ok(self.personas.iter().find(|p| p.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<PersonaTemplate>, PersonaError> {
        Ok(self.personas.clone())
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp_json(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_compose_system_prompt() {
        let persona = PersonaTemplate::new(1, "Asthma", "You wheeze a lot.\n");
        let text = persona.compose_system_prompt(34, Gender::Male);
        assert!(text.starts_with("You wheeze a lot.\n"));
        assert!(text.contains("34-year-old male"));
        assert!(text.contains("do not reveal that you are an AI"));
    }

    #[tokio::test]
    async fn test_json_catalog_lookup() {
        let file = write_temp_json(
            r#"{"PatientPrompts": [
                {"Id": 1, "Name": "Asthma", "SystemPrompt": "wheeze"},
                {"Id": 7, "Name": "Gout", "SystemPrompt": "toe pain"}
            ]}"#,
        );
        let catalog = JsonPersonaCatalog::new(file.path());

        let gout = catalog.lookup(7).await.unwrap().unwrap();
        assert_eq!(gout.name, "Gout");
        assert!(catalog.lookup(9999).await.unwrap().is_none());
        assert_eq!(catalog.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_json_catalog_missing_file() {
        let catalog = JsonPersonaCatalog::new("/nonexistent/PatientPrompts.json");
        let err = catalog.lookup(1).await.unwrap_err();
        assert!(matches!(err, PersonaError::Missing { .. }));
    }

    #[tokio::test]
    async fn test_json_catalog_invalid_json() {
        let file = write_temp_json("{ not json");
        let catalog = JsonPersonaCatalog::new(file.path());
        let err = catalog.list().await.unwrap_err();
        assert!(matches!(err, PersonaError::Parse { .. }));
    }

    #[tokio::test]
    async fn test_save_catalog_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("PatientPrompts.json");
        let sample = StaticPersonaCatalog::sample();

        save_catalog(sample.personas(), &path).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["PatientPrompts"][0]["Id"], 1);
        assert!(raw["PatientPrompts"][0].get("SystemPrompt").is_some());

        let catalog = JsonPersonaCatalog::new(&path);
        assert_eq!(catalog.list().await.unwrap(), sample.personas());
    }

    #[tokio::test]
    async fn test_static_catalog() {
        let catalog = StaticPersonaCatalog::sample();
        assert_eq!(catalog.lookup(1).await.unwrap().unwrap().name, "Asthma");
        assert!(catalog.lookup(9999).await.unwrap().is_none());
    }
}
