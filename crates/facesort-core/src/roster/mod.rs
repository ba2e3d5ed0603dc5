//! Roster management for database-matching mode.
//!
//! The roster is a flat, persisted list of known subjects and their canonical
//! descriptions, generated once via `describe_one_face` and reused across
//! runs. It is passed into the engine explicitly rather than held globally,
//! matching how the analysis cache is threaded through.

use crate::error::{ConfigError, EngineError};
use crate::types::RosterEntry;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Serialize, Deserialize)]
struct RosterFile {
    #[serde(default)]
    people: Vec<RosterEntry>,
}

/// In-memory roster, backed by a JSON file.
pub struct Roster {
    path: PathBuf,
    entries: Vec<RosterEntry>,
}

impl Roster {
    /// Load the roster from disk, or start empty if the file doesn't exist.
    pub fn load(path: PathBuf) -> Result<Self, EngineError> {
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let file: RosterFile = serde_json::from_str(&content)?;
            file.people
        } else {
            Vec::new()
        };
        Ok(Self { path, entries })
    }

    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    pub fn find(&self, name: &str) -> Option<&RosterEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Add a new entry. Rejects a case-insensitive duplicate name, since the
    /// matcher looks names up by exact string and a near-duplicate is almost
    /// always an accidental double-registration.
    pub fn add(&mut self, entry: RosterEntry) -> Result<(), EngineError> {
        if self
            .entries
            .iter()
            .any(|e| e.name.eq_ignore_ascii_case(&entry.name))
        {
            return Err(EngineError::Config(ConfigError::ValidationError(format!(
                "a roster entry named '{}' already exists",
                entry.name
            ))));
        }
        self.entries.push(entry);
        self.save()
    }

    /// Remove an entry by exact name. Returns `true` if an entry was removed.
    pub fn remove(&mut self, name: &str) -> Result<bool, EngineError> {
        let before = self.entries.len();
        self.entries.retain(|e| e.name != name);
        let removed = self.entries.len() != before;
        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    /// Validate the roster: every entry has a non-empty name and
    /// description, and every reference path still exists on disk.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for entry in &self.entries {
            if entry.name.trim().is_empty() {
                problems.push("an entry has an empty name".to_string());
            }
            if entry.description.trim().is_empty() {
                problems.push(format!("entry '{}' has an empty description", entry.name));
            }
            for reference in &entry.reference_paths {
                if !reference.exists() {
                    problems.push(format!(
                        "entry '{}' references missing file {}",
                        entry.name,
                        reference.display()
                    ));
                }
            }
        }
        problems
    }

    fn save(&self) -> Result<(), EngineError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = RosterFile {
            people: self.entries.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

/// Build a roster entry from a name, a vision-generated description, and the
/// reference photo paths it was derived from.
pub fn new_entry(
    name: String,
    description: String,
    reference_paths: Vec<PathBuf>,
    notes: Option<String>,
) -> RosterEntry {
    RosterEntry {
        name,
        description,
        reference_paths,
        notes,
        created_at: Utc::now(),
    }
}

/// A filesystem-safe, case-preserving roster name: alphanumerics, `.`, `_`,
/// and `-` only, with any other character collapsed to `_`.
pub fn sanitize_name(raw: &str) -> String {
    let sanitized: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        "Unnamed".to_string()
    } else {
        sanitized
    }
}

impl Roster {
    /// Path to the backing file, for the CLI's `config show`/`config path`.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
