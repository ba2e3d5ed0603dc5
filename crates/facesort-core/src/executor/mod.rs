//! Carries out planned placements (copy or move) and records the undo manifest.
//!
//! Failures are per-placement: a single bad copy is logged and counted, never
//! aborts the run. The manifest is only ever replaced atomically, so a crash
//! mid-run leaves either the old manifest or the new one, never a half-write.

use crate::error::EngineError;
use crate::types::{CopyOrMove, Manifest, ManifestEntry, Placement};
use std::path::Path;

pub struct Executor {
    mode: CopyOrMove,
    manifest_path: std::path::PathBuf,
}

/// Outcome of executing a placement plan.
#[derive(Debug, Default)]
pub struct ExecutionResult {
    pub succeeded: usize,
    pub failed: usize,
}

impl Executor {
    pub fn new(mode: CopyOrMove, manifest_path: std::path::PathBuf) -> Self {
        Self {
            mode,
            manifest_path,
        }
    }

    /// Execute every placement in order, appending a manifest entry per
    /// success. The manifest is written once at the end, atomically.
    pub fn execute(&self, placements: &[Placement]) -> Result<ExecutionResult, EngineError> {
        let mut entries = Vec::with_capacity(placements.len());
        let mut result = ExecutionResult::default();

        for placement in placements {
            let Some(destination) = &placement.destination_path else {
                tracing::warn!(
                    "placement for {:?} has no resolved destination; skipping",
                    placement.source_path
                );
                result.failed += 1;
                continue;
            };

            match self.place_one(&placement.source_path, destination) {
                Ok(()) => {
                    entries.push(ManifestEntry {
                        destination_path: destination.clone(),
                        original_path: placement.source_path.clone(),
                    });
                    result.succeeded += 1;
                }
                Err(e) => {
                    tracing::error!(
                        "failed to place {:?} -> {:?}: {e}",
                        placement.source_path,
                        destination
                    );
                    result.failed += 1;
                }
            }
        }

        self.write_manifest(&entries)?;
        Ok(result)
    }

    fn place_one(&self, source: &Path, destination: &Path) -> Result<(), EngineError> {
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)?;
        }
        match self.mode {
            CopyOrMove::Copy => {
                std::fs::copy(source, destination)?;
            }
            CopyOrMove::Move => {
                if std::fs::rename(source, destination).is_err() {
                    std::fs::copy(source, destination)?;
                    std::fs::remove_file(source)?;
                }
            }
        }
        Ok(())
    }

    fn write_manifest(&self, entries: &[ManifestEntry]) -> Result<(), EngineError> {
        let manifest = Manifest {
            mode: self.mode,
            entries: entries.to_vec(),
        };
        let json = serde_json::to_string_pretty(&manifest)?;
        if let Some(parent) = self.manifest_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = self.manifest_path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.manifest_path)?;
        Ok(())
    }
}

/// Reverse a completed run using its manifest. In move mode, destinations are
/// moved back to their original path; in copy mode, destinations are simply
/// deleted and the (untouched) source is left alone. The manifest file is
/// removed after a clean undo.
pub fn undo(manifest_path: &Path) -> Result<ExecutionResult, EngineError> {
    if !manifest_path.exists() {
        return Err(EngineError::Config(crate::error::ConfigError::ValidationError(
            format!("no manifest found at {}", manifest_path.display()),
        )));
    }

    let content = std::fs::read_to_string(manifest_path)?;
    let manifest: Manifest = serde_json::from_str(&content)?;

    let mut result = ExecutionResult::default();
    for entry in &manifest.entries {
        let outcome = match manifest.mode {
            CopyOrMove::Move => {
                if let Some(parent) = entry.original_path.parent() {
                    std::fs::create_dir_all(parent).ok();
                }
                std::fs::rename(&entry.destination_path, &entry.original_path)
            }
            CopyOrMove::Copy => std::fs::remove_file(&entry.destination_path),
        };
        match outcome {
            Ok(()) => result.succeeded += 1,
            Err(e) => {
                tracing::error!("undo failed for {:?}: {e}", entry.destination_path);
                result.failed += 1;
            }
        }
    }

    if result.failed == 0 {
        std::fs::remove_file(manifest_path)?;
    }
    Ok(result)
}
