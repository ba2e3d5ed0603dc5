//! Writes the post-run `organization_log.json` artifact.
//!
//! `schema_version` is bumped whenever a breaking change is made to this
//! shape; readers should ignore unknown fields rather than fail closed, the
//! same forward-compatibility stance as the cache and roster files.

use crate::config::Config;
use crate::error::EngineError;
use crate::types::{Category, Placement, RunMode, RunSummary};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const SCHEMA_VERSION: u32 = 1;

/// Run-relevant configuration, minus secrets, captured at report time so a
/// reader can tell which thresholds and limits produced a given run.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub parallel: usize,
    pub supported_formats: Vec<String>,
    pub max_payload_mb: f64,
    pub max_dimension: u32,
    pub vision_model: String,
    pub cluster_threshold: f64,
    pub match_threshold: f64,
    pub t_exact_seconds: i64,
    pub t_high_seconds: i64,
    pub copy_mode: bool,
}

impl ConfigSnapshot {
    fn from_config(config: &Config) -> Self {
        Self {
            parallel: config.processing.parallel,
            supported_formats: config.processing.supported_formats.clone(),
            max_payload_mb: config.limits.max_payload_mb,
            max_dimension: config.limits.max_dimension,
            vision_model: config.vision.model.clone(),
            cluster_threshold: config.vision.cluster_threshold,
            match_threshold: config.vision.match_threshold,
            t_exact_seconds: config.vision.t_exact_seconds,
            t_high_seconds: config.vision.t_high_seconds,
            copy_mode: config.output.copy_mode,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReportEntry {
    pub source_path: PathBuf,
    /// `None` when the image never reached classification (decode failure).
    pub category: Option<Category>,
    pub destination_name: String,
    pub destination_path: Option<PathBuf>,
    /// Failure detail for a decode error or a vision error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Report {
    pub schema_version: u32,
    pub mode: RunMode,
    pub config: ConfigSnapshot,
    pub summary: RunSummary,
    pub cluster_sizes: Vec<(String, usize)>,
    pub entries: Vec<ReportEntry>,
}

/// Build the report payload for a finished run.
///
/// `decode_failures` are images that never reached classification at all
/// (unreadable or unrecognized) and so have no `Placement`; they still get a
/// `ReportEntry` so the report accounts for every discovered file.
pub fn build_report(
    mode: RunMode,
    config: &Config,
    summary: RunSummary,
    cluster_sizes: Vec<(String, usize)>,
    placements: &[Placement],
    decode_failures: &[(PathBuf, String)],
) -> Report {
    let mut entries: Vec<ReportEntry> = placements
        .iter()
        .map(|p| ReportEntry {
            source_path: p.source_path.clone(),
            category: Some(p.category),
            destination_name: p.destination_name.clone(),
            destination_path: p.destination_path.clone(),
            error: p.error.clone(),
        })
        .collect();

    entries.extend(decode_failures.iter().map(|(path, message)| ReportEntry {
        source_path: path.clone(),
        category: None,
        destination_name: String::new(),
        destination_path: None,
        error: Some(message.clone()),
    }));

    Report {
        schema_version: SCHEMA_VERSION,
        mode,
        config: ConfigSnapshot::from_config(config),
        summary,
        cluster_sizes,
        entries,
    }
}

/// Write the report to `<output_root>/organization_log.json`.
pub fn write_report(output_root: &Path, report: &Report) -> Result<(), EngineError> {
    std::fs::create_dir_all(output_root)?;
    let path = output_root.join("organization_log.json");
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Category;

    #[test]
    fn test_build_report_carries_schema_version() {
        let summary = RunSummary::default();
        let report = build_report(RunMode::AutoCluster, &Config::default(), summary, vec![], &[], &[]);
        assert_eq!(report.schema_version, 1);
    }

    #[test]
    fn test_build_report_omits_api_key_from_snapshot() {
        let mut config = Config::default();
        config.vision.api_key = "sk-super-secret".to_string();
        let report = build_report(
            RunMode::AutoCluster,
            &config,
            RunSummary::default(),
            vec![],
            &[],
            &[],
        );
        let json = serde_json::to_string(&report).unwrap();
        assert!(!json.contains("sk-super-secret"));
    }

    #[test]
    fn test_write_report_produces_valid_json() {
        let dir = tempfile::tempdir().unwrap();
        let placements = vec![Placement {
            source_path: PathBuf::from("/a.jpg"),
            category: Category::SingleSubject,
            destination_name: "Alice".to_string(),
            destination_path: Some(PathBuf::from("/out/Alice/a.jpg")),
            error: None,
        }];
        let report = build_report(
            RunMode::Database,
            &Config::default(),
            RunSummary::default(),
            vec![("Alice".to_string(), 1)],
            &placements,
            &[(PathBuf::from("/corrupt.jpg"), "bad magic bytes".to_string())],
        );
        write_report(dir.path(), &report).unwrap();

        let content = std::fs::read_to_string(dir.path().join("organization_log.json")).unwrap();
        let parsed: Report = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.entries.len(), 2);
        assert_eq!(parsed.cluster_sizes[0].0, "Alice");
        assert!(parsed.entries.iter().any(|e| e.category.is_none() && e.error.is_some()));
    }
}
