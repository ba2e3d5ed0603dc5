//! Core data types for the facesort engine.
//!
//! These mirror the data model in the specification: an `Image` carries identity
//! and timing, a `SubjectDetection` is one face/outfit found in one image, and the
//! auto-cluster and database-match entry points both produce `Placement`s that the
//! planner and executor turn into filesystem moves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A candidate photo discovered under the source directory.
#[derive(Debug, Clone)]
pub struct Image {
    /// Canonical absolute path to the source file.
    pub path: PathBuf,
    /// BLAKE3 digest of the original file bytes; the cache key.
    pub content_hash: String,
    /// Capture instant, when recoverable. Never derived from filesystem mtime.
    pub captured_at: Option<DateTime<Utc>>,
    /// Format tag ("jpeg", "png", "heic", ...).
    pub format: String,
    /// File size in bytes.
    pub file_size: u64,
}

/// Structured visual-feature hints attached to a detection. Every field is
/// optional; these are weighting hints for the comparator, never authoritative.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureHints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub helmet_brand: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub helmet_colors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goggle_lens_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goggle_strap: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boot_brand: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub boot_colors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clothing_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clothing_colors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub equipment_brands: Vec<String>,
}

impl FeatureHints {
    /// Up to three dominant feature tokens, used to synthesize an outfit-based
    /// cluster name when no bib number was observed. Order follows the
    /// comparator's own weighting: helmet, then boots, then clothing.
    pub fn dominant_tokens(&self, max: usize) -> Vec<String> {
        let mut tokens = Vec::new();
        if let Some(ref brand) = self.helmet_brand {
            tokens.push(brand.clone());
        }
        tokens.extend(self.helmet_colors.iter().cloned());
        if let Some(ref brand) = self.boot_brand {
            tokens.push(brand.clone());
        }
        tokens.extend(self.boot_colors.iter().cloned());
        if let Some(ref pattern) = self.clothing_pattern {
            tokens.push(pattern.clone());
        }
        tokens.extend(self.clothing_colors.iter().cloned());
        tokens.truncate(max);
        tokens
    }
}

/// One face/outfit found in one image by `detect_all_subjects`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectDetection {
    /// Free-text position hint ("center", "left", ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    /// Free-text outfit description. The only non-optional field; the canonical
    /// input to `compare_two_descriptions`.
    pub outfit_description: String,
    /// Recorded only when every digit is unambiguously legible.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bib_number: Option<String>,
    /// Structured hints to the comparator.
    #[serde(default)]
    pub features: FeatureHints,
}

/// An `Image` plus its ordered list of detections. The analysis-cache entry,
/// keyed by `(content_hash, prompt_kind)`.
#[derive(Debug, Clone)]
pub struct ImageAnalysis {
    pub image: Image,
    pub detections: Vec<SubjectDetection>,
}

/// A roster entry (database mode only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterEntry {
    /// Unique, case-preserving subject name.
    pub name: String,
    /// Canonical facial description from `describe_one_face`.
    pub description: String,
    /// One or more reference image paths the description was derived from.
    pub reference_paths: Vec<PathBuf>,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One member of an in-progress or finished cluster.
#[derive(Debug, Clone)]
pub struct ClusterMember {
    pub image: Image,
    pub detection: SubjectDetection,
}

/// A run-local grouping of single-subject photographs believed to show the same
/// subject (auto-cluster mode only).
#[derive(Debug, Clone)]
pub struct Cluster {
    /// Monotonically assigned within a run; never reused.
    pub id: u64,
    /// Ordered list of members; `members[0]` is the exemplar's source.
    pub members: Vec<ClusterMember>,
    /// The first detection placed in the cluster.
    pub exemplar: SubjectDetection,
    /// Capture instant of the most recently assigned member, when known.
    pub last_seen: Option<DateTime<Utc>>,
    /// First non-null bib number observed among members; first one wins.
    pub bib_number: Option<String>,
}

impl Cluster {
    pub fn new(id: u64, member: ClusterMember) -> Self {
        let last_seen = member.image.captured_at;
        let bib_number = member.detection.bib_number.clone();
        let exemplar = member.detection.clone();
        Self {
            id,
            members: vec![member],
            exemplar,
            last_seen,
            bib_number,
        }
    }

    /// Record a new member, updating `last_seen` and the sticky bib number.
    pub fn add(&mut self, member: ClusterMember) {
        if let Some(captured_at) = member.image.captured_at {
            self.last_seen = Some(captured_at);
        }
        if self.bib_number.is_none() {
            self.bib_number = member.detection.bib_number.clone();
        }
        self.members.push(member);
    }
}

/// The destination category a photo is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    SingleSubject,
    MultipleSubjects,
    UnknownSubjects,
    NoFaces,
}

impl Category {
    pub fn folder_name(self) -> &'static str {
        match self {
            Category::SingleSubject => "",
            Category::MultipleSubjects => "Multiple_People",
            Category::UnknownSubjects => "Unknown_Faces",
            Category::NoFaces => "No_Faces_Detected",
        }
    }
}

/// A planned `(source, destination)` file placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Placement {
    pub source_path: PathBuf,
    pub category: Category,
    pub destination_name: String,
    /// Resolved at execution time once filename collisions are settled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_path: Option<PathBuf>,
    /// Set when this placement stands in for a vision failure rather than a
    /// real classification (the file is still placed under `NoFaces`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One `(destination, original)` manifest entry, sufficient to undo a placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub destination_path: PathBuf,
    pub original_path: PathBuf,
}

/// How files were placed, recorded in the manifest so `undo` knows whether to
/// move files back or simply delete the copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CopyOrMove {
    Copy,
    Move,
}

/// The on-disk undo manifest (`.original_paths.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub mode: CopyOrMove,
    pub entries: Vec<ManifestEntry>,
}

/// Run mode, recorded in the report and used to pick the engine entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    Database,
    AutoCluster,
}

/// Per-run counters surfaced in the report and used to compute the CLI exit code.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub single_subject: usize,
    pub multiple_subjects: usize,
    pub unknown_subjects: usize,
    pub no_faces: usize,
    pub placements_succeeded: usize,
    pub placements_failed: usize,
    pub vision_errors: usize,
    pub decode_errors: usize,
}

impl RunSummary {
    /// `true` when any recoverable failure occurred during the run, which maps
    /// to exit code 3 ("partial failure") in the CLI.
    pub fn had_partial_failure(&self) -> bool {
        self.placements_failed > 0 || self.vision_errors > 0 || self.decode_errors > 0
    }
}
