//! Analysis cache: at-most-once vision invocation per `(content_hash, prompt_kind)`.
//!
//! Keeping this as an explicit object the engine threads through, rather than
//! a global, makes a run's cache visibility a parameter instead of ambient
//! state — two engines can run against two different caches in the same
//! process (useful in tests).

use crate::error::EngineError;
use crate::types::SubjectDetection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Which vision operation a cache entry corresponds to. The same image can
/// have both a `DetectSubjects` entry (auto-cluster mode) and a
/// `DescribeFace` entry (if it was also used as a roster reference photo).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    DescribeFace,
    DetectSubjects,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    content_hash: String,
    prompt_kind: PromptKind,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    detections: Vec<SubjectDetection>,
}

/// On-disk cache format. Plain `#[serde(default)]` fields (no
/// `deny_unknown_fields`) keep older cache files loadable across versions
/// that add new entry fields.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    entries: Vec<CacheEntry>,
}

/// The in-memory, periodically-flushed analysis cache.
pub struct AnalysisCache {
    path: PathBuf,
    flush_interval: usize,
    enabled: bool,
    entries: HashMap<(String, PromptKind), CacheEntry>,
    dirty_count: usize,
}

impl AnalysisCache {
    /// Load a cache from disk, or start empty if the file doesn't exist yet.
    pub fn load(path: PathBuf, flush_interval: usize, enabled: bool) -> Result<Self, EngineError> {
        let mut entries = HashMap::new();
        if enabled && path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let file: CacheFile = serde_json::from_str(&content)?;
            for entry in file.entries {
                entries.insert((entry.content_hash.clone(), entry.prompt_kind), entry);
            }
        }
        Ok(Self {
            path,
            flush_interval,
            enabled,
            entries,
            dirty_count: 0,
        })
    }

    /// Previously cached subject detections for a `(hash, DetectSubjects)` key.
    pub fn get_detections(&self, content_hash: &str) -> Option<&[SubjectDetection]> {
        self.entries
            .get(&(content_hash.to_string(), PromptKind::DetectSubjects))
            .map(|e| e.detections.as_slice())
    }

    /// Previously cached face description for a `(hash, DescribeFace)` key.
    pub fn get_description(&self, content_hash: &str) -> Option<&str> {
        self.entries
            .get(&(content_hash.to_string(), PromptKind::DescribeFace))
            .and_then(|e| e.description.as_deref())
    }

    /// Record a successful `detect_all_subjects` result, flushing every
    /// `flush_interval` new entries.
    pub fn put_detections(
        &mut self,
        content_hash: &str,
        detections: Vec<SubjectDetection>,
    ) -> Result<(), EngineError> {
        if !self.enabled {
            return Ok(());
        }
        self.entries.insert(
            (content_hash.to_string(), PromptKind::DetectSubjects),
            CacheEntry {
                content_hash: content_hash.to_string(),
                prompt_kind: PromptKind::DetectSubjects,
                description: None,
                detections,
            },
        );
        self.note_write()
    }

    /// Record a successful `describe_one_face` result.
    pub fn put_description(
        &mut self,
        content_hash: &str,
        description: String,
    ) -> Result<(), EngineError> {
        if !self.enabled {
            return Ok(());
        }
        self.entries.insert(
            (content_hash.to_string(), PromptKind::DescribeFace),
            CacheEntry {
                content_hash: content_hash.to_string(),
                prompt_kind: PromptKind::DescribeFace,
                description: Some(description),
                detections: Vec::new(),
            },
        );
        self.note_write()
    }

    fn note_write(&mut self) -> Result<(), EngineError> {
        self.dirty_count += 1;
        if self.dirty_count >= self.flush_interval {
            self.flush()?;
        }
        Ok(())
    }

    /// Force a flush regardless of the dirty counter. Always called at clean
    /// shutdown so a run's final entries are never lost.
    pub fn flush(&mut self) -> Result<(), EngineError> {
        if !self.enabled {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = CacheFile {
            entries: self.entries.values().cloned().collect(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.path)?;
        self.dirty_count = 0;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Drop for AnalysisCache {
    fn drop(&mut self) {
        if self.dirty_count > 0 {
            if let Err(e) = self.flush() {
                tracing::warn!("failed to flush analysis cache on drop: {e}");
            }
        }
    }
}

/// Acquire the advisory single-writer lock for a state directory.
///
/// Returns an error if another facesort process already holds it; the lock
/// is released (file removed) when the returned guard is dropped.
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    pub fn acquire(state_dir: &Path) -> Result<Self, EngineError> {
        std::fs::create_dir_all(state_dir)?;
        let path = state_dir.join("facesort.lock");
        let file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path);
        match file {
            Ok(mut f) => {
                use std::io::Write;
                let _ = write!(f, "{}", std::process::id());
                Ok(Self { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(EngineError::Config(crate::error::ConfigError::ValidationError(
                    format!(
                        "another facesort run appears to be in progress (lock file: {})",
                        path.display()
                    ),
                )))
            }
            Err(e) => Err(EngineError::Io(e)),
        }
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(outfit: &str) -> SubjectDetection {
        SubjectDetection {
            position: None,
            outfit_description: outfit.to_string(),
            bib_number: None,
            features: Default::default(),
        }
    }

    #[test]
    fn test_cache_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        {
            let mut cache = AnalysisCache::load(path.clone(), 5, true).unwrap();
            cache
                .put_detections("hash1", vec![detection("red jacket")])
                .unwrap();
            cache.flush().unwrap();
        }

        let cache = AnalysisCache::load(path, 5, true).unwrap();
        let detections = cache.get_detections("hash1").unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].outfit_description, "red jacket");
    }

    #[test]
    fn test_cache_flushes_after_interval() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let mut cache = AnalysisCache::load(path.clone(), 2, true).unwrap();

        cache.put_detections("a", vec![]).unwrap();
        assert!(!path.exists(), "should not flush after first write");
        cache.put_detections("b", vec![]).unwrap();
        assert!(path.exists(), "should flush once dirty_count hits interval");
    }

    #[test]
    fn test_disabled_cache_never_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let mut cache = AnalysisCache::load(path.clone(), 1, false).unwrap();
        cache.put_detections("a", vec![]).unwrap();
        assert!(!path.exists());
        assert!(cache.get_detections("a").is_none());
    }

    #[test]
    fn test_run_lock_rejects_second_acquire() {
        let dir = tempfile::tempdir().unwrap();
        let first = RunLock::acquire(dir.path()).unwrap();
        let second = RunLock::acquire(dir.path());
        assert!(second.is_err());
        drop(first);
        assert!(RunLock::acquire(dir.path()).is_ok());
    }
}
