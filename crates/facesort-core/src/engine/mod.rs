//! Orchestrates the full pipeline: discover, decode, timestamp, vision,
//! cluster/match, plan, execute, report.
//!
//! Vision RPC calls are the only suspension points worth parallelizing, so
//! stage 1 (per-image decode + `detect_all_subjects`) runs with bounded
//! concurrency via a buffered stream. Stage 2 (cluster assignment) is
//! strictly sequential in enumeration order, since the clusterer's own
//! ordering guarantee requires it.

use crate::cache::{AnalysisCache, RunLock};
use crate::clusterer::{Clusterer, ClustererThresholds};
use crate::config::Config;
use crate::error::EngineError;
use crate::executor::Executor;
use crate::matcher::{self, MatchOutcome};
use crate::pipeline::{FileDiscovery, Hasher, ImageDecoder, MetadataExtractor, Validator};
use crate::planner::{classify_placement, classify_vision_failure, Planner};
use crate::reporter::{self, Report};
use crate::roster::Roster;
use crate::types::{Category, CopyOrMove, Image, Placement, RunMode, RunSummary, SubjectDetection};
use crate::vision::{self, VisionProvider};
use futures_util::stream::{self, StreamExt};
use std::path::{Path, PathBuf};

/// Per-invocation flags that don't belong in the persisted config.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub dry_run: bool,
    /// Walk subdirectories of the source during discovery.
    pub recursive: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            recursive: true,
        }
    }
}

/// Result of stage 1 for one image: the detections (or the error that
/// occurred trying to get them) plus enough identity to place it later.
enum Analyzed {
    Detections { image: Image, detections: Vec<SubjectDetection> },
    DecodeError { path: PathBuf, message: String },
    VisionError { image: Image, message: String },
}

enum FailureStage {
    Decode { path: PathBuf, message: String },
    Vision { image: Image, message: String },
}

pub struct Engine {
    config: Config,
    provider: Box<dyn VisionProvider>,
}

impl Engine {
    pub async fn new(config: Config) -> Result<Self, EngineError> {
        let provider = vision::build_provider(&config.vision)?;
        Ok(Self { config, provider })
    }

    /// Build an engine around an already-constructed provider, bypassing the
    /// config-driven factory. Used by tests and by callers wiring up a
    /// backend that isn't selectable through `VisionConfig` alone.
    pub fn with_provider(config: Config, provider: Box<dyn VisionProvider>) -> Self {
        Self { config, provider }
    }

    /// Decode a single reference photo and ask the vision backend for its
    /// canonical description, for ingesting a new roster entry.
    pub async fn describe_reference_photo(&self, path: &Path) -> Result<String, EngineError> {
        let validator = Validator::new(self.config.limits.clone());
        validator.validate(path)?;
        let decoder = ImageDecoder::new(self.config.limits.clone());
        let decoded = decoder.decode(path).await?;
        let payload = decoder.encode_for_vision(&decoded, self.config.processing.jpeg_quality)?;
        let description = vision::call_with_retry(&self.config.vision, || {
            self.provider.describe_one_face(&payload)
        })
        .await?;
        Ok(description)
    }

    pub async fn run_auto_cluster(
        &self,
        source: &Path,
        output: &Path,
        options: &RunOptions,
    ) -> Result<(RunSummary, Vec<Placement>), EngineError> {
        let _lock = RunLock::acquire(&self.config.state_dir())?;
        let mut cache = AnalysisCache::load(
            self.config.cache_path(),
            self.config.cache.flush_interval,
            self.config.cache.enabled,
        )?;

        let analyzed = self.analyze_all(source, &mut cache, options).await?;
        cache.flush()?;

        let thresholds = ClustererThresholds {
            t_exact_seconds: self.config.vision.t_exact_seconds,
            t_high_seconds: self.config.vision.t_high_seconds,
            cluster_threshold: self.config.vision.cluster_threshold,
            early_terminate_score: self.config.vision.early_terminate_score,
        };
        let mut clusterer = Clusterer::new(thresholds);
        let mut summary = RunSummary::default();
        let mut placements = Vec::new();
        let mut decode_failures = Vec::new();
        let mut cluster_of_image: Vec<(u64, &str)> = Vec::new();

        for item in &analyzed {
            match item {
                Analyzed::DecodeError { path, message } => {
                    summary.decode_errors += 1;
                    decode_failures.push((path.clone(), message.clone()));
                }
                Analyzed::VisionError { image, message } => {
                    summary.vision_errors += 1;
                    summary.no_faces += 1;
                    placements.push(classify_vision_failure(&image.path, message.clone()));
                }
                Analyzed::Detections { image, detections } => match detections.len() {
                    0 => {
                        summary.no_faces += 1;
                        placements.push(classify_placement(
                            &image.path,
                            Category::NoFaces,
                            String::new(),
                        ));
                    }
                    1 => {
                        let cluster_id = clusterer
                            .assign(self.provider.as_ref(), image.clone(), detections[0].clone())
                            .await?;
                        summary.single_subject += 1;
                        cluster_of_image.push((cluster_id, image.path.to_str().unwrap_or_default()));
                        placements.push(classify_placement(
                            &image.path,
                            Category::SingleSubject,
                            String::new(),
                        ));
                    }
                    _ => {
                        summary.multiple_subjects += 1;
                        let joined = "Multiple_Subjects".to_string();
                        placements.push(classify_placement(
                            &image.path,
                            Category::MultipleSubjects,
                            joined,
                        ));
                    }
                },
            }
        }

        let names = clusterer.finalize_names();
        let mut cluster_sizes: Vec<(String, usize)> = clusterer
            .clusters()
            .iter()
            .map(|c| {
                let name = names.get(&c.id).cloned().unwrap_or_else(|| c.id.to_string());
                (name, c.members.len())
            })
            .collect();
        cluster_sizes.sort();

        // Resolve the single-subject placements' destination names now that
        // cluster ids are known (assigned in the same enumeration-order pass
        // above, so the nth single-subject placement maps to the nth entry
        // in `cluster_of_image`).
        let mut single_subject_idx = 0;
        for placement in &mut placements {
            if placement.category == Category::SingleSubject {
                let (cluster_id, _) = cluster_of_image[single_subject_idx];
                placement.destination_name = names
                    .get(&cluster_id)
                    .cloned()
                    .unwrap_or_else(|| cluster_id.to_string());
                single_subject_idx += 1;
            }
        }

        self.finish(
            output,
            RunMode::AutoCluster,
            summary,
            cluster_sizes,
            placements,
            decode_failures,
            options,
        )
    }

    pub async fn run_database_match(
        &self,
        source: &Path,
        output: &Path,
        options: &RunOptions,
    ) -> Result<(RunSummary, Vec<Placement>), EngineError> {
        let _lock = RunLock::acquire(&self.config.state_dir())?;
        let mut cache = AnalysisCache::load(
            self.config.cache_path(),
            self.config.cache.flush_interval,
            self.config.cache.enabled,
        )?;
        let roster = Roster::load(self.config.roster_path())?;

        let analyzed = self.analyze_all(source, &mut cache, options).await?;
        cache.flush()?;

        let mut summary = RunSummary::default();
        let mut placements = Vec::new();
        let mut decode_failures = Vec::new();
        let threshold = self.config.vision.match_threshold;

        for item in &analyzed {
            match item {
                Analyzed::DecodeError { path, message } => {
                    summary.decode_errors += 1;
                    decode_failures.push((path.clone(), message.clone()));
                }
                Analyzed::VisionError { image, message } => {
                    summary.vision_errors += 1;
                    summary.no_faces += 1;
                    placements.push(classify_vision_failure(&image.path, message.clone()));
                }
                Analyzed::Detections { image, detections } => match detections.len() {
                    0 => {
                        summary.no_faces += 1;
                        placements.push(classify_placement(
                            &image.path,
                            Category::NoFaces,
                            String::new(),
                        ));
                    }
                    1 => {
                        let outcome = matcher::match_description(
                            self.provider.as_ref(),
                            &roster,
                            &detections[0].outfit_description,
                            threshold,
                        )
                        .await?;
                        match outcome {
                            MatchOutcome::Matched { name, .. } => {
                                summary.single_subject += 1;
                                placements.push(classify_placement(
                                    &image.path,
                                    Category::SingleSubject,
                                    name,
                                ));
                            }
                            MatchOutcome::Unmatched { .. } => {
                                summary.unknown_subjects += 1;
                                placements.push(classify_placement(
                                    &image.path,
                                    Category::UnknownSubjects,
                                    String::new(),
                                ));
                            }
                        }
                    }
                    _ => {
                        let mut names = Vec::with_capacity(detections.len());
                        for detection in detections {
                            let outcome = matcher::match_description(
                                self.provider.as_ref(),
                                &roster,
                                &detection.outfit_description,
                                threshold,
                            )
                            .await?;
                            names.push(match outcome {
                                MatchOutcome::Matched { name, .. } => name,
                                MatchOutcome::Unmatched { .. } => "Unknown".to_string(),
                            });
                        }
                        names.sort();
                        summary.multiple_subjects += 1;
                        placements.push(classify_placement(
                            &image.path,
                            Category::MultipleSubjects,
                            names.join("_"),
                        ));
                    }
                },
            }
        }

        self.finish(
            output,
            RunMode::Database,
            summary,
            Vec::new(),
            placements,
            decode_failures,
            options,
        )
    }

    /// Stage 1: discover, decode, extract timestamp, and detect subjects for
    /// every candidate image, with bounded concurrency across vision calls.
    async fn analyze_all(
        &self,
        source: &Path,
        cache: &mut AnalysisCache,
        options: &RunOptions,
    ) -> Result<Vec<Analyzed>, EngineError> {
        let discovery =
            FileDiscovery::with_recursive(self.config.processing.clone(), options.recursive);
        let files = discovery.discover(source);
        let validator = Validator::new(self.config.limits.clone());
        let decoder = ImageDecoder::new(self.config.limits.clone());

        let parallel = self.config.processing.parallel.max(1);
        let results: Vec<Result<(Image, Vec<SubjectDetection>), FailureStage>> = stream::iter(files)
            .map(|file| {
                let validator = &validator;
                let decoder = &decoder;
                let provider = self.provider.as_ref();
                let cache: &AnalysisCache = cache;
                async move {
                    if let Err(e) = validator.validate(&file.path) {
                        return Err(FailureStage::Decode {
                            path: file.path.clone(),
                            message: e.to_string(),
                        });
                    }
                    let content_hash =
                        Hasher::content_hash(&file.path).map_err(|e| FailureStage::Decode {
                            path: file.path.clone(),
                            message: e.to_string(),
                        })?;
                    let captured_at = MetadataExtractor::extract_captured_at(&file.path);
                    if let Some(captured_at) = captured_at {
                        MetadataExtractor::remember_captured_at(&file.path, captured_at);
                    }

                    let image = Image {
                        path: file.path.clone(),
                        content_hash: content_hash.clone(),
                        captured_at,
                        format: String::new(),
                        file_size: file.size,
                    };

                    if let Some(cached) = cache.get_detections(&content_hash) {
                        return Ok((image, cached.to_vec()));
                    }

                    let decoded = decoder.decode(&file.path).await.map_err(|e| {
                        FailureStage::Decode {
                            path: file.path.clone(),
                            message: e.to_string(),
                        }
                    })?;
                    let payload = decoder
                        .encode_for_vision(&decoded, self.config.processing.jpeg_quality)
                        .map_err(|e| FailureStage::Decode {
                            path: file.path.clone(),
                            message: e.to_string(),
                        })?;

                    let detections = vision::call_with_retry(&self.config.vision, || {
                        provider.detect_all_subjects(&payload)
                    })
                    .await
                    .map_err(|e| FailureStage::Vision {
                        image: image.clone(),
                        message: e.to_string(),
                    })?;

                    Ok((image, detections))
                }
            })
            .buffered(parallel)
            .collect()
            .await;

        let mut analyzed = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok((image, detections)) => {
                    if cache.get_detections(&image.content_hash).is_none() {
                        cache.put_detections(&image.content_hash, detections.clone())?;
                    }
                    analyzed.push(Analyzed::Detections { image, detections });
                }
                Err(FailureStage::Decode { path, message }) => {
                    analyzed.push(Analyzed::DecodeError { path, message })
                }
                Err(FailureStage::Vision { image, message }) => {
                    analyzed.push(Analyzed::VisionError { image, message })
                }
            }
        }
        Ok(analyzed)
    }

    /// Resolve names and collisions (pure, no filesystem writes), then -
    /// unless this is a dry run - execute the plan and write the report.
    fn finish(
        &self,
        output: &Path,
        mode: RunMode,
        summary: RunSummary,
        cluster_sizes: Vec<(String, usize)>,
        placements: Vec<Placement>,
        decode_failures: Vec<(PathBuf, String)>,
        options: &RunOptions,
    ) -> Result<(RunSummary, Vec<Placement>), EngineError> {
        let planner = Planner::new(output.to_path_buf());
        let resolved = planner.resolve(placements);

        if options.dry_run {
            return Ok((summary, resolved));
        }

        let copy_or_move = if self.config.output.copy_mode {
            CopyOrMove::Copy
        } else {
            CopyOrMove::Move
        };
        let executor = Executor::new(copy_or_move, output.join(".original_paths.json"));
        let exec_result = executor.execute(&resolved)?;

        let mut summary = summary;
        summary.placements_succeeded = exec_result.succeeded;
        summary.placements_failed = exec_result.failed;

        if self.config.output.write_report {
            let report: Report = reporter::build_report(
                mode,
                &self.config,
                summary.clone(),
                cluster_sizes,
                &resolved,
                &decode_failures,
            );
            reporter::write_report(output, &report)?;
        }

        Ok((summary, resolved))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VisionError;
    use crate::pipeline::EncodedPayload;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Returns a fixed number of detections per photo and counts how many
    /// times `detect_all_subjects` was actually invoked.
    struct StubProvider {
        detections_per_image: usize,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl VisionProvider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }
        fn timeout(&self) -> std::time::Duration {
            std::time::Duration::from_secs(1)
        }
        async fn describe_one_face(&self, _image: &EncodedPayload) -> Result<String, VisionError> {
            unimplemented!()
        }
        async fn detect_all_subjects(
            &self,
            _image: &EncodedPayload,
        ) -> Result<Vec<SubjectDetection>, VisionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((0..self.detections_per_image)
                .map(|i| SubjectDetection {
                    position: None,
                    outfit_description: format!("subject {i}"),
                    bib_number: None,
                    features: Default::default(),
                })
                .collect())
        }
        async fn compare_two_descriptions(&self, _a: &str, _b: &str) -> Result<f64, VisionError> {
            Ok(0.0)
        }
    }

    fn test_config(state_dir: &Path) -> Config {
        let mut config = Config::default();
        config.general.state_dir = state_dir.to_path_buf();
        config
    }

    fn write_test_image(path: &Path) {
        image::RgbImage::new(4, 4).save(path).unwrap();
    }

    #[tokio::test]
    async fn test_multi_detection_photo_bypasses_clusterer() {
        let source = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let state = tempfile::tempdir().unwrap();
        write_test_image(&source.path().join("group.png"));

        let calls = Arc::new(AtomicUsize::new(0));
        let provider = StubProvider {
            detections_per_image: 2,
            calls: calls.clone(),
        };
        let engine = Engine::with_provider(test_config(state.path()), Box::new(provider));

        let (summary, placements) = engine
            .run_auto_cluster(source.path(), output.path(), &RunOptions { dry_run: true, recursive: true })
            .await
            .unwrap();

        assert_eq!(summary.multiple_subjects, 1);
        assert_eq!(summary.single_subject, 0);
        assert_eq!(placements.len(), 1);
        assert_eq!(placements[0].category, Category::MultipleSubjects);
    }

    #[tokio::test]
    async fn test_rerun_with_populated_cache_issues_zero_vision_calls() {
        let source = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let state = tempfile::tempdir().unwrap();
        write_test_image(&source.path().join("a.png"));

        let calls = Arc::new(AtomicUsize::new(0));
        let config = test_config(state.path());
        let options = RunOptions { dry_run: true, recursive: true };

        let engine = Engine::with_provider(
            config.clone(),
            Box::new(StubProvider {
                detections_per_image: 1,
                calls: calls.clone(),
            }),
        );
        let (first, _) = engine
            .run_auto_cluster(source.path(), output.path(), &options)
            .await
            .unwrap();
        assert_eq!(first.single_subject, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let engine = Engine::with_provider(
            config,
            Box::new(StubProvider {
                detections_per_image: 1,
                calls: calls.clone(),
            }),
        );
        let (second, _) = engine
            .run_auto_cluster(source.path(), output.path(), &options)
            .await
            .unwrap();
        assert_eq!(second.single_subject, 1);
        assert_eq!(
            calls.load(Ordering::SeqCst),
            1,
            "second run must be served entirely from the analysis cache"
        );
    }

    #[tokio::test]
    async fn test_empty_source_directory_is_a_clean_no_op() {
        let source = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let state = tempfile::tempdir().unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let engine = Engine::with_provider(
            test_config(state.path()),
            Box::new(StubProvider {
                detections_per_image: 1,
                calls,
            }),
        );

        let (summary, placements) = engine
            .run_auto_cluster(source.path(), output.path(), &RunOptions::default())
            .await
            .unwrap();

        assert_eq!(summary.no_faces, 0);
        assert_eq!(summary.single_subject, 0);
        assert!(placements.is_empty());
        assert!(!summary.had_partial_failure());
    }
}
