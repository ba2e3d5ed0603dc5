//! End-to-end scenarios for the auto-cluster and database-match entry
//! points, driven through the public `Engine` API against real temp-dir
//! images rather than the clusterer's internal types directly.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use facesort_core::vision::VisionProvider;
use facesort_core::{
    Category, Config, Engine, EncodedPayload, MetadataExtractor, RunOptions, RunSummary,
    SubjectDetection,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

fn write_test_image(path: &Path) {
    image::RgbImage::new(4, 4).save(path).unwrap();
}

fn stamp_captured_at(path: &Path, offset_secs: i64) {
    MetadataExtractor::remember_captured_at(
        path,
        Utc::now() + ChronoDuration::milliseconds(offset_secs * 1000),
    );
}

fn detection(outfit: &str, bib: Option<&str>) -> SubjectDetection {
    SubjectDetection {
        position: None,
        outfit_description: outfit.to_string(),
        bib_number: bib.map(str::to_string),
        features: Default::default(),
    }
}

fn test_config(state_dir: &Path) -> Config {
    let mut config = Config::default();
    config.general.state_dir = state_dir.to_path_buf();
    config
}

/// Returns one canned detection list per call, in call order, and scores
/// every comparison from a fixed table keyed by the two outfit strings.
/// Panics if `compare_two_descriptions` is called more times than scripted,
/// so a scenario asserting "zero vision comparisons" can prove it.
struct ScriptedProvider {
    detections: Mutex<Vec<Vec<SubjectDetection>>>,
    next_detection: AtomicUsize,
    compare_score: f64,
    compare_calls: AtomicUsize,
    forbid_compare: bool,
}

impl ScriptedProvider {
    fn new(detections: Vec<Vec<SubjectDetection>>, compare_score: f64) -> Self {
        Self {
            detections: Mutex::new(detections),
            next_detection: AtomicUsize::new(0),
            compare_score,
            compare_calls: AtomicUsize::new(0),
            forbid_compare: false,
        }
    }

    fn forbidding_compare(mut self) -> Self {
        self.forbid_compare = true;
        self
    }
}

#[async_trait]
impl VisionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }
    fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(1)
    }
    async fn describe_one_face(
        &self,
        _image: &EncodedPayload,
    ) -> Result<String, facesort_core::VisionError> {
        unimplemented!("not exercised by these scenarios")
    }
    async fn detect_all_subjects(
        &self,
        _image: &EncodedPayload,
    ) -> Result<Vec<SubjectDetection>, facesort_core::VisionError> {
        let idx = self.next_detection.fetch_add(1, Ordering::SeqCst);
        let detections = self.detections.lock().unwrap();
        Ok(detections[idx].clone())
    }
    async fn compare_two_descriptions(
        &self,
        _a: &str,
        _b: &str,
    ) -> Result<f64, facesort_core::VisionError> {
        assert!(
            !self.forbid_compare,
            "exact timestamp proximity should have short-circuited vision entirely"
        );
        self.compare_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.compare_score)
    }
}

fn scenario_config(state_dir: &Path) -> Config {
    let mut config = test_config(state_dir);
    config.vision.t_exact_seconds = 10;
    config.vision.t_high_seconds = 30;
    config.vision.cluster_threshold = 0.5;
    config
}

/// Scenario 1: five images within `T_EXACT` of each other, first carrying a
/// bib number, the rest not — one cluster named `Racer_Bib_23`, zero visual
/// comparisons.
#[tokio::test]
async fn scenario_exact_timestamp_chain_forms_one_cluster_by_bib_number() {
    let source = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let state = tempfile::tempdir().unwrap();

    let offsets = [0, 0, 1, 2, 3];
    let names = ["a", "b", "c", "d", "e"];
    for (name, offset) in names.iter().zip(offsets.iter()) {
        let path = source.path().join(format!("{name}.jpg"));
        write_test_image(&path);
        stamp_captured_at(&path, *offset);
    }

    let detections = vec![
        vec![detection("red jacket", Some("23"))],
        vec![detection("blue jacket", None)],
        vec![detection("green jacket", None)],
        vec![detection("yellow jacket", None)],
        vec![detection("black jacket", None)],
    ];
    let provider = ScriptedProvider::new(detections, 0.0).forbidding_compare();

    let engine = Engine::with_provider(scenario_config(state.path()), Box::new(provider));
    let (summary, placements) = engine
        .run_auto_cluster(
            source.path(),
            output.path(),
            &RunOptions {
                dry_run: true,
                recursive: true,
            },
        )
        .await
        .unwrap();

    assert_eq!(summary.single_subject, 5);
    assert_eq!(placements.len(), 5);
    assert!(placements
        .iter()
        .all(|p| p.category == Category::SingleSubject && p.destination_name == "Racer_Bib_23"));
}

/// Scenario 2: two images 23s apart (within `T_HIGH`), visual score 0.40
/// floored to 0.85 — one cluster.
#[tokio::test]
async fn scenario_high_window_floor_merges_mediocre_visual_match() {
    let source = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let state = tempfile::tempdir().unwrap();

    let a = source.path().join("a.jpg");
    let b = source.path().join("b.jpg");
    write_test_image(&a);
    write_test_image(&b);
    stamp_captured_at(&a, 0);
    stamp_captured_at(&b, 23);

    let detections = vec![
        vec![detection("red jacket", None)],
        vec![detection("red jacket", None)],
    ];
    let provider = ScriptedProvider::new(detections, 0.40);

    let engine = Engine::with_provider(scenario_config(state.path()), Box::new(provider));
    let (summary, placements) = engine
        .run_auto_cluster(
            source.path(),
            output.path(),
            &RunOptions {
                dry_run: true,
                recursive: true,
            },
        )
        .await
        .unwrap();

    assert_eq!(summary.single_subject, 2);
    let names: std::collections::HashSet<_> =
        placements.iter().map(|p| p.destination_name.clone()).collect();
    assert_eq!(names.len(), 1, "both photos should land in the same cluster");
}

/// Scenario 3: two images 120s apart (outside `T_HIGH`), visual score 0.40
/// against a 0.5 threshold — two clusters.
#[tokio::test]
async fn scenario_beyond_high_window_falls_back_to_raw_visual_score() {
    let source = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let state = tempfile::tempdir().unwrap();

    let a = source.path().join("a.jpg");
    let b = source.path().join("b.jpg");
    write_test_image(&a);
    write_test_image(&b);
    stamp_captured_at(&a, 0);
    stamp_captured_at(&b, 120);

    let detections = vec![
        vec![detection("red jacket", None)],
        vec![detection("red jacket", None)],
    ];
    let provider = ScriptedProvider::new(detections, 0.40);

    let engine = Engine::with_provider(scenario_config(state.path()), Box::new(provider));
    let (summary, placements) = engine
        .run_auto_cluster(
            source.path(),
            output.path(),
            &RunOptions {
                dry_run: true,
                recursive: true,
            },
        )
        .await
        .unwrap();

    assert_eq!(summary.single_subject, 2);
    let names: std::collections::HashSet<_> =
        placements.iter().map(|p| p.destination_name.clone()).collect();
    assert_eq!(names.len(), 2, "score below threshold must start a second cluster");
}

/// Scenario 4: a single image with two detections is routed directly to
/// `Multiple_People`, bypassing the clusterer (and vision comparisons)
/// entirely.
#[tokio::test]
async fn scenario_multi_detection_photo_skips_clusterer() {
    let source = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let state = tempfile::tempdir().unwrap();

    let a = source.path().join("group.jpg");
    write_test_image(&a);

    let detections = vec![vec![detection("red jacket", None), detection("blue jacket", None)]];
    let provider = ScriptedProvider::new(detections, 0.0).forbidding_compare();

    let engine = Engine::with_provider(scenario_config(state.path()), Box::new(provider));
    let (summary, placements) = engine
        .run_auto_cluster(
            source.path(),
            output.path(),
            &RunOptions {
                dry_run: true,
                recursive: true,
            },
        )
        .await
        .unwrap();

    assert_eq!(summary.multiple_subjects, 1);
    assert_eq!(placements[0].category, Category::MultipleSubjects);
}

/// Scenario 5: a roster with Alice and Bob; a photo matching Alice at 0.82
/// against a 0.7 threshold lands in `Alice/`.
#[tokio::test]
async fn scenario_roster_match_places_subject_by_best_scoring_entry() {
    let source = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let state = tempfile::tempdir().unwrap();

    let mut config = test_config(state.path());
    config.vision.match_threshold = 0.7;

    let roster_path = config.roster_path();
    let mut roster = facesort_core::roster::Roster::load(roster_path).unwrap();
    roster
        .add(facesort_core::RosterEntry {
            name: "Alice".to_string(),
            description: "alpha outfit".to_string(),
            reference_paths: vec![],
            notes: None,
            created_at: Utc::now(),
        })
        .unwrap();
    roster
        .add(facesort_core::RosterEntry {
            name: "Bob".to_string(),
            description: "beta outfit".to_string(),
            reference_paths: vec![],
            notes: None,
            created_at: Utc::now(),
        })
        .unwrap();

    let photo = source.path().join("a.jpg");
    write_test_image(&photo);

    let detections = vec![vec![detection("alpha-ish outfit", None)]];
    // Alice scores 0.82, Bob scores lower; the matcher keeps the best.
    struct RosterScriptedProvider {
        detections: Vec<Vec<SubjectDetection>>,
        next: AtomicUsize,
    }
    #[async_trait]
    impl VisionProvider for RosterScriptedProvider {
        fn name(&self) -> &str {
            "roster-scripted"
        }
        fn timeout(&self) -> std::time::Duration {
            std::time::Duration::from_secs(1)
        }
        async fn describe_one_face(
            &self,
            _image: &EncodedPayload,
        ) -> Result<String, facesort_core::VisionError> {
            unimplemented!()
        }
        async fn detect_all_subjects(
            &self,
            _image: &EncodedPayload,
        ) -> Result<Vec<SubjectDetection>, facesort_core::VisionError> {
            let idx = self.next.fetch_add(1, Ordering::SeqCst);
            Ok(self.detections[idx].clone())
        }
        async fn compare_two_descriptions(
            &self,
            _a: &str,
            b: &str,
        ) -> Result<f64, facesort_core::VisionError> {
            if b == "alpha outfit" {
                Ok(0.82)
            } else {
                Ok(0.3)
            }
        }
    }
    let provider = RosterScriptedProvider {
        detections,
        next: AtomicUsize::new(0),
    };

    let engine = Engine::with_provider(config, Box::new(provider));
    let (summary, placements) = engine
        .run_database_match(
            source.path(),
            output.path(),
            &RunOptions {
                dry_run: true,
                recursive: true,
            },
        )
        .await
        .unwrap();

    assert_eq!(summary.single_subject, 1);
    assert_eq!(placements[0].category, Category::SingleSubject);
    assert_eq!(placements[0].destination_name, "Alice");
}

/// Scenario 6 (round-trip law): re-running with the same state dir issues
/// zero additional vision calls for unchanged images, and placements match.
#[tokio::test]
async fn scenario_cached_rerun_issues_zero_vision_calls() {
    let source = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let state = tempfile::tempdir().unwrap();
    write_test_image(&source.path().join("a.jpg"));

    let options = RunOptions {
        dry_run: true,
        recursive: true,
    };
    let config = scenario_config(state.path());

    let first_provider = ScriptedProvider::new(vec![vec![detection("red jacket", None)]], 0.0);
    let engine = Engine::with_provider(config.clone(), Box::new(first_provider));
    let (first, _): (RunSummary, _) = engine
        .run_auto_cluster(source.path(), output.path(), &options)
        .await
        .unwrap();
    assert_eq!(first.single_subject, 1);

    // Second run: the provider forbids any comparison or detection call by
    // only scripting zero entries — a cache hit never reaches the provider.
    let second_provider = ScriptedProvider::new(vec![], 0.0).forbidding_compare();
    let engine = Engine::with_provider(config, Box::new(second_provider));
    let (second, _) = engine
        .run_auto_cluster(source.path(), output.path(), &options)
        .await
        .unwrap();
    assert_eq!(second.single_subject, 1);
}
