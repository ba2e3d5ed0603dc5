//! Online clustering of same-subject photos.
//!
//! The priority protocol, in order: an exact timestamp match short-circuits
//! the visual comparison entirely; a close timestamp floors the visual score
//! so a merely-mediocre outfit match still joins; anything else relies on the
//! visual score alone. Clusters are scanned in creation order and a
//! comparison scoring at or above `early_terminate_score` stops the sweep, so
//! a clear match doesn't pay for comparisons against every other cluster.

use crate::roster::sanitize_name;
use crate::types::{Cluster, ClusterMember, Image, SubjectDetection};
use crate::vision::VisionProvider;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// How closely two capture instants line up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimeProximity {
    /// Within `t_exact_seconds`: treated as certainly the same subject.
    Exact,
    /// Within `t_high_seconds`: a strong but not certain hint.
    High,
    /// No usable timestamp signal; fall back to the visual score alone.
    None,
}

fn time_proximity(
    a: Option<DateTime<Utc>>,
    b: Option<DateTime<Utc>>,
    t_exact_seconds: i64,
    t_high_seconds: i64,
) -> TimeProximity {
    match (a, b) {
        (Some(a), Some(b)) => {
            let delta = (a - b).num_seconds().abs();
            if delta <= t_exact_seconds {
                TimeProximity::Exact
            } else if delta <= t_high_seconds {
                TimeProximity::High
            } else {
                TimeProximity::None
            }
        }
        _ => TimeProximity::None,
    }
}

/// Tunable thresholds driving the clustering protocol, taken from
/// `VisionConfig` at engine construction time.
#[derive(Debug, Clone, Copy)]
pub struct ClustererThresholds {
    pub t_exact_seconds: i64,
    pub t_high_seconds: i64,
    pub cluster_threshold: f64,
    pub early_terminate_score: f64,
}

/// Online, single-pass clusterer. Images are assigned strictly in the order
/// `assign` is called, which the engine guarantees matches file-enumeration
/// order so a run is reproducible.
pub struct Clusterer {
    thresholds: ClustererThresholds,
    clusters: Vec<Cluster>,
    next_id: u64,
}

impl Clusterer {
    pub fn new(thresholds: ClustererThresholds) -> Self {
        Self {
            thresholds,
            clusters: Vec::new(),
            next_id: 0,
        }
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    /// Score one detection against one existing cluster's exemplar.
    async fn score_against(
        &self,
        provider: &dyn VisionProvider,
        captured_at: Option<DateTime<Utc>>,
        detection: &SubjectDetection,
        cluster: &Cluster,
    ) -> Result<f64, crate::error::VisionError> {
        match time_proximity(
            captured_at,
            cluster.last_seen,
            self.thresholds.t_exact_seconds,
            self.thresholds.t_high_seconds,
        ) {
            TimeProximity::Exact => Ok(1.0),
            TimeProximity::High => {
                let visual = provider
                    .compare_two_descriptions(
                        &detection.outfit_description,
                        &cluster.exemplar.outfit_description,
                    )
                    .await?;
                Ok(visual.max(0.85))
            }
            TimeProximity::None => {
                provider
                    .compare_two_descriptions(
                        &detection.outfit_description,
                        &cluster.exemplar.outfit_description,
                    )
                    .await
            }
        }
    }

    /// Assign one detected subject to an existing cluster or start a new one.
    /// Returns the id of the cluster it ended up in.
    ///
    /// Ties for the best score are broken by cluster creation order: the
    /// scan keeps the first cluster to reach a given score, never replacing
    /// it with a later cluster scoring equally.
    pub async fn assign(
        &mut self,
        provider: &dyn VisionProvider,
        image: Image,
        detection: SubjectDetection,
    ) -> Result<u64, crate::error::VisionError> {
        let mut best: Option<(usize, f64)> = None;

        for (idx, cluster) in self.clusters.iter().enumerate() {
            let score = self
                .score_against(provider, image.captured_at, &detection, cluster)
                .await?;
            if best.map(|(_, best_score)| score > best_score).unwrap_or(true) {
                best = Some((idx, score));
            }
            if score >= self.thresholds.early_terminate_score {
                break;
            }
        }

        let member = ClusterMember { image, detection };

        if let Some((idx, score)) = best {
            if score >= self.thresholds.cluster_threshold {
                self.clusters[idx].add(member);
                return Ok(self.clusters[idx].id);
            }
        }

        let id = self.next_id;
        self.next_id += 1;
        self.clusters.push(Cluster::new(id, member));
        Ok(id)
    }

    /// Compute a display name for every cluster once the run is complete.
    ///
    /// A cluster with a recorded bib number is named from it; otherwise the
    /// exemplar's dominant feature tokens (the first detection ever placed in
    /// the cluster, not a blend across members) form the name. The ordinal in
    /// an outfit name disambiguates clusters that land on the same token set,
    /// not the cluster's position overall — two clusters that both reduce to
    /// "Red_Jacket" become `Outfit_1_Red_Jacket` and `Outfit_2_Red_Jacket`,
    /// while an unrelated "Blue_Boots" cluster starts its own count at 1.
    /// Any names that still collide after that (e.g. two mistakenly-shared
    /// bib numbers) get a final `_2`, `_3`, ... suffix.
    pub fn finalize_names(&self) -> HashMap<u64, String> {
        let mut ordered: Vec<&Cluster> = self.clusters.iter().collect();
        ordered.sort_by_key(|c| c.id);

        let mut token_ordinal: HashMap<String, usize> = HashMap::new();
        let mut raw_names: Vec<(u64, String)> = Vec::with_capacity(ordered.len());

        for cluster in ordered {
            let name = if let Some(bib) = &cluster.bib_number {
                sanitize_name(&format!("Racer_Bib_{bib}"))
            } else {
                let tokens = cluster.exemplar.features.dominant_tokens(3);
                let key = if tokens.is_empty() {
                    "Subject".to_string()
                } else {
                    tokens.join("_")
                };
                let ordinal = token_ordinal.entry(key.clone()).or_insert(0);
                *ordinal += 1;
                sanitize_name(&format!("Outfit_{ordinal}_{key}"))
            };
            raw_names.push((cluster.id, name));
        }

        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut result = HashMap::new();
        for (id, name) in raw_names {
            let count = seen.entry(name.clone()).or_insert(0);
            *count += 1;
            let final_name = if *count == 1 {
                name
            } else {
                format!("{name}_{count}")
            };
            result.insert(id, final_name);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VisionError;
    use crate::pipeline::EncodedPayload;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use std::time::Duration;

    struct ScriptedProvider {
        score: f64,
    }

    #[async_trait]
    impl VisionProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }
        fn timeout(&self) -> Duration {
            Duration::from_secs(1)
        }
        async fn describe_one_face(&self, _image: &EncodedPayload) -> Result<String, VisionError> {
            unimplemented!()
        }
        async fn detect_all_subjects(
            &self,
            _image: &EncodedPayload,
        ) -> Result<Vec<SubjectDetection>, VisionError> {
            unimplemented!()
        }
        async fn compare_two_descriptions(&self, _a: &str, _b: &str) -> Result<f64, VisionError> {
            Ok(self.score)
        }
    }

    /// Fails the test if `compare_two_descriptions` is ever invoked, so an
    /// assignment relying only on rule 1 can prove it skipped vision entirely.
    struct CountingProvider {
        calls: std::sync::atomic::AtomicUsize,
    }

    impl CountingProvider {
        fn new() -> Self {
            Self {
                calls: std::sync::atomic::AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl VisionProvider for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }
        fn timeout(&self) -> Duration {
            Duration::from_secs(1)
        }
        async fn describe_one_face(&self, _image: &EncodedPayload) -> Result<String, VisionError> {
            unimplemented!()
        }
        async fn detect_all_subjects(
            &self,
            _image: &EncodedPayload,
        ) -> Result<Vec<SubjectDetection>, VisionError> {
            unimplemented!()
        }
        async fn compare_two_descriptions(&self, _a: &str, _b: &str) -> Result<f64, VisionError> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(0.0)
        }
    }

    fn thresholds() -> ClustererThresholds {
        ClustererThresholds {
            t_exact_seconds: 10,
            t_high_seconds: 30,
            cluster_threshold: 0.5,
            early_terminate_score: 0.95,
        }
    }

    fn image_at(offset_secs: i64) -> Image {
        Image {
            path: Default::default(),
            content_hash: "h".to_string(),
            captured_at: Some(Utc::now() + ChronoDuration::seconds(offset_secs)),
            format: "jpeg".to_string(),
            file_size: 0,
        }
    }

    fn detection(outfit: &str) -> SubjectDetection {
        SubjectDetection {
            position: None,
            outfit_description: outfit.to_string(),
            bib_number: None,
            features: Default::default(),
        }
    }

    #[test]
    fn test_time_proximity_buckets() {
        let now = Utc::now();
        assert_eq!(
            time_proximity(Some(now), Some(now + ChronoDuration::seconds(5)), 10, 30),
            TimeProximity::Exact
        );
        assert_eq!(
            time_proximity(Some(now), Some(now + ChronoDuration::seconds(20)), 10, 30),
            TimeProximity::High
        );
        assert_eq!(
            time_proximity(Some(now), Some(now + ChronoDuration::seconds(60)), 10, 30),
            TimeProximity::None
        );
        assert_eq!(time_proximity(Some(now), None, 10, 30), TimeProximity::None);
    }

    #[tokio::test]
    async fn test_exact_timestamp_match_short_circuits_vision() {
        let provider = ScriptedProvider { score: 0.0 };
        let mut clusterer = Clusterer::new(thresholds());

        let id1 = clusterer
            .assign(&provider, image_at(0), detection("red jacket"))
            .await
            .unwrap();
        let id2 = clusterer
            .assign(&provider, image_at(2), detection("totally different"))
            .await
            .unwrap();

        assert_eq!(id1, id2, "exact timestamp proximity forces a join even with score 0.0 from vision");
    }

    #[tokio::test]
    async fn test_high_window_floors_score_at_085() {
        let provider = ScriptedProvider { score: 0.1 };
        let mut clusterer = Clusterer::new(thresholds());

        let id1 = clusterer
            .assign(&provider, image_at(0), detection("red jacket"))
            .await
            .unwrap();
        let id2 = clusterer
            .assign(&provider, image_at(20), detection("red jacket"))
            .await
            .unwrap();

        assert_eq!(id1, id2, "score floored at 0.85 clears the 0.5 join threshold");
    }

    #[tokio::test]
    async fn test_below_threshold_starts_new_cluster() {
        let provider = ScriptedProvider { score: 0.2 };
        let mut clusterer = Clusterer::new(thresholds());

        let id1 = clusterer
            .assign(&provider, image_at(0), detection("red jacket"))
            .await
            .unwrap();
        let id2 = clusterer
            .assign(&provider, image_at(1000), detection("blue jacket"))
            .await
            .unwrap();

        assert_ne!(id1, id2);
        assert_eq!(clusterer.clusters().len(), 2);
    }

    #[tokio::test]
    async fn test_bib_number_sticks_for_naming() {
        let provider = ScriptedProvider { score: 1.0 };
        let mut clusterer = Clusterer::new(thresholds());

        let mut first = detection("red jacket");
        first.bib_number = Some("42".to_string());
        clusterer.assign(&provider, image_at(0), first).await.unwrap();
        clusterer
            .assign(&provider, image_at(1), detection("red jacket"))
            .await
            .unwrap();

        let names = clusterer.finalize_names();
        assert_eq!(names.len(), 1);
        assert_eq!(names.values().next().unwrap(), "Racer_Bib_42");
    }

    #[test]
    fn test_finalize_names_disambiguates_shared_outfit_tokens() {
        let mut clusterer = Clusterer::new(thresholds());
        let mut det_a = detection("plain jacket");
        det_a.features.clothing_colors = vec!["Blue".to_string()];
        let mut det_b = detection("plain jacket");
        det_b.features.clothing_colors = vec!["Blue".to_string()];

        clusterer
            .clusters
            .push(Cluster::new(
                0,
                ClusterMember {
                    image: image_at(0),
                    detection: det_a,
                },
            ));
        clusterer
            .clusters
            .push(Cluster::new(
                1,
                ClusterMember {
                    image: image_at(1),
                    detection: det_b,
                },
            ));
        clusterer.next_id = 2;

        let names = clusterer.finalize_names();
        let mut values: Vec<&String> = names.values().collect();
        values.sort();
        assert_eq!(values[0], "Outfit_1_Blue");
        assert_eq!(values[1], "Outfit_2_Blue");
    }

    #[test]
    fn test_finalize_names_suffixes_duplicate_bib_numbers() {
        let mut clusterer = Clusterer::new(thresholds());
        let mut det_a = detection("racer a");
        det_a.bib_number = Some("42".to_string());
        let mut det_b = detection("racer b");
        det_b.bib_number = Some("42".to_string());

        clusterer.clusters.push(Cluster::new(
            0,
            ClusterMember {
                image: image_at(0),
                detection: det_a,
            },
        ));
        clusterer.clusters.push(Cluster::new(
            1,
            ClusterMember {
                image: image_at(1),
                detection: det_b,
            },
        ));
        clusterer.next_id = 2;

        let names = clusterer.finalize_names();
        let mut values: Vec<&String> = names.values().collect();
        values.sort();
        assert_eq!(values[0], "Racer_Bib_42");
        assert_eq!(values[1], "Racer_Bib_42_2");
    }

    #[tokio::test]
    async fn test_tight_burst_with_one_tagged_bib_forms_single_cluster_without_vision() {
        let provider = CountingProvider::new();
        let mut clusterer = Clusterer::new(thresholds());

        let base = Utc::now();
        let offsets_ms: [i64; 5] = [0, 300, 1000, 2000, 3000];
        let mut first = detection("racer in red");
        first.bib_number = Some("23".to_string());

        let mut ids = Vec::new();
        for (i, offset) in offsets_ms.iter().enumerate() {
            let image = Image {
                path: Default::default(),
                content_hash: format!("h{i}"),
                captured_at: Some(base + ChronoDuration::milliseconds(*offset)),
                format: "jpeg".to_string(),
                file_size: 0,
            };
            let detection = if i == 0 {
                first.clone()
            } else {
                detection("an entirely different description")
            };
            ids.push(clusterer.assign(&provider, image, detection).await.unwrap());
        }

        assert!(ids.iter().all(|id| *id == ids[0]), "all five frames join one cluster");
        assert_eq!(provider.call_count(), 0, "exact timestamp proximity never consults vision");

        let names = clusterer.finalize_names();
        assert_eq!(names.len(), 1);
        assert_eq!(names.values().next().unwrap(), "Racer_Bib_23");
    }

    #[tokio::test]
    async fn test_two_minutes_apart_below_threshold_opens_second_cluster() {
        let provider = ScriptedProvider { score: 0.40 };
        let mut clusterer = Clusterer::new(thresholds());

        let id1 = clusterer
            .assign(&provider, image_at(0), detection("subject one"))
            .await
            .unwrap();
        let id2 = clusterer
            .assign(&provider, image_at(120), detection("subject two"))
            .await
            .unwrap();

        assert_ne!(id1, id2);
        assert_eq!(clusterer.clusters().len(), 2);
    }
}
