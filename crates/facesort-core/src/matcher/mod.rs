//! Database-matching mode: classify a detection against a fixed roster.
//!
//! Unlike the clusterer, matching has no cross-image shared state — each
//! photo is scored independently against the roster, so callers can run this
//! concurrently across a batch without any synchronization.

use crate::roster::Roster;
use crate::types::RosterEntry;
use crate::vision::VisionProvider;

/// Outcome of matching one subject description against the roster.
#[derive(Debug, Clone)]
pub enum MatchOutcome {
    /// Matched roster entry name and the similarity score that won.
    Matched { name: String, score: f64 },
    /// No roster entry scored above the configured threshold.
    Unmatched { best_score: Option<f64> },
}

/// Score a description against every roster entry and keep the best.
///
/// Ties are broken by roster order (first entry registered wins), matching
/// the clusterer's own first-registered-wins tie-break.
pub async fn match_description(
    provider: &dyn VisionProvider,
    roster: &Roster,
    description: &str,
    threshold: f64,
) -> Result<MatchOutcome, crate::error::VisionError> {
    let mut best: Option<(&RosterEntry, f64)> = None;

    for entry in roster.entries() {
        let score = provider
            .compare_two_descriptions(description, &entry.description)
            .await?;
        let is_better = match &best {
            Some((_, best_score)) => score > *best_score,
            None => true,
        };
        if is_better {
            best = Some((entry, score));
        }
    }

    match best {
        Some((entry, score)) if score >= threshold => Ok(MatchOutcome::Matched {
            name: entry.name.clone(),
            score,
        }),
        Some((_, score)) => Ok(MatchOutcome::Unmatched {
            best_score: Some(score),
        }),
        None => Ok(MatchOutcome::Unmatched { best_score: None }),
    }
}
