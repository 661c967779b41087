//! Identity-based drive affinity.
//!
//! Two drives are related when they share rare features. Every feature
//! found on both drives contributes `1 / n`, where `n` is the number of
//! drives carrying that feature, so an address seen on only those two drives
//! adds 0.5 while one seen on forty drives adds 0.025. This is an
//! inverse-document-frequency weighting with drives as documents.
//!
//! Scores are summed over every category. The five heaviest shared features
//! are kept as the *factors* explaining a score.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::index::CorrelatorIndex;
use crate::error::CdaError;
use crate::Result;

/// Number of factors kept per pair.
pub const TOP_FACTORS: usize = 5;

/// One shared feature and the weight it added to a pair's score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffinityFactor {
    /// `1 / drive_count_for(feature)`
    pub weight: f64,
    /// The shared feature
    pub feature: String,
    /// Category the feature belongs to
    pub category: String,
}

/// Affinity between an ordered pair of distinct drives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffinityScore {
    /// First drive
    pub drive_a: String,
    /// Second drive
    pub drive_b: String,
    /// Sum of all factor weights
    pub score: f64,
    /// Number of shared features across all categories
    pub shared: usize,
    /// Heaviest factors, at most [`TOP_FACTORS`]
    pub factors: Vec<AffinityFactor>,
}

/// Factor ordering: weight descending, then feature, then category.
pub fn compare_factors(a: &AffinityFactor, b: &AffinityFactor) -> Ordering {
    b.weight
        .total_cmp(&a.weight)
        .then_with(|| a.feature.cmp(&b.feature))
        .then_with(|| a.category.cmp(&b.category))
}

/// Ranking order: score descending, then drive names.
pub fn compare_scores(a: &AffinityScore, b: &AffinityScore) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.drive_a.cmp(&b.drive_a))
        .then_with(|| a.drive_b.cmp(&b.drive_b))
}

/// Score one ordered pair of drives.
///
/// Factors are summed in [`compare_factors`] order, which does not depend
/// on which drive comes first, so `score(a, b) == score(b, a)` exactly.
pub fn score(
    indices: &[CorrelatorIndex],
    drive_a: &str,
    drive_b: &str,
) -> Result<AffinityScore> {
    if drive_a == drive_b {
        return Err(CdaError::InvariantViolation(format!(
            "affinity of drive '{drive_a}' with itself"
        )));
    }

    let mut factors = Vec::new();
    for index in indices {
        for (feature, drives) in index.drive_counts() {
            if index.shared_by(feature, drive_a, drive_b) {
                factors.push(AffinityFactor {
                    weight: 1.0 / drives as f64,
                    feature: feature.to_string(),
                    category: index.category().to_string(),
                });
            }
        }
    }

    Ok(finish(drive_a, drive_b, factors))
}

fn finish(drive_a: &str, drive_b: &str, mut factors: Vec<AffinityFactor>) -> AffinityScore {
    factors.sort_by(compare_factors);
    let score = factors.iter().map(|f| f.weight).sum();
    let shared = factors.len();
    factors.truncate(TOP_FACTORS);

    AffinityScore {
        drive_a: drive_a.to_string(),
        drive_b: drive_b.to_string(),
        score,
        shared,
        factors,
    }
}

/// Features of one drive, per index position, for pair scoring.
struct DriveFeatures<'a> {
    by_index: Vec<Vec<&'a str>>,
    total: usize,
}

impl<'a> DriveFeatures<'a> {
    fn collect(indices: &'a [CorrelatorIndex], drive: &'a str) -> Self {
        let by_index: Vec<Vec<&str>> = indices
            .iter()
            .map(|i| i.features_on(drive).collect())
            .collect();
        let total = by_index.iter().map(Vec::len).sum();
        Self { by_index, total }
    }
}

/// Score every ordered pair of distinct drives and rank them.
///
/// Pairs are scored on rayon worker threads; the merged list is sorted with
/// [`compare_scores`], so the output is identical from run to run. Each pair
/// walks only the features of the drive that has fewer of them, and a pair
/// with nothing in common never allocates a factor list. Returns an empty
/// ranking when fewer than two drives are given.
pub fn rank_all_pairs(
    indices: &[CorrelatorIndex],
    drives: &BTreeSet<String>,
) -> Vec<AffinityScore> {
    if drives.len() < 2 {
        return Vec::new();
    }

    let drive_list: Vec<&str> = drives.iter().map(String::as_str).collect();
    let features: Vec<DriveFeatures> = drive_list
        .par_iter()
        .map(|&drive| DriveFeatures::collect(indices, drive))
        .collect();

    let pairs: Vec<(usize, usize)> = (0..drive_list.len())
        .flat_map(|a| {
            (0..drive_list.len())
                .filter(move |&b| b != a)
                .map(move |b| (a, b))
        })
        .collect();

    let mut scores: Vec<AffinityScore> = pairs
        .par_iter()
        .map(|&(a, b)| {
            let (name_a, name_b) = (drive_list[a], drive_list[b]);
            let (walk, other) = if features[a].total <= features[b].total {
                (&features[a], name_b)
            } else {
                (&features[b], name_a)
            };

            let mut factors = Vec::new();
            for (index, own) in indices.iter().zip(&walk.by_index) {
                for feature in own {
                    let Some(drives) = index.drives_for(feature) else {
                        continue;
                    };
                    if drives.contains_key(other) {
                        factors.push(AffinityFactor {
                            weight: 1.0 / drives.len() as f64,
                            feature: feature.to_string(),
                            category: index.category().to_string(),
                        });
                    }
                }
            }
            finish(name_a, name_b, factors)
        })
        .collect();

    scores.sort_by(compare_scores);
    scores
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::index::FeatureSink;

    fn corpus() -> Vec<CorrelatorIndex> {
        let mut email = CorrelatorIndex::new("email");
        for drive in ["A", "B", "C", "D"] {
            email.ingest(drive, "common@x.com", 1).unwrap();
        }
        email.ingest("A", "pair@x.com", 1).unwrap();
        email.ingest("B", "pair@x.com", 3).unwrap();
        email.ingest("C", "solo@x.com", 1).unwrap();

        let mut ccn = CorrelatorIndex::new("ccn");
        ccn.ingest("A", "4111111111111111", 1).unwrap();
        ccn.ingest("B", "4111111111111111", 1).unwrap();
        ccn.ingest("C", "4111111111111111", 1).unwrap();
        vec![email, ccn]
    }

    fn drives(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_feature_on_four_drives_adds_a_quarter() {
        let indices = corpus();
        let s = score(&indices, "C", "D").unwrap();
        assert_eq!(s.score, 0.25);
        assert_eq!(s.shared, 1);
        assert_eq!(s.factors[0].feature, "common@x.com");
    }

    #[test]
    fn test_score_sums_across_categories() {
        let indices = corpus();
        let s = score(&indices, "A", "B").unwrap();
        // pair (0.5) + ccn (1/3) + common (0.25)
        assert!((s.score - (0.5 + 1.0 / 3.0 + 0.25)).abs() < 1e-12);
        assert_eq!(s.shared, 3);
        let order: Vec<&str> = s.factors.iter().map(|f| f.feature.as_str()).collect();
        assert_eq!(order, vec!["pair@x.com", "4111111111111111", "common@x.com"]);
    }

    #[test]
    fn test_score_is_symmetric() {
        let indices = corpus();
        for (a, b) in [("A", "B"), ("A", "C"), ("B", "D"), ("C", "D")] {
            let ab = score(&indices, a, b).unwrap();
            let ba = score(&indices, b, a).unwrap();
            assert_eq!(ab.score, ba.score);
            assert_eq!(ab.factors, ba.factors);
        }
    }

    #[test]
    fn test_self_pair_is_rejected() {
        let indices = corpus();
        assert!(matches!(
            score(&indices, "A", "A"),
            Err(CdaError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_factor_ties_break_on_feature() {
        let mut email = CorrelatorIndex::new("email");
        for feature in ["zed@x.com", "amy@x.com", "kim@x.com"] {
            email.ingest("A", feature, 1).unwrap();
            email.ingest("B", feature, 1).unwrap();
        }
        let s = score(&[email], "A", "B").unwrap();
        let order: Vec<&str> = s.factors.iter().map(|f| f.feature.as_str()).collect();
        assert_eq!(order, vec!["amy@x.com", "kim@x.com", "zed@x.com"]);
    }

    #[test]
    fn test_top_five_factors() {
        let mut email = CorrelatorIndex::new("email");
        for i in 0..8 {
            let feature = format!("user{i}@x.com");
            email.ingest("A", &feature, 1).unwrap();
            email.ingest("B", &feature, 1).unwrap();
        }
        let s = score(&[email], "A", "B").unwrap();
        assert_eq!(s.shared, 8);
        assert_eq!(s.factors.len(), TOP_FACTORS);
        assert_eq!(s.score, 4.0);
    }

    #[test]
    fn test_rank_all_pairs() {
        let indices = corpus();
        let ranking = rank_all_pairs(&indices, &drives(&["A", "B", "C", "D"]));

        assert_eq!(ranking.len(), 12);
        assert!(ranking.iter().all(|s| s.drive_a != s.drive_b));
        assert_eq!(
            (ranking[0].drive_a.as_str(), ranking[0].drive_b.as_str()),
            ("A", "B")
        );
        assert_eq!(
            (ranking[1].drive_a.as_str(), ranking[1].drive_b.as_str()),
            ("B", "A")
        );
        for pair in ranking.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_rank_matches_pair_scores() {
        let indices = corpus();
        for ranked in rank_all_pairs(&indices, &drives(&["A", "B", "C", "D"])) {
            let direct = score(&indices, &ranked.drive_a, &ranked.drive_b).unwrap();
            assert_eq!(ranked.score, direct.score);
            assert_eq!(ranked.factors, direct.factors);
        }
    }

    #[test]
    fn test_rank_is_deterministic() {
        let indices = corpus();
        let all = drives(&["A", "B", "C", "D"]);
        assert_eq!(
            rank_all_pairs(&indices, &all),
            rank_all_pairs(&indices, &all)
        );
    }

    #[test]
    fn test_fewer_than_two_drives() {
        let indices = corpus();
        assert!(rank_all_pairs(&indices, &drives(&["A"])).is_empty());
        assert!(rank_all_pairs(&indices, &BTreeSet::new()).is_empty());
    }

    #[test]
    fn test_unrelated_pair_scores_zero() {
        let mut email = CorrelatorIndex::new("email");
        email.ingest("A", "a@x.com", 1).unwrap();
        email.ingest("B", "b@x.com", 1).unwrap();
        let ranking = rank_all_pairs(&[email], &drives(&["A", "B"]));
        assert_eq!(ranking.len(), 2);
        assert!(ranking.iter().all(|s| s.score == 0.0 && s.factors.is_empty()));
    }
}
