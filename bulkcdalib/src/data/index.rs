//! The correlator index: `feature → {drive → count}` for one category.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::CdaError;
use crate::Result;

/// Receiver for `(drive, feature, amount)` contributions produced by the
/// ingestor.
pub trait FeatureSink {
    /// Note that `drive` exists, even if it never contributes a feature.
    fn register_drive(&mut self, drive: &str);

    /// Add `amount` occurrences of `feature` on `drive`.
    fn ingest(&mut self, drive: &str, feature: &str, amount: u64) -> Result<()>;
}

/// Cross-drive occurrence counts for one feature category.
///
/// Counts are only ever incremented. Every drive that appears in a
/// feature's inner map is also in the drive set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelatorIndex {
    category: String,
    drives: HashSet<String>,
    features: HashMap<String, HashMap<String, u64>>,
}

impl CorrelatorIndex {
    /// Create an empty index for a category (e.g. `email`).
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            ..Self::default()
        }
    }

    /// Category name.
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Drives seen so far.
    pub fn drives(&self) -> &HashSet<String> {
        &self.drives
    }

    /// Number of distinct features.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// True when no feature has been ingested.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Number of distinct drives on which `feature` occurs.
    pub fn drive_count_for(&self, feature: &str) -> usize {
        self.features.get(feature).map_or(0, HashMap::len)
    }

    /// Occurrences of `feature` on `drive` (0 when absent).
    pub fn count(&self, feature: &str, drive: &str) -> u64 {
        self.features
            .get(feature)
            .and_then(|drives| drives.get(drive))
            .copied()
            .unwrap_or(0)
    }

    /// Per-drive counts for a feature.
    pub fn drives_for(&self, feature: &str) -> Option<&HashMap<String, u64>> {
        self.features.get(feature)
    }

    /// Does `feature` occur on both drives?
    pub fn shared_by(&self, feature: &str, a: &str, b: &str) -> bool {
        self.features
            .get(feature)
            .is_some_and(|drives| drives.contains_key(a) && drives.contains_key(b))
    }

    /// All features, in unspecified order. Each call starts a fresh pass.
    pub fn features(&self) -> impl Iterator<Item = &str> + '_ {
        self.features.keys().map(String::as_str)
    }

    /// Features paired with their drive count.
    pub fn drive_counts(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.features
            .iter()
            .map(|(feature, drives)| (feature.as_str(), drives.len()))
    }

    /// Features on `drive`, in unspecified order.
    pub fn features_on<'a>(&'a self, drive: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.features
            .iter()
            .filter(move |(_, drives)| drives.contains_key(drive))
            .map(|(feature, _)| feature.as_str())
    }

    /// Features ordered by drive count descending, then by feature.
    pub fn sorted_by_drive_count(&self) -> Vec<(&str, usize)> {
        let mut rows: Vec<(&str, usize)> = self.drive_counts().collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        rows
    }
}

impl FeatureSink for CorrelatorIndex {
    fn register_drive(&mut self, drive: &str) {
        if !self.drives.contains(drive) {
            self.drives.insert(drive.to_string());
        }
    }

    fn ingest(&mut self, drive: &str, feature: &str, amount: u64) -> Result<()> {
        if amount == 0 {
            return Err(CdaError::InvariantViolation(format!(
                "non-positive increment for feature '{feature}' on drive '{drive}'"
            )));
        }
        self.register_drive(drive);
        let counts = self.features.entry(feature.to_string()).or_default();
        *counts.entry(drive.to_string()).or_insert(0) += amount;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_drive_index() -> CorrelatorIndex {
        let mut index = CorrelatorIndex::new("email");
        index.ingest("A", "alice@x.com", 3).unwrap();
        index.ingest("B", "alice@x.com", 2).unwrap();
        index.ingest("B", "bob@x.com", 1).unwrap();
        index
    }

    #[test]
    fn test_two_drive_email_index() {
        let index = two_drive_index();

        assert_eq!(index.count("alice@x.com", "A"), 3);
        assert_eq!(index.count("alice@x.com", "B"), 2);
        assert_eq!(index.count("bob@x.com", "B"), 1);
        assert_eq!(index.count("bob@x.com", "A"), 0);
        assert_eq!(index.drive_count_for("alice@x.com"), 2);
        assert_eq!(index.drive_count_for("bob@x.com"), 1);
        assert_eq!(index.drive_count_for("carol@x.com"), 0);
        assert_eq!(index.len(), 2);
        assert_eq!(index.drives().len(), 2);
    }

    #[test]
    fn test_zero_amount_is_invariant_violation() {
        let mut index = CorrelatorIndex::new("email");
        let err = index.ingest("A", "alice@x.com", 0).unwrap_err();
        assert!(matches!(err, CdaError::InvariantViolation(_)));
        assert!(index.is_empty());
        assert!(index.drives().is_empty());
    }

    #[test]
    fn test_register_drive_without_features() {
        let mut index = CorrelatorIndex::new("ccn");
        index.register_drive("A");
        assert!(index.drives().contains("A"));
        assert!(index.is_empty());
    }

    #[test]
    fn test_features_is_restartable() {
        let index = two_drive_index();
        let mut first: Vec<&str> = index.features().collect();
        let mut second: Vec<&str> = index.features().collect();
        first.sort();
        second.sort();
        assert_eq!(first, vec!["alice@x.com", "bob@x.com"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_features_are_byte_exact() {
        let mut index = CorrelatorIndex::new("email");
        index.ingest("A", "Alice@x.com", 1).unwrap();
        index.ingest("A", "alice@x.com", 1).unwrap();
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_shared_and_features_on() {
        let index = two_drive_index();
        assert!(index.shared_by("alice@x.com", "A", "B"));
        assert!(!index.shared_by("bob@x.com", "A", "B"));
        let on_a: Vec<&str> = index.features_on("A").collect();
        assert_eq!(on_a, vec!["alice@x.com"]);
    }

    #[test]
    fn test_sorted_by_drive_count() {
        let index = two_drive_index();
        assert_eq!(
            index.sorted_by_drive_count(),
            vec![("alice@x.com", 2), ("bob@x.com", 1)]
        );
    }
}
