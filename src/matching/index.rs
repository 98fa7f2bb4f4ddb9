//! Fingerprint index for exact and near-duplicate method lookup.

use std::collections::BTreeMap;

use crate::features::FeatureVector;

/// Maximum number of entries any query returns.
const MAX_RESULTS: usize = 512;

/// One indexed method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Internal name of the declaring class.
    pub owner: String,
    /// Method descriptor.
    pub descriptor: String,
    /// Method name.
    pub name: String,
    /// 64-bit content fingerprint.
    pub fingerprint: u64,
}

/// Methods bucketed by exact (owner, descriptor) key, queried by fingerprint.
#[derive(Debug, Clone, Default)]
pub struct FingerprintIndex {
    buckets: BTreeMap<(String, String), Vec<IndexEntry>>,
}

impl FingerprintIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes one feature vector.
    pub fn insert(&mut self, vector: &FeatureVector) {
        self.insert_entry(IndexEntry {
            owner: vector.owner.clone(),
            descriptor: vector.descriptor.clone(),
            name: vector.name.clone(),
            fingerprint: vector.fingerprint(),
        });
    }

    /// Indexes one entry directly.
    pub fn insert_entry(&mut self, entry: IndexEntry) {
        self.buckets
            .entry((entry.owner.clone(), entry.descriptor.clone()))
            .or_default()
            .push(entry);
    }

    /// Total number of indexed entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Entries in the (owner, descriptor) bucket whose fingerprint equals the probe.
    /// Sorted by (owner, descriptor, name), capped at 512.
    #[must_use]
    pub fn exact(&self, owner: &str, descriptor: &str, probe: u64) -> Vec<&IndexEntry> {
        self.query(owner, descriptor, |fp| fp == probe)
    }

    /// Entries in the bucket within Hamming distance `budget` of the probe, computed via
    /// XOR and popcount. Sorted by (owner, descriptor, name), capped at 512.
    #[must_use]
    pub fn near(&self, owner: &str, descriptor: &str, probe: u64, budget: u32) -> Vec<&IndexEntry> {
        self.query(owner, descriptor, |fp| (fp ^ probe).count_ones() <= budget)
    }

    fn query<F: Fn(u64) -> bool>(&self, owner: &str, descriptor: &str, keep: F) -> Vec<&IndexEntry> {
        let mut out: Vec<&IndexEntry> = self
            .buckets
            .get(&(owner.to_string(), descriptor.to_string()))
            .map_or(&[][..], Vec::as_slice)
            .iter()
            .filter(|e| keep(e.fingerprint))
            .collect();
        out.sort_by(|a, b| {
            a.owner
                .cmp(&b.owner)
                .then_with(|| a.descriptor.cmp(&b.descriptor))
                .then_with(|| a.name.cmp(&b.name))
        });
        out.truncate(MAX_RESULTS);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, fingerprint: u64) -> IndexEntry {
        IndexEntry {
            owner: "a/B".to_string(),
            descriptor: "()V".to_string(),
            name: name.to_string(),
            fingerprint,
        }
    }

    #[test]
    fn test_exact_matches_only_identical_fingerprints() {
        let mut index = FingerprintIndex::new();
        index.insert_entry(entry("m1", 0xABCD));
        index.insert_entry(entry("m2", 0xABCE));
        let hits = index.exact("a/B", "()V", 0xABCD);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "m1");
    }

    #[test]
    fn test_near_respects_hamming_budget() {
        let mut index = FingerprintIndex::new();
        index.insert_entry(entry("m1", 0b0000));
        index.insert_entry(entry("m2", 0b0011));
        index.insert_entry(entry("m3", 0b0111));
        let hits = index.near("a/B", "()V", 0b0000, 2);
        let names: Vec<&str> = hits.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["m1", "m2"]);
    }

    #[test]
    fn test_bucket_isolation() {
        let mut index = FingerprintIndex::new();
        index.insert_entry(entry("m1", 1));
        index.insert_entry(IndexEntry {
            owner: "a/B".to_string(),
            descriptor: "(I)V".to_string(),
            name: "m2".to_string(),
            fingerprint: 1,
        });
        assert_eq!(index.exact("a/B", "()V", 1).len(), 1);
        assert_eq!(index.exact("a/B", "(I)V", 1).len(), 1);
        assert!(index.exact("a/B", "(J)V", 1).is_empty());
    }

    #[test]
    fn test_results_sorted_and_capped() {
        let mut index = FingerprintIndex::new();
        for i in 0..600 {
            index.insert_entry(entry(&format!("m{i:04}"), 7));
        }
        let hits = index.near("a/B", "()V", 7, 64);
        assert_eq!(hits.len(), 512);
        assert_eq!(hits[0].name, "m0000");
        assert!(hits.windows(2).all(|w| w[0].name <= w[1].name));
    }
}
