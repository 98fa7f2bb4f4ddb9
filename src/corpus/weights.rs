//! Persistent corpus weight store.
//!
//! Accumulates document-frequency-derived term weights across runs through an exponential
//! moving average, so one unusual artifact cannot swing the weights. Weights de-emphasize
//! terms common across the corpus when comparing bags.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::Result;

const MIN_WEIGHT: f64 = 0.5;
const MAX_WEIGHT: f64 = 3.0;
const DEFAULT_LAMBDA: f64 = 0.9;
const DEFAULT_WEIGHT: f64 = 1.0;

/// Term-key → weight store with EMA updates and sorted text persistence.
#[derive(Debug, Clone)]
pub struct WeightStore {
    weights: BTreeMap<String, f64>,
    lambda: f64,
}

impl Default for WeightStore {
    fn default() -> Self {
        Self::new()
    }
}

impl WeightStore {
    /// Creates an empty store with the default smoothing factor of 0.9.
    #[must_use]
    pub fn new() -> Self {
        Self {
            weights: BTreeMap::new(),
            lambda: DEFAULT_LAMBDA,
        }
    }

    /// Overrides the EMA smoothing factor. Values near 1.0 favor history.
    #[must_use]
    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.lambda = lambda;
        self
    }

    /// Current weight for a term; unseen terms weigh 1.0.
    #[must_use]
    pub fn get(&self, key: &str) -> f64 {
        self.weights.get(key).copied().unwrap_or(DEFAULT_WEIGHT)
    }

    /// Number of stored terms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Whether the store holds no terms.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Folds one observation into the store: `fresh = ln((N+1)/(df+1)) + 1` for corpus
    /// size `corpus_size` and document frequency `df`, blended into the prior value and
    /// clamped to `[0.5, 3.0]`.
    pub fn update(&mut self, key: &str, df: u64, corpus_size: u64) {
        let fresh = ((corpus_size as f64 + 1.0) / (df as f64 + 1.0)).ln() + 1.0;
        let old = self.get(key);
        let blended = self.lambda * old + (1.0 - self.lambda) * fresh;
        self.weights
            .insert(key.to_string(), blended.clamp(MIN_WEIGHT, MAX_WEIGHT));
    }

    /// Loads a store from a `key=weight` line file. Malformed lines are skipped with a
    /// diagnostic; a missing file yields an empty store.
    pub fn load(path: &Path) -> Result<Self> {
        let mut store = Self::new();
        if !path.exists() {
            return Ok(store);
        }
        let text = fs::read_to_string(path)?;
        for line in text.lines() {
            if line.is_empty() {
                continue;
            }
            match line.rsplit_once('=').and_then(|(key, value)| {
                value.parse::<f64>().ok().map(|w| (key.to_string(), w))
            }) {
                Some((key, weight)) if weight.is_finite() => {
                    store.weights.insert(key, weight);
                }
                _ => log::warn!("skipping malformed weight line: {line}"),
            }
        }
        Ok(store)
    }

    /// Writes the store to `path`: sorted by key, 4-decimal values, atomic temp-file-
    /// then-rename replace.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut out = String::new();
        for (key, weight) in &self.weights {
            out.push_str(&format!("{key}={weight:.4}\n"));
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, out.as_bytes())?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Cosine similarity between two count bags, each term weighted by its stored weight
    /// under `prefix`. Merge-join over the sorted iterators; no dense vectors are built.
    /// Two empty bags compare as 1.0, one empty bag as 0.0.
    #[must_use]
    pub fn weighted_cosine(
        &self,
        a: &BTreeMap<String, u32>,
        b: &BTreeMap<String, u32>,
        prefix: &str,
    ) -> f64 {
        if a.is_empty() && b.is_empty() {
            return 1.0;
        }
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }

        let mut dot = 0.0;
        let mut norm_a = 0.0;
        let mut norm_b = 0.0;
        let mut ia = a.iter().peekable();
        let mut ib = b.iter().peekable();
        loop {
            match (ia.peek(), ib.peek()) {
                (Some((ka, &ca)), Some((kb, &cb))) => match ka.cmp(kb) {
                    std::cmp::Ordering::Less => {
                        let va = f64::from(ca) * self.get(&format!("{prefix}{ka}"));
                        norm_a += va * va;
                        ia.next();
                    }
                    std::cmp::Ordering::Greater => {
                        let vb = f64::from(cb) * self.get(&format!("{prefix}{kb}"));
                        norm_b += vb * vb;
                        ib.next();
                    }
                    std::cmp::Ordering::Equal => {
                        let w = self.get(&format!("{prefix}{ka}"));
                        let va = f64::from(ca) * w;
                        let vb = f64::from(cb) * w;
                        dot += va * vb;
                        norm_a += va * va;
                        norm_b += vb * vb;
                        ia.next();
                        ib.next();
                    }
                },
                (Some((ka, &ca)), None) => {
                    let va = f64::from(ca) * self.get(&format!("{prefix}{ka}"));
                    norm_a += va * va;
                    ia.next();
                }
                (None, Some((kb, &cb))) => {
                    let vb = f64::from(cb) * self.get(&format!("{prefix}{kb}"));
                    norm_b += vb * vb;
                    ib.next();
                }
                (None, None) => break,
            }
        }
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        dot / (norm_a.sqrt() * norm_b.sqrt())
    }

    /// Micropattern weight vector: the stored weights under `micro.<bit>` keys.
    #[must_use]
    pub fn micro_weights(&self) -> [f64; 17] {
        let mut out = [DEFAULT_WEIGHT; 17];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.get(&format!("micro.{i}"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn bag(entries: &[(&str, u32)]) -> BTreeMap<String, u32> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect()
    }

    #[test]
    fn test_unseen_term_defaults_to_one() {
        let store = WeightStore::new();
        assert!((store.get("nope") - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_update_blends_and_clamps() {
        let mut store = WeightStore::new();
        // df == N makes fresh slightly below 1; blended stays near the prior.
        store.update("t", 100, 100);
        let first = store.get("t");
        assert!(first > 0.5 && first < 3.0);

        // Very rare term pushes the weight up, but never past the clamp.
        let mut rare = WeightStore::new().with_lambda(0.0);
        rare.update("r", 0, 1_000_000);
        assert!((rare.get("r") - 3.0).abs() < 1e-12);

        // Ubiquitous term bottoms out at the clamp.
        let mut common = WeightStore::new().with_lambda(0.0);
        common.update("c", 1_000_000, 1);
        assert!((common.get("c") - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_persistence_round_trip_sorted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("weights.txt");
        let mut store = WeightStore::new();
        store.update("b", 10, 100);
        store.update("a", 5, 100);
        store.save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("a="));
        assert!(lines[1].starts_with("b="));

        let loaded = WeightStore::load(&path).unwrap();
        assert!((loaded.get("a") - store.get("a")).abs() < 1e-4);
        assert!((loaded.get("b") - store.get("b")).abs() < 1e-4);
    }

    #[test]
    fn test_load_skips_malformed_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("weights.txt");
        std::fs::write(&path, "good=1.5\nno-separator\nbad=abc\n").unwrap();
        let store = WeightStore::load(&path).unwrap();
        assert_eq!(store.len(), 1);
        assert!((store.get("good") - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_cosine_identical_bags_is_one() {
        let store = WeightStore::new();
        let a = bag(&[("x", 2), ("y", 3)]);
        assert!((store.weighted_cosine(&a, &a, "call.") - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_cosine_disjoint_bags_is_zero() {
        let store = WeightStore::new();
        let a = bag(&[("x", 1)]);
        let b = bag(&[("y", 1)]);
        assert!(store.weighted_cosine(&a, &b, "").abs() < 1e-12);
    }

    #[test]
    fn test_cosine_empty_bag_conventions() {
        let store = WeightStore::new();
        let empty = BTreeMap::new();
        let a = bag(&[("x", 1)]);
        assert!((store.weighted_cosine(&empty, &empty, "") - 1.0).abs() < 1e-12);
        assert!(store.weighted_cosine(&a, &empty, "").abs() < 1e-12);
    }
}
