//! Composite similarity scoring between feature vectors.

use std::collections::BTreeMap;

use crate::corpus::WeightStore;
use crate::features::{FeatureVector, MicroPatterns};

/// Sub-score weights, summing to 0.95. Identical vectors score 0.95, not 1.0.
const W_CALLS: f64 = 0.45;
const W_MICRO: f64 = 0.25;
const W_HISTOGRAM: f64 = 0.15;
const W_STRINGS: f64 = 0.10;

/// Penalty when exactly one side has an empty call bag.
const LEAF_MISMATCH_PENALTY: f64 = 0.05;

/// Minimum best score for a candidate pair to be eligible. Inclusive.
pub const TAU: f64 = 0.60;

/// Minimum margin over the second-best candidate. Inclusive.
pub const MARGIN: f64 = 0.05;

/// Micropattern sub-score mix: Jaccard of the bit sets versus cosine of the idf-weighted
/// bit vectors.
const MICRO_JACCARD_WEIGHT: f64 = 0.6;
const MICRO_COSINE_WEIGHT: f64 = 0.4;

/// Slack for the inclusive acceptance bounds. Scores are quoted at two decimals;
/// in f64, 0.60 - 0.55 lands just below 0.05 and would fail a bare comparison.
const BOUNDARY_EPSILON: f64 = 1e-9;

/// Breakdown of one pairwise comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    /// Call-bag cosine.
    pub calls: f64,
    /// Micropattern sub-score.
    pub micro: f64,
    /// Opcode-histogram cosine.
    pub histogram: f64,
    /// String-bag cosine.
    pub strings: f64,
    /// Weighted composite, penalized and clamped to [0,1].
    pub total: f64,
}

/// Pairwise scorer over extracted feature vectors.
///
/// An optional class correspondence remaps the obfuscated side's callee owners before the
/// call bags are compared, so methods match through renamed classes once those classes are
/// themselves mapped.
#[derive(Debug)]
pub struct CompositeScorer<'a> {
    weights: &'a WeightStore,
    class_map: Option<&'a BTreeMap<String, String>>,
}

impl<'a> CompositeScorer<'a> {
    /// Creates a scorer over a weight store.
    #[must_use]
    pub fn new(weights: &'a WeightStore) -> Self {
        Self {
            weights,
            class_map: None,
        }
    }

    /// Attaches a known old-owner → new-owner correspondence for call-bag remapping.
    #[must_use]
    pub fn with_class_map(mut self, class_map: &'a BTreeMap<String, String>) -> Self {
        self.class_map = Some(class_map);
        self
    }

    /// Scores one pair, returning the full breakdown. `a` is the side whose callee owners
    /// are remapped through the class map, if one is attached.
    #[must_use]
    pub fn score(&self, a: &FeatureVector, b: &FeatureVector) -> ScoreBreakdown {
        let remapped;
        let calls_a = match self.class_map {
            Some(map) => {
                remapped = remap_call_bag(&a.call_bag, map);
                &remapped
            }
            None => &a.call_bag,
        };

        let calls = self.weights.weighted_cosine(calls_a, &b.call_bag, "call.");
        let micro = self.micro_score(a.micropatterns, b.micropatterns);
        let histogram = histogram_cosine(&a.histogram, &b.histogram);
        let strings = self
            .weights
            .weighted_cosine(&a.string_bag, &b.string_bag, "str.");

        let mut total =
            W_CALLS * calls + W_MICRO * micro + W_HISTOGRAM * histogram + W_STRINGS * strings;
        if calls_a.is_empty() != b.call_bag.is_empty() {
            total = (total - LEAF_MISMATCH_PENALTY).max(0.0);
        }
        ScoreBreakdown {
            calls,
            micro,
            histogram,
            strings,
            total: total.clamp(0.0, 1.0),
        }
    }

    fn micro_score(&self, a: MicroPatterns, b: MicroPatterns) -> f64 {
        let jaccard = a.jaccard(b);
        let idf = self.weights.micro_weights();

        let mut dot = 0.0;
        let mut norm_a = 0.0;
        let mut norm_b = 0.0;
        for (i, &w) in idf.iter().enumerate() {
            let va = if a.bits() & (1 << i) != 0 { w } else { 0.0 };
            let vb = if b.bits() & (1 << i) != 0 { w } else { 0.0 };
            dot += va * vb;
            norm_a += va * va;
            norm_b += vb * vb;
        }
        let cosine = if norm_a == 0.0 && norm_b == 0.0 {
            1.0
        } else if norm_a == 0.0 || norm_b == 0.0 {
            0.0
        } else {
            dot / (norm_a.sqrt() * norm_b.sqrt())
        };
        MICRO_JACCARD_WEIGHT * jaccard + MICRO_COSINE_WEIGHT * cosine
    }
}

/// Whether a best score and runner-up margin pass the acceptance gate. Both bounds are
/// inclusive: a best of exactly 0.60 with a margin of exactly 0.05 accepts.
#[must_use]
pub fn eligible(best: f64, second_best: f64) -> bool {
    best >= TAU - BOUNDARY_EPSILON && (best - second_best) >= MARGIN - BOUNDARY_EPSILON
}

/// Cosine over two raw opcode histograms. Two all-zero histograms compare as 1.0.
#[must_use]
pub fn histogram_cosine(a: &[u32; 256], b: &[u32; 256]) -> f64 {
    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for i in 0..256 {
        let va = f64::from(a[i]);
        let vb = f64::from(b[i]);
        dot += va * vb;
        norm_a += va * va;
        norm_b += vb * vb;
    }
    if norm_a == 0.0 && norm_b == 0.0 {
        return 1.0;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

fn remap_call_bag(
    bag: &BTreeMap<String, u32>,
    class_map: &BTreeMap<String, String>,
) -> BTreeMap<String, u32> {
    let mut out: BTreeMap<String, u32> = BTreeMap::new();
    for (token, &count) in bag {
        let remapped = match token.split_once('#') {
            Some((owner, rest)) => match class_map.get(owner) {
                Some(new_owner) => format!("{new_owner}#{rest}"),
                None => token.clone(),
            },
            None => token.clone(),
        };
        *out.entry(remapped).or_insert(0) += count;
    }
    out
}
