//! IsoRank-style similarity refinement over two call graphs.
//!
//! Starting from a seed similarity matrix, each iteration blends the seed with a
//! neighborhood-consistency term: methods whose callees resemble each other are pulled
//! together, methods with inconsistent neighborhoods drift apart. Per-pair caps keep the
//! refinement from overturning strong or weak seeds outright.

use std::collections::BTreeMap;

use crate::analysis::CallGraph;

/// Blend factor between the seed score and the consistency term.
const BETA: f64 = 0.7;

/// Maximum refinement iterations.
const MAX_ITERATIONS: usize = 10;

/// Convergence threshold on the largest per-pair change.
const EPSILON: f64 = 1e-3;

/// Per-pair drift caps relative to the seed score.
const CAP_BELOW: f64 = 0.05;
const CAP_ABOVE: f64 = 0.10;

/// Seed score at or above which a pair is frozen against decrease.
const FREEZE_THRESHOLD: f64 = 0.80;

/// Similarity matrix keyed by (old method key, new method key). Sorted keys make every
/// iteration order deterministic.
pub type SimilarityMatrix = BTreeMap<(String, String), f64>;

/// Refines `seed` against the two call graphs and returns the final matrix.
///
/// Runs up to 10 iterations, stopping early once the largest change drops below 1e-3.
/// Every value stays within `[seed - 0.05, seed + 0.10]`; pairs seeded at 0.80 or above
/// never decrease across iterations.
#[must_use]
pub fn refine(old_graph: &CallGraph, new_graph: &CallGraph, seed: &SimilarityMatrix) -> SimilarityMatrix {
    let mut current: SimilarityMatrix = seed.clone();

    for iteration in 0..MAX_ITERATIONS {
        let mut next: SimilarityMatrix = BTreeMap::new();
        let mut max_delta = 0.0f64;

        for ((u, v), &s0) in seed {
            let prior = current.get(&(u.clone(), v.clone())).copied().unwrap_or(s0);
            let consistency = neighborhood_consistency(old_graph, new_graph, u, v, &current);
            let mut updated = (1.0 - BETA) * s0 + BETA * consistency;
            updated = updated.clamp(s0 - CAP_BELOW, s0 + CAP_ABOVE);
            if s0 >= FREEZE_THRESHOLD && updated < prior {
                updated = prior;
            }
            max_delta = max_delta.max((updated - prior).abs());
            next.insert((u.clone(), v.clone()), updated);
        }

        current = next;
        log::debug!("refine iteration {iteration}: max delta {max_delta:.6}");
        if max_delta < EPSILON {
            break;
        }
    }
    current
}

/// Average over u's callees of the best current similarity to any of v's callees.
/// Zero when either side has no callees, so un-frozen leaf pairs settle at the
/// lower cap instead of staying pinned to their seed.
fn neighborhood_consistency(
    old_graph: &CallGraph,
    new_graph: &CallGraph,
    u: &str,
    v: &str,
    current: &SimilarityMatrix,
) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for u2 in old_graph.callees(u) {
        // Per-neighbor max; iterating v's callees in sorted order with a strict
        // comparison keeps the lexicographically smallest candidate on ties.
        let mut best = 0.0f64;
        for v2 in new_graph.callees(v) {
            let sim = current
                .get(&(u2.to_string(), v2.to_string()))
                .copied()
                .unwrap_or(0.0);
            if sim > best {
                best = sim;
            }
        }
        sum += best;
        count += 1;
    }
    if count == 0 {
        return 0.0;
    }
    sum / count as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(u: &str, v: &str) -> (String, String) {
        (u.to_string(), v.to_string())
    }

    fn chain_graph(edges: &[(&str, &str)]) -> CallGraph {
        let mut g = CallGraph::new();
        for (from, to) in edges {
            g.add_edge((*from).to_string(), (*to).to_string());
        }
        g
    }

    #[test]
    fn test_leaf_pair_drifts_to_lower_cap() {
        // No callees on either side means zero consistency, so the pair settles at
        // seed - 0.05 rather than staying pinned to its seed.
        let mut old = CallGraph::new();
        old.add_node("u".to_string());
        let mut new = CallGraph::new();
        new.add_node("v".to_string());
        let seed: SimilarityMatrix = [(pair("u", "v"), 0.7)].into();
        let out = refine(&old, &new, &seed);
        assert!((out[&pair("u", "v")] - 0.65).abs() < 1e-12);
    }

    #[test]
    fn test_frozen_leaf_pair_keeps_seed() {
        let mut old = CallGraph::new();
        old.add_node("u".to_string());
        let mut new = CallGraph::new();
        new.add_node("v".to_string());
        let seed: SimilarityMatrix = [(pair("u", "v"), 0.85)].into();
        let out = refine(&old, &new, &seed);
        assert!((out[&pair("u", "v")] - 0.85).abs() < 1e-12);
    }

    #[test]
    fn test_values_stay_within_caps() {
        let old = chain_graph(&[("u", "u2")]);
        let new = chain_graph(&[("v", "v2")]);
        let seed: SimilarityMatrix =
            [(pair("u", "v"), 0.5), (pair("u2", "v2"), 1.0)].into();
        let out = refine(&old, &new, &seed);
        for ((u, v), &score) in &out {
            let s0 = seed[&(u.clone(), v.clone())];
            assert!(score >= s0 - 0.05 - 1e-12, "{u}/{v} fell below cap");
            assert!(score <= s0 + 0.10 + 1e-12, "{u}/{v} rose above cap");
        }
    }

    #[test]
    fn test_high_seed_never_decreases() {
        // u's callee pairs badly with v's, so the consistency term pulls down.
        let old = chain_graph(&[("u", "u2")]);
        let new = chain_graph(&[("v", "v2")]);
        let seed: SimilarityMatrix =
            [(pair("u", "v"), 0.85), (pair("u2", "v2"), 0.0)].into();
        let out = refine(&old, &new, &seed);
        assert!(out[&pair("u", "v")] >= 0.85 - 1e-12);
    }

    #[test]
    fn test_consistent_neighborhood_lifts_score() {
        let old = chain_graph(&[("u", "u2")]);
        let new = chain_graph(&[("v", "v2")]);
        let seed: SimilarityMatrix =
            [(pair("u", "v"), 0.6), (pair("u2", "v2"), 0.95)].into();
        let out = refine(&old, &new, &seed);
        assert!(out[&pair("u", "v")] > 0.6);
        assert!(out[&pair("u", "v")] <= 0.7 + 1e-12);
    }

    #[test]
    fn test_deterministic() {
        let old = chain_graph(&[("u", "a"), ("u", "b")]);
        let new = chain_graph(&[("v", "x"), ("v", "y")]);
        let seed: SimilarityMatrix = [
            (pair("u", "v"), 0.7),
            (pair("a", "x"), 0.9),
            (pair("a", "y"), 0.9),
            (pair("b", "x"), 0.4),
            (pair("b", "y"), 0.4),
        ]
        .into();
        assert_eq!(refine(&old, &new, &seed), refine(&old, &new, &seed));
    }
}
