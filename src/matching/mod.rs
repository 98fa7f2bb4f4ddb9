//! Scoring, refinement and assignment of method correspondences.
//!
//! The stages are public and composable: [`CompositeScorer`] turns feature-vector pairs
//! into scores, [`refine`] propagates neighborhood consistency over two call graphs, and
//! [`assign`] claims conflict-free correspondences. [`Pipeline`] wires them in the usual
//! order (score, optionally refine, assign) for callers that want the whole run.

mod assign;
mod index;
mod refine;
mod scorer;

pub use assign::{assign, greedy_bipartite, Assignment};
pub use index::{FingerprintIndex, IndexEntry};
pub use refine::{refine, SimilarityMatrix};
pub use scorer::{eligible, histogram_cosine, CompositeScorer, ScoreBreakdown, MARGIN, TAU};

use std::collections::BTreeMap;

use crate::analysis::CallGraph;
use crate::corpus::WeightStore;
use crate::features::FeatureVector;

/// End-to-end matching run over two sides of an artifact.
///
/// Candidate pairs are restricted to equal descriptors; descriptors are structural and
/// survive renaming, so cross-descriptor pairs can never correspond.
#[derive(Debug)]
pub struct Pipeline<'a> {
    weights: &'a WeightStore,
    class_map: Option<&'a BTreeMap<String, String>>,
    graphs: Option<(&'a CallGraph, &'a CallGraph)>,
}

impl<'a> Pipeline<'a> {
    /// Creates a pipeline over a weight store.
    #[must_use]
    pub fn new(weights: &'a WeightStore) -> Self {
        Self {
            weights,
            class_map: None,
            graphs: None,
        }
    }

    /// Attaches a known class correspondence for call-bag remapping during scoring.
    #[must_use]
    pub fn with_class_map(mut self, class_map: &'a BTreeMap<String, String>) -> Self {
        self.class_map = Some(class_map);
        self
    }

    /// Enables call-graph refinement between the scoring and assignment stages.
    #[must_use]
    pub fn with_refinement(mut self, old_graph: &'a CallGraph, new_graph: &'a CallGraph) -> Self {
        self.graphs = Some((old_graph, new_graph));
        self
    }

    /// Runs the full pipeline and returns the accepted assignments.
    #[must_use]
    pub fn run(&self, old: &[FeatureVector], new: &[FeatureVector]) -> Vec<Assignment> {
        let mut scorer = CompositeScorer::new(self.weights);
        if let Some(map) = self.class_map {
            scorer = scorer.with_class_map(map);
        }

        let mut seed: SimilarityMatrix = BTreeMap::new();
        for o in old {
            for n in new {
                if o.descriptor != n.descriptor {
                    continue;
                }
                seed.insert((o.key.clone(), n.key.clone()), scorer.score(o, n).total);
            }
        }

        let scores = match self.graphs {
            Some((old_graph, new_graph)) => refine(old_graph, new_graph, &seed),
            None => seed,
        };

        let mut candidates: BTreeMap<String, Vec<(String, f64)>> = BTreeMap::new();
        for ((o, n), score) in scores {
            candidates.entry(o).or_default().push((n, score));
        }
        assign(&candidates)
    }
}
