//! Dominance frontiers and their iterated closure.

use std::collections::BTreeMap;

use crate::analysis::cfg::{sort_dedup, ReducedCfg};
use crate::analysis::dom::DominatorTree;

/// Step cap multiplier for the per-edge runner walk. Guards against malformed or cyclic
/// idom data reaching this layer.
const RUNNER_CAP_FACTOR: usize = 8;

/// Iteration cap multiplier for the iterated-frontier fixpoint.
const CLOSURE_CAP_FACTOR: usize = 4;

/// Dominance frontiers for every block of a CFG.
///
/// DF(b) is the set of blocks where b's dominance ends at a merge point. Sets are sorted
/// and deduplicated; identical input reproduces identical output.
#[derive(Debug, Clone)]
pub struct DominanceFrontier {
    frontiers: BTreeMap<u32, Vec<u32>>,
    block_count: usize,
}

impl DominanceFrontier {
    /// Computes all frontiers with the standard runner walk: for each edge b→s where
    /// idom(s) ≠ b, a runner starts at b and climbs the idom chain adding s to each
    /// frontier until it reaches idom(s).
    #[must_use]
    pub fn compute(cfg: &ReducedCfg, dom: &DominatorTree) -> Self {
        let mut frontiers: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
        let n = cfg.block_count();
        let cap = RUNNER_CAP_FACTOR * n.max(1);

        for block in cfg.blocks() {
            for &succ in block.succs() {
                let stop = dom.idom(succ);
                if stop == Some(block.id) {
                    continue;
                }
                let mut runner = block.id;
                let mut steps = 0usize;
                while Some(runner) != stop {
                    if steps >= cap {
                        log::warn!(
                            "frontier runner walk truncated at {steps} steps \
                             (edge {} -> {succ})",
                            block.id
                        );
                        break;
                    }
                    steps += 1;
                    frontiers.entry(runner).or_default().push(succ);
                    match dom.idom(runner) {
                        Some(up) => runner = up,
                        None => break,
                    }
                }
            }
        }
        for set in frontiers.values_mut() {
            sort_dedup(set);
        }
        Self {
            frontiers,
            block_count: n,
        }
    }

    /// DF of one block, sorted ascending. Empty for blocks with no frontier or unknown ids.
    #[must_use]
    pub fn frontier(&self, id: u32) -> &[u32] {
        self.frontiers.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Iterated dominance frontier of a seed set: the smallest superset of `seed` closed
    /// under membership's frontier, computed by repeated union to a fixpoint.
    #[must_use]
    pub fn iterated(&self, seed: &[u32]) -> Vec<u32> {
        let mut set: Vec<u32> = seed.to_vec();
        sort_dedup(&mut set);

        let cap = CLOSURE_CAP_FACTOR * self.block_count.max(1);
        let mut rounds = 0usize;
        loop {
            if rounds >= cap {
                log::warn!("iterated frontier closure truncated after {rounds} rounds");
                break;
            }
            rounds += 1;
            let mut next = set.clone();
            for &id in &set {
                next.extend_from_slice(self.frontier(id));
            }
            sort_dedup(&mut next);
            if next == set {
                break;
            }
            set = next;
        }
        set
    }
}
