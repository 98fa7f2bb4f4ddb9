//! Basic block representation for the reduced CFG.

/// A basic block: a contiguous instruction index range with id-based adjacency.
///
/// Block ids are stable across rebuilds: a block's id is the index of its first instruction
/// in the original stream. Adjacency is kept as sorted, deduplicated id vectors; blocks never
/// hold pointers to each other, so the owning [`ReducedCfg`](crate::analysis::cfg::ReducedCfg)
/// can mutate the table freely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Stable id: index of the first instruction.
    pub id: u32,
    /// Index of the first instruction in the method's stream.
    pub start: usize,
    /// Index of the last instruction, inclusive. Mutable across linear-chain merges.
    pub end: usize,
    /// Whether this block is the entry of an exception handler.
    pub is_handler_start: bool,
    pub(crate) succs: Vec<u32>,
    pub(crate) preds: Vec<u32>,
}

impl Block {
    pub(crate) fn new(start: usize, end: usize, is_handler_start: bool) -> Self {
        Self {
            id: start as u32,
            start,
            end,
            is_handler_start,
            succs: Vec::new(),
            preds: Vec::new(),
        }
    }

    /// Successor block ids, sorted ascending and deduplicated.
    #[must_use]
    pub fn succs(&self) -> &[u32] {
        &self.succs
    }

    /// Predecessor block ids, sorted ascending and deduplicated.
    #[must_use]
    pub fn preds(&self) -> &[u32] {
        &self.preds
    }

    /// Number of instructions spanned by this block.
    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// Returns `true` if the block spans no instructions. Never true for blocks produced
    /// by the builder, whose spans always cover at least one instruction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

/// Sorts and deduplicates an adjacency list in place.
pub(crate) fn sort_dedup(ids: &mut Vec<u32>) {
    ids.sort_unstable();
    ids.dedup();
}
