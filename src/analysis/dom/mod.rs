//! Dominator analyses over reduced control flow graphs.
//!
//! This layer is self-contained and structural: [`DominatorTree`] gives immediate
//! dominators, tree depth and reflexive dominance queries; [`DominanceFrontier`] gives
//! per-block frontiers and the iterated closure used for merge-point analysis. Both are
//! pure functions of their inputs with bounded fixpoints, so a pathological graph degrades
//! to a best-effort result plus a log diagnostic instead of hanging.

mod dominators;
mod frontier;

pub use dominators::DominatorTree;
pub use frontier::DominanceFrontier;
