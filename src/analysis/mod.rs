//! Structural analyses over decoded method bodies.
//!
//! Bottom layer of the pipeline: [`cfg`] partitions an instruction stream into a reduced
//! block graph, [`dom`] computes dominators and dominance frontiers over it, and
//! [`callgraph`] links methods of one artifact into a directed call graph for the
//! refinement stage.

pub mod callgraph;
pub mod cfg;
pub mod dom;

pub use callgraph::CallGraph;
pub use cfg::{Block, CfgOptions, ExceptionEdgePolicy, ReducedCfg};
pub use dom::{DominanceFrontier, DominatorTree};
