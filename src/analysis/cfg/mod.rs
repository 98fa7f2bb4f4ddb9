//! Control flow graph analysis.
//!
//! Partitions a method body into basic blocks identified by the index of their first
//! instruction, so block ids are stable across rebuilds of the same input. The reduced
//! graph (unreachable blocks dropped, linear chains merged) is the substrate for the
//! dominator analyses in [`crate::analysis::dom`] and for feature extraction.
//!
//! # Example
//!
//! ```rust,ignore
//! use symscope::analysis::cfg::ReducedCfg;
//!
//! let cfg = ReducedCfg::build(&method_body);
//! for block in cfg.blocks() {
//!     println!("block {} -> {:?}", block.id, block.succs());
//! }
//! ```

mod block;
mod graph;

pub use block::Block;
pub use graph::{CfgOptions, ExceptionEdgePolicy, ReducedCfg};

pub(crate) use block::sort_dedup;
