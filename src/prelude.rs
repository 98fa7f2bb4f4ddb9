//! # symscope Prelude
//!
//! This module provides a convenient prelude for the most commonly used types from the
//! symscope library. Import this module to get quick access to the essential types for
//! structural symbol matching.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all symscope operations
pub use crate::Error;

/// The result type used throughout symscope
pub use crate::Result;

// ================================================================================================
// Input Contract
// ================================================================================================

/// Decoded method bodies and their instruction model
pub use crate::assembly::{
    CallRef, ConstValue, ExceptionHandler, FieldRef, FlowType, Instruction, MethodAccess,
    MethodBody, Operand,
};

// ================================================================================================
// Structural Analysis
// ================================================================================================

/// Control flow graph construction and options
pub use crate::analysis::{Block, CfgOptions, ExceptionEdgePolicy, ReducedCfg};

/// Dominator analyses
pub use crate::analysis::{DominanceFrontier, DominatorTree};

/// Intra-artifact call graph
pub use crate::analysis::CallGraph;

// ================================================================================================
// Features and Corpus Weighting
// ================================================================================================

/// Feature extraction entry points
pub use crate::features::{extract, extract_all, FeatureCache, FeatureVector};

/// Normalization policies and the micropattern set
pub use crate::features::{MicroPatterns, NormalizeOptions, NormalizedMethod};

/// Corpus term weighting
pub use crate::corpus::{TfIdfModel, WeightStore};

// ================================================================================================
// Matching
// ================================================================================================

/// Scoring, refinement, assignment and indexing
pub use crate::matching::{
    assign, refine, Assignment, CompositeScorer, FingerprintIndex, Pipeline, ScoreBreakdown,
};
