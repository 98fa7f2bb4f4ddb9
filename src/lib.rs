// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]

//! # symscope
//!
//! A deterministic symbol-name-mapping engine for compiled artifacts. Given two versions
//! of the same artifact, one with obfuscated names and one with readable names, `symscope`
//! produces a conflict-free renaming correspondence between their methods without any
//! decompilation.
//!
//! ## Features
//!
//! - **Structural analysis** - Reduced control flow graphs, dominator trees and dominance
//!   frontiers built from decoded instruction streams
//! - **Robust features** - Opcode histograms, n-gram maps, call and string bags, and a
//!   frozen-order micropattern set, all invariant under renaming
//! - **Corpus-aware scoring** - Persistent idf weights de-emphasize terms common across
//!   the corpus; a composite scorer blends four similarity signals
//! - **Call-graph refinement** - IsoRank-style propagation pulls neighbor-consistent
//!   pairs together before assignment
//! - **Deterministic output** - Every stage iterates sorted structures; identical input
//!   always yields byte-identical results
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use symscope::corpus::WeightStore;
//! use symscope::features::{extract_all, NormalizeOptions};
//! use symscope::matching::Pipeline;
//! # let old_bodies = vec![];
//! # let new_bodies = vec![];
//!
//! let options = NormalizeOptions::default();
//! let old = extract_all(&old_bodies, &options);
//! let new = extract_all(&new_bodies, &options);
//!
//! let weights = WeightStore::new();
//! for assignment in Pipeline::new(&weights).run(&old, &new) {
//!     println!("{} -> {} ({:.3})", assignment.old, assignment.new, assignment.score);
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`assembly`] - Decoded method bodies: the input contract supplied by an external
//!   bytecode-decoding layer
//! - [`analysis`] - Control flow graphs, dominators, dominance frontiers and the
//!   intra-artifact call graph
//! - [`features`] - Normalization, feature extraction and the versioned feature cache
//! - [`corpus`] - Persistent and one-shot idf term weighting
//! - [`matching`] - Composite scoring, call-graph refinement, greedy assignment and the
//!   fingerprint index
//!
//! All algorithms are single-threaded pure functions; bulk extraction fans out with a
//! parallel map and no shared mutable state. Every fixpoint carries an iteration cap and
//! degrades to a best-effort result plus a log diagnostic instead of hanging.

/// Crate-wide result alias over [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

mod error;

pub mod analysis;
pub mod assembly;
pub mod corpus;
pub mod features;
pub mod matching;
pub mod prelude;

pub use error::Error;
