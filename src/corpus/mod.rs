//! Corpus-level term weighting.
//!
//! [`WeightStore`] accumulates clamped idf weights across runs with explicit load, update
//! and save steps; [`TfIdfModel`] is its non-persistent one-shot counterpart for simpler
//! bag-similarity needs.

mod tfidf;
mod weights;

pub use tfidf::TfIdfModel;
pub use weights::WeightStore;
