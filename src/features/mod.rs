//! Per-method feature extraction.
//!
//! A decoded body is first normalized ([`NormalizedMethod`]), then summarized into a
//! [`FeatureVector`]: opcode histogram, bigram/trigram maps, call and string bags, a
//! frozen-order micropattern set, and a SHA-1 digest over the canonical text form that
//! doubles as a content identity. [`FeatureCache`] persists vectors between runs behind a
//! versioned header.

mod cache;
mod extractor;
mod micropattern;
mod normalize;

pub use cache::FeatureCache;
pub use extractor::{extract, extract_all, is_platform_owner, FeatureVector};
pub use micropattern::MicroPatterns;
pub use normalize::{NormalizeOptions, NormalizedMethod};
