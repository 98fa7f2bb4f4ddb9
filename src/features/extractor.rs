//! Feature extraction over normalized method bodies.

use std::collections::BTreeMap;

use rayon::prelude::*;
use sha1::{Digest, Sha1};

use crate::assembly::{ConstValue, MethodBody, Operand};
use crate::features::{MicroPatterns, NormalizeOptions, NormalizedMethod};

/// Minimum literal length kept in the string bag.
const MIN_STRING_LEN: usize = 2;

/// Owner-name prefixes excluded from call bags. Platform callees survive renaming on both
/// sides and carry no discriminating signal.
const PLATFORM_PREFIXES: [&str; 2] = ["java/", "javax/"];

/// Literal substrings treated as exception or reflection noise and dropped from string bags.
const NOISE_MARKERS: [&str; 3] = ["Exception", "java.lang.", ".reflect."];

/// The per-method feature vector produced by [`extract`].
///
/// All bags are sorted maps so serialization, hashing and merge-join scoring see one
/// canonical order regardless of how the input stream arranged its call sites.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    /// Canonical method key (`owner#name:descriptor`).
    pub key: String,
    /// Internal name of the declaring class.
    pub owner: String,
    /// Method name.
    pub name: String,
    /// Method descriptor.
    pub descriptor: String,
    /// Raw opcode counts over the filtered sequence, one bin per opcode byte.
    pub histogram: [u32; 256],
    /// Order-sensitive opcode bigram counts.
    pub bigrams: BTreeMap<[u8; 2], u32>,
    /// Order-sensitive opcode trigram counts.
    pub trigrams: BTreeMap<[u8; 3], u32>,
    /// Callee token → call-site count, platform owners excluded.
    pub call_bag: BTreeMap<String, u32>,
    /// String literal → occurrence count, noise excluded.
    pub string_bag: BTreeMap<String, u32>,
    /// Micropattern bit set.
    pub micropatterns: MicroPatterns,
    /// SHA-1 digest over the canonical text form.
    pub digest: [u8; 20],
}

impl FeatureVector {
    /// 64-bit fingerprint: the first 8 digest bytes, big-endian.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.digest[..8]);
        u64::from_be_bytes(bytes)
    }
}

/// Whether `owner` belongs to the platform namespace.
#[must_use]
pub fn is_platform_owner(owner: &str) -> bool {
    PLATFORM_PREFIXES.iter().any(|p| owner.starts_with(p))
}

fn is_noise_literal(s: &str) -> bool {
    NOISE_MARKERS.iter().any(|m| s.contains(m))
}

/// Extracts the feature vector for one method body.
///
/// Byte-identical input always yields a byte-identical digest; permuting independent
/// instructions changes bigram and trigram maps but not the histogram.
#[must_use]
pub fn extract(body: &MethodBody, options: &NormalizeOptions) -> FeatureVector {
    let normalized = NormalizedMethod::new(body, options);

    let mut histogram = [0u32; 256];
    let mut bigrams: BTreeMap<[u8; 2], u32> = BTreeMap::new();
    let mut trigrams: BTreeMap<[u8; 3], u32> = BTreeMap::new();
    let mut call_bag: BTreeMap<String, u32> = BTreeMap::new();
    let mut string_bag: BTreeMap<String, u32> = BTreeMap::new();

    let mut window: Vec<u8> = Vec::with_capacity(3);
    for (_, insn) in normalized.iter() {
        histogram[insn.opcode as usize] += 1;

        window.push(insn.opcode);
        if window.len() > 3 {
            window.remove(0);
        }
        if window.len() >= 2 {
            let pair = [window[window.len() - 2], window[window.len() - 1]];
            *bigrams.entry(pair).or_insert(0) += 1;
        }
        if window.len() == 3 {
            let triple = [window[0], window[1], window[2]];
            *trigrams.entry(triple).or_insert(0) += 1;
        }

        match &insn.operand {
            Operand::Call(call) => {
                if !is_platform_owner(&call.owner) {
                    *call_bag.entry(call.token()).or_insert(0) += 1;
                }
            }
            Operand::DynamicCall { name, descriptor } => {
                *call_bag
                    .entry(format!("indy#{name}:{descriptor}"))
                    .or_insert(0) += 1;
            }
            Operand::Const(ConstValue::Str(s)) => {
                if s.len() >= MIN_STRING_LEN && !is_noise_literal(s) {
                    *string_bag.entry(s.clone()).or_insert(0) += 1;
                }
            }
            _ => {}
        }
    }

    let micropatterns = MicroPatterns::extract(&normalized);
    let digest = compute_digest(body, &call_bag, &string_bag, &histogram, micropatterns);

    FeatureVector {
        key: body.key(),
        owner: body.owner.clone(),
        name: body.name.clone(),
        descriptor: body.descriptor.clone(),
        histogram,
        bigrams,
        trigrams,
        call_bag,
        string_bag,
        micropatterns,
        digest,
    }
}

/// Extracts feature vectors for many bodies in parallel, preserving input order.
#[must_use]
pub fn extract_all(bodies: &[MethodBody], options: &NormalizeOptions) -> Vec<FeatureVector> {
    bodies
        .par_iter()
        .map(|body| extract(body, options))
        .collect()
}

fn compute_digest(
    body: &MethodBody,
    call_bag: &BTreeMap<String, u32>,
    string_bag: &BTreeMap<String, u32>,
    histogram: &[u32; 256],
    micropatterns: MicroPatterns,
) -> [u8; 20] {
    let mut text = String::new();
    text.push_str("owner=");
    text.push_str(&body.owner);
    text.push('\n');
    text.push_str("descriptor=");
    text.push_str(&body.descriptor);
    text.push('\n');
    for (token, count) in call_bag {
        text.push_str(&format!("call={token}x{count}\n"));
    }
    for (literal, count) in string_bag {
        text.push_str(&format!("str={literal}x{count}\n"));
    }
    for (bin, count) in histogram.iter().enumerate() {
        if *count > 0 {
            text.push_str(&format!("hist={bin}:{count}\n"));
        }
    }
    text.push_str(&format!("micro={}\n", micropatterns.bits()));

    let mut hasher = Sha1::new();
    hasher.update(text.as_bytes());
    hasher.finalize().into()
}
