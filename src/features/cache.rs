//! Versioned on-disk cache of extracted feature vectors.
//!
//! The file format is an explicit line-oriented schema behind a magic header, so a cache
//! written by an older build (or by something else entirely) is detected and discarded
//! instead of being half-parsed. An options fingerprint line ties the cached vectors to
//! the exact normalization and builder settings that produced them.

use std::fs;
use std::path::Path;

use dashmap::DashMap;

use crate::features::{FeatureVector, MicroPatterns};
use crate::{Error, Result};

/// Magic header on the first line of every cache file.
const MAGIC: &str = "symscope-fc/1";

/// Upper bound on the cache file size read into memory.
const MAX_CACHE_BYTES: u64 = 64 * 1024 * 1024;

/// Concurrent method-key → feature-vector cache.
///
/// Reads and writes may interleave freely during parallel extraction; persistence happens
/// once at the end of a run via [`flush`](FeatureCache::flush), never mid-extraction.
#[derive(Debug, Default)]
pub struct FeatureCache {
    entries: DashMap<String, FeatureVector>,
    options_fingerprint: String,
}

impl FeatureCache {
    /// Creates an empty cache bound to an options fingerprint.
    #[must_use]
    pub fn new(options_fingerprint: &str) -> Self {
        Self {
            entries: DashMap::new(),
            options_fingerprint: options_fingerprint.to_string(),
        }
    }

    /// Loads a cache file. A missing file, a wrong magic header or a stale options
    /// fingerprint all yield an empty cache rather than an error; malformed entries are
    /// skipped individually.
    ///
    /// # Errors
    /// Returns [`Error::CacheFormat`] when the file exceeds the bounded read size, and
    /// [`Error::FileError`] on I/O failure.
    pub fn load(path: &Path, options_fingerprint: &str) -> Result<Self> {
        let cache = Self::new(options_fingerprint);
        if !path.exists() {
            return Ok(cache);
        }
        let meta = fs::metadata(path)?;
        if meta.len() > MAX_CACHE_BYTES {
            return Err(Error::CacheFormat(format!(
                "feature cache {} exceeds the {MAX_CACHE_BYTES}-byte read bound",
                path.display()
            )));
        }
        let text = fs::read_to_string(path)?;
        let mut lines = text.lines();
        if lines.next() != Some(MAGIC) {
            log::warn!("feature cache {} has wrong magic; ignoring", path.display());
            return Ok(cache);
        }
        match lines.next().and_then(|l| l.strip_prefix("options=")) {
            Some(fp) if fp == options_fingerprint => {}
            _ => {
                log::warn!(
                    "feature cache {} was built with different options; ignoring",
                    path.display()
                );
                return Ok(cache);
            }
        }

        let mut record: Vec<&str> = Vec::new();
        for line in lines {
            if line == "end" {
                match parse_record(&record) {
                    Some(fv) => {
                        cache.entries.insert(fv.key.clone(), fv);
                    }
                    None => log::warn!("skipping malformed feature cache entry"),
                }
                record.clear();
            } else {
                record.push(line);
            }
        }
        Ok(cache)
    }

    /// Looks up a cached vector by method key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<FeatureVector> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    /// Inserts or replaces a vector.
    pub fn put(&self, vector: FeatureVector) {
        self.entries.insert(vector.key.clone(), vector);
    }

    /// Number of cached vectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no vectors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes the cache to `path` atomically (temp file then rename), entries sorted by
    /// key so repeated flushes of the same content are byte-identical.
    pub fn flush(&self, path: &Path) -> Result<()> {
        let mut out = String::new();
        out.push_str(MAGIC);
        out.push('\n');
        out.push_str("options=");
        out.push_str(&self.options_fingerprint);
        out.push('\n');

        let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort_unstable();
        for key in keys {
            if let Some(entry) = self.entries.get(&key) {
                write_record(&mut out, &entry);
            }
        }

        let tmp = path.with_extension("tmp");
        fs::write(&tmp, out.as_bytes())?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\n', "\\n").replace('\r', "\\r")
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('\\') => out.push('\\'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn write_record(out: &mut String, fv: &FeatureVector) {
    out.push_str(&format!("begin {}\n", escape(&fv.key)));
    out.push_str(&format!("owner {}\n", escape(&fv.owner)));
    out.push_str(&format!("name {}\n", escape(&fv.name)));
    out.push_str(&format!("desc {}\n", escape(&fv.descriptor)));
    out.push_str(&format!("micro {}\n", fv.micropatterns.bits()));
    out.push_str("digest ");
    for b in fv.digest {
        out.push_str(&format!("{b:02x}"));
    }
    out.push('\n');
    out.push_str("hist");
    for (bin, count) in fv.histogram.iter().enumerate() {
        if *count > 0 {
            out.push_str(&format!(" {bin}:{count}"));
        }
    }
    out.push('\n');
    out.push_str("bi");
    for ([a, b], count) in &fv.bigrams {
        out.push_str(&format!(" {a},{b}:{count}"));
    }
    out.push('\n');
    out.push_str("tri");
    for ([a, b, c], count) in &fv.trigrams {
        out.push_str(&format!(" {a},{b},{c}:{count}"));
    }
    out.push('\n');
    for (token, count) in &fv.call_bag {
        out.push_str(&format!("call {count} {}\n", escape(token)));
    }
    for (literal, count) in &fv.string_bag {
        out.push_str(&format!("str {count} {}\n", escape(literal)));
    }
    out.push_str("end\n");
}

fn parse_record(lines: &[&str]) -> Option<FeatureVector> {
    let mut key = None;
    let mut owner = None;
    let mut name = None;
    let mut descriptor = None;
    let mut micropatterns = MicroPatterns::empty();
    let mut digest = [0u8; 20];
    let mut histogram = [0u32; 256];
    let mut bigrams = std::collections::BTreeMap::new();
    let mut trigrams = std::collections::BTreeMap::new();
    let mut call_bag = std::collections::BTreeMap::new();
    let mut string_bag = std::collections::BTreeMap::new();

    for line in lines {
        let (tag, rest) = line.split_once(' ').unwrap_or((*line, ""));
        match tag {
            "begin" => key = Some(unescape(rest)),
            "owner" => owner = Some(unescape(rest)),
            "name" => name = Some(unescape(rest)),
            "desc" => descriptor = Some(unescape(rest)),
            "micro" => {
                let bits: u32 = rest.parse().ok()?;
                micropatterns = MicroPatterns::from_bits_truncate(bits);
            }
            "digest" => {
                if rest.len() != 40 {
                    return None;
                }
                for (i, chunk) in rest.as_bytes().chunks(2).enumerate() {
                    let hex = std::str::from_utf8(chunk).ok()?;
                    digest[i] = u8::from_str_radix(hex, 16).ok()?;
                }
            }
            "hist" => {
                for pair in rest.split_whitespace() {
                    let (bin, count) = pair.split_once(':')?;
                    let bin: usize = bin.parse().ok()?;
                    if bin >= 256 {
                        return None;
                    }
                    histogram[bin] = count.parse().ok()?;
                }
            }
            "bi" => {
                for pair in rest.split_whitespace() {
                    let (ops, count) = pair.split_once(':')?;
                    let (a, b) = ops.split_once(',')?;
                    bigrams.insert(
                        [a.parse().ok()?, b.parse().ok()?],
                        count.parse().ok()?,
                    );
                }
            }
            "tri" => {
                for pair in rest.split_whitespace() {
                    let (ops, count) = pair.split_once(':')?;
                    let mut parts = ops.split(',');
                    let a = parts.next()?.parse().ok()?;
                    let b = parts.next()?.parse().ok()?;
                    let c = parts.next()?.parse().ok()?;
                    trigrams.insert([a, b, c], count.parse().ok()?);
                }
            }
            "call" => {
                let (count, token) = rest.split_once(' ')?;
                call_bag.insert(unescape(token), count.parse().ok()?);
            }
            "str" => {
                let (count, literal) = rest.split_once(' ')?;
                string_bag.insert(unescape(literal), count.parse().ok()?);
            }
            _ => return None,
        }
    }

    Some(FeatureVector {
        key: key?,
        owner: owner?,
        name: name?,
        descriptor: descriptor?,
        histogram,
        bigrams,
        trigrams,
        call_bag,
        string_bag,
        micropatterns,
        digest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::{Instruction, MethodBody};
    use crate::features::{extract, NormalizeOptions};
    use tempfile::tempdir;

    fn sample_vector() -> FeatureVector {
        let body = MethodBody {
            instructions: vec![Instruction::simple(0x01), Instruction::simple(0x02)],
            ..MethodBody::new("a/B", "m", "()V")
        };
        extract(&body, &NormalizeOptions::default())
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("features.cache");
        let cache = FeatureCache::new("opts-v1");
        let fv = sample_vector();
        cache.put(fv.clone());
        cache.flush(&path).unwrap();

        let loaded = FeatureCache::load(&path, "opts-v1").unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get(&fv.key), Some(fv));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let cache = FeatureCache::load(&dir.path().join("nope"), "opts-v1").unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_wrong_magic_yields_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("features.cache");
        std::fs::write(&path, "not-a-cache\noptions=opts-v1\n").unwrap();
        let cache = FeatureCache::load(&path, "opts-v1").unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_stale_options_yield_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("features.cache");
        let cache = FeatureCache::new("opts-v1");
        cache.put(sample_vector());
        cache.flush(&path).unwrap();

        let loaded = FeatureCache::load(&path, "opts-v2").unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_malformed_entry_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("features.cache");
        let cache = FeatureCache::new("opts-v1");
        cache.put(sample_vector());
        cache.flush(&path).unwrap();

        let mut text = std::fs::read_to_string(&path).unwrap();
        text.push_str("begin broken\nbogus line here\nend\n");
        std::fs::write(&path, text).unwrap();

        let loaded = FeatureCache::load(&path, "opts-v1").unwrap();
        assert_eq!(loaded.len(), 1);
    }

    #[test]
    fn test_flushes_are_byte_identical() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.cache");
        let b = dir.path().join("b.cache");
        let cache = FeatureCache::new("opts-v1");
        cache.put(sample_vector());
        cache.flush(&a).unwrap();
        cache.flush(&b).unwrap();
        assert_eq!(
            std::fs::read(&a).unwrap(),
            std::fs::read(&b).unwrap()
        );
    }
}
