//! Greedy conflict-free assignment of scored candidate pairs.

use std::collections::{BTreeMap, BTreeSet};

use crate::matching::scorer::eligible;
use crate::{Error, Result};

/// One accepted correspondence.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// Id on the obfuscated side.
    pub old: String,
    /// Id on the readable side.
    pub new: String,
    /// Composite score at acceptance time.
    pub score: f64,
}

/// Builds the assignment from per-old candidate lists.
///
/// A pair is eligible only when its score is the old id's best, the best clears the
/// acceptance threshold, and the margin over the runner-up holds. Eligible triples are
/// then sorted by (score descending, old ascending, new ascending) and claimed greedily,
/// so no id appears twice on either side and repeated runs on identical input produce
/// byte-identical output. The greedy order is not globally score-optimal; a locally best
/// pair can block a better global sum.
#[must_use]
pub fn assign(candidates: &BTreeMap<String, Vec<(String, f64)>>) -> Vec<Assignment> {
    let mut triples: Vec<Assignment> = Vec::new();
    for (old, list) in candidates {
        let mut best: Option<(&str, f64)> = None;
        let mut second = 0.0f64;
        for (new, score) in list {
            match best {
                Some((_, bs)) if *score <= bs => {
                    if *score > second {
                        second = *score;
                    }
                }
                Some((_, bs)) => {
                    second = bs;
                    best = Some((new, *score));
                }
                None => best = Some((new, *score)),
            }
        }
        if let Some((new, score)) = best {
            if eligible(score, second) {
                triples.push(Assignment {
                    old: old.clone(),
                    new: new.to_string(),
                    score,
                });
            }
        }
    }
    claim(triples)
}

/// Generic weighted-bipartite greedy matching over a dense score matrix, without the
/// eligibility gate. Rows index the left side, columns the right side.
///
/// # Errors
/// Returns [`Error::Contract`] when the matrix rows are ragged.
pub fn greedy_bipartite(scores: &[Vec<f64>]) -> Result<Vec<(usize, usize, f64)>> {
    let Some(width) = scores.first().map(Vec::len) else {
        return Ok(Vec::new());
    };
    if scores.iter().any(|row| row.len() != width) {
        return Err(Error::Contract("ragged score matrix".to_string()));
    }

    let mut triples: Vec<(usize, usize, f64)> = Vec::new();
    for (i, row) in scores.iter().enumerate() {
        for (j, &score) in row.iter().enumerate() {
            triples.push((i, j, score));
        }
    }
    triples.sort_by(|a, b| {
        b.2.total_cmp(&a.2)
            .then_with(|| a.0.cmp(&b.0))
            .then_with(|| a.1.cmp(&b.1))
    });

    let mut used_left: BTreeSet<usize> = BTreeSet::new();
    let mut used_right: BTreeSet<usize> = BTreeSet::new();
    let mut out = Vec::new();
    for (i, j, score) in triples {
        if used_left.contains(&i) || used_right.contains(&j) {
            continue;
        }
        used_left.insert(i);
        used_right.insert(j);
        out.push((i, j, score));
    }
    Ok(out)
}

fn claim(mut triples: Vec<Assignment>) -> Vec<Assignment> {
    triples.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.old.cmp(&b.old))
            .then_with(|| a.new.cmp(&b.new))
    });

    let mut used_old: BTreeSet<&str> = BTreeSet::new();
    let mut used_new: BTreeSet<&str> = BTreeSet::new();
    let mut keep = vec![false; triples.len()];
    for (i, t) in triples.iter().enumerate() {
        if used_old.contains(t.old.as_str()) || used_new.contains(t.new.as_str()) {
            continue;
        }
        used_old.insert(&t.old);
        used_new.insert(&t.new);
        keep[i] = true;
    }
    let mut index = 0;
    triples.retain(|_| {
        let kept = keep[index];
        index += 1;
        kept
    });
    triples
}
