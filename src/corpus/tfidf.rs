//! Lightweight non-persistent tf-idf weighting over a fixed document set.

use std::collections::BTreeMap;

/// A tf-idf model fitted to one document set.
///
/// Vocabulary is the sorted union of all document terms; idf is unclamped, unlike the
/// persistent [`WeightStore`](crate::corpus::WeightStore). Intended for one-shot bag
/// similarity where no cross-run accumulation is wanted.
#[derive(Debug, Clone)]
pub struct TfIdfModel {
    idf: BTreeMap<String, f64>,
}

impl TfIdfModel {
    /// Fits the model: for each term, `idf = ln((N+1)/(df+1)) + 1` with `N` the number of
    /// documents and `df` the number of documents containing the term.
    #[must_use]
    pub fn fit(documents: &[BTreeMap<String, u32>]) -> Self {
        let n = documents.len() as f64;
        let mut df: BTreeMap<&str, u64> = BTreeMap::new();
        for doc in documents {
            for term in doc.keys() {
                *df.entry(term).or_insert(0) += 1;
            }
        }
        let idf = df
            .into_iter()
            .map(|(term, count)| {
                let weight = ((n + 1.0) / (count as f64 + 1.0)).ln() + 1.0;
                (term.to_string(), weight)
            })
            .collect();
        Self { idf }
    }

    /// Idf of one term; terms outside the fitted vocabulary weigh 1.0.
    #[must_use]
    pub fn idf(&self, term: &str) -> f64 {
        self.idf.get(term).copied().unwrap_or(1.0)
    }

    /// Vocabulary size.
    #[must_use]
    pub fn vocabulary_len(&self) -> usize {
        self.idf.len()
    }

    /// Cosine similarity of two documents under tf·idf weighting, merge-joined over the
    /// sorted term iterators. Two empty documents compare as 1.0, one empty as 0.0.
    #[must_use]
    pub fn similarity(&self, a: &BTreeMap<String, u32>, b: &BTreeMap<String, u32>) -> f64 {
        if a.is_empty() && b.is_empty() {
            return 1.0;
        }
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        let mut dot = 0.0;
        let mut norm_a = 0.0;
        let mut norm_b = 0.0;
        let mut ia = a.iter().peekable();
        let mut ib = b.iter().peekable();
        loop {
            match (ia.peek(), ib.peek()) {
                (Some((ka, &ca)), Some((kb, &cb))) => match ka.cmp(kb) {
                    std::cmp::Ordering::Less => {
                        let v = f64::from(ca) * self.idf(ka);
                        norm_a += v * v;
                        ia.next();
                    }
                    std::cmp::Ordering::Greater => {
                        let v = f64::from(cb) * self.idf(kb);
                        norm_b += v * v;
                        ib.next();
                    }
                    std::cmp::Ordering::Equal => {
                        let w = self.idf(ka);
                        let va = f64::from(ca) * w;
                        let vb = f64::from(cb) * w;
                        dot += va * vb;
                        norm_a += va * va;
                        norm_b += vb * vb;
                        ia.next();
                        ib.next();
                    }
                },
                (Some((ka, &ca)), None) => {
                    let v = f64::from(ca) * self.idf(ka);
                    norm_a += v * v;
                    ia.next();
                }
                (None, Some((kb, &cb))) => {
                    let v = f64::from(cb) * self.idf(kb);
                    norm_b += v * v;
                    ib.next();
                }
                (None, None) => break,
            }
        }
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        dot / (norm_a.sqrt() * norm_b.sqrt())
    }
}
