//! Bag-of-words TF-IDF vectors and cosine similarity.
//!
//! Tokens are lowercased runs of two or more word characters (alphanumeric
//! or `_`) with English stop words removed. Weights are raw term counts
//! times a smoothed idf, `ln((1 + n) / (1 + df)) + 1`, and every row is
//! L2-normalised, so the cosine of two rows is their dot product.

use std::collections::{BTreeMap, HashMap};

use super::stop_words::is_stop_word;

/// A sparse, L2-normalised row: `(term index, weight)` sorted by index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    entries: Vec<(usize, f64)>,
}

impl SparseVector {
    pub fn is_zero(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dot(&self, other: &SparseVector) -> f64 {
        let (mut i, mut j, mut sum) = (0, 0, 0.0);
        while i < self.entries.len() && j < other.entries.len() {
            let (a_idx, a_w) = self.entries[i];
            let (b_idx, b_w) = other.entries[j];
            match a_idx.cmp(&b_idx) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += a_w * b_w;
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }

    fn norm(&self) -> f64 {
        self.entries.iter().map(|(_, w)| w * w).sum::<f64>().sqrt()
    }
}

/// Cosine similarity; `0.0` when either side is a zero vector.
pub fn cosine_similarity(a: &SparseVector, b: &SparseVector) -> f64 {
    let denom = a.norm() * b.norm();
    if denom == 0.0 { 0.0 } else { a.dot(b) / denom }
}

/// Split `text` into lowercase tokens, dropping single characters and stop words.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| t.chars().nth(1).is_some())
        .map(str::to_lowercase)
        .filter(|t| !is_stop_word(t))
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct TfidfVectorizer {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
}

impl TfidfVectorizer {
    /// Learn the vocabulary and idf weights of `docs`. Terms are indexed in
    /// alphabetical order.
    pub fn fit<S: AsRef<str>>(docs: &[S]) -> Self {
        let mut df: BTreeMap<String, usize> = BTreeMap::new();
        for doc in docs {
            let mut seen: Vec<String> = tokenize(doc.as_ref());
            seen.sort_unstable();
            seen.dedup();
            for term in seen {
                *df.entry(term).or_default() += 1;
            }
        }

        let n = docs.len() as f64;
        let mut vocabulary = HashMap::with_capacity(df.len());
        let mut idf = Vec::with_capacity(df.len());
        for (idx, (term, count)) in df.into_iter().enumerate() {
            idf.push(((1.0 + n) / (1.0 + count as f64)).ln() + 1.0);
            vocabulary.insert(term, idx);
        }
        Self { vocabulary, idf }
    }

    /// Vectorise one document against the fitted vocabulary. Unknown terms
    /// are ignored.
    pub fn transform(&self, doc: &str) -> SparseVector {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for token in tokenize(doc) {
            if let Some(&idx) = self.vocabulary.get(&token) {
                *counts.entry(idx).or_default() += 1.0;
            }
        }
        let mut v = SparseVector {
            entries: counts
                .into_iter()
                .map(|(idx, tf)| (idx, tf * self.idf[idx]))
                .collect(),
        };
        let norm = v.norm();
        if norm > 0.0 {
            for (_, w) in &mut v.entries {
                *w /= norm;
            }
        }
        v
    }

    pub fn fit_transform<S: AsRef<str>>(docs: &[S]) -> (Self, Vec<SparseVector>) {
        let vectorizer = Self::fit(docs);
        let rows = docs.iter().map(|d| vectorizer.transform(d.as_ref())).collect();
        (vectorizer, rows)
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn idf_of(&self, term: &str) -> Option<f64> {
        self.vocabulary.get(term).map(|&i| self.idf[i])
    }
}

/// Indices of the `k` highest scores, descending. Equal scores keep their
/// original order.
pub fn top_k(scores: &[f64], k: usize) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..scores.len()).collect();
    idx.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    idx.truncate(k);
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_lowercases_and_filters() {
        assert_eq!(
            tokenize("The Kettle's handle is GREAT, a 10/10 buy!"),
            vec!["kettle", "handle", "great", "10", "10", "buy"]
        );
    }

    #[test]
    fn tokenize_keeps_underscores_and_unicode() {
        assert_eq!(tokenize("crème_brûlée dish"), vec!["crème_brûlée", "dish"]);
    }

    #[test]
    fn idf_is_smoothed() {
        let v = TfidfVectorizer::fit(&["red pan", "red pot", "blue pot"]);
        // n = 3: red df=2, blue df=1
        let red = v.idf_of("red").unwrap();
        let blue = v.idf_of("blue").unwrap();
        assert!((red - ((4.0f64 / 3.0).ln() + 1.0)).abs() < 1e-12);
        assert!((blue - (2.0f64.ln() + 1.0)).abs() < 1e-12);
        assert_eq!(v.vocabulary_len(), 4);
    }

    #[test]
    fn rows_are_unit_length() {
        let (_, rows) = TfidfVectorizer::fit_transform(&["sturdy sturdy handle", "handle"]);
        for r in rows {
            assert!((r.dot(&r) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn unknown_terms_give_zero_vector() {
        let v = TfidfVectorizer::fit(&["sturdy handle"]);
        let t = v.transform("completely different words");
        assert!(t.is_zero());
        let other = v.transform("sturdy");
        assert_eq!(cosine_similarity(&t, &other), 0.0);
    }

    #[test]
    fn identical_documents_have_similarity_one() {
        let (v, rows) = TfidfVectorizer::fit_transform(&["non stick pan", "glass lid"]);
        let t = v.transform("non stick pan");
        assert!((cosine_similarity(&t, &rows[0]) - 1.0).abs() < 1e-12);
        assert_eq!(cosine_similarity(&t, &rows[1]), 0.0);
    }

    #[test]
    fn empty_corpus_fits_empty_vocabulary() {
        let docs: [&str; 0] = [];
        let v = TfidfVectorizer::fit(&docs);
        assert_eq!(v.vocabulary_len(), 0);
        assert!(v.transform("anything").is_zero());
    }

    #[test]
    fn top_k_orders_descending_with_stable_ties() {
        assert_eq!(top_k(&[0.2, 0.9, 0.2, 0.5], 3), vec![1, 3, 0]);
        assert_eq!(top_k(&[0.1], 10), vec![0]);
        assert!(top_k(&[], 3).is_empty());
    }
}
