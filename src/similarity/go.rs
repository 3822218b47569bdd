//! GO-term overlap similarity.

use super::annotation::AnnotationStore;
use super::cache::{CacheKey, SimilarityCache};
use super::matrix::SimilarityMatrix;
use crate::error::{AlignError, Result};
use crate::graph::{Graph, GraphPair};
use crate::measures::LocalMeasure;

/// Similarity of two proteins by the number of GO terms they share.
///
/// `count_weights[k]` is the extra credit for the `(k+1)`-th shared term.
/// Weights are normalized to sum to one and accumulated, so a pair sharing
/// `c` terms scores `w1 + ... + wc`, saturating once `c` reaches the number
/// of weights.
///
/// ```
/// use u_netalign::similarity::GoSimilarity;
///
/// let go = GoSimilarity::new(vec![2.0, 1.0, 1.0], 1.0).unwrap();
/// assert_eq!(go.count_weights(), &[0.5, 0.25, 0.25]);
/// ```
#[derive(Debug, Clone)]
pub struct GoSimilarity {
    count_weights: Vec<f64>,
    occurrences_fraction: f64,
}

impl GoSimilarity {
    pub const NAME: &'static str = "go";

    /// Fails with [`AlignError::Configuration`] on an empty or negative
    /// weight vector, or a fraction outside `(0, 1]`.
    pub fn new(count_weights: Vec<f64>, occurrences_fraction: f64) -> Result<Self> {
        if count_weights.is_empty() {
            return Err(AlignError::Configuration(
                "go: count weights must not be empty".into(),
            ));
        }
        if count_weights.iter().any(|&w| !w.is_finite() || w < 0.0) {
            return Err(AlignError::Configuration(
                "go: count weights must be finite and non-negative".into(),
            ));
        }
        let total: f64 = count_weights.iter().sum();
        if total <= 0.0 {
            return Err(AlignError::Configuration(
                "go: count weights must not all be zero".into(),
            ));
        }
        if !(occurrences_fraction > 0.0 && occurrences_fraction <= 1.0) {
            return Err(AlignError::Configuration(format!(
                "go: occurrences fraction must be in (0, 1], got {occurrences_fraction}"
            )));
        }
        Ok(Self {
            count_weights: count_weights.iter().map(|w| w / total).collect(),
            occurrences_fraction,
        })
    }

    /// Normalized weights.
    pub fn count_weights(&self) -> &[f64] {
        &self.count_weights
    }

    pub fn occurrences_fraction(&self) -> f64 {
        self.occurrences_fraction
    }

    pub fn cache_key(&self, pair: &GraphPair) -> CacheKey {
        CacheKey::new(pair.g1().name(), pair.g2().name(), Self::NAME)
            .with_weights(&self.count_weights)
            .with_param("frac", self.occurrences_fraction)
    }

    /// Scores every pair from per-node term lists.
    pub fn compute(&self, g1_terms: &[Vec<u32>], g2_terms: &[Vec<u32>]) -> SimilarityMatrix {
        let mut accumulated = self.count_weights.clone();
        for k in 1..accumulated.len() {
            accumulated[k] += accumulated[k - 1];
        }
        let max_count = accumulated.len();

        let sorted = |terms: &[Vec<u32>]| -> Vec<Vec<u32>> {
            terms
                .iter()
                .map(|list| {
                    let mut list = list.clone();
                    list.sort_unstable();
                    list.dedup();
                    list
                })
                .collect()
        };
        let left = sorted(g1_terms);
        let right = sorted(g2_terms);

        SimilarityMatrix::from_fn(left.len(), right.len(), |i, j| {
            match shared_terms(&left[i], &right[j], max_count) {
                0 => 0.0,
                count => accumulated[count - 1] as f32,
            }
        })
    }

    /// Builds (or loads) the similarity matrix and wraps it as a local
    /// measure.
    pub fn build(
        &self,
        pair: &GraphPair,
        store: &AnnotationStore,
        cache: &SimilarityCache,
    ) -> Result<LocalMeasure> {
        let key = self.cache_key(pair);
        let matrix = cache.get_or_build(&key, pair.n1(), pair.n2(), || {
            let g1_terms = store.load_terms(pair.g1(), self.occurrences_fraction)?;
            let g2_terms = store.load_terms(pair.g2(), self.occurrences_fraction)?;
            Ok(self.compute(&g1_terms, &g2_terms))
        })?;
        Ok(LocalMeasure::new(Self::NAME, matrix))
    }

    /// Number of nodes of `graph` carrying at least one GO term.
    pub fn annotated_count(store: &AnnotationStore, graph: &Graph) -> Result<usize> {
        let terms = store.internal_terms(graph)?;
        Ok(terms.iter().filter(|t| !t.is_empty()).count())
    }
}

/// Size of the intersection of two sorted lists, stopping at `cap`.
fn shared_terms(a: &[u32], b: &[u32], cap: usize) -> usize {
    let (mut i, mut j, mut count) = (0, 0, 0);
    while i < a.len() && j < b.len() && count < cap {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                count += 1;
                i += 1;
                j += 1;
            }
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_new_validates() {
        assert!(GoSimilarity::new(vec![], 1.0).is_err());
        assert!(GoSimilarity::new(vec![-1.0, 2.0], 1.0).is_err());
        assert!(GoSimilarity::new(vec![0.0], 1.0).is_err());
        assert!(GoSimilarity::new(vec![1.0], 0.0).is_err());
        assert!(GoSimilarity::new(vec![1.0], 1.5).is_err());
    }

    #[test]
    fn test_saturating_accumulated_score() {
        let go = GoSimilarity::new(vec![1.0, 1.0], 1.0).unwrap();
        let m = go.compute(
            &[vec![1, 2, 3], vec![9]],
            &[vec![3, 2, 1], vec![1], vec![]],
        );
        // three shared terms saturate at two weights
        assert!((m.get(0, 0) - 1.0).abs() < 1e-6);
        assert!((m.get(0, 1) - 0.5).abs() < 1e-6);
        assert_eq!(m.get(0, 2), 0.0);
        assert_eq!(m.get(1, 0), 0.0);
    }

    #[test]
    fn test_shared_terms_cap() {
        assert_eq!(shared_terms(&[1, 2, 3, 4], &[2, 3, 4], 2), 2);
        assert_eq!(shared_terms(&[1, 5], &[2, 3], 9), 0);
    }

    #[test]
    fn test_build_through_cache_twice() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("gene2go");
        fs::write(
            &raw,
            "h\n1 a1 GO:0000001\n1 a2 GO:0000002\n1 b1 GO:0000002\n1 b2 GO:0000001\n1 b3 GO:0000001\n",
        )
        .unwrap();
        let g1 = Graph::from_named_edges("A", &[("a1", "a2")]).unwrap();
        let g2 = Graph::from_named_edges("B", &[("b1", "b2"), ("b2", "b3")]).unwrap();
        let pair = GraphPair::new(g1, g2).unwrap();
        let store = AnnotationStore::new(dir.path().join("cache")).with_gene2go(&raw);
        let go = GoSimilarity::new(vec![1.0], 1.0).unwrap();

        let cache = SimilarityCache::new(dir.path().join("matrices"));
        let first = go.build(&pair, &store, &cache).unwrap();
        let again = SimilarityCache::new(dir.path().join("matrices"));
        let second = go.build(&pair, &store, &again).unwrap();

        assert_eq!(cache.builds(), 1);
        assert_eq!(again.builds(), 0);
        assert_eq!(first.matrix().to_bytes(), second.matrix().to_bytes());
        assert_eq!(first.matrix().row(0), &[0.0, 1.0, 1.0]);
        assert_eq!(first.matrix().row(1), &[1.0, 0.0, 0.0]);
        assert!(cache
            .artifact_path(&go.cache_key(&pair))
            .ends_with("A_B_go_1_000_frac_000.bin"));
    }

    #[test]
    fn test_missing_annotation_fails_measure() {
        let dir = tempfile::tempdir().unwrap();
        let g1 = Graph::from_named_edges("A", &[("a1", "a2")]).unwrap();
        let g2 = Graph::from_named_edges("B", &[("b1", "b2")]).unwrap();
        let pair = GraphPair::new(g1, g2).unwrap();
        let store = AnnotationStore::new(dir.path());
        let cache = SimilarityCache::new(dir.path());
        let go = GoSimilarity::new(vec![1.0], 1.0).unwrap();
        let err = go.build(&pair, &store, &cache).unwrap_err();
        assert!(matches!(err, AlignError::MissingAnnotationData { .. }));
        assert_eq!(cache.builds(), 0);
    }

    #[test]
    fn test_annotated_count() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("gene2go");
        fs::write(&raw, "h\n1 a1 GO:0000001\n").unwrap();
        let g = Graph::from_named_edges("A", &[("a1", "a2")]).unwrap();
        let store = AnnotationStore::new(dir.path().join("cache")).with_gene2go(&raw);
        assert_eq!(GoSimilarity::annotated_count(&store, &g).unwrap(), 1);
    }
}
