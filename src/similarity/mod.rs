//! Local similarity matrices and their on-disk cache.
//!
//! A local measure scores every `(G1 node, G2 node)` pair up front. Those
//! tables are expensive to build and depend only on the graph pair and the
//! measure parameters, so [`SimilarityCache`] computes each one once and
//! reloads it from a binary artifact afterwards. The GO annotation pipeline
//! caches its intermediate per-graph stages the same way.

mod annotation;
mod cache;
mod go;
mod matrix;

pub use annotation::{least_frequent_terms, term_counts, AnnotationSource, AnnotationStore};
pub use cache::{CacheKey, SimilarityCache};
pub use go::GoSimilarity;
pub use matrix::SimilarityMatrix;
