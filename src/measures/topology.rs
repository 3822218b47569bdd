//! Edge-overlap counts and the measures built on them.
//!
//! - *aligned edges*: G1 edges `(a, b)` whose images `(A[a], A[b])` are a G2
//!   edge.
//! - *induced edges*: G2 edges with both endpoints in the image of `A`.
//!
//! EC, ICS and S3 are ratios of these two counts and the G1 edge count.

use super::types::GlobalMeasure;
use crate::alignment::Alignment;
use crate::graph::GraphPair;

/// Edge counts an alignment induces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopologyCounts {
    pub aligned_edges: i64,
    pub induced_edges: i64,
}

impl TopologyCounts {
    /// Counts both quantities with one pass over each edge set.
    pub fn compute(pair: &GraphPair, alignment: &Alignment) -> Self {
        let g2 = pair.g2();
        let aligned_edges = pair
            .g1()
            .edges()
            .filter(|&(a, b)| g2.has_edge(alignment[a], alignment[b]))
            .count() as i64;
        let induced_edges = g2
            .edges()
            .filter(|&(u, v)| alignment.is_occupied(u) && alignment.is_occupied(v))
            .count() as i64;
        Self {
            aligned_edges,
            induced_edges,
        }
    }

    pub fn add(&mut self, diff: &TopologyCounts) {
        self.aligned_edges += diff.aligned_edges;
        self.induced_edges += diff.induced_edges;
    }

    pub fn plus(mut self, diff: &TopologyCounts) -> Self {
        self.add(diff);
        self
    }
}

/// Count changes from exchanging the images of `a` and `b`.
///
/// The image set is unchanged, so induced edges stay the same. The edge
/// between `a` and `b` (if any) maps onto the same undirected G2 pair before
/// and after, so it is skipped.
pub fn swap_diff(pair: &GraphPair, alignment: &Alignment, a: usize, b: usize) -> TopologyCounts {
    let (g1, g2) = (pair.g1(), pair.g2());
    let (u, v) = (alignment[a], alignment[b]);
    let mut diff = 0i64;
    for &k in g1.neighbors(a) {
        if k == b {
            continue;
        }
        let w = alignment[k];
        diff += g2.has_edge(v, w) as i64 - g2.has_edge(u, w) as i64;
    }
    for &k in g1.neighbors(b) {
        if k == a {
            continue;
        }
        let w = alignment[k];
        diff += g2.has_edge(u, w) as i64 - g2.has_edge(v, w) as i64;
    }
    TopologyCounts {
        aligned_edges: diff,
        induced_edges: 0,
    }
}

/// Count changes from moving `node` onto the unassigned G2 node `target`.
pub fn reassign_diff(
    pair: &GraphPair,
    alignment: &Alignment,
    node: usize,
    target: usize,
) -> TopologyCounts {
    let (g1, g2) = (pair.g1(), pair.g2());
    let old = alignment[node];

    let mut aligned = 0i64;
    for &k in g1.neighbors(node) {
        let w = alignment[k];
        aligned += g2.has_edge(target, w) as i64 - g2.has_edge(old, w) as i64;
    }

    let lost = g2
        .neighbors(old)
        .iter()
        .filter(|&&w| alignment.is_occupied(w))
        .count() as i64;
    let gained = g2
        .neighbors(target)
        .iter()
        .filter(|&&w| w != old && alignment.is_occupied(w))
        .count() as i64;

    TopologyCounts {
        aligned_edges: aligned,
        induced_edges: gained - lost,
    }
}

/// Edge correctness: fraction of G1 edges that are aligned.
#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeCorrectness;

impl GlobalMeasure for EdgeCorrectness {
    fn name(&self) -> &str {
        "ec"
    }

    fn score(&self, counts: &TopologyCounts, pair: &GraphPair) -> f64 {
        ratio(counts.aligned_edges, pair.g1().num_edges() as i64)
    }
}

/// Induced conserved structure: aligned edges over induced edges.
#[derive(Debug, Clone, Copy, Default)]
pub struct InducedConservedStructure;

impl GlobalMeasure for InducedConservedStructure {
    fn name(&self) -> &str {
        "ics"
    }

    fn score(&self, counts: &TopologyCounts, _pair: &GraphPair) -> f64 {
        ratio(counts.aligned_edges, counts.induced_edges)
    }
}

/// Symmetric substructure score: aligned edges over the union of G1 edges
/// and induced edges.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymmetricSubstructureScore;

impl GlobalMeasure for SymmetricSubstructureScore {
    fn name(&self) -> &str {
        "s3"
    }

    fn score(&self, counts: &TopologyCounts, pair: &GraphPair) -> f64 {
        let union = pair.g1().num_edges() as i64 + counts.induced_edges - counts.aligned_edges;
        ratio(counts.aligned_edges, union)
    }
}

fn ratio(num: i64, den: i64) -> f64 {
    if den <= 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}
