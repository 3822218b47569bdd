//! Alignment quality measures and their weighted combination.
//!
//! Two kinds of measure exist:
//!
//! - **Global** measures score whole-graph topological overlap. The ones
//!   provided here (EC, ICS, S3) are functions of aligned and induced edge
//!   counts, which can be updated from the neighborhoods of moved nodes.
//! - **Local** measures score each node pair through a precomputed
//!   [`SimilarityMatrix`](crate::similarity::SimilarityMatrix).
//!
//! [`MeasureCombination`] aggregates both and implements
//! [`MoveScorer`](crate::sana::MoveScorer) for the annealer.
//!
//! # References
//!
//! - Kuchaiev et al. (2010), "Topological network alignment uncovers
//!   biological function and phylogeny" (EC)
//! - Patro & Kingsford (2012), "Global network alignment using multiscale
//!   spectral signatures" (ICS)
//! - Saraph & Milenković (2014), "MAGNA: Maximizing Accuracy in Global
//!   Network Alignment" (S3)

mod combination;
mod local;
mod topology;
mod types;

pub use combination::{CombinationDelta, CombinationState, MeasureCombination};
pub use local::LocalMeasure;
pub use topology::{
    EdgeCorrectness, InducedConservedStructure, SymmetricSubstructureScore, TopologyCounts,
};
pub use types::{GlobalMeasure, Measure};
