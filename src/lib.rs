//! Global network alignment by simulated annealing.
//!
//! Aligns a smaller graph G1 into a larger graph G2 with an injective node
//! mapping that maximizes a weighted combination of quality measures:
//!
//! - **Graphs & alignments**: [`graph`] holds undirected simple graphs and
//!   the ordered pair being aligned; [`alignment`] holds the mapping itself,
//!   its file format and the lock set of nodes that must not move.
//! - **Measures**: [`measures`] provides topological measures (EC, ICS, S3)
//!   with neighborhood-restricted deltas, local measures over a similarity
//!   matrix, and [`MeasureCombination`](measures::MeasureCombination).
//! - **Similarity**: [`similarity`] builds local similarity matrices (GO
//!   annotation overlap) and caches them on disk, keyed by graph names and
//!   parameters.
//! - **Search**: [`sana`] runs simulated annealing with calibrated,
//!   dynamic or restart-based temperature schedules.
//!
//! # Example
//!
//! ```
//! use u_netalign::graph::{Graph, GraphPair};
//! use u_netalign::measures::{EdgeCorrectness, Measure, MeasureCombination};
//! use u_netalign::sana::{Budget, SanaConfig, SanaRunner, TemperatureMode};
//!
//! let g1 = Graph::from_named_edges("yeast", &[("a", "b"), ("b", "c")]).unwrap();
//! let g2 = Graph::from_named_edges("human", &[("x", "y"), ("y", "z"), ("z", "w")]).unwrap();
//! let pair = GraphPair::new(g1, g2).unwrap();
//!
//! let combo = MeasureCombination::new(&pair)
//!     .with(Measure::global(EdgeCorrectness), 1.0)
//!     .unwrap();
//! let config = SanaConfig::default()
//!     .with_t_initial(TemperatureMode::Explicit(0.1))
//!     .with_t_decay(TemperatureMode::Explicit(10.0))
//!     .with_budget(Budget::Iterations(5_000))
//!     .with_seed(42);
//!
//! let result = SanaRunner::run(&combo, &pair, &config).unwrap();
//! assert!((result.score - 1.0).abs() < 1e-12);
//! ```

pub mod alignment;
pub mod error;
pub mod graph;
pub mod measures;
pub mod random;
pub mod sana;
pub mod similarity;

pub use error::{AlignError, Result};
