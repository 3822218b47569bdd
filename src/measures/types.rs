//! The measure capability and its two variants.

use super::local::LocalMeasure;
use super::topology::TopologyCounts;
use crate::alignment::Alignment;
use crate::graph::GraphPair;
use std::fmt::Debug;

/// A topological measure defined over whole-graph edge overlap.
///
/// Implementations are pure functions of [`TopologyCounts`], which the
/// combination maintains incrementally. This keeps the per-move cost of a
/// global measure bounded by the degrees of the moved nodes.
pub trait GlobalMeasure: Send + Sync + Debug {
    /// Short identifier, e.g. `"ec"`.
    fn name(&self) -> &str;

    /// Score for the given edge counts. Higher is better.
    fn score(&self, counts: &TopologyCounts, pair: &GraphPair) -> f64;
}

/// Anything that can score an alignment.
#[derive(Debug)]
pub enum Measure {
    Global(Box<dyn GlobalMeasure>),
    Local(LocalMeasure),
}

impl Measure {
    pub fn global(measure: impl GlobalMeasure + 'static) -> Self {
        Measure::Global(Box::new(measure))
    }

    pub fn name(&self) -> &str {
        match self {
            Measure::Global(m) => m.name(),
            Measure::Local(m) => m.name(),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Measure::Local(_))
    }

    /// Scores `alignment` from scratch.
    pub fn evaluate(&self, pair: &GraphPair, alignment: &Alignment) -> f64 {
        match self {
            Measure::Global(m) => m.score(&TopologyCounts::compute(pair, alignment), pair),
            Measure::Local(m) => m.evaluate(alignment),
        }
    }
}

impl From<LocalMeasure> for Measure {
    fn from(m: LocalMeasure) -> Self {
        Measure::Local(m)
    }
}
