//! Weighted aggregate of measures with incremental re-scoring.

use super::topology::{self, TopologyCounts};
use super::types::Measure;
use crate::alignment::Alignment;
use crate::error::{AlignError, Result};
use crate::graph::GraphPair;
use crate::sana::{Move, MoveScorer};

/// An ordered list of `(measure, weight)` pairs.
///
/// The total score is `sum(weight * measure)`. Weights are plain
/// multipliers; normalizing them is up to the caller.
///
/// # Examples
///
/// ```
/// use u_netalign::alignment::Alignment;
/// use u_netalign::graph::{Graph, GraphPair};
/// use u_netalign::measures::{EdgeCorrectness, Measure, MeasureCombination};
///
/// let g1 = Graph::from_named_edges("a", &[("a1", "a2")]).unwrap();
/// let g2 = Graph::from_named_edges("b", &[("b1", "b2"), ("b2", "b3")]).unwrap();
/// let pair = GraphPair::new(g1, g2).unwrap();
///
/// let combo = MeasureCombination::new(&pair)
///     .with(Measure::global(EdgeCorrectness), 1.0)
///     .unwrap();
/// let score = combo.evaluate(&Alignment::identity(2, 3));
/// assert!((score - 1.0).abs() < 1e-12);
/// ```
#[derive(Debug)]
pub struct MeasureCombination<'g> {
    pair: &'g GraphPair,
    entries: Vec<(Measure, f64)>,
    needs_topology: bool,
}

/// Incremental state of a [`MeasureCombination`].
#[derive(Debug, Clone, PartialEq)]
pub struct CombinationState {
    pub counts: TopologyCounts,
    /// Raw similarity sum per entry (zero for global entries).
    pub local_sums: Vec<f64>,
}

/// Pending effect of one move.
#[derive(Debug, Clone, Default)]
pub struct CombinationDelta {
    pub counts: TopologyCounts,
    pub local_sums: Vec<f64>,
}

impl<'g> MeasureCombination<'g> {
    pub fn new(pair: &'g GraphPair) -> Self {
        Self {
            pair,
            entries: Vec::new(),
            needs_topology: false,
        }
    }

    /// Appends a measure with its weight.
    pub fn with(mut self, measure: Measure, weight: f64) -> Result<Self> {
        self.push(measure, weight)?;
        Ok(self)
    }

    /// Appends a measure with its weight.
    ///
    /// A local measure must carry an `n1 x n2` matrix for this pair;
    /// anything else is a configuration error.
    pub fn push(&mut self, measure: Measure, weight: f64) -> Result<()> {
        match &measure {
            Measure::Local(local) => {
                let m = local.matrix();
                if m.rows() != self.pair.n1() || m.cols() != self.pair.n2() {
                    return Err(AlignError::Configuration(format!(
                        "measure `{}` has a {}x{} matrix, the pair needs {}x{}",
                        local.name(),
                        m.rows(),
                        m.cols(),
                        self.pair.n1(),
                        self.pair.n2()
                    )));
                }
            }
            Measure::Global(_) => self.needs_topology = true,
        }
        self.entries.push((measure, weight));
        Ok(())
    }

    pub fn pair(&self) -> &'g GraphPair {
        self.pair
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[(Measure, f64)] {
        &self.entries
    }

    /// Looks up an entry by measure name.
    pub fn measure(&self, name: &str) -> Option<&Measure> {
        self.entries
            .iter()
            .map(|(m, _)| m)
            .find(|m| m.name() == name)
    }

    /// Weighted score of `alignment`, computed from scratch.
    pub fn evaluate(&self, alignment: &Alignment) -> f64 {
        let state = self.initial_state(alignment);
        self.score(&state)
    }

    /// Unweighted value of every measure, in entry order.
    pub fn measure_scores(&self, alignment: &Alignment) -> Vec<(String, f64)> {
        self.entries
            .iter()
            .map(|(m, _)| (m.name().to_string(), m.evaluate(self.pair, alignment)))
            .collect()
    }

    fn value(&self, index: usize, counts: &TopologyCounts, local_sum: f64) -> f64 {
        match &self.entries[index].0 {
            Measure::Global(m) => m.score(counts, self.pair),
            Measure::Local(m) => m.normalize(local_sum),
        }
    }
}

impl MoveScorer for MeasureCombination<'_> {
    type State = CombinationState;
    type Delta = CombinationDelta;

    fn initial_state(&self, alignment: &Alignment) -> CombinationState {
        let counts = if self.needs_topology {
            TopologyCounts::compute(self.pair, alignment)
        } else {
            TopologyCounts::default()
        };
        let local_sums = self
            .entries
            .iter()
            .map(|(m, _)| match m {
                Measure::Local(local) => local.similarity_sum(alignment),
                Measure::Global(_) => 0.0,
            })
            .collect();
        CombinationState { counts, local_sums }
    }

    fn score(&self, state: &CombinationState) -> f64 {
        (0..self.entries.len())
            .map(|k| self.entries[k].1 * self.value(k, &state.counts, state.local_sums[k]))
            .sum()
    }

    fn evaluate_delta(
        &self,
        state: &CombinationState,
        alignment: &Alignment,
        mv: &Move,
        delta: &mut CombinationDelta,
    ) -> f64 {
        delta.counts = if self.needs_topology {
            match *mv {
                Move::Swap { a, b } => topology::swap_diff(self.pair, alignment, a, b),
                Move::Reassign { node, target } => {
                    topology::reassign_diff(self.pair, alignment, node, target)
                }
            }
        } else {
            TopologyCounts::default()
        };
        let new_counts = state.counts.plus(&delta.counts);

        delta.local_sums.resize(self.entries.len(), 0.0);
        let mut change = 0.0;
        for (k, (measure, weight)) in self.entries.iter().enumerate() {
            match measure {
                Measure::Local(local) => {
                    let diff = match *mv {
                        Move::Swap { a, b } => local.swap_diff(alignment, a, b),
                        Move::Reassign { node, target } => {
                            local.reassign_diff(alignment, node, target)
                        }
                    };
                    delta.local_sums[k] = diff;
                    change += weight * local.normalize(diff);
                }
                Measure::Global(global) => {
                    delta.local_sums[k] = 0.0;
                    change += weight
                        * (global.score(&new_counts, self.pair)
                            - global.score(&state.counts, self.pair));
                }
            }
        }
        change
    }

    fn apply_delta(&self, state: &mut CombinationState, delta: &CombinationDelta) {
        state.counts.add(&delta.counts);
        for (sum, diff) in state.local_sums.iter_mut().zip(&delta.local_sums) {
            *sum += diff;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;
    use crate::measures::{
        EdgeCorrectness, InducedConservedStructure, LocalMeasure, SymmetricSubstructureScore,
    };
    use crate::random::create_rng;
    use crate::similarity::SimilarityMatrix;
    use proptest::prelude::*;
    use rand::Rng;
    use std::sync::Arc;

    fn ring_pair(n1: usize, n2: usize) -> GraphPair {
        let names = |p: &str, n: usize| (0..n).map(|i| format!("{p}{i}")).collect::<Vec<_>>();
        let ring = |n: usize| (0..n).map(|i| (i, (i + 1) % n)).collect::<Vec<_>>();
        let mut e2 = ring(n2);
        e2.push((0, n2 / 2));
        let g1 = Graph::new("r1", names("a", n1), &ring(n1)).unwrap();
        let g2 = Graph::new("r2", names("b", n2), &e2).unwrap();
        GraphPair::new(g1, g2).unwrap()
    }

    fn full_combo(pair: &GraphPair) -> MeasureCombination<'_> {
        let sims = SimilarityMatrix::from_fn(pair.n1(), pair.n2(), |i, j| {
            ((i * 7 + j * 3) % 5) as f32 / 4.0
        });
        let mut combo = MeasureCombination::new(pair);
        combo.push(Measure::global(EdgeCorrectness), 0.4).unwrap();
        combo.push(Measure::global(SymmetricSubstructureScore), 0.3).unwrap();
        combo.push(Measure::global(InducedConservedStructure), 0.1).unwrap();
        combo
            .push(LocalMeasure::new("sim", Arc::new(sims)).into(), 0.2)
            .unwrap();
        combo
    }

    #[test]
    fn test_evaluate_is_weighted_sum() {
        let pair = ring_pair(6, 9);
        let combo = full_combo(&pair);
        let a = Alignment::identity(6, 9);
        let expected: f64 = combo
            .entries()
            .iter()
            .map(|(m, w)| w * m.evaluate(&pair, &a))
            .sum();
        assert!((combo.evaluate(&a) - expected).abs() < 1e-12);
        assert_eq!(combo.measure_scores(&a).len(), 4);
        assert!(combo.measure("s3").is_some());
        assert!(combo.measure("nope").is_none());
    }

    #[test]
    fn test_delta_matches_full_evaluation() {
        let pair = ring_pair(8, 12);
        let combo = full_combo(&pair);
        let mut rng = create_rng(5);
        let mut a = Alignment::random(8, 12, &mut rng);
        let mut state = combo.initial_state(&a);
        let mut delta = CombinationDelta::default();

        for _ in 0..300 {
            let mv = if rng.random_bool(0.5) {
                let x = rng.random_range(0..8);
                let y = (x + 1 + rng.random_range(0..7)) % 8;
                Move::Swap { a: x, b: y }
            } else {
                let free = a.unassigned();
                Move::Reassign {
                    node: rng.random_range(0..8),
                    target: free[rng.random_range(0..free.len())],
                }
            };
            let before = combo.evaluate(&a);
            let d = combo.evaluate_delta(&state, &a, &mv, &mut delta);
            mv.apply(&mut a);
            combo.apply_delta(&mut state, &delta);
            let after = combo.evaluate(&a);
            assert!((after - before - d).abs() < 1e-9, "delta drift: {d} vs {}", after - before);
            assert!((combo.score(&state) - after).abs() < 1e-9);
        }
    }

    #[test]
    fn test_local_only_skips_topology() {
        let pair = ring_pair(3, 4);
        let sims = SimilarityMatrix::from_fn(3, 4, |i, j| if i == j { 1.0 } else { 0.0 });
        let combo = MeasureCombination::new(&pair)
            .with(LocalMeasure::new("sim", Arc::new(sims)).into(), 1.0)
            .unwrap();
        let state = combo.initial_state(&Alignment::identity(3, 4));
        assert_eq!(state.counts, TopologyCounts::default());
        assert!((combo.score(&state) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_local_matrix_must_match_pair() {
        let pair = ring_pair(12, 15);
        for (rows, cols) in [(12, 14), (12, 16), (11, 15)] {
            let sims = SimilarityMatrix::zeros(rows, cols);
            let err = MeasureCombination::new(&pair)
                .with(LocalMeasure::new("sim", Arc::new(sims)).into(), 1.0)
                .unwrap_err();
            assert!(matches!(err, AlignError::Configuration(_)), "{rows}x{cols}");
        }

        let mut combo = MeasureCombination::new(&pair);
        let narrow = LocalMeasure::new("sim", Arc::new(SimilarityMatrix::zeros(12, 14)));
        assert!(combo.push(narrow.into(), 1.0).is_err());
        assert!(combo.is_empty());
        let fitting = LocalMeasure::new("sim", Arc::new(SimilarityMatrix::zeros(12, 15)));
        combo.push(fitting.into(), 1.0).unwrap();
        assert_eq!(combo.evaluate(&Alignment::identity(12, 15)), 0.0);
    }

    proptest! {
        #[test]
        fn prop_running_score_tracks_evaluation(seed in any::<u64>(), steps in 1usize..200) {
            let pair = ring_pair(7, 10);
            let combo = full_combo(&pair);
            let mut rng = create_rng(seed);
            let mut a = Alignment::random(7, 10, &mut rng);
            let mut state = combo.initial_state(&a);
            let mut running = combo.score(&state);
            let mut delta = CombinationDelta::default();
            for _ in 0..steps {
                let x = rng.random_range(0..7);
                let mv = if rng.random_bool(0.3) {
                    let free = a.unassigned();
                    Move::Reassign { node: x, target: free[rng.random_range(0..free.len())] }
                } else {
                    Move::Swap { a: x, b: (x + 1) % 7 }
                };
                running += combo.evaluate_delta(&state, &a, &mv, &mut delta);
                mv.apply(&mut a);
                combo.apply_delta(&mut state, &delta);
                prop_assert!(a.is_injective());
            }
            prop_assert!((running - combo.evaluate(&a)).abs() < 1e-9);
        }
    }
}
