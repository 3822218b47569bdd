//! Restart scheme: many short candidate runs, then a long cooling of the
//! most promising one.
//!
//! Each round gets an equal share of what is left of the budget. The
//! candidate phases of a round may use at most half of that share; the
//! chosen candidate cools over whatever the round has left.

use super::annealer::{Annealer, PhaseStats};
use super::config::{Budget, RestartConfig};
use super::schedule::{PhaseClock, Schedule};
use super::types::MoveScorer;
use crate::alignment::{Alignment, LockSet};
use crate::error::Result;
use crate::random::{create_rng, derive_seed};
use rand::seq::SliceRandom;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Index of the highest score, first one on ties. NaN scores never win.
///
/// # Examples
///
/// ```
/// use u_netalign::sana::select_best;
///
/// assert_eq!(select_best(&[0.2, 0.5, 0.35]), Some(1));
/// assert_eq!(select_best(&[]), None);
/// ```
pub fn select_best(scores: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &s) in scores.iter().enumerate() {
        if s.is_nan() {
            continue;
        }
        if best.map_or(true, |(_, b)| s > b) {
            best = Some((i, s));
        }
    }
    best.map(|(i, _)| i)
}

/// A random alignment that agrees with `start` on every locked node.
///
/// Movable G1 nodes draw their images from the images they hold in `start`
/// plus the free, unlocked G2 nodes.
pub(crate) fn fresh_candidate(
    start: &Alignment,
    locks: &LockSet,
    seed: u64,
) -> Result<Alignment> {
    let mut rng = create_rng(seed);
    let movable = locks.movable_g1();
    let mut pool: Vec<usize> = movable.iter().map(|&i| start[i]).collect();
    pool.extend(
        start
            .unassigned()
            .into_iter()
            .filter(|&t| !locks.is_g2_locked(t)),
    );
    pool.shuffle(&mut rng);

    let mut image = start.as_slice().to_vec();
    for (&node, &target) in movable.iter().zip(&pool) {
        image[node] = target;
    }
    Alignment::from_vec(image, start.n2())
}

/// What the restart scheme hands back to the runner.
pub(crate) struct RestartOutcome {
    pub alignment: Alignment,
    pub score: f64,
    pub stats: PhaseStats,
    pub rounds: usize,
    pub cancelled: bool,
}

struct Candidate {
    alignment: Alignment,
    score: f64,
    iterations: u64,
    accepted: u64,
    improving: u64,
}

/// Limits of the two candidate phases of one round.
#[derive(Debug, Clone, Copy)]
struct StepLimit {
    iterations: u64,
    deadline: Option<Instant>,
}

impl StepLimit {
    /// Fits `2 * num_candidates` phases into half of `round`.
    fn for_round(round: Budget, config: &RestartConfig, deadline: Option<Instant>) -> Self {
        let phases = 4 * config.num_candidates as u64;
        match round {
            Budget::Iterations(n) => Self {
                iterations: config.iter_per_step.min(n / phases),
                deadline,
            },
            Budget::Time(d) => {
                let half = Instant::now() + d.div_f64(2.0);
                Self {
                    iterations: config.iter_per_step,
                    deadline: Some(deadline.map_or(half, |end| end.min(half))),
                }
            }
        }
    }
}

/// Warms a candidate at `t_new`, then scores it after a stint at `t_cand`.
fn run_candidate<S: MoveScorer>(
    scorer: &S,
    alignment: Alignment,
    locks: &LockSet,
    config: &RestartConfig,
    limit: StepLimit,
    cancel: Option<&Arc<AtomicBool>>,
    seed: u64,
) -> Candidate {
    let mut annealer = Annealer::new(scorer, alignment, locks, seed);
    let (mut iterations, mut accepted, mut improving) = (0, 0, 0);
    for t in [config.t_new, config.t_cand] {
        let mut clock = PhaseClock::new(Budget::Iterations(limit.iterations), limit.deadline)
            .with_cancel(cancel.cloned());
        let phase = annealer.anneal(&mut Schedule::fixed(t), &mut clock, None);
        iterations += phase.iterations;
        accepted += phase.accepted;
        improving += phase.improving;
    }
    Candidate {
        score: annealer.score(),
        alignment: annealer.alignment().clone(),
        iterations,
        accepted,
        improving,
    }
}

/// Runs all restart rounds within `budget`, which is what is left of the
/// run budget once calibration has been paid for.
pub(crate) fn run_restarts<S: MoveScorer>(
    scorer: &S,
    start: &Alignment,
    locks: &LockSet,
    config: &RestartConfig,
    budget: Budget,
    cancel: Option<&Arc<AtomicBool>>,
    seed: u64,
) -> Result<RestartOutcome> {
    let began = Instant::now();
    let deadline = match budget {
        Budget::Time(d) => Some(began + d),
        Budget::Iterations(_) => None,
    };
    let mut stats = PhaseStats::default();
    let mut best: Option<(Alignment, f64)> = None;
    let mut rounds = 0;
    let mut cancelled = false;

    for round in 0..config.rounds {
        if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            cancelled = true;
            break;
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        let round_budget = budget
            .remaining(stats.iterations, began.elapsed())
            .share(config.rounds - round);
        let limit = StepLimit::for_round(round_budget, config, deadline);
        let mut starts = Vec::with_capacity(config.num_candidates);
        for k in 0..config.num_candidates {
            let stream = (round * config.num_candidates + k) as u64;
            if round == 0 && k == 0 {
                starts.push((start.clone(), stream));
            } else {
                starts.push((fresh_candidate(start, locks, derive_seed(seed, stream))?, stream));
            }
        }

        #[cfg(feature = "parallel")]
        let candidates: Vec<Candidate> = {
            use rayon::prelude::*;
            starts
                .into_par_iter()
                .map(|(a, stream)| {
                    run_candidate(
                        scorer,
                        a,
                        locks,
                        config,
                        limit,
                        cancel,
                        derive_seed(!seed, stream),
                    )
                })
                .collect()
        };
        #[cfg(not(feature = "parallel"))]
        let candidates: Vec<Candidate> = starts
            .into_iter()
            .map(|(a, stream)| {
                run_candidate(
                    scorer,
                    a,
                    locks,
                    config,
                    limit,
                    cancel,
                    derive_seed(!seed, stream),
                )
            })
            .collect();

        for c in &candidates {
            stats.iterations += c.iterations;
            stats.accepted += c.accepted;
            stats.improving += c.improving;
        }
        let scores: Vec<f64> = candidates.iter().map(|c| c.score).collect();
        let Some(chosen) = select_best(&scores) else {
            break;
        };
        debug!(round, chosen, score = scores[chosen], "restart candidate selected");
        let Some(candidate) = candidates.into_iter().nth(chosen) else {
            break;
        };

        let share = budget
            .remaining(stats.iterations, began.elapsed())
            .share(config.rounds - round);
        let mut annealer = Annealer::new(
            scorer,
            candidate.alignment,
            locks,
            derive_seed(seed, u64::MAX - round as u64),
        );
        annealer.track_best();
        let mut schedule = Schedule::between(config.t_cand, config.t_final);
        let mut clock = PhaseClock::new(share, deadline).with_cancel(cancel.cloned());
        let phase = annealer.anneal(&mut schedule, &mut clock, None);
        cancelled |= clock.cancelled();

        stats.iterations += phase.iterations;
        stats.accepted += phase.accepted;
        stats.improving += phase.improving;
        stats.final_temperature = phase.final_temperature;
        stats.temperature_history.extend(phase.temperature_history);
        stats.score_history.extend(phase.score_history);

        let (alignment, score) = annealer.into_best();
        info!(round, score, "restart round finished");
        if best.as_ref().map_or(true, |(_, b)| score > *b) {
            best = Some((alignment, score));
        }
        rounds += 1;
    }

    let (alignment, score) = match best {
        Some(found) => found,
        None => {
            let annealer = Annealer::new(scorer, start.clone(), locks, seed);
            (start.clone(), annealer.score())
        }
    };
    Ok(RestartOutcome {
        alignment,
        score,
        stats,
        rounds,
        cancelled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Graph, GraphPair};
    use crate::sana::types::Move;

    /// Counts nodes mapped onto their own index.
    struct IdentityScorer;

    impl MoveScorer for IdentityScorer {
        type State = f64;
        type Delta = f64;

        fn initial_state(&self, alignment: &Alignment) -> f64 {
            (0..alignment.len()).filter(|&i| alignment[i] == i).count() as f64
        }

        fn score(&self, state: &f64) -> f64 {
            *state
        }

        fn evaluate_delta(&self, _s: &f64, al: &Alignment, mv: &Move, d: &mut f64) -> f64 {
            let hit = |i: usize, t: usize| if i == t { 1.0 } else { 0.0 };
            *d = match *mv {
                Move::Swap { a, b } => {
                    hit(a, al[b]) + hit(b, al[a]) - hit(a, al[a]) - hit(b, al[b])
                }
                Move::Reassign { node, target } => hit(node, target) - hit(node, al[node]),
            };
            *d
        }

        fn apply_delta(&self, state: &mut f64, delta: &f64) {
            *state += delta;
        }
    }

    /// Every move leaves the score unchanged.
    struct Neutral;

    impl MoveScorer for Neutral {
        type State = ();
        type Delta = ();

        fn initial_state(&self, _alignment: &Alignment) {}

        fn score(&self, _state: &()) -> f64 {
            0.0
        }

        fn evaluate_delta(&self, _s: &(), _a: &Alignment, _mv: &Move, _d: &mut ()) -> f64 {
            0.0
        }

        fn apply_delta(&self, _state: &mut (), _delta: &()) {}
    }

    fn small_restart() -> RestartConfig {
        RestartConfig {
            t_new: 1.0,
            iter_per_step: 200,
            num_candidates: 4,
            t_cand: 0.5,
            t_final: 1e-3,
            rounds: 2,
        }
    }

    #[test]
    fn test_select_best() {
        assert_eq!(select_best(&[0.2, 0.5, 0.35]), Some(1));
        assert_eq!(select_best(&[1.0, 1.0]), Some(0));
        assert_eq!(select_best(&[f64::NAN, 0.1]), Some(1));
        assert_eq!(select_best(&[f64::NAN]), None);
    }

    #[test]
    fn test_fresh_candidate_keeps_locks() {
        let g1 = Graph::from_named_edges("a", &[("p1", "p2"), ("p2", "p3")]).unwrap();
        let g2 = Graph::from_named_edges(
            "b",
            &[("q1", "q2"), ("q2", "q3"), ("q3", "q4"), ("q4", "q5")],
        )
        .unwrap();
        let pair = GraphPair::new(g1, g2).unwrap();
        let mut locks = LockSet::parse("p1 q4\nq2\n", &pair).unwrap();
        let mut start = Alignment::identity(3, 5);
        locks.enforce(&mut start);

        for seed in 0..50 {
            let c = fresh_candidate(&start, &locks, seed).unwrap();
            assert!(c.is_injective());
            assert_eq!(c[0], 3);
            assert_eq!(c[1], start[1], "pre-image of q2 is frozen");
        }
    }

    #[test]
    fn test_restarts_find_identity() {
        let locks = LockSet::none(6, 8);
        let start = Alignment::from_vec(vec![7, 6, 5, 4, 3, 2], 8).unwrap();
        let outcome = run_restarts(
            &IdentityScorer,
            &start,
            &locks,
            &small_restart(),
            Budget::Iterations(40_000),
            None,
            11,
        )
        .unwrap();
        assert_eq!(outcome.rounds, 2);
        assert_eq!(outcome.score, 6.0);
        assert_eq!(outcome.alignment, Alignment::identity(6, 8));
        assert_eq!(IdentityScorer.initial_state(&outcome.alignment), outcome.score);
    }

    #[test]
    fn test_restart_candidate_phases_are_charged() {
        let locks = LockSet::none(4, 5);
        let start = Alignment::identity(4, 5);
        let config = RestartConfig {
            rounds: 1,
            ..small_restart()
        };
        // 100 / (4 * 4) = 6 iterations per candidate phase, 52 left to cool
        let outcome =
            run_restarts(&IdentityScorer, &start, &locks, &config, Budget::Iterations(100), None, 3)
                .unwrap();
        assert_eq!(outcome.stats.iterations, 100);
        assert_eq!(outcome.rounds, 1);
        assert!(outcome.alignment.is_injective());
    }

    #[test]
    fn test_restart_rounds_stay_within_budget() {
        let locks = LockSet::none(6, 8);
        let start = Alignment::from_vec(vec![7, 6, 5, 4, 3, 2], 8).unwrap();
        let config = RestartConfig {
            iter_per_step: 10_000,
            rounds: 3,
            ..small_restart()
        };
        let outcome = run_restarts(
            &IdentityScorer,
            &start,
            &locks,
            &config,
            Budget::Iterations(9_000),
            None,
            5,
        )
        .unwrap();
        assert_eq!(outcome.rounds, 3);
        assert!(outcome.stats.iterations <= 9_000, "{}", outcome.stats.iterations);
    }

    #[test]
    fn test_restart_counts_candidate_acceptances() {
        let locks = LockSet::none(6, 8);
        let start = Alignment::identity(6, 8);
        let config = RestartConfig {
            rounds: 1,
            ..small_restart()
        };
        let outcome = run_restarts(
            &Neutral,
            &start,
            &locks,
            &config,
            Budget::Iterations(4 * 4 * 200),
            None,
            9,
        )
        .unwrap();
        assert_eq!(outcome.stats.iterations, 4 * 4 * 200);
        // every move is neutral, so every proposal counts as accepted
        assert_eq!(outcome.stats.accepted, outcome.stats.iterations);
        assert_eq!(outcome.stats.improving, 0);
    }
}
