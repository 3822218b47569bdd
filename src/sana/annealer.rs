//! The annealing kernel: move proposal, Metropolis acceptance, bookkeeping.

use super::schedule::{DynamicDecay, PhaseClock, Schedule};
use super::types::{Move, MoveScorer};
use crate::alignment::{Alignment, LockSet};
use crate::random::create_rng;
use rand::rngs::StdRng;
use rand::Rng;

/// Gains below this are treated as no gain by the hill climber.
const IMPROVEMENT_EPS: f64 = 1e-12;

/// Metropolis criterion for a maximization problem.
///
/// Non-negative deltas are always accepted without consuming randomness.
/// A negative delta is accepted with probability `exp(delta / T)`.
#[inline]
pub fn accepts<R: Rng>(delta: f64, temperature: f64, rng: &mut R) -> bool {
    if delta >= 0.0 {
        return true;
    }
    if temperature <= 0.0 {
        return false;
    }
    rng.random::<f64>() < (delta / temperature).exp()
}

/// What happened to one proposal.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StepOutcome {
    pub delta: f64,
    pub accepted: bool,
    /// Acceptance probability, for worsening proposals only.
    pub pbad: Option<f64>,
}

/// Counters of one annealing phase.
#[derive(Debug, Clone, Default)]
pub(crate) struct PhaseStats {
    pub iterations: u64,
    pub accepted: u64,
    pub improving: u64,
    pub final_temperature: f64,
    pub temperature_history: Vec<f64>,
    pub score_history: Vec<f64>,
}

/// Iterations between history samples.
const HISTORY_INTERVAL: u64 = 1 << 14;

/// Owns one alignment and anneals it.
///
/// Locked G1 nodes never take part in moves, and locked or occupied G2
/// nodes are never offered as reassignment targets. The pool of free G2
/// nodes is kept with an index table so that reassignment is O(1).
pub(crate) struct Annealer<'s, S: MoveScorer> {
    scorer: &'s S,
    alignment: Alignment,
    state: S::State,
    score: f64,
    delta: S::Delta,
    movable: Vec<usize>,
    free: Vec<usize>,
    free_slot: Vec<usize>,
    change_probability: f64,
    rng: StdRng,
    best: Option<(f64, Alignment)>,
}

const NOT_FREE: usize = usize::MAX;

impl<'s, S: MoveScorer> Annealer<'s, S> {
    /// `alignment` must already satisfy the pins of `locks`.
    pub fn new(scorer: &'s S, alignment: Alignment, locks: &LockSet, seed: u64) -> Self {
        let movable = locks.movable_g1();
        let mut free_slot = vec![NOT_FREE; alignment.n2()];
        let free: Vec<usize> = alignment
            .unassigned()
            .into_iter()
            .filter(|&t| !locks.is_g2_locked(t))
            .collect();
        for (slot, &t) in free.iter().enumerate() {
            free_slot[t] = slot;
        }

        let m = movable.len() as f64;
        let reassigns = m * free.len() as f64;
        let swaps = m * (m - 1.0) / 2.0;
        let change_probability = if reassigns + swaps > 0.0 {
            reassigns / (reassigns + swaps)
        } else {
            0.0
        };

        let state = scorer.initial_state(&alignment);
        let score = scorer.score(&state);
        Self {
            scorer,
            alignment,
            state,
            score,
            delta: S::Delta::default(),
            movable,
            free,
            free_slot,
            change_probability,
            rng: create_rng(seed),
            best: None,
        }
    }

    pub fn alignment(&self) -> &Alignment {
        &self.alignment
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    /// Whether any move exists at all.
    pub fn can_move(&self) -> bool {
        self.movable.len() >= 2 || (!self.movable.is_empty() && !self.free.is_empty())
    }

    /// Starts remembering the best alignment seen from now on.
    pub fn track_best(&mut self) {
        self.best = Some((self.score, self.alignment.clone()));
    }

    /// The better of the best alignment seen and the current one.
    pub fn into_best(self) -> (Alignment, f64) {
        match self.best {
            Some((score, alignment)) if score > self.score => (alignment, score),
            _ => (self.alignment, self.score),
        }
    }

    /// Draws a move uniformly from the neighborhood of the current
    /// alignment, or `None` when nothing can move.
    pub fn propose(&mut self) -> Option<Move> {
        if !self.can_move() {
            return None;
        }
        let m = self.movable.len();
        let reassign = !self.free.is_empty()
            && (m < 2 || self.rng.random::<f64>() < self.change_probability);
        if reassign {
            let node = self.movable[self.rng.random_range(0..m)];
            let target = self.free[self.rng.random_range(0..self.free.len())];
            return Some(Move::Reassign { node, target });
        }
        let i = self.rng.random_range(0..m);
        let mut j = self.rng.random_range(0..m - 1);
        if j >= i {
            j += 1;
        }
        Some(Move::Swap {
            a: self.movable[i],
            b: self.movable[j],
        })
    }

    fn commit(&mut self, mv: &Move, delta: f64) {
        if let Move::Reassign { node, target } = *mv {
            let old = self.alignment[node];
            let slot = self.free_slot[target];
            self.free[slot] = old;
            self.free_slot[old] = slot;
            self.free_slot[target] = NOT_FREE;
        }
        mv.apply(&mut self.alignment);
        self.scorer.apply_delta(&mut self.state, &self.delta);
        self.score += delta;
        if let Some((best_score, best)) = &mut self.best {
            if self.score > *best_score {
                *best_score = self.score;
                best.clone_from(&self.alignment);
            }
        }
    }

    /// Proposes one move at `temperature` and applies it if accepted.
    pub fn step(&mut self, temperature: f64) -> Option<StepOutcome> {
        let mv = self.propose()?;
        let delta = self
            .scorer
            .evaluate_delta(&self.state, &self.alignment, &mv, &mut self.delta);
        let accepted = accepts(delta, temperature, &mut self.rng);
        if accepted {
            self.commit(&mv, delta);
        }
        let pbad = if delta < 0.0 && temperature > 0.0 {
            Some((delta / temperature).exp())
        } else if delta < 0.0 {
            Some(0.0)
        } else {
            None
        };
        Some(StepOutcome {
            delta,
            accepted,
            pbad,
        })
    }

    /// Runs one phase until `clock` runs out.
    pub fn anneal(
        &mut self,
        schedule: &mut Schedule,
        clock: &mut PhaseClock,
        mut dynamic: Option<&mut DynamicDecay>,
    ) -> PhaseStats {
        let mut stats = PhaseStats::default();
        let mut temperature = schedule.t_initial;

        while clock.tick(stats.iterations) {
            let fraction = clock.fraction();
            if let Some(d) = dynamic.as_deref_mut() {
                if let Some(updated) = d.update(stats.iterations, fraction, schedule) {
                    *schedule = updated;
                }
            }
            temperature = schedule.temperature(fraction);

            if stats.iterations % HISTORY_INTERVAL == 0 {
                stats.temperature_history.push(temperature);
                stats.score_history.push(self.score);
            }

            let Some(outcome) = self.step(temperature) else {
                break;
            };
            stats.iterations += 1;
            if outcome.accepted {
                stats.accepted += 1;
                if outcome.delta > 0.0 {
                    stats.improving += 1;
                }
            }
            if let (Some(d), Some(p)) = (dynamic.as_deref_mut(), outcome.pbad) {
                d.observe(p);
            }
        }

        stats.final_temperature = temperature;
        stats.temperature_history.push(temperature);
        stats.score_history.push(self.score);
        stats
    }

    /// Greedy pass: applies strictly improving moves until none is left.
    /// Returns the number of moves applied.
    pub fn hill_climb(&mut self) -> usize {
        let mut applied = 0;
        loop {
            let mut improved = false;
            for x in 0..self.movable.len() {
                let a = self.movable[x];
                for y in (x + 1)..self.movable.len() {
                    let mv = Move::Swap {
                        a,
                        b: self.movable[y],
                    };
                    if self.try_improve(&mv) {
                        applied += 1;
                        improved = true;
                    }
                }
                let mut slot = 0;
                while slot < self.free.len() {
                    let mv = Move::Reassign {
                        node: a,
                        target: self.free[slot],
                    };
                    if self.try_improve(&mv) {
                        applied += 1;
                        improved = true;
                    }
                    slot += 1;
                }
            }
            if !improved {
                return applied;
            }
        }
    }

    fn try_improve(&mut self, mv: &Move) -> bool {
        let delta = self
            .scorer
            .evaluate_delta(&self.state, &self.alignment, mv, &mut self.delta);
        if delta > IMPROVEMENT_EPS {
            self.commit(mv, delta);
            true
        } else {
            false
        }
    }
}
