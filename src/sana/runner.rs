//! SANA execution: setup, calibration, annealing, polishing.

use super::annealer::{Annealer, PhaseStats};
use super::calibration::{calibrate, CalibrationReport};
use super::config::SanaConfig;
use super::restart::run_restarts;
use super::schedule::{DynamicDecay, PhaseClock, Schedule};
use super::types::MoveScorer;
use crate::alignment::{Alignment, LockSet};
use crate::error::Result;
use crate::graph::GraphPair;
use crate::random::{create_rng, derive_seed};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Result of a SANA run.
#[derive(Debug, Clone)]
pub struct SanaResult {
    /// The best alignment found.
    pub alignment: Alignment,

    /// Score of `alignment`.
    pub score: f64,

    /// Proposed moves after calibration.
    pub iterations: u64,

    pub accepted_moves: u64,
    pub improving_moves: u64,

    /// Temperature when annealing stopped.
    pub final_temperature: f64,

    /// Schedule in effect at the end of the run (after dynamic updates).
    pub schedule: Schedule,

    pub calibration: CalibrationReport,

    /// Current score sampled at regular intervals.
    pub score_history: Vec<f64>,

    /// Temperature sampled alongside `score_history`.
    pub temperature_history: Vec<f64>,

    /// Moves applied by the final hill climb.
    pub hill_climb_moves: usize,

    /// Decay updates made by dynamic decay.
    pub dynamic_updates: usize,

    /// Completed restart rounds; zero for a plain run.
    pub restart_rounds: usize,

    /// Whether cancelled externally.
    pub cancelled: bool,

    /// Seed the run used, to reproduce it.
    pub seed: u64,

    /// Wall time of the whole run, calibration included.
    pub elapsed: Duration,
}

/// Executes SANA over any [`MoveScorer`].
pub struct SanaRunner;

impl SanaRunner {
    /// Runs SANA.
    ///
    /// Fails before any search when the configuration is invalid or a lock
    /// or seed alignment file cannot be read.
    pub fn run<S: MoveScorer>(
        scorer: &S,
        pair: &GraphPair,
        config: &SanaConfig,
    ) -> Result<SanaResult> {
        Self::run_with_cancel(scorer, pair, config, None)
    }

    /// Runs SANA with an optional cancellation token.
    pub fn run_with_cancel<S: MoveScorer>(
        scorer: &S,
        pair: &GraphPair,
        config: &SanaConfig,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Result<SanaResult> {
        let began = Instant::now();
        config.validate()?;
        let seed = config.seed.unwrap_or_else(rand::random);

        let mut locks = match &config.lock_file {
            Some(path) => LockSet::read(path, pair)?,
            None if config.lock_same_names => LockSet::same_names(pair),
            None => LockSet::none(pair.n1(), pair.n2()),
        };
        let mut start = match &config.seed_alignment {
            Some(path) => Alignment::read(path, pair)?,
            None => Alignment::random(pair.n1(), pair.n2(), &mut create_rng(derive_seed(seed, 0))),
        };
        locks.enforce(&mut start);
        info!(
            g1 = pair.g1().name(),
            g2 = pair.g2().name(),
            n1 = pair.n1(),
            n2 = pair.n2(),
            pinned = locks.pinned().len(),
            seed,
            "sana run starting"
        );
        let movable = locks.movable_g1().len();
        let free = start
            .unassigned()
            .into_iter()
            .filter(|&t| !locks.is_g2_locked(t))
            .count();
        if movable < 2 && (movable == 0 || free == 0) {
            warn!(movable, free, "no move is possible, the start alignment is returned");
        }

        if let Some(restart) = &config.restart {
            let report = CalibrationReport {
                schedule: Schedule::between(restart.t_cand, restart.t_final),
                t_initial_degraded: false,
                t_decay_degraded: false,
                iterations: 0,
                elapsed: Duration::ZERO,
            };
            let outcome = run_restarts(
                scorer,
                &start,
                &locks,
                restart,
                config.budget,
                cancel.as_ref(),
                seed,
            )?;
            let mut result = Self::finish(
                scorer,
                &locks,
                config,
                outcome.alignment,
                outcome.stats,
                report.schedule,
                report,
                seed,
                began,
            );
            result.restart_rounds = outcome.rounds;
            result.cancelled = outcome.cancelled;
            return Ok(result);
        }

        let report = calibrate(scorer, &start, &locks, config, derive_seed(seed, 1));
        let remaining = config.budget.remaining(report.iterations, began.elapsed());
        debug!(?remaining, "budget left after calibration");

        let mut annealer = Annealer::new(scorer, start, &locks, derive_seed(seed, 2));
        annealer.track_best();
        let mut schedule = report.schedule;
        let mut dynamic = config.dynamic_decay.then(|| {
            DynamicDecay::new(
                config.dynamic_interval,
                config.calibration.target_initial_pbad,
                config.calibration.target_final_pbad,
            )
        });
        let mut clock = PhaseClock::new(remaining, None).with_cancel(cancel);
        let stats = annealer.anneal(&mut schedule, &mut clock, dynamic.as_mut());
        let (best, _) = annealer.into_best();

        let mut result = Self::finish(
            scorer, &locks, config, best, stats, schedule, report, seed, began,
        );
        result.dynamic_updates = dynamic.map_or(0, |d| d.updates());
        result.cancelled = clock.cancelled();
        Ok(result)
    }

    /// Optional hill climb, then packs the result.
    #[allow(clippy::too_many_arguments)]
    fn finish<S: MoveScorer>(
        scorer: &S,
        locks: &LockSet,
        config: &SanaConfig,
        alignment: Alignment,
        stats: PhaseStats,
        schedule: Schedule,
        calibration: CalibrationReport,
        seed: u64,
        began: Instant,
    ) -> SanaResult {
        let mut polish = Annealer::new(scorer, alignment, locks, seed);
        let hill_climb_moves = if config.hill_climbing {
            polish.hill_climb()
        } else {
            0
        };
        let score = polish.score();
        let alignment = polish.alignment().clone();
        info!(
            score,
            iterations = stats.iterations,
            accepted = stats.accepted,
            hill_climb_moves,
            "sana run finished"
        );

        SanaResult {
            alignment,
            score,
            iterations: stats.iterations,
            accepted_moves: stats.accepted,
            improving_moves: stats.improving,
            final_temperature: stats.final_temperature,
            schedule,
            calibration,
            score_history: stats.score_history,
            temperature_history: stats.temperature_history,
            hill_climb_moves,
            dynamic_updates: 0,
            restart_rounds: 0,
            cancelled: false,
            seed,
            elapsed: began.elapsed(),
        }
    }
}
