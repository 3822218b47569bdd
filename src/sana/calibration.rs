//! Automatic choice of the initial temperature and the decay constant.
//!
//! Both searches look at `pbad`, the probability that a worsening move is
//! accepted at temperature `T`. For a move that loses `d`, `pbad = exp(-d/T)`,
//! so `log10(-ln pbad) = log10(d) - log10(T)`: a straight line in
//! `log10 T`. The regression search fits that line through short probes on
//! a grid of temperatures; the statistical search bisects on `log10 T` and
//! stops when a hypothesis test cannot tell the sampled acceptance apart from
//! the target.
//!
//! Probes are paid for out of the run budget. At most
//! [`CalibrationConfig::budget_share`] of it goes to probing, spread evenly
//! over the probes still planned.
//!
//! Either search may fail (flat objective, no worsening moves, no sign
//! change, budget too small). That surfaces as
//! [`AlignError::CalibrationDegraded`] and the caller falls back to
//! [`DEFAULT_T_INITIAL`] / [`DEFAULT_T_DECAY`].

use super::annealer::Annealer;
use super::config::{Budget, CalibrationConfig, SanaConfig, TemperatureMode};
use super::schedule::{Schedule, DEFAULT_T_DECAY, DEFAULT_T_INITIAL, TIME_CHECK_INTERVAL};
use super::types::MoveScorer;
use crate::alignment::{Alignment, LockSet};
use crate::error::{AlignError, Result};
use crate::random::derive_seed;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Two-sided 95% critical value of the standard normal.
const Z_TWO_SIDED: f64 = 1.959_963_985;

/// One-sided 95% critical value of the standard normal.
const Z_ONE_SIDED: f64 = 1.644_853_627;

/// `pbad` range informative for the initial temperature.
const INITIAL_BAND: (f64, f64) = (0.01, 0.995);

/// `pbad` range informative for the final temperature.
const FINAL_BAND: (f64, f64) = (0.0, 0.5);

/// Offset of the seed streams used by the statistical searches, so they
/// never collide with grid probes.
const SEARCH_STREAM: u64 = 1 << 32;

/// Shortest probe worth running when the budget forces probes to shrink.
const MIN_PROBE_ITERATIONS: u64 = 100;

/// Outcome of a fixed-temperature probe.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProbeStats {
    pub temperature: f64,
    pub iterations: u64,
    /// Worsening proposals seen.
    pub bad_moves: u64,
    /// Worsening proposals accepted.
    pub accepted_bad: u64,
    pbad_sum: f64,
    pbad_sq_sum: f64,
}

impl ProbeStats {
    /// Mean acceptance probability of worsening proposals.
    pub fn mean_pbad(&self) -> Option<f64> {
        (self.bad_moves > 0).then(|| self.pbad_sum / self.bad_moves as f64)
    }

    /// Observed fraction of worsening proposals that were accepted.
    pub fn acceptance_rate(&self) -> Option<f64> {
        (self.bad_moves > 0).then(|| self.accepted_bad as f64 / self.bad_moves as f64)
    }

    /// Sample standard deviation of `pbad`.
    pub fn pbad_std(&self) -> Option<f64> {
        if self.bad_moves < 2 {
            return None;
        }
        let n = self.bad_moves as f64;
        let mean = self.pbad_sum / n;
        let var = ((self.pbad_sq_sum - n * mean * mean) / (n - 1.0)).max(0.0);
        Some(var.sqrt())
    }
}

/// Result of the calibration phase.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationReport {
    pub schedule: Schedule,
    pub t_initial_degraded: bool,
    pub t_decay_degraded: bool,
    /// Iterations spent in probes.
    pub iterations: u64,
    pub elapsed: Duration,
}

/// Least-squares line `y = slope * x + intercept`.
pub fn fit_line(points: &[(f64, f64)]) -> Result<(f64, f64)> {
    if points.len() < 2 {
        return Err(AlignError::CalibrationDegraded(format!(
            "need at least two informative probes, got {}",
            points.len()
        )));
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;
    let sxx: f64 = points.iter().map(|p| (p.0 - mean_x).powi(2)).sum();
    let sxy: f64 = points.iter().map(|p| (p.0 - mean_x) * (p.1 - mean_y)).sum();
    if sxx <= 0.0 {
        return Err(AlignError::CalibrationDegraded(
            "probes share a single temperature".into(),
        ));
    }
    let slope = sxy / sxx;
    Ok((slope, mean_y - slope * mean_x))
}

/// Line of `log10(-ln pbad)` against `log10 T`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PbadModel {
    slope: f64,
    intercept: f64,
}

impl PbadModel {
    /// Fits the probes whose mean `pbad` lies in `band`. The lower bound is
    /// exclusive when it is zero.
    pub fn fit(probes: &[ProbeStats], band: (f64, f64)) -> Result<Self> {
        let (lo, hi) = band;
        let points: Vec<(f64, f64)> = probes
            .iter()
            .filter_map(|p| {
                let pbad = p.mean_pbad()?;
                let inside = pbad > 0.0 && pbad >= lo && pbad <= hi && pbad < 1.0;
                inside.then(|| (p.temperature.log10(), (-pbad.ln()).log10()))
            })
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .collect();
        let (slope, intercept) = fit_line(&points)?;
        if slope >= 0.0 {
            return Err(AlignError::CalibrationDegraded(format!(
                "bad-move acceptance does not grow with temperature (slope {slope:.3})"
            )));
        }
        Ok(Self { slope, intercept })
    }

    /// Temperature at which the model predicts acceptance `pbad`.
    pub fn temperature_for(&self, pbad: f64) -> f64 {
        let y = (-pbad.ln()).log10();
        10f64.powf((y - self.intercept) / self.slope)
    }

    pub fn pbad_at(&self, temperature: f64) -> f64 {
        let y = self.slope * temperature.log10() + self.intercept;
        (-(10f64.powf(y))).exp()
    }
}

/// Runs the probes the temperature searches need, within its share of the
/// run budget.
pub(crate) struct Calibrator<'a, S: MoveScorer> {
    scorer: &'a S,
    start: &'a Alignment,
    locks: &'a LockSet,
    config: &'a CalibrationConfig,
    seed: u64,
    iterations: u64,
    /// Iterations the probes may spend in total (iteration budgets).
    allowance: Option<u64>,
    /// Time after which no probe runs (time budgets).
    deadline: Option<Instant>,
    /// Probes still expected to run, including the current search.
    probes_left: u64,
}

impl<'a, S: MoveScorer> Calibrator<'a, S> {
    pub fn new(
        scorer: &'a S,
        start: &'a Alignment,
        locks: &'a LockSet,
        config: &'a CalibrationConfig,
        budget: Budget,
        seed: u64,
    ) -> Self {
        let (allowance, deadline) = match budget.scaled(config.budget_share) {
            Budget::Iterations(n) => (Some(n), None),
            Budget::Time(d) => (None, Some(Instant::now() + d)),
        };
        Self {
            scorer,
            start,
            locks,
            config,
            seed,
            iterations: 0,
            allowance,
            deadline,
            probes_left: 0,
        }
    }

    /// Announces `probes` more probes, so the allowance is spread over them.
    pub fn plan(&mut self, probes: u64) {
        self.probes_left += probes;
    }

    /// Iterations spent so far.
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Iteration limit of each of the next `batch` probes.
    fn probe_limit(&self, batch: u64) -> Result<u64> {
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(AlignError::CalibrationDegraded(
                "calibration share of the time budget is used up".into(),
            ));
        }
        let Some(allowance) = self.allowance else {
            return Ok(self.config.probe_iterations);
        };
        let left = allowance.saturating_sub(self.iterations);
        let limit = (left / self.probes_left.max(batch).max(1)).min(self.config.probe_iterations);
        if limit < MIN_PROBE_ITERATIONS.min(self.config.probe_iterations) {
            return Err(AlignError::CalibrationDegraded(format!(
                "budget leaves {limit} iterations per probe"
            )));
        }
        Ok(limit)
    }

    /// Anneals a private copy of the start alignment at a fixed
    /// temperature. Stops after `limit` iterations, at the deadline, or once
    /// `bad_samples` worsening proposals have been seen.
    fn probe(
        &self,
        temperature: f64,
        stream: u64,
        limit: u64,
        bad_samples: Option<u64>,
    ) -> ProbeStats {
        let mut annealer = Annealer::new(
            self.scorer,
            self.start.clone(),
            self.locks,
            derive_seed(self.seed, stream),
        );
        let mut stats = ProbeStats {
            temperature,
            ..ProbeStats::default()
        };
        while stats.iterations < limit {
            if bad_samples.is_some_and(|n| stats.bad_moves >= n) {
                break;
            }
            if stats.iterations % TIME_CHECK_INTERVAL == 0
                && self.deadline.is_some_and(|d| Instant::now() >= d)
            {
                break;
            }
            let Some(outcome) = annealer.step(temperature) else {
                break;
            };
            stats.iterations += 1;
            if let Some(p) = outcome.pbad {
                stats.bad_moves += 1;
                stats.pbad_sum += p;
                stats.pbad_sq_sum += p * p;
                if outcome.accepted {
                    stats.accepted_bad += 1;
                }
            }
        }
        stats
    }

    /// Number of temperatures on the regression grid.
    pub fn grid_len(&self) -> u64 {
        (self.config.max_exponent - self.config.min_exponent + 1) as u64
    }

    /// Probes every temperature `10^e` of the configured exponent range.
    pub fn probe_grid(&mut self) -> Result<Vec<ProbeStats>> {
        let temperatures: Vec<f64> = (self.config.min_exponent..=self.config.max_exponent)
            .map(|e| 10f64.powi(e))
            .collect();
        let batch = temperatures.len() as u64;
        let limit = self.probe_limit(batch)?;
        self.probes_left = self.probes_left.saturating_sub(batch);

        #[cfg(feature = "parallel")]
        let probes: Vec<ProbeStats> = {
            use rayon::prelude::*;
            temperatures
                .par_iter()
                .enumerate()
                .map(|(k, &t)| self.probe(t, k as u64, limit, None))
                .collect()
        };
        #[cfg(not(feature = "parallel"))]
        let probes: Vec<ProbeStats> = temperatures
            .iter()
            .enumerate()
            .map(|(k, &t)| self.probe(t, k as u64, limit, None))
            .collect();

        for p in &probes {
            debug!(
                temperature = p.temperature,
                pbad = ?p.mean_pbad(),
                bad_moves = p.bad_moves,
                "probe"
            );
        }
        self.iterations += probes.iter().map(|p| p.iterations).sum::<u64>();
        Ok(probes)
    }

    /// Initial temperature by bisection with a two-sided z-test on the
    /// observed acceptance of worsening moves.
    pub fn t_initial_by_statistical_test(&mut self) -> Result<f64> {
        let after = self
            .probes_left
            .saturating_sub(self.config.max_search_steps as u64);
        let found = self.bisect_t_initial();
        self.probes_left = after;
        found
    }

    /// Final temperature by bisection below `t_initial`: the warmest
    /// temperature at which a one-sided z-test shows mean `pbad` below the
    /// final target.
    pub fn t_final_by_statistical_test(&mut self, t_initial: f64) -> Result<f64> {
        let after = self
            .probes_left
            .saturating_sub(self.config.max_search_steps as u64);
        let found = self.bisect_t_final(t_initial);
        self.probes_left = after;
        found
    }

    /// Runs one search probe and charges it.
    fn search_probe(&mut self, temperature: f64, stream: u64) -> Result<ProbeStats> {
        let limit = self.probe_limit(1)?;
        let probe = self.probe(
            temperature,
            stream,
            limit,
            Some(self.config.sample_size as u64),
        );
        self.iterations += probe.iterations;
        self.probes_left = self.probes_left.saturating_sub(1);
        Ok(probe)
    }

    fn bisect_t_initial(&mut self) -> Result<f64> {
        let target = self.config.target_initial_pbad;
        let (mut lo, mut hi) = (
            self.config.min_exponent as f64,
            self.config.max_exponent as f64,
        );

        for step in 0..self.config.max_search_steps {
            let mid = 0.5 * (lo + hi);
            let t = 10f64.powf(mid);
            let probe = self.search_probe(t, SEARCH_STREAM + step as u64)?;

            let Some(rate) = probe.acceptance_rate() else {
                return Err(AlignError::CalibrationDegraded(
                    "no worsening moves to sample".into(),
                ));
            };
            let se = (target * (1.0 - target) / probe.bad_moves as f64).sqrt();
            let z = (rate - target) / se;
            debug!(temperature = t, rate, z, "statistical t_initial step");
            if z.abs() < Z_TWO_SIDED {
                return Ok(t);
            }
            if rate < target {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        Err(AlignError::CalibrationDegraded(format!(
            "acceptance did not settle at {target} within {} steps",
            self.config.max_search_steps
        )))
    }

    fn bisect_t_final(&mut self, t_initial: f64) -> Result<f64> {
        let target = self.config.target_final_pbad;
        let (mut lo, mut hi) = (self.config.min_exponent as f64 - 10.0, t_initial.log10());
        let mut found = None;

        for step in 0..self.config.max_search_steps {
            let mid = 0.5 * (lo + hi);
            let t = 10f64.powf(mid);
            let probe = self.search_probe(t, 2 * SEARCH_STREAM + step as u64)?;

            let Some(mean) = probe.mean_pbad() else {
                return Err(AlignError::CalibrationDegraded(
                    "no worsening moves to sample".into(),
                ));
            };
            let below = match probe.pbad_std() {
                Some(sd) if sd > 0.0 => {
                    let z = (mean - target) / (sd / (probe.bad_moves as f64).sqrt());
                    z <= -Z_ONE_SIDED
                }
                _ => mean <= target,
            };
            debug!(temperature = t, mean, below, "statistical t_final step");
            if below {
                found = Some(t);
                lo = mid;
            } else {
                hi = mid;
            }
        }
        found.ok_or_else(|| {
            AlignError::CalibrationDegraded(format!(
                "no temperature below {t_initial} reaches pbad {target}"
            ))
        })
    }
}

/// Resolves `(t_initial, t_decay)` for a run.
///
/// Any failed search is logged and replaced by the conservative default;
/// this never fails.
pub(crate) fn calibrate<S: MoveScorer>(
    scorer: &S,
    start: &Alignment,
    locks: &LockSet,
    config: &SanaConfig,
    seed: u64,
) -> CalibrationReport {
    let began = Instant::now();
    let cal = &config.calibration;
    let mut calibrator = Calibrator::new(scorer, start, locks, cal, config.budget, seed);
    let modes = [config.t_initial, config.t_decay];
    if modes.contains(&TemperatureMode::ByLinearRegression) {
        calibrator.plan(calibrator.grid_len());
    }
    for mode in modes {
        if mode == TemperatureMode::ByStatisticalTest {
            calibrator.plan(cal.max_search_steps as u64);
        }
    }
    let mut grid: Option<Vec<ProbeStats>> = None;

    let mut t_initial_degraded = false;
    let t_initial = match config.t_initial {
        TemperatureMode::Explicit(t) => Ok(t),
        TemperatureMode::ByLinearRegression => {
            grid_model(&mut grid, &mut calibrator, INITIAL_BAND).map(|m| {
                let lo = 10f64.powi(cal.min_exponent);
                let hi = 10f64.powi(cal.max_exponent);
                m.temperature_for(cal.target_initial_pbad).clamp(lo, hi)
            })
        }
        TemperatureMode::ByStatisticalTest => calibrator.t_initial_by_statistical_test(),
    };
    let t_initial = t_initial.unwrap_or_else(|e| {
        warn!(error = %e, fallback = DEFAULT_T_INITIAL, "t_initial search degraded");
        t_initial_degraded = true;
        DEFAULT_T_INITIAL
    });

    let mut t_decay_degraded = false;
    let t_decay = match config.t_decay {
        TemperatureMode::Explicit(d) => Ok(d),
        TemperatureMode::ByLinearRegression => grid_model(&mut grid, &mut calibrator, FINAL_BAND)
            .map(|m| m.temperature_for(cal.target_final_pbad))
            .and_then(|t_final| decay_between(t_initial, t_final)),
        TemperatureMode::ByStatisticalTest => calibrator
            .t_final_by_statistical_test(t_initial)
            .and_then(|t_final| decay_between(t_initial, t_final)),
    };
    let t_decay = t_decay.unwrap_or_else(|e| {
        warn!(error = %e, fallback = DEFAULT_T_DECAY, "t_decay search degraded");
        t_decay_degraded = true;
        DEFAULT_T_DECAY
    });

    let report = CalibrationReport {
        schedule: Schedule::new(t_initial, t_decay),
        t_initial_degraded,
        t_decay_degraded,
        iterations: calibrator.iterations(),
        elapsed: began.elapsed(),
    };
    info!(
        t_initial,
        t_decay,
        t_final = report.schedule.t_final(),
        iterations = report.iterations,
        "temperature schedule ready"
    );
    report
}

/// Probes the grid once and fits the points inside `band`.
fn grid_model<S: MoveScorer>(
    grid: &mut Option<Vec<ProbeStats>>,
    calibrator: &mut Calibrator<'_, S>,
    band: (f64, f64),
) -> Result<PbadModel> {
    if grid.is_none() {
        *grid = Some(calibrator.probe_grid()?);
    }
    match grid {
        Some(probes) => PbadModel::fit(probes, band),
        None => Err(AlignError::CalibrationDegraded("no probe grid".into())),
    }
}

fn decay_between(t_initial: f64, t_final: f64) -> Result<f64> {
    if !(t_final > 0.0 && t_final.is_finite()) || t_final >= t_initial {
        return Err(AlignError::CalibrationDegraded(format!(
            "final temperature {t_final} is not below initial temperature {t_initial}"
        )));
    }
    Ok((t_initial / t_final).ln())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sana::types::Move;

    /// Every move loses exactly one unit, so `pbad = exp(-1/T)`.
    struct ConstantLoss;

    impl MoveScorer for ConstantLoss {
        type State = ();
        type Delta = ();

        fn initial_state(&self, _alignment: &Alignment) {}

        fn score(&self, _state: &()) -> f64 {
            0.0
        }

        fn evaluate_delta(&self, _s: &(), _a: &Alignment, _mv: &Move, _d: &mut ()) -> f64 {
            -1.0
        }

        fn apply_delta(&self, _state: &mut (), _delta: &()) {}
    }

    /// Every move is neutral; nothing can be calibrated.
    struct Flat;

    impl MoveScorer for Flat {
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

    fn fixture() -> (Alignment, LockSet) {
        (Alignment::identity(6, 8), LockSet::none(6, 8))
    }

    fn small_calibration() -> CalibrationConfig {
        CalibrationConfig {
            probe_iterations: 2_000,
            sample_size: 500,
            ..CalibrationConfig::default()
        }
    }

    #[test]
    fn test_fit_line_exact() {
        let (m, b) = fit_line(&[(0.0, 1.0), (1.0, 3.0), (2.0, 5.0)]).unwrap();
        assert!((m - 2.0).abs() < 1e-12);
        assert!((b - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_fit_line_degenerate() {
        assert!(matches!(
            fit_line(&[(1.0, 1.0)]),
            Err(AlignError::CalibrationDegraded(_))
        ));
        assert!(fit_line(&[(1.0, 1.0), (1.0, 2.0)]).is_err());
    }

    #[test]
    fn test_pbad_model_recovers_unit_loss() {
        let probes: Vec<ProbeStats> = (-3..=3)
            .map(|e| {
                let t = 10f64.powi(e);
                let p = (-1.0 / t).exp();
                ProbeStats {
                    temperature: t,
                    iterations: 1,
                    bad_moves: 1,
                    accepted_bad: 0,
                    pbad_sum: p,
                    pbad_sq_sum: p * p,
                }
            })
            .collect();
        let model = PbadModel::fit(&probes, (0.0, 1.0)).unwrap();
        let t = model.temperature_for(0.5);
        assert!((t - 1.0 / 2f64.ln()).abs() / t < 1e-6, "{t}");
        assert!((model.pbad_at(1.0) - (-1.0f64).exp()).abs() < 1e-6);
    }

    #[test]
    fn test_regression_calibration_on_constant_loss() {
        let (start, locks) = fixture();
        let config = SanaConfig::default().with_calibration(small_calibration());
        let report = calibrate(&ConstantLoss, &start, &locks, &config, 7);

        assert!(!report.t_initial_degraded);
        assert!(!report.t_decay_degraded);
        let expected_initial = -1.0 / 0.985f64.ln();
        let expected_final = -1.0 / 1e-10f64.ln();
        let s = report.schedule;
        assert!((s.t_initial - expected_initial).abs() / expected_initial < 1e-6);
        assert!((s.t_final() - expected_final).abs() / expected_final < 1e-6);
        assert_eq!(report.iterations, 21 * 2_000);
    }

    #[test]
    fn test_statistical_calibration_on_constant_loss() {
        let (start, locks) = fixture();
        let config = SanaConfig::default()
            .with_t_initial(TemperatureMode::ByStatisticalTest)
            .with_t_decay(TemperatureMode::ByStatisticalTest)
            .with_calibration(small_calibration())
            .with_seed(3);
        let report = calibrate(&ConstantLoss, &start, &locks, &config, 3);

        assert!(!report.t_initial_degraded);
        assert!(!report.t_decay_degraded);
        let s = report.schedule;
        // exact answer is ~66; a 500-sample test accepts a band around it
        assert!(s.t_initial > 15.0 && s.t_initial < 400.0, "{}", s.t_initial);
        // exact answer is ~0.043
        assert!(s.t_final() > 0.02 && s.t_final() < 0.05, "{}", s.t_final());
    }

    #[test]
    fn test_flat_objective_degrades_to_defaults() {
        let (start, locks) = fixture();
        let config = SanaConfig::default().with_calibration(small_calibration());
        let report = calibrate(&Flat, &start, &locks, &config, 1);
        assert!(report.t_initial_degraded);
        assert!(report.t_decay_degraded);
        assert_eq!(report.schedule, Schedule::new(DEFAULT_T_INITIAL, DEFAULT_T_DECAY));

        let config = config
            .with_t_initial(TemperatureMode::ByStatisticalTest)
            .with_t_decay(TemperatureMode::ByStatisticalTest);
        let report = calibrate(&Flat, &start, &locks, &config, 1);
        assert!(report.t_initial_degraded && report.t_decay_degraded);
    }

    #[test]
    fn test_explicit_values_need_no_probes() {
        let (start, locks) = fixture();
        let config = SanaConfig::default()
            .with_t_initial(TemperatureMode::Explicit(2.0))
            .with_t_decay(TemperatureMode::Explicit(4.0));
        let report = calibrate(&ConstantLoss, &start, &locks, &config, 1);
        assert_eq!(report.schedule, Schedule::new(2.0, 4.0));
        assert_eq!(report.iterations, 0);
    }

    #[test]
    fn test_manual_t_initial_with_regression_decay() {
        let (start, locks) = fixture();
        let config = SanaConfig::default()
            .with_t_initial(TemperatureMode::Explicit(10.0))
            .with_calibration(small_calibration());
        let report = calibrate(&ConstantLoss, &start, &locks, &config, 1);
        let expected_final = -1.0 / 1e-10f64.ln();
        assert!((report.schedule.t_final() - expected_final).abs() / expected_final < 1e-6);
        assert_eq!(report.schedule.t_initial, 10.0);
    }

    #[test]
    fn test_calibration_shrinks_to_fit_iteration_budget() {
        let (start, locks) = fixture();
        let config = SanaConfig::default().with_budget(Budget::Iterations(20_000));
        let report = calibrate(&ConstantLoss, &start, &locks, &config, 7);
        assert!(!report.t_initial_degraded);
        assert!(!report.t_decay_degraded);
        assert_eq!(report.iterations, 21 * (10_000 / 21));
        assert!(report.iterations <= 10_000);
        let expected_initial = -1.0 / 0.985f64.ln();
        assert!((report.schedule.t_initial - expected_initial).abs() / expected_initial < 1e-6);
    }

    #[test]
    fn test_budget_too_small_for_calibration_degrades() {
        let (start, locks) = fixture();
        let config = SanaConfig::default().with_budget(Budget::Iterations(1_000));
        let report = calibrate(&ConstantLoss, &start, &locks, &config, 7);
        assert!(report.t_initial_degraded);
        assert!(report.t_decay_degraded);
        assert_eq!(report.iterations, 0);
        assert_eq!(report.schedule, Schedule::new(DEFAULT_T_INITIAL, DEFAULT_T_DECAY));
    }

    #[test]
    fn test_statistical_searches_stay_within_share() {
        let (start, locks) = fixture();
        let config = SanaConfig::default()
            .with_t_initial(TemperatureMode::ByStatisticalTest)
            .with_t_decay(TemperatureMode::ByStatisticalTest)
            .with_calibration(small_calibration())
            .with_budget(Budget::Iterations(200_000));
        let report = calibrate(&ConstantLoss, &start, &locks, &config, 3);
        assert!(!report.t_initial_degraded);
        assert!(!report.t_decay_degraded);
        assert!(report.iterations <= 100_000, "{}", report.iterations);
    }

    #[test]
    fn test_decay_between_rejects_warmer_final() {
        assert!(decay_between(1.0, 2.0).is_err());
        assert!((decay_between(10.0, 1.0).unwrap() - 10f64.ln()).abs() < 1e-12);
    }
}
