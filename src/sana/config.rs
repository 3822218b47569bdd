//! SANA configuration.

use crate::error::{AlignError, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// How a temperature parameter is obtained.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TemperatureMode {
    /// Use the value as given.
    Explicit(f64),
    /// Fit a line through short probes at fixed temperatures.
    ByLinearRegression,
    /// Search with a hypothesis test on sampled move outcomes.
    ByStatisticalTest,
}

impl Default for TemperatureMode {
    fn default() -> Self {
        TemperatureMode::ByLinearRegression
    }
}

impl FromStr for TemperatureMode {
    type Err = AlignError;

    /// Parses `auto`, `by-linear-regression`, `by-statistical-test` or a
    /// number.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "auto" | "by-linear-regression" => Ok(TemperatureMode::ByLinearRegression),
            "by-statistical-test" => Ok(TemperatureMode::ByStatisticalTest),
            other => other
                .parse::<f64>()
                .map(TemperatureMode::Explicit)
                .map_err(|_| {
                    AlignError::Configuration(format!("unknown temperature mode `{other}`"))
                }),
        }
    }
}

/// How long a run may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Budget {
    /// Total proposed moves, calibration included.
    Iterations(u64),
    /// Total wall-clock time, calibration included.
    Time(Duration),
}

impl Budget {
    /// What is left after `iterations` moves and `elapsed` time were spent.
    pub fn remaining(&self, iterations: u64, elapsed: Duration) -> Budget {
        match *self {
            Budget::Iterations(n) => Budget::Iterations(n.saturating_sub(iterations)),
            Budget::Time(d) => Budget::Time(d.saturating_sub(elapsed)),
        }
    }

    /// An equal share of this budget over `parts` phases.
    pub fn share(&self, parts: usize) -> Budget {
        let parts = parts.max(1);
        match *self {
            Budget::Iterations(n) => Budget::Iterations(n / parts as u64),
            Budget::Time(d) => Budget::Time(d.div_f64(parts as f64)),
        }
    }

    /// `fraction` of this budget, rounded down for iterations.
    pub fn scaled(&self, fraction: f64) -> Budget {
        let fraction = fraction.clamp(0.0, 1.0);
        match *self {
            Budget::Iterations(n) => Budget::Iterations((n as f64 * fraction) as u64),
            Budget::Time(d) => Budget::Time(d.mul_f64(fraction)),
        }
    }

    pub fn is_zero(&self) -> bool {
        match *self {
            Budget::Iterations(n) => n == 0,
            Budget::Time(d) => d.is_zero(),
        }
    }
}

impl Default for Budget {
    fn default() -> Self {
        Budget::Time(Duration::from_secs(60))
    }
}

/// Parameters of the restart scheme.
///
/// Each round generates `num_candidates` fresh alignments, anneals each at
/// `t_new` for `iter_per_step` iterations, probes it at `t_cand` for another
/// `iter_per_step` iterations, keeps the best, and anneals that one from
/// `t_cand` down to `t_final`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RestartConfig {
    pub t_new: f64,
    pub iter_per_step: u64,
    pub num_candidates: usize,
    pub t_cand: f64,
    pub t_final: f64,
    pub rounds: usize,
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            t_new: 1e-3,
            iter_per_step: 10_000_000,
            num_candidates: 50,
            t_cand: 1e-5,
            t_final: 1e-7,
            rounds: 1,
        }
    }
}

impl RestartConfig {
    pub fn validate(&self) -> Result<()> {
        let positive = |name: &str, v: f64| {
            if v > 0.0 && v.is_finite() {
                Ok(())
            } else {
                Err(AlignError::Configuration(format!(
                    "restart {name} must be positive, got {v}"
                )))
            }
        };
        positive("t_new", self.t_new)?;
        positive("t_cand", self.t_cand)?;
        positive("t_final", self.t_final)?;
        if self.t_final >= self.t_cand {
            return Err(AlignError::Configuration(
                "restart t_final must be below t_cand".into(),
            ));
        }
        if self.iter_per_step == 0 || self.num_candidates == 0 || self.rounds == 0 {
            return Err(AlignError::Configuration(
                "restart iter_per_step, num_candidates and rounds must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Knobs of the automatic temperature searches.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CalibrationConfig {
    /// Probes run at `10^e` for every integer `e` in this inclusive range.
    pub min_exponent: i32,
    pub max_exponent: i32,

    /// Iterations per probe.
    pub probe_iterations: u64,

    /// Probability of accepting a bad move wanted at the start of a run.
    pub target_initial_pbad: f64,

    /// Probability of accepting a bad move wanted at the end of a run.
    pub target_final_pbad: f64,

    /// Bad-move samples per statistical test.
    pub sample_size: usize,

    /// Bisection steps before a statistical search gives up.
    pub max_search_steps: usize,

    /// Largest fraction of the run budget the probes may use. Probes are
    /// shortened to fit; if that leaves too little per probe the search
    /// degrades to the default schedule.
    pub budget_share: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            min_exponent: -10,
            max_exponent: 10,
            probe_iterations: 10_000,
            target_initial_pbad: 0.985,
            target_final_pbad: 1e-10,
            sample_size: 1_000,
            max_search_steps: 40,
            budget_share: 0.5,
        }
    }
}

impl CalibrationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_exponent >= self.max_exponent {
            return Err(AlignError::Configuration(
                "calibration min_exponent must be below max_exponent".into(),
            ));
        }
        if self.probe_iterations == 0 || self.sample_size == 0 || self.max_search_steps == 0 {
            return Err(AlignError::Configuration(
                "calibration probe_iterations, sample_size and max_search_steps must be positive"
                    .into(),
            ));
        }
        let in_unit = |p: f64| p > 0.0 && p < 1.0;
        if !in_unit(self.target_initial_pbad) || !in_unit(self.target_final_pbad) {
            return Err(AlignError::Configuration(
                "calibration target probabilities must be in (0, 1)".into(),
            ));
        }
        if self.target_final_pbad >= self.target_initial_pbad {
            return Err(AlignError::Configuration(
                "target_final_pbad must be below target_initial_pbad".into(),
            ));
        }
        if !(self.budget_share > 0.0 && self.budget_share <= 1.0) {
            return Err(AlignError::Configuration(format!(
                "calibration budget_share must be in (0, 1], got {}",
                self.budget_share
            )));
        }
        Ok(())
    }
}

/// Configuration of one SANA run.
///
/// # Examples
///
/// ```
/// use u_netalign::sana::{Budget, SanaConfig, TemperatureMode};
///
/// let config = SanaConfig::default()
///     .with_t_initial(TemperatureMode::Explicit(1.0))
///     .with_t_decay(TemperatureMode::Explicit(10.0))
///     .with_budget(Budget::Iterations(100_000))
///     .with_seed(42);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SanaConfig {
    pub t_initial: TemperatureMode,
    pub t_decay: TemperatureMode,
    pub budget: Budget,

    /// Enables the restart scheme instead of a single cooling run.
    pub restart: Option<RestartConfig>,

    /// Re-derives the decay constant during the run from observed
    /// acceptance of bad moves.
    pub dynamic_decay: bool,

    /// Iterations between dynamic decay updates.
    pub dynamic_interval: u64,

    /// Starting alignment file; random when absent.
    pub seed_alignment: Option<PathBuf>,

    /// Nodes that must not move.
    pub lock_file: Option<PathBuf>,

    /// Without a lock file, pins every G1 node to the G2 node of the same
    /// name.
    pub lock_same_names: bool,

    /// Finish with a greedy pass over all moves.
    pub hill_climbing: bool,

    pub calibration: CalibrationConfig,

    /// Random seed for reproducibility.
    pub seed: Option<u64>,
}

impl Default for SanaConfig {
    fn default() -> Self {
        Self {
            t_initial: TemperatureMode::default(),
            t_decay: TemperatureMode::default(),
            budget: Budget::default(),
            restart: None,
            dynamic_decay: false,
            dynamic_interval: 100_000,
            seed_alignment: None,
            lock_file: None,
            lock_same_names: false,
            hill_climbing: false,
            calibration: CalibrationConfig::default(),
            seed: None,
        }
    }
}

impl SanaConfig {
    pub fn with_t_initial(mut self, mode: TemperatureMode) -> Self {
        self.t_initial = mode;
        self
    }

    pub fn with_t_decay(mut self, mode: TemperatureMode) -> Self {
        self.t_decay = mode;
        self
    }

    pub fn with_budget(mut self, budget: Budget) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_restart(mut self, restart: RestartConfig) -> Self {
        self.restart = Some(restart);
        self
    }

    pub fn with_dynamic_decay(mut self, interval: u64) -> Self {
        self.dynamic_decay = true;
        self.dynamic_interval = interval;
        self
    }

    pub fn with_seed_alignment(mut self, path: impl Into<PathBuf>) -> Self {
        self.seed_alignment = Some(path.into());
        self
    }

    pub fn with_lock_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.lock_file = Some(path.into());
        self
    }

    pub fn with_lock_same_names(mut self, enabled: bool) -> Self {
        self.lock_same_names = enabled;
        self
    }

    pub fn with_hill_climbing(mut self, enabled: bool) -> Self {
        self.hill_climbing = enabled;
        self
    }

    pub fn with_calibration(mut self, calibration: CalibrationConfig) -> Self {
        self.calibration = calibration;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if let TemperatureMode::Explicit(t) = self.t_initial {
            if !(t > 0.0 && t.is_finite()) {
                return Err(AlignError::Configuration(format!(
                    "t_initial must be positive, got {t}"
                )));
            }
        }
        if let TemperatureMode::Explicit(d) = self.t_decay {
            if !(d >= 0.0 && d.is_finite()) {
                return Err(AlignError::Configuration(format!(
                    "t_decay must be non-negative, got {d}"
                )));
            }
        }
        if self.budget.is_zero() {
            return Err(AlignError::Configuration("budget must be positive".into()));
        }
        if let Some(restart) = &self.restart {
            restart.validate()?;
            if self.dynamic_decay {
                return Err(AlignError::Configuration(
                    "dynamic decay cannot be combined with the restart scheme".into(),
                ));
            }
        }
        if self.dynamic_decay && self.dynamic_interval == 0 {
            return Err(AlignError::Configuration(
                "dynamic_interval must be positive".into(),
            ));
        }
        self.calibration.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SanaConfig::default();
        assert_eq!(config.t_initial, TemperatureMode::ByLinearRegression);
        assert_eq!(config.budget, Budget::Time(Duration::from_secs(60)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_modes() {
        assert_eq!(
            "auto".parse::<TemperatureMode>().unwrap(),
            TemperatureMode::ByLinearRegression
        );
        assert_eq!(
            "by-statistical-test".parse::<TemperatureMode>().unwrap(),
            TemperatureMode::ByStatisticalTest
        );
        assert_eq!(
            "0.5".parse::<TemperatureMode>().unwrap(),
            TemperatureMode::Explicit(0.5)
        );
        assert!("warm".parse::<TemperatureMode>().is_err());
    }

    #[test]
    fn test_validate_bad_temperature() {
        let config = SanaConfig::default().with_t_initial(TemperatureMode::Explicit(-1.0));
        assert!(matches!(config.validate(), Err(AlignError::Configuration(_))));
        let config = SanaConfig::default().with_t_decay(TemperatureMode::Explicit(f64::NAN));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_budget() {
        let config = SanaConfig::default().with_budget(Budget::Iterations(0));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_restart_with_dynamic_decay() {
        let config = SanaConfig::default()
            .with_restart(RestartConfig::default())
            .with_dynamic_decay(1000);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_restart_temperatures() {
        let restart = RestartConfig {
            t_final: 1.0,
            t_cand: 0.5,
            ..RestartConfig::default()
        };
        assert!(SanaConfig::default().with_restart(restart).validate().is_err());
    }

    #[test]
    fn test_validate_calibration_targets() {
        let calibration = CalibrationConfig {
            target_final_pbad: 0.99,
            ..CalibrationConfig::default()
        };
        assert!(SanaConfig::default()
            .with_calibration(calibration)
            .validate()
            .is_err());
    }

    #[test]
    fn test_budget_arithmetic() {
        let b = Budget::Iterations(100);
        assert_eq!(b.remaining(30, Duration::ZERO), Budget::Iterations(70));
        assert_eq!(b.remaining(300, Duration::ZERO), Budget::Iterations(0));
        assert_eq!(b.share(4), Budget::Iterations(25));
        let t = Budget::Time(Duration::from_secs(10));
        assert_eq!(
            t.remaining(0, Duration::from_secs(4)),
            Budget::Time(Duration::from_secs(6))
        );
        assert_eq!(t.share(2), Budget::Time(Duration::from_secs(5)));
        assert_eq!(b.scaled(0.5), Budget::Iterations(50));
        assert_eq!(t.scaled(0.25), Budget::Time(Duration::from_millis(2_500)));
    }

    #[test]
    fn test_time_share_over_many_parts() {
        let t = Budget::Time(Duration::from_secs(8));
        let parts = u32::MAX as usize + 1;
        match t.share(parts) {
            Budget::Time(d) => {
                assert!(d > Duration::ZERO);
                assert!(d < Duration::from_micros(2));
            }
            Budget::Iterations(_) => unreachable!(),
        }
    }

    #[test]
    fn test_validate_budget_share() {
        for share in [0.0, 1.5, f64::NAN] {
            let calibration = CalibrationConfig {
                budget_share: share,
                ..CalibrationConfig::default()
            };
            assert!(SanaConfig::default()
                .with_calibration(calibration)
                .validate()
                .is_err());
        }
    }
}
