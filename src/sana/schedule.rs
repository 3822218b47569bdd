//! Temperature schedule, budget clock and dynamic decay.

use super::config::Budget;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Iterations between wall-clock reads.
pub const TIME_CHECK_INTERVAL: u64 = 1024;

/// Initial temperature used when calibration degrades.
pub const DEFAULT_T_INITIAL: f64 = 1.0;

/// Decay used when calibration degrades: six orders of magnitude of cooling.
pub const DEFAULT_T_DECAY: f64 = 13.815_510_557_964_274; // ln(1e6)

/// Exponential cooling: `T(f) = t_initial * exp(-t_decay * f)` where `f` in
/// `[0, 1]` is the fraction of the phase budget already used.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Schedule {
    pub t_initial: f64,
    pub t_decay: f64,
}

impl Schedule {
    pub fn new(t_initial: f64, t_decay: f64) -> Self {
        Self { t_initial, t_decay }
    }

    /// Constant temperature.
    pub fn fixed(temperature: f64) -> Self {
        Self::new(temperature, 0.0)
    }

    /// Cools from `from` to `to` over the phase.
    pub fn between(from: f64, to: f64) -> Self {
        Self::new(from, (from / to).ln())
    }

    pub fn temperature(&self, fraction: f64) -> f64 {
        self.t_initial * (-self.t_decay * fraction.clamp(0.0, 1.0)).exp()
    }

    pub fn t_final(&self) -> f64 {
        self.temperature(1.0)
    }
}

/// Tracks how much of a phase budget has been used.
///
/// Iteration budgets are exact. Time budgets, the optional hard deadline
/// and the cancellation flag are checked every [`TIME_CHECK_INTERVAL`]
/// iterations only.
#[derive(Debug)]
pub(crate) struct PhaseClock {
    limit: Budget,
    start: Instant,
    deadline: Option<Instant>,
    cancel: Option<Arc<AtomicBool>>,
    fraction: f64,
    expired: bool,
    cancelled: bool,
}

impl PhaseClock {
    pub fn new(limit: Budget, deadline: Option<Instant>) -> Self {
        Self {
            limit,
            start: Instant::now(),
            deadline,
            cancel: None,
            fraction: 0.0,
            expired: limit.is_zero(),
            cancelled: false,
        }
    }

    pub fn with_cancel(mut self, cancel: Option<Arc<AtomicBool>>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Updates progress for `iteration` (0-based) and returns whether the
    /// phase may run it.
    pub fn tick(&mut self, iteration: u64) -> bool {
        if self.expired {
            return false;
        }
        let check_time = iteration % TIME_CHECK_INTERVAL == 0;
        match self.limit {
            Budget::Iterations(n) => {
                self.fraction = iteration as f64 / n as f64;
                if iteration >= n {
                    self.expired = true;
                }
            }
            Budget::Time(d) => {
                if check_time {
                    self.fraction = self.start.elapsed().as_secs_f64() / d.as_secs_f64();
                    if self.fraction >= 1.0 {
                        self.expired = true;
                    }
                }
            }
        }
        if check_time {
            if let Some(deadline) = self.deadline {
                if Instant::now() >= deadline {
                    self.expired = true;
                }
            }
            if let Some(flag) = &self.cancel {
                if flag.load(Ordering::Relaxed) {
                    self.cancelled = true;
                    self.expired = true;
                }
            }
        }
        !self.expired
    }

    pub fn fraction(&self) -> f64 {
        self.fraction.min(1.0)
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Whether the phase stopped on the cancellation flag.
    pub fn cancelled(&self) -> bool {
        self.cancelled
    }
}

/// Adjusts the decay constant while a run is in progress.
///
/// Every `interval` iterations the mean acceptance probability of bad moves
/// over the window is compared with a log-linear target trajectory from
/// `target_initial` to `target_final`. The temperature is nudged by the
/// ratio of the two (clamped to `[0.5, 2]`) and the decay is solved so that
/// the schedule passes through the nudged temperature at the current
/// fraction.
#[derive(Debug, Clone)]
pub(crate) struct DynamicDecay {
    interval: u64,
    target_initial: f64,
    target_final: f64,
    window_sum: f64,
    window_count: u64,
    updates: usize,
}

const MIN_DECAY: f64 = 1e-6;

impl DynamicDecay {
    pub fn new(interval: u64, target_initial: f64, target_final: f64) -> Self {
        Self {
            interval,
            target_initial,
            target_final,
            window_sum: 0.0,
            window_count: 0,
            updates: 0,
        }
    }

    /// Records the acceptance probability of one bad move.
    pub fn observe(&mut self, pbad: f64) {
        self.window_sum += pbad;
        self.window_count += 1;
    }

    /// Expected bad-move acceptance at `fraction` of the run.
    pub fn expected_pbad(&self, fraction: f64) -> f64 {
        let (a, b) = (self.target_initial.ln(), self.target_final.ln());
        (a + fraction * (b - a)).exp()
    }

    /// At the end of each window, returns the updated schedule.
    pub fn update(
        &mut self,
        iteration: u64,
        fraction: f64,
        schedule: &Schedule,
    ) -> Option<Schedule> {
        if iteration == 0 || iteration % self.interval != 0 {
            return None;
        }
        let (sum, count) = (self.window_sum, self.window_count);
        self.window_sum = 0.0;
        self.window_count = 0;
        if count == 0 || fraction <= 0.0 {
            return None;
        }

        let observed = sum / count as f64;
        if observed <= 0.0 {
            return None;
        }
        let ratio = (self.expected_pbad(fraction) / observed).clamp(0.5, 2.0);
        let wanted = schedule.temperature(fraction) * ratio;
        let decay = ((schedule.t_initial / wanted).ln() / fraction).max(MIN_DECAY);
        self.updates += 1;
        Some(Schedule::new(schedule.t_initial, decay))
    }

    pub fn updates(&self) -> usize {
        self.updates
    }
}
