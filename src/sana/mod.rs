//! SANA: simulated annealing over alignments.
//!
//! The engine keeps one injective alignment and proposes two kinds of move,
//! drawn uniformly from the whole neighborhood: swapping the images of two
//! G1 nodes, or moving a G1 node onto an unused G2 node. Each move is scored
//! incrementally through a [`MoveScorer`] and accepted with the Metropolis
//! rule under an exponentially decaying temperature
//! `T(f) = t_initial * exp(-t_decay * f)`.
//!
//! The two temperature parameters can be given, fitted by regression over
//! short fixed-temperature probes, or searched with a hypothesis test. A
//! run may also re-derive the decay on the fly ([`SanaConfig::dynamic_decay`])
//! or use the restart scheme ([`RestartConfig`]).
//!
//! # References
//!
//! - Kirkpatrick, Gelatt & Vecchi (1983), "Optimization by Simulated Annealing"
//! - Mamano & Hayes (2017), "SANA: Simulated Annealing far outperforms many
//!   other search algorithms for biological network alignment"
//! - Hayes & Mamano (2018), "Determining the temperature schedule for
//!   simulated annealing"

mod annealer;
mod calibration;
mod config;
mod restart;
mod runner;
mod schedule;
mod types;

pub use annealer::accepts;
pub use calibration::{fit_line, CalibrationReport, PbadModel, ProbeStats};
pub use config::{Budget, CalibrationConfig, RestartConfig, SanaConfig, TemperatureMode};
pub use restart::select_best;
pub use runner::{SanaResult, SanaRunner};
pub use schedule::{Schedule, DEFAULT_T_DECAY, DEFAULT_T_INITIAL, TIME_CHECK_INTERVAL};
pub use types::{Move, MoveScorer};
