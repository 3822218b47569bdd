//! Error taxonomy.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while configuring a run or building similarity data.
///
/// Nothing in the annealing inner loop is fallible; every variant here is
/// produced either before optimization starts or while a local measure is
/// being built.
#[derive(Error, Debug)]
pub enum AlignError {
    /// Invalid or contradictory configuration, including unknown names in a
    /// lock file.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No annotation source exists for the named graph.
    #[error("annotation data not available for network `{graph}`")]
    MissingAnnotationData { graph: String },

    /// A source record could not be parsed.
    #[error("malformed input in {}:{line}: {reason}", path.display())]
    MalformedInput {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// A temperature search could not find a stable fit. The scheduler
    /// recovers from this with default parameters.
    #[error("calibration degraded: {0}")]
    CalibrationDegraded(String),

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AlignError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AlignError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn malformed(
        path: impl Into<PathBuf>,
        line: usize,
        reason: impl Into<String>,
    ) -> Self {
        AlignError::MalformedInput {
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, AlignError>;
