//! Key-addressed persistence of similarity matrices.

use super::matrix::SimilarityMatrix;
use crate::error::{AlignError, Result};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Identity of a similarity artifact: the graph pair, the measure, and the
/// measure's parameters.
///
/// Rendered as `{g1}_{g2}_{measure}[_{k}_{w1}.._{wk}][_{param}_{value}]*.bin`
/// where every real number keeps its first three decimal digits only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    file_name: String,
}

impl CacheKey {
    pub fn new(g1: &str, g2: &str, measure: &str) -> Self {
        Self {
            file_name: format!("{g1}_{g2}_{measure}"),
        }
    }

    /// Appends a weight vector: its length, then each weight.
    pub fn with_weights(mut self, weights: &[f64]) -> Self {
        self.file_name.push_str(&format!("_{}", weights.len()));
        for &w in weights {
            self.file_name.push('_');
            self.file_name.push_str(&extract_decimals(w, 3));
        }
        self
    }

    /// Appends a named scalar parameter.
    pub fn with_param(mut self, name: &str, value: f64) -> Self {
        self.file_name
            .push_str(&format!("_{name}_{}", extract_decimals(value, 3)));
        self
    }

    pub fn file_name(&self) -> String {
        format!("{}.bin", self.file_name)
    }
}

/// First `digits` decimal digits of `value`, e.g. `0.5 -> "500"`.
fn extract_decimals(value: f64, digits: usize) -> String {
    let rendered = format!("{value:.digits$}");
    match rendered.split_once('.') {
        Some((_, decimals)) => decimals.to_string(),
        None => "0".repeat(digits),
    }
}

/// Builds each similarity matrix at most once per key and reuses it.
///
/// Lookups go to memory first, then to `{dir}/{key}.bin`. A miss runs the
/// caller's builder under a per-key lock, so concurrent callers asking for
/// the same uncached key wait for a single build. Writing the artifact is
/// best-effort: a failure is logged and the freshly built matrix is still
/// returned.
#[derive(Debug)]
pub struct SimilarityCache {
    dir: PathBuf,
    key_locks: Mutex<HashMap<CacheKey, Arc<Mutex<()>>>>,
    loaded: Mutex<HashMap<CacheKey, Arc<SimilarityMatrix>>>,
    builds: AtomicUsize,
}

impl SimilarityCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            key_locks: Mutex::new(HashMap::new()),
            loaded: Mutex::new(HashMap::new()),
            builds: AtomicUsize::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn artifact_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Number of matrices this cache had to compute.
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }

    /// Returns the matrix for `key`, building it with `build` on a miss.
    ///
    /// Errors from `build` are returned unchanged and nothing is persisted.
    pub fn get_or_build<F>(
        &self,
        key: &CacheKey,
        rows: usize,
        cols: usize,
        build: F,
    ) -> Result<Arc<SimilarityMatrix>>
    where
        F: FnOnce() -> Result<SimilarityMatrix>,
    {
        let key_lock = {
            let mut locks = self.key_locks.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(locks.entry(key.clone()).or_default())
        };
        let _guard = key_lock.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(found) = self.memory_lookup(key) {
            debug!(key = %key.file_name(), "similarity matrix served from memory");
            return Ok(found);
        }

        let path = self.artifact_path(key);
        if path.is_file() {
            match SimilarityMatrix::read(&path, rows, cols) {
                Ok(matrix) => {
                    info!(path = %path.display(), "loaded cached similarity matrix");
                    return Ok(self.remember(key, matrix));
                }
                Err(e) => warn!(path = %path.display(), error = %e, "ignoring unreadable artifact"),
            }
        }

        info!(key = %key.file_name(), "computing similarity matrix");
        let matrix = build()?;
        if matrix.rows() != rows || matrix.cols() != cols {
            return Err(AlignError::Configuration(format!(
                "builder for {} produced a {}x{} matrix, expected {rows}x{cols}",
                key.file_name(),
                matrix.rows(),
                matrix.cols()
            )));
        }
        self.builds.fetch_add(1, Ordering::Relaxed);
        write_best_effort(&path, &matrix.to_bytes());
        Ok(self.remember(key, matrix))
    }

    fn memory_lookup(&self, key: &CacheKey) -> Option<Arc<SimilarityMatrix>> {
        let loaded = self.loaded.lock().unwrap_or_else(|e| e.into_inner());
        loaded.get(key).cloned()
    }

    fn remember(&self, key: &CacheKey, matrix: SimilarityMatrix) -> Arc<SimilarityMatrix> {
        let matrix = Arc::new(matrix);
        let mut loaded = self.loaded.lock().unwrap_or_else(|e| e.into_inner());
        loaded.insert(key.clone(), Arc::clone(&matrix));
        matrix
    }
}

/// Atomically writes `bytes` to `path` through a temp file in the same
/// directory. Failures are logged, never returned.
pub(crate) fn write_best_effort(path: &Path, bytes: &[u8]) {
    if let Err(e) = write_atomic(path, bytes) {
        warn!(path = %path.display(), error = %e, "could not persist cache artifact");
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
