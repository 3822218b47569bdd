//! Dense node-pair similarity tables and their binary form.

use crate::error::{AlignError, Result};
use crate::graph::GraphPair;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

/// A dense `n1 x n2` row-major table of non-negative similarity scores.
///
/// # Binary format
///
/// Raw little-endian `f32` values, row by row, with no header. The
/// dimensions are implied by the two graphs, so a reader must already know
/// `n1` and `n2`.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl SimilarityMatrix {
    /// All-zero matrix.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Builds a matrix by evaluating `f(i, j)` for every pair.
    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> f32) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        for i in 0..rows {
            for j in 0..cols {
                data.push(f(i, j));
            }
        }
        Self { rows, cols, data }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f32 {
        self.data[i * self.cols + j]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: f32) {
        self.data[i * self.cols + j] = value;
    }

    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Weight that scales the mean similarity to one half, so that measures
    /// of different magnitude can be combined on a comparable footing.
    pub fn balance_weight(&self) -> f64 {
        if self.data.is_empty() {
            return 1.0;
        }
        let total: f64 = self.data.iter().map(|&v| v as f64).sum();
        let mean = total / self.data.len() as f64;
        if mean <= 0.0 {
            return 1.0;
        }
        0.5 / mean
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.data.len() * 4);
        for v in &self.data {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes
    }

    /// Decodes the binary form. `path` is only used for error reporting.
    pub fn from_bytes(bytes: &[u8], rows: usize, cols: usize, path: &Path) -> Result<Self> {
        let expected = rows * cols * 4;
        if bytes.len() != expected {
            return Err(AlignError::malformed(
                path,
                0,
                format!(
                    "expected {expected} bytes for a {rows}x{cols} matrix, found {}",
                    bytes.len()
                ),
            ));
        }
        let data = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(Self { rows, cols, data })
    }

    pub fn read(path: &Path, rows: usize, cols: usize) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| AlignError::io(path, e))?;
        Self::from_bytes(&bytes, rows, cols, path)
    }

    /// Text dump: one `g1name g2name similarity` line per pair.
    pub fn write_with_names(&self, path: &Path, pair: &GraphPair) -> Result<()> {
        let file = fs::File::create(path).map_err(|e| AlignError::io(path, e))?;
        let mut out = BufWriter::new(file);
        for i in 0..self.rows {
            for j in 0..self.cols {
                writeln!(
                    out,
                    "{} {} {}",
                    pair.g1().node_name(i),
                    pair.g2().node_name(j),
                    self.get(i, j)
                )
                .map_err(|e| AlignError::io(path, e))?;
            }
        }
        out.flush().map_err(|e| AlignError::io(path, e))
    }
}
