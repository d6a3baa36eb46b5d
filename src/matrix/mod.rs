//! Dense row-major matrices and the local multiplication kernels.
//!
//! The distribution protocol moves flat `f64` buffers, so [`Matrix`] keeps
//! its elements flat and row-major internally. [`flatten`] and [`unflatten`]
//! convert between that layout and nested rows.

pub mod naive_ijk;
pub mod naive_ikj;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use naive_ijk::matmul_naive_ijk;
use naive_ikj::matmul_naive_ikj;

/// Errors raised while building or multiplying matrices.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MatrixError {
    #[error("matrix must have at least one row and one column, got {rows}x{cols}")]
    Empty { rows: usize, cols: usize },

    #[error("row {row} has {found} elements, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("flat buffer has {found} elements, expected {rows}x{cols}={expected}")]
    LengthMismatch {
        rows: usize,
        cols: usize,
        expected: usize,
        found: usize,
    },

    #[error("cannot multiply {a_rows}x{a_cols} by {b_rows}x{b_cols}: inner dimensions differ")]
    DimensionMismatch {
        a_rows: usize,
        a_cols: usize,
        b_rows: usize,
        b_cols: usize,
    },
}

/// A rectangular `rows × cols` matrix of `f64`, stored row-major.
///
/// Both dimensions are at least one. Matrices are never mutated after
/// construction; operations produce new ones.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Wraps a row-major buffer, checking it holds exactly `rows * cols` values.
    pub fn from_flat(data: Vec<f64>, rows: usize, cols: usize) -> Result<Self, MatrixError> {
        check_shape(rows, cols)?;
        if data.len() != rows * cols {
            return Err(MatrixError::LengthMismatch {
                rows,
                cols,
                expected: rows * cols,
                found: data.len(),
            });
        }
        Ok(Self { rows, cols, data })
    }

    /// Builds a matrix from nested rows. Every row must have the same length.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, MatrixError> {
        let data = flatten(rows)?;
        Self::from_flat(data, rows.len(), rows[0].len())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Element at row `i`, column `j`.
    ///
    /// # Panics
    ///
    /// Panics if `i` or `j` is out of bounds.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        assert!(i < self.rows && j < self.cols, "({}, {}) out of bounds", i, j);
        self.data[i * self.cols + j]
    }

    /// The row-major flat buffer.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn into_flat(self) -> Vec<f64> {
        self.data
    }

    /// Copies the matrix out as nested rows.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.data.chunks(self.cols).map(<[f64]>::to_vec).collect()
    }
}

/// Converts nested rows to a row-major flat buffer of `rows * cols` values.
pub fn flatten(rows: &[Vec<f64>]) -> Result<Vec<f64>, MatrixError> {
    let cols = rows.first().map_or(0, Vec::len);
    check_shape(rows.len(), cols)?;

    let mut flat = Vec::with_capacity(rows.len() * cols);
    for (i, row) in rows.iter().enumerate() {
        if row.len() != cols {
            return Err(MatrixError::Ragged {
                row: i,
                expected: cols,
                found: row.len(),
            });
        }
        flat.extend_from_slice(row);
    }
    Ok(flat)
}

/// Inverse of [`flatten`]: splits a row-major buffer back into `rows` rows.
pub fn unflatten(flat: &[f64], rows: usize, cols: usize) -> Result<Vec<Vec<f64>>, MatrixError> {
    check_shape(rows, cols)?;
    if flat.len() != rows * cols {
        return Err(MatrixError::LengthMismatch {
            rows,
            cols,
            expected: rows * cols,
            found: flat.len(),
        });
    }
    Ok(flat.chunks(cols).map(<[f64]>::to_vec).collect())
}

fn check_shape(rows: usize, cols: usize) -> Result<(), MatrixError> {
    if rows == 0 || cols == 0 {
        return Err(MatrixError::Empty { rows, cols });
    }
    Ok(())
}

/// Random `rows × cols` matrix, uniform in `[0, 1)`, seeded from OS entropy.
pub fn generate(rows: usize, cols: usize) -> Result<Matrix, MatrixError> {
    generate_with(&mut rand::thread_rng(), rows, cols)
}

/// Like [`generate`], drawing from a caller-supplied generator.
pub fn generate_with<R: Rng + ?Sized>(
    rng: &mut R,
    rows: usize,
    cols: usize,
) -> Result<Matrix, MatrixError> {
    check_shape(rows, cols)?;
    let data = (0..rows * cols).map(|_| rng.gen_range(0.0..1.0)).collect();
    Matrix::from_flat(data, rows, cols)
}

/// Loop order used for local block products.
///
/// Both orders sum each output element over the inner dimension in ascending
/// order, so they agree bit for bit; only memory access differs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Kernel {
    /// Textbook i-j-k order.
    Ijk,
    /// Stride-1 i-k-j order.
    #[default]
    Ikj,
}

impl Kernel {
    /// Computes a `rows × n` block of C from a `rows × k` block of A and the
    /// full `k × n` operand B. A zero-row block yields an empty buffer.
    ///
    /// # Panics
    ///
    /// Panics if the slice lengths don't match `rows`, `n`, `k`.
    pub fn multiply_block(self, a: &[f64], b: &[f64], rows: usize, n: usize, k: usize) -> Vec<f64> {
        assert_eq!(a.len(), rows * k, "A block: expected {}x{}={} elements", rows, k, rows * k);
        assert_eq!(b.len(), k * n, "B: expected {}x{}={} elements", k, n, k * n);

        let mut c = vec![0.0; rows * n];
        match self {
            Kernel::Ijk => matmul_naive_ijk(a, b, &mut c, rows, n, k),
            Kernel::Ikj => matmul_naive_ikj(a, b, &mut c, rows, n, k),
        }
        c
    }
}

/// Sequential product `A * B` on the calling thread.
pub fn multiply_with(kernel: Kernel, a: &Matrix, b: &Matrix) -> Result<Matrix, MatrixError> {
    if a.cols != b.rows {
        return Err(MatrixError::DimensionMismatch {
            a_rows: a.rows,
            a_cols: a.cols,
            b_rows: b.rows,
            b_cols: b.cols,
        });
    }
    let c = kernel.multiply_block(&a.data, &b.data, a.rows, b.cols, a.cols);
    Matrix::from_flat(c, a.rows, b.cols)
}
