//! Row-block distributed matrix multiplication.
//!
//! The coordinator splits A into contiguous row blocks, scatters one block
//! to each participant, broadcasts all of B, and gathers the blocks of C
//! back in rank order:
//!
//! ```text
//!   A (m×k)            B (k×n)               C (m×n)
//!   ┌──────┐ rows[0] → p0 ┐                  ┌──────┐
//!   ├──────┤ rows[1] → p1 ├─ × B (replica) → ├──────┤ gather
//!   ├──────┤   ...        │                  ├──────┤
//!   └──────┘ rows[P-1]→ pP ┘                 └──────┘
//! ```
//!
//! Every participant, the coordinator included, must call
//! [`DistributedMultiplier::multiply`] for the same trial; the collectives
//! inside block until all of them arrive.

use thiserror::Error;

use crate::group::{Group, GroupError};
use crate::matrix::{Kernel, Matrix, MatrixError};
use crate::partition::RowPartition;

#[derive(Debug, Error)]
pub enum DistributedError {
    #[error("cannot multiply {a_rows}x{a_cols} by {b_rows}x{b_cols}: inner dimensions differ")]
    DimensionMismatch {
        a_rows: usize,
        a_cols: usize,
        b_rows: usize,
        b_cols: usize,
    },

    #[error("the coordinator must hold both operands")]
    MissingOperands,

    #[error("coordinator announced an invalid shape {0:?}")]
    InvalidShape([u64; 3]),

    #[error("collective failed: {0}")]
    Group(#[from] GroupError),

    #[error("could not assemble the product: {0}")]
    Assemble(#[from] MatrixError),
}

/// Runs the distributed product on one participant of `G`.
pub struct DistributedMultiplier<G: Group> {
    group: G,
    kernel: Kernel,
}

impl<G: Group> DistributedMultiplier<G> {
    pub fn new(group: G) -> Self {
        Self::with_kernel(group, Kernel::default())
    }

    pub fn with_kernel(group: G, kernel: Kernel) -> Self {
        Self { group, kernel }
    }

    pub fn group(&self) -> &G {
        &self.group
    }

    pub fn kernel(&self) -> Kernel {
        self.kernel
    }

    /// Tears down the underlying group.
    pub fn finalize(self) -> Result<(), GroupError> {
        self.group.finalize()
    }

    /// Multiplies `a × b` across the group.
    ///
    /// The coordinator passes `Some((a, b))` and gets `Some(c)` back. Other
    /// participants pass `None` and get `None`; they never see a partial
    /// product.
    ///
    /// A dimension mismatch is rejected before any operand data moves: the
    /// coordinator announces an empty shape, so every participant returns an
    /// error instead of waiting for a scatter that never comes.
    pub fn multiply(&self, operands: Option<(&Matrix, &Matrix)>) -> Result<Option<Matrix>, DistributedError> {
        let group = &self.group;

        let (a, b) = match operands {
            Some((a, b)) if group.is_coordinator() => (Some(a), Some(b)),
            _ => (None, None),
        };

        // Only the coordinator knows the operands, so it announces the shape.
        // An all-zero shape tells the others this trial is void.
        let mut shape = vec![0u64; 3];
        let mut rejected = None;
        match (a, b) {
            (Some(a), Some(b)) if a.cols() == b.rows() => {
                shape = vec![a.rows() as u64, a.cols() as u64, b.cols() as u64];
            }
            (Some(a), Some(b)) => {
                rejected = Some(DistributedError::DimensionMismatch {
                    a_rows: a.rows(),
                    a_cols: a.cols(),
                    b_rows: b.rows(),
                    b_cols: b.cols(),
                });
            }
            _ if group.is_coordinator() => rejected = Some(DistributedError::MissingOperands),
            _ => {}
        }
        group.broadcast(&mut shape)?;
        if let Some(err) = rejected {
            return Err(err);
        }
        let (m, k, n) = decode_shape(&shape)?;

        let partition = RowPartition::new(m, group.size());
        let my_rows = partition.counts()[group.rank()];
        log::debug!(
            "participant {}/{}: rows {:?} of {}x{} * {}x{}",
            group.rank(),
            group.size(),
            partition.rows_of(group.rank()),
            m,
            k,
            k,
            n
        );

        let a_block = group.scatter(a.map(Matrix::as_slice), &partition.element_counts(k))?;

        let mut b_flat = match b {
            Some(b) => b.as_slice().to_vec(),
            None => vec![0.0; k * n],
        };
        group.broadcast(&mut b_flat)?;

        let c_block = self.kernel.multiply_block(&a_block, &b_flat, my_rows, n, k);

        match group.gather(&c_block, &partition.element_counts(n))? {
            Some(c_flat) => Ok(Some(Matrix::from_flat(c_flat, m, n)?)),
            None => Ok(None),
        }
    }
}

fn decode_shape(shape: &[u64]) -> Result<(usize, usize, usize), DistributedError> {
    let raw = [shape[0], shape[1], shape[2]];
    let dims: Vec<usize> = raw
        .iter()
        .map(|&d| usize::try_from(d).ok().filter(|&d| d > 0))
        .collect::<Option<_>>()
        .ok_or(DistributedError::InvalidShape(raw))?;
    Ok((dims[0], dims[1], dims[2]))
}
