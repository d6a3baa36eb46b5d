//! Dense matrix multiplication, sequential and distributed by row blocks.
//!
//! The distributed path splits A into contiguous row blocks, scatters one
//! block to each participant of a [`Group`], broadcasts B, multiplies
//! locally and gathers the blocks of C back at the coordinator (rank 0).
//! Around that core sits a small benchmark harness that times both paths
//! and appends the results to CSV files.
//!
//! ## Usage
//!
//! ```
//! use rowscatter::{Matrix, multiply};
//!
//! let a = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
//! let b = Matrix::from_rows(&[vec![5.0, 6.0], vec![7.0, 8.0]]).unwrap();
//!
//! let c = multiply(&a, &b).unwrap();
//! assert_eq!(c.to_rows(), vec![vec![19.0, 22.0], vec![43.0, 50.0]]);
//! ```
//!
//! The same product over three in-process participants:
//!
//! ```
//! use rowscatter::{DistributedMultiplier, Group, LocalGroup, generate};
//!
//! let a = generate(7, 5).unwrap();
//! let b = generate(5, 3).unwrap();
//!
//! let results = LocalGroup::run(3, |group| {
//!     let mult = DistributedMultiplier::new(group);
//!     let operands = mult.group().is_coordinator().then_some((&a, &b));
//!     mult.multiply(operands).unwrap()
//! })
//! .unwrap();
//!
//! assert_eq!(results[0].as_ref().unwrap().rows(), 7);
//! assert!(results[1].is_none());
//! ```
//!
//! ## What's inside
//!
//! - Flatten/reshape between nested rows and flat row-major buffers
//! - i-j-k and i-k-j local kernels
//! - Row-block partition with the remainder on the first blocks
//! - Thread-backed participant groups, and MPI-backed ones with the `mpi`
//!   feature
//! - Benchmark driver, CSV sink and speedup report

pub mod config;
pub mod distributed;
pub mod driver;
pub mod group;
pub mod matrix;
pub mod partition;
pub mod report;

pub use distributed::{DistributedError, DistributedMultiplier};
pub use group::{Group, GroupError, LocalGroup};
#[cfg(feature = "mpi")]
pub use group::MpiGroup;
pub use matrix::{Kernel, Matrix, MatrixError, flatten, generate, unflatten};
pub use partition::RowPartition;

/// Matrix multiply: C = A * B, on the calling thread.
///
/// Uses the default [`Kernel`]. A is m×k, B is k×n, C is m×n.
///
/// # Errors
///
/// Returns [`MatrixError::DimensionMismatch`] if A's column count differs
/// from B's row count.
pub fn multiply(a: &Matrix, b: &Matrix) -> Result<Matrix, MatrixError> {
    matrix::multiply_with(Kernel::default(), a, b)
}
