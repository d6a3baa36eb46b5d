//! Multi-process group over MPI.
//!
//! Start every participant through the MPI launcher:
//!
//! ```sh
//! mpirun -n 4 rowscatter run --transport mpi
//! ```
//!
//! Rank and size come from `MPI_COMM_WORLD`. The collectives map onto the
//! native MPI ones rooted at [`COORDINATOR`]; frames only travel through
//! `send_frame`/`recv_frame` when a caller uses them directly.
//!
//! MPI's default error handler aborts the whole job when a peer dies or a
//! message is truncated, so a failure ends the trial on every rank.

use mpi::Count;
use mpi::datatype::{Partition, PartitionMut};
use mpi::environment::Universe;
use mpi::topology::{Rank, SimpleCommunicator};
use mpi::traits::*;

use super::{COORDINATOR, Collective, Element, Group, GroupError, check_counts};

pub struct MpiGroup {
    world: SimpleCommunicator,
    rank: usize,
    size: usize,
    // Declared last so it drops last; dropping it finalises MPI.
    _universe: Universe,
}

impl MpiGroup {
    /// Initialises MPI and joins `MPI_COMM_WORLD`.
    ///
    /// Fails if MPI was already initialised in this process.
    pub fn init() -> Result<Self, GroupError> {
        let universe = mpi::initialize()
            .ok_or_else(|| GroupError::Init("MPI is already initialised".into()))?;
        let world = universe.world();
        let rank = world.rank() as usize;
        let size = world.size() as usize;
        log::debug!("joined MPI world as rank {} of {}", rank, size);

        Ok(Self {
            world,
            rank,
            size,
            _universe: universe,
        })
    }

    fn peer(&self, rank: usize) -> Result<Rank, GroupError> {
        if rank >= self.size {
            return Err(GroupError::NoRoute {
                from: self.rank,
                to: rank,
            });
        }
        Ok(rank as Rank)
    }
}

impl Group for MpiGroup {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send_frame(&self, to: usize, frame: Vec<u8>) -> Result<(), GroupError> {
        let to = self.peer(to)?;
        self.world.process_at_rank(to).send(&frame[..]);
        Ok(())
    }

    fn recv_frame(&self, from: usize) -> Result<Vec<u8>, GroupError> {
        let from = self.peer(from)?;
        let (frame, _status) = self.world.process_at_rank(from).receive_vec::<u8>();
        Ok(frame)
    }

    fn barrier(&self) -> Result<(), GroupError> {
        self.world.barrier();
        Ok(())
    }

    fn scatter<T: Element>(&self, data: Option<&[T]>, counts: &[usize]) -> Result<Vec<T>, GroupError> {
        check_counts(self, Collective::Scatter, counts)?;
        let root = self.world.process_at_rank(COORDINATOR as Rank);
        let mut local = vec![T::default(); counts[self.rank]];

        if !self.is_coordinator() {
            root.scatter_varcount_into(&mut local[..]);
            return Ok(local);
        }

        let data = data.ok_or(GroupError::MissingRootData {
            op: Collective::Scatter,
        })?;
        let total: usize = counts.iter().sum();
        if data.len() != total {
            return Err(GroupError::SizeMismatch {
                op: Collective::Scatter,
                peer: COORDINATOR,
                expected: total,
                found: data.len(),
            });
        }

        let (counts, displs) = layout(Collective::Scatter, counts)?;
        let partition = Partition::new(data, counts, displs);
        root.scatter_varcount_into_root(&partition, &mut local[..]);
        Ok(local)
    }

    /// Receivers size `buf` to the coordinator's length beforehand; a
    /// shorter buffer is a truncation, which MPI treats as fatal.
    fn broadcast<T: Element>(&self, buf: &mut Vec<T>) -> Result<(), GroupError> {
        let root = self.world.process_at_rank(COORDINATOR as Rank);
        root.broadcast_into(&mut buf[..]);
        Ok(())
    }

    fn gather<T: Element>(&self, local: &[T], counts: &[usize]) -> Result<Option<Vec<T>>, GroupError> {
        check_counts(self, Collective::Gather, counts)?;
        if local.len() != counts[self.rank] {
            return Err(GroupError::SizeMismatch {
                op: Collective::Gather,
                peer: self.rank,
                expected: counts[self.rank],
                found: local.len(),
            });
        }

        let root = self.world.process_at_rank(COORDINATOR as Rank);
        if !self.is_coordinator() {
            root.gather_varcount_into(local);
            return Ok(None);
        }

        let (mpi_counts, displs) = layout(Collective::Gather, counts)?;
        let mut out = vec![T::default(); counts.iter().sum()];
        {
            let mut partition = PartitionMut::new(&mut out[..], mpi_counts, displs);
            root.gather_varcount_into_root(local, &mut partition);
        }
        Ok(Some(out))
    }

    /// Waits for every rank, then finalises MPI.
    fn finalize(self) -> Result<(), GroupError> {
        self.world.barrier();
        log::debug!("rank {} leaving the MPI world", self.rank);
        Ok(())
    }
}

/// MPI counts and displacements for a varcount collective: block `p`
/// starts where block `p - 1` ends.
fn layout(op: Collective, counts: &[usize]) -> Result<(Vec<Count>, Vec<Count>), GroupError> {
    let to_count = |n: usize| Count::try_from(n).map_err(|_| GroupError::Overflow { op, count: n });

    let mut mpi_counts = Vec::with_capacity(counts.len());
    let mut displs = Vec::with_capacity(counts.len());
    let mut offset = 0usize;
    for &count in counts {
        mpi_counts.push(to_count(count)?);
        displs.push(to_count(offset)?);
        offset += count;
    }
    Ok((mpi_counts, displs))
}
