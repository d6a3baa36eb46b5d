//! Participant groups and their collective operations.
//!
//! A [`Group`] is one participant's handle on a fixed set of `size()`
//! participants. Implementations only have to move opaque frames between two
//! participants; the collectives (barrier, scatter, broadcast, gather) are
//! provided methods built on top of that, so every transport gets the same
//! ordering and size checks. A transport with native collectives may
//! override them.
//!
//! All collectives are rooted at [`COORDINATOR`] and block until every
//! participant has reached them. There is no timeout.
//!
//! Available groups:
//! - `local`: participants are threads in this process
//! - `mpi_world`: participants are MPI processes (feature `mpi`)

pub mod local;
#[cfg(feature = "mpi")]
pub mod mpi_world;

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use local::LocalGroup;
#[cfg(feature = "mpi")]
pub use mpi_world::MpiGroup;

/// Rank of the participant that owns full inputs and outputs.
pub const COORDINATOR: usize = 0;

/// Collective a frame belongs to. Carried in every frame so a participant
/// that receives the wrong kind of message fails instead of misreading it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Collective {
    Barrier,
    Scatter,
    Broadcast,
    Gather,
}

impl fmt::Display for Collective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Collective::Barrier => "barrier",
            Collective::Scatter => "scatter",
            Collective::Broadcast => "broadcast",
            Collective::Gather => "gather",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum GroupError {
    #[error("participant {peer} disconnected")]
    Disconnected { peer: usize },

    #[error("frame codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("{op}: participant {peer} carries {found} elements, expected {expected}")]
    SizeMismatch {
        op: Collective,
        peer: usize,
        expected: usize,
        found: usize,
    },

    #[error("expected a {expected} frame from participant {peer}, got {found}")]
    Protocol {
        peer: usize,
        expected: Collective,
        found: Collective,
    },

    #[error("{op}: {found} counts given for a group of {size}")]
    CountsMismatch {
        op: Collective,
        size: usize,
        found: usize,
    },

    #[error("{op}: the coordinator must supply the data to distribute")]
    MissingRootData { op: Collective },

    #[error("no link from participant {from} to participant {to}")]
    NoRoute { from: usize, to: usize },

    #[error("participant {rank} panicked")]
    Panicked { rank: usize },

    #[error("{op}: {count} elements exceed what one message can carry")]
    Overflow { op: Collective, count: usize },

    #[error("cannot start the process group: {0}")]
    Init(String),
}

/// Element types that can travel through a collective.
#[cfg(not(feature = "mpi"))]
pub trait Element: Copy + Default + Send + Serialize + DeserializeOwned + 'static {}

/// Element types that can travel through a collective. With MPI enabled
/// they also need a matching MPI datatype.
#[cfg(feature = "mpi")]
pub trait Element:
    Copy + Default + Send + Serialize + DeserializeOwned + mpi::datatype::Equivalence + 'static
{
}

impl Element for f64 {}
impl Element for u64 {}

#[derive(Serialize)]
struct FrameOut<'a, T> {
    op: Collective,
    data: &'a [T],
}

#[derive(Deserialize)]
struct FrameIn<T> {
    op: Collective,
    data: Vec<T>,
}

/// One participant's view of a process group.
pub trait Group {
    /// This participant's index, `0..size()`.
    fn rank(&self) -> usize;

    /// Number of participants, coordinator included.
    fn size(&self) -> usize;

    /// Delivers one frame to participant `to`.
    fn send_frame(&self, to: usize, frame: Vec<u8>) -> Result<(), GroupError>;

    /// Blocks until the next frame from participant `from` arrives.
    fn recv_frame(&self, from: usize) -> Result<Vec<u8>, GroupError>;

    fn is_coordinator(&self) -> bool {
        self.rank() == COORDINATOR
    }

    /// Returns once every participant has entered the barrier.
    fn barrier(&self) -> Result<(), GroupError> {
        let empty: &[u64] = &[];
        if self.is_coordinator() {
            for peer in 1..self.size() {
                recv_op::<_, u64>(self, peer, Collective::Barrier, Some(0))?;
            }
            for peer in 1..self.size() {
                send_op(self, peer, Collective::Barrier, empty)?;
            }
        } else {
            send_op(self, COORDINATOR, Collective::Barrier, empty)?;
            recv_op::<_, u64>(self, COORDINATOR, Collective::Barrier, Some(0))?;
        }
        Ok(())
    }

    /// Hands participant `p` the `counts[p]` elements of `data` that follow
    /// the slices of participants `0..p`.
    ///
    /// Only the coordinator supplies `data`; everyone passes the same
    /// `counts`. Returns this participant's slice. Zero counts are legal.
    fn scatter<T: Element>(&self, data: Option<&[T]>, counts: &[usize]) -> Result<Vec<T>, GroupError> {
        check_counts(self, Collective::Scatter, counts)?;

        if !self.is_coordinator() {
            return recv_op(self, COORDINATOR, Collective::Scatter, Some(counts[self.rank()]));
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

        let mut offset = counts[COORDINATOR];
        for (peer, &count) in counts.iter().enumerate().skip(1) {
            send_op(self, peer, Collective::Scatter, &data[offset..offset + count])?;
            offset += count;
        }
        Ok(data[..counts[COORDINATOR]].to_vec())
    }

    /// Copies the coordinator's `buf` into every participant's `buf`.
    ///
    /// Receivers size `buf` beforehand to the length they expect; a payload
    /// of any other length is an error.
    fn broadcast<T: Element>(&self, buf: &mut Vec<T>) -> Result<(), GroupError> {
        if self.is_coordinator() {
            for peer in 1..self.size() {
                send_op(self, peer, Collective::Broadcast, buf.as_slice())?;
            }
        } else {
            *buf = recv_op(self, COORDINATOR, Collective::Broadcast, Some(buf.len()))?;
        }
        Ok(())
    }

    /// Concatenates every participant's `local` slice at the coordinator in
    /// rank order. Participant `p` must contribute exactly `counts[p]`
    /// elements.
    ///
    /// Returns `Some` at the coordinator and `None` everywhere else.
    fn gather<T: Element>(&self, local: &[T], counts: &[usize]) -> Result<Option<Vec<T>>, GroupError> {
        check_counts(self, Collective::Gather, counts)?;

        let rank = self.rank();
        if local.len() != counts[rank] {
            return Err(GroupError::SizeMismatch {
                op: Collective::Gather,
                peer: rank,
                expected: counts[rank],
                found: local.len(),
            });
        }

        if !self.is_coordinator() {
            send_op(self, COORDINATOR, Collective::Gather, local)?;
            return Ok(None);
        }

        let mut out = Vec::with_capacity(counts.iter().sum());
        out.extend_from_slice(local);
        for (peer, &count) in counts.iter().enumerate().skip(1) {
            let part: Vec<T> = recv_op(self, peer, Collective::Gather, Some(count))?;
            out.extend_from_slice(&part);
        }
        Ok(Some(out))
    }

    /// Tears the group down. Implementations that hold OS resources release
    /// them here.
    fn finalize(self) -> Result<(), GroupError>
    where
        Self: Sized,
    {
        Ok(())
    }
}

fn check_counts<G: Group + ?Sized>(group: &G, op: Collective, counts: &[usize]) -> Result<(), GroupError> {
    if counts.len() != group.size() {
        return Err(GroupError::CountsMismatch {
            op,
            size: group.size(),
            found: counts.len(),
        });
    }
    Ok(())
}

fn send_op<G: Group + ?Sized, T: Element>(
    group: &G,
    to: usize,
    op: Collective,
    data: &[T],
) -> Result<(), GroupError> {
    let frame = bincode::serialize(&FrameOut { op, data })?;
    log::trace!("{} -> {}: {} ({} elements)", group.rank(), to, op, data.len());
    group.send_frame(to, frame)
}

fn recv_op<G: Group + ?Sized, T: Element>(
    group: &G,
    from: usize,
    op: Collective,
    expected_len: Option<usize>,
) -> Result<Vec<T>, GroupError> {
    let bytes = group.recv_frame(from)?;
    let frame: FrameIn<T> = bincode::deserialize(&bytes)?;
    if frame.op != op {
        return Err(GroupError::Protocol {
            peer: from,
            expected: op,
            found: frame.op,
        });
    }
    if let Some(expected) = expected_len {
        if frame.data.len() != expected {
            return Err(GroupError::SizeMismatch {
                op,
                peer: from,
                expected,
                found: frame.data.len(),
            });
        }
    }
    Ok(frame.data)
}
