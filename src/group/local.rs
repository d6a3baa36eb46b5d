//! In-process group: every participant is a thread.
//!
//! Each ordered pair of participants gets its own unbounded channel, so a
//! receive from participant `p` only ever sees frames `p` sent. When a
//! participant's thread ends, its senders drop and peers waiting on it get
//! [`GroupError::Disconnected`] instead of hanging.

use crossbeam::channel::{self, Receiver, Sender};

use super::{Group, GroupError};

pub struct LocalGroup {
    rank: usize,
    outboxes: Vec<Sender<Vec<u8>>>,
    inboxes: Vec<Receiver<Vec<u8>>>,
}

impl LocalGroup {
    /// Builds the handles for a group of `size` participants, indexed by rank.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero.
    pub fn create(size: usize) -> Vec<LocalGroup> {
        assert!(size > 0, "a group needs at least one participant");

        // links[from][to]
        let links: Vec<Vec<(Sender<Vec<u8>>, Receiver<Vec<u8>>)>> = (0..size)
            .map(|_| (0..size).map(|_| channel::unbounded()).collect())
            .collect();

        (0..size)
            .map(|rank| LocalGroup {
                rank,
                outboxes: (0..size).map(|to| links[rank][to].0.clone()).collect(),
                inboxes: (0..size).map(|from| links[from][rank].1.clone()).collect(),
            })
            .collect()
    }

    /// Runs `f` once per participant, each on its own scoped thread, and
    /// returns the results in rank order.
    ///
    /// A participant that panics is reported as [`GroupError::Panicked`].
    pub fn run<F, R>(size: usize, f: F) -> Result<Vec<R>, GroupError>
    where
        F: Fn(LocalGroup) -> R + Sync,
        R: Send,
    {
        let groups = LocalGroup::create(size);
        let f = &f;

        let joined = crossbeam::thread::scope(|s| {
            let handles: Vec<_> = groups
                .into_iter()
                .map(|group| s.spawn(move |_| f(group)))
                .collect();

            handles
                .into_iter()
                .enumerate()
                .map(|(rank, handle)| handle.join().map_err(|_| GroupError::Panicked { rank }))
                .collect::<Result<Vec<R>, GroupError>>()
        });

        // Scope errors only surface panics already reported per handle.
        joined.unwrap_or(Err(GroupError::Panicked { rank: 0 }))
    }
}

impl Group for LocalGroup {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.outboxes.len()
    }

    fn send_frame(&self, to: usize, frame: Vec<u8>) -> Result<(), GroupError> {
        let outbox = self.outboxes.get(to).ok_or(GroupError::NoRoute {
            from: self.rank,
            to,
        })?;
        outbox
            .send(frame)
            .map_err(|_| GroupError::Disconnected { peer: to })
    }

    fn recv_frame(&self, from: usize) -> Result<Vec<u8>, GroupError> {
        let inbox = self.inboxes.get(from).ok_or(GroupError::NoRoute {
            from,
            to: self.rank,
        })?;
        inbox
            .recv()
            .map_err(|_| GroupError::Disconnected { peer: from })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::Collective;

    #[test]
    fn ranks_and_size() {
        let ranks = LocalGroup::run(4, |g| (g.rank(), g.size())).unwrap();
        assert_eq!(ranks, vec![(0, 4), (1, 4), (2, 4), (3, 4)]);
    }

    #[test]
    fn scatter_hands_out_disjoint_slices() {
        let data: Vec<f64> = (0..10).map(f64::from).collect();
        let counts = [4, 0, 3, 3];

        let parts = LocalGroup::run(4, |g| {
            let send = g.is_coordinator().then_some(data.as_slice());
            g.scatter(send, &counts).unwrap()
        })
        .unwrap();

        assert_eq!(parts[0], vec![0.0, 1.0, 2.0, 3.0]);
        assert!(parts[1].is_empty());
        assert_eq!(parts[2], vec![4.0, 5.0, 6.0]);
        assert_eq!(parts[3], vec![7.0, 8.0, 9.0]);
    }

    #[test]
    fn broadcast_replicates() {
        let out = LocalGroup::run(3, |g| {
            let mut buf = if g.is_coordinator() {
                vec![5u64, 6, 7]
            } else {
                vec![0u64; 3]
            };
            g.broadcast(&mut buf).unwrap();
            buf
        })
        .unwrap();

        assert!(out.iter().all(|b| b == &[5, 6, 7]));
    }

    #[test]
    fn gather_concatenates_in_rank_order() {
        let counts = [1, 2, 0];
        let out = LocalGroup::run(3, |g| {
            let local: Vec<f64> = vec![g.rank() as f64; counts[g.rank()]];
            g.barrier().unwrap();
            g.gather(&local, &counts).unwrap()
        })
        .unwrap();

        assert_eq!(out[0], Some(vec![0.0, 1.0, 1.0]));
        assert_eq!(out[1], None);
        assert_eq!(out[2], None);
    }

    #[test]
    fn broadcast_length_mismatch_is_reported() {
        let out = LocalGroup::run(2, |g| {
            let mut buf = if g.is_coordinator() {
                vec![1.0, 2.0, 3.0]
            } else {
                vec![0.0; 2]
            };
            g.broadcast(&mut buf)
        })
        .unwrap();

        assert!(out[0].is_ok());
        assert!(matches!(
            out[1],
            Err(GroupError::SizeMismatch {
                op: Collective::Broadcast,
                expected: 2,
                found: 3,
                ..
            })
        ));
    }

    #[test]
    fn scatter_rejects_root_data_not_covering_counts() {
        let data = [1.0, 2.0, 3.0, 4.0];
        let out = LocalGroup::run(2, |g| {
            let send = g.is_coordinator().then_some(&data[..]);
            g.scatter(send, &[3, 2])
        })
        .unwrap();

        assert!(matches!(
            out[0],
            Err(GroupError::SizeMismatch {
                op: Collective::Scatter,
                peer: 0,
                expected: 5,
                found: 4,
            })
        ));
        // The coordinator bailed out, so nothing ever reaches the peer.
        assert!(matches!(out[1], Err(GroupError::Disconnected { peer: 0 })));
    }

    #[test]
    fn gather_rejects_local_slice_of_wrong_length() {
        let counts = [1, 2];
        let out = LocalGroup::run(2, |g| {
            let local = vec![0.5; 1];
            g.gather(&local, &counts)
        })
        .unwrap();

        assert!(matches!(
            out[1],
            Err(GroupError::SizeMismatch {
                op: Collective::Gather,
                peer: 1,
                expected: 2,
                found: 1,
            })
        ));
        assert!(matches!(out[0], Err(GroupError::Disconnected { peer: 1 })));
    }

    #[test]
    fn wrong_collective_is_a_protocol_error() {
        let out = LocalGroup::run(2, |g| {
            if g.is_coordinator() {
                let mut buf = vec![1.0];
                g.broadcast(&mut buf)?;
                // Stay alive until the peer's barrier frame lands.
                g.recv_frame(1).map(|_| ())
            } else {
                g.barrier()
            }
        })
        .unwrap();

        assert!(matches!(
            out[1],
            Err(GroupError::Protocol {
                expected: Collective::Barrier,
                found: Collective::Broadcast,
                ..
            })
        ));
    }

    #[test]
    fn departed_peer_disconnects() {
        let out = LocalGroup::run(2, |g| {
            if g.is_coordinator() {
                g.recv_frame(1).map(|_| ())
            } else {
                Ok(())
            }
        })
        .unwrap();

        assert!(matches!(out[0], Err(GroupError::Disconnected { peer: 1 })));
    }
}
