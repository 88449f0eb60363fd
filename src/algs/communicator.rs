//! Thin façade over intra-process (threads) or inter-process (MPI) collectives.
//!
//! The state vector needs exactly one collective: an element-wise sum of a
//! small `f64` buffer across all ranks. Backends:
//! - [`NoComm`]: a single rank; the reduction is the identity.
//! - [`RayonComm`]: `n` ranks emulated by threads of one process, exchanging
//!   contributions through a process-wide mailbox.
//! - `MpiComm` (feature `mpi-support`): `MPI_Allreduce` with `MPI_SUM`.
//!
//! Every backend returns the bitwise-identical sum on all ranks.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::state_error::StateVecError;

/// Collective communication interface (minimal by design).
pub trait Communicator: Send + Sync + 'static {
    /// This process's rank in `0..size()`.
    fn rank(&self) -> usize;

    /// Number of ranks.
    fn size(&self) -> usize;

    /// Replace `buf` with its element-wise sum over all ranks.
    ///
    /// Collective: every rank must call it with a buffer of the same length.
    fn allreduce_sum(&self, buf: &mut [f64]) -> Result<(), StateVecError>;

    /// True for the serial no-op backend.
    fn is_no_comm(&self) -> bool {
        false
    }
}

/// Shared, type-erased communicator handle held by every array.
pub type CommHandle = Arc<dyn Communicator>;

/// Compile-time no-op comm for pure serial runs and unit tests.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl NoComm {
    pub fn handle() -> CommHandle {
        Arc::new(NoComm)
    }
}

impl Communicator for NoComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn allreduce_sum(&self, _buf: &mut [f64]) -> Result<(), StateVecError> {
        Ok(())
    }

    fn is_no_comm(&self) -> bool {
        true
    }
}

// --- RayonComm: intra-process / multi-thread ---
type Key = (u64, u64, usize); // (group, epoch, rank)

static MAILBOX: Lazy<DashMap<Key, Bytes>> = Lazy::new(DashMap::new);
static DONE: Lazy<DashMap<(u64, u64), usize>> = Lazy::new(DashMap::new);
static NEXT_GROUP: AtomicU64 = AtomicU64::new(1);

/// One rank of a thread-emulated communicator group.
///
/// Each rank must be driven by its own thread; a collective blocks until all
/// ranks of the group have contributed.
#[derive(Debug)]
pub struct RayonComm {
    group: u64,
    rank: usize,
    size: usize,
    epoch: AtomicU64,
}

impl RayonComm {
    /// Create a fresh group of `size` ranks, isolated from every other group.
    pub fn world(size: usize) -> Vec<Self> {
        let size = size.max(1);
        let group = NEXT_GROUP.fetch_add(1, Ordering::Relaxed);
        (0..size)
            .map(|rank| Self {
                group,
                rank,
                size,
                epoch: AtomicU64::new(0),
            })
            .collect()
    }

    /// Like [`world`](Self::world), returning shared handles.
    pub fn handles(size: usize) -> Vec<CommHandle> {
        Self::world(size)
            .into_iter()
            .map(|c| Arc::new(c) as CommHandle)
            .collect()
    }
}

impl Communicator for RayonComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn allreduce_sum(&self, buf: &mut [f64]) -> Result<(), StateVecError> {
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel);
        let payload = Bytes::copy_from_slice(bytemuck::cast_slice::<f64, u8>(&*buf));
        MAILBOX.insert((self.group, epoch, self.rank), payload);

        let mut total = vec![0.0f64; buf.len()];
        // Sum in rank order so every rank sees the same rounding.
        for peer in 0..self.size {
            let key = (self.group, epoch, peer);
            let bytes = loop {
                if let Some(b) = MAILBOX.get(&key) {
                    break b.value().clone();
                }
                std::thread::yield_now();
            };
            if bytes.len() != std::mem::size_of_val(buf) {
                return Err(StateVecError::CommError(format!(
                    "rank {peer} contributed {} bytes, expected {}",
                    bytes.len(),
                    std::mem::size_of_val(buf)
                )));
            }
            let vals: Vec<f64> = bytes
                .chunks_exact(8)
                .map(|c| bytemuck::pod_read_unaligned::<f64>(c))
                .collect();
            for (t, v) in total.iter_mut().zip(vals) {
                *t += v;
            }
        }
        buf.copy_from_slice(&total);

        // Last reader retires the epoch.
        let finished = {
            let mut n = DONE.entry((self.group, epoch)).or_insert(0);
            *n += 1;
            *n == self.size
        };
        if finished {
            DONE.remove(&(self.group, epoch));
            for peer in 0..self.size {
                MAILBOX.remove(&(self.group, epoch, peer));
            }
        }
        Ok(())
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::{Arc, Communicator, StateVecError};
    use mpi::collective::SystemOperation;
    use mpi::environment::Universe;
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::{Communicator as _, CommunicatorCollectives as _};

    pub struct MpiComm {
        // Dropping the universe finalizes MPI.
        _universe: Arc<Universe>,
        world: SimpleCommunicator,
        rank: usize,
        size: usize,
    }

    // SAFETY: collectives are issued from a single control thread (the
    // solver driver serializes calls); the handle is only moved, never used
    // concurrently.
    unsafe impl Send for MpiComm {}
    unsafe impl Sync for MpiComm {}

    impl MpiComm {
        pub fn new() -> Result<Self, StateVecError> {
            let universe = mpi::initialize()
                .ok_or_else(|| StateVecError::CommError("MPI already initialized".into()))?;
            let world = universe.world();
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Ok(Self {
                _universe: Arc::new(universe),
                world,
                rank,
                size,
            })
        }
    }

    impl Communicator for MpiComm {
        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn allreduce_sum(&self, buf: &mut [f64]) -> Result<(), StateVecError> {
            let local = buf.to_vec();
            self.world
                .all_reduce_into(&local[..], buf, SystemOperation::sum());
            Ok(())
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;
