//! Re-export public algorithms.

pub mod communicator;
pub mod reduction;

pub use communicator::{CommHandle, Communicator, NoComm, RayonComm};
pub use reduction::{global_sum, local_masked_dot};
