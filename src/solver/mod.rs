//! Solver-facing vector types.

pub mod config;
pub mod state_vec;
pub mod traits;

pub use config::{MaskPolicy, StateVecConfig, VecShape};
pub use state_vec::StateVector;
pub use traits::SolverVector;
