#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-solver-vec
//!
//! Distributed state vectors for implicit field solves on block-structured,
//! adaptively refined meshes. A [`StateVector`](solver::StateVector) packs one
//! field array per (refinement level, field component) and offers the
//! vector-space operations a Newton or Krylov iteration needs, with an inner
//! product that counts every physical mesh point exactly once, however many
//! patches, periodic images or refinement levels store it.
//!
//! ## Features
//! - Box layouts, geometries and staggered (cell/edge/face/node) field arrays
//! - Owner/duplicate classification of mesh points, shared per partitioning
//! - Pluggable communication backends (serial, threads, MPI) for the one
//!   global reduction a dot product needs
//! - Serial, multi-rank and property-based tests
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! mesh-solver-vec = "0.1"
//! # Optional features:
//! # features = ["mpi-support", "check-invariants"]
//! ```
//!
//! ```
//! use std::sync::Arc;
//! use mesh_solver_vec::prelude::*;
//!
//! let layout = Arc::new(BoxLayout::serial(vec![IndexBox::line(0, 3)]).unwrap());
//! let efield = vec![vec![FieldArray::<Real>::new(layout, Centering::CELL, 1, NoComm::handle())]];
//! let geom = Geometry::bounded(IndexBox::line(0, 3)).unwrap();
//!
//! let mut x = StateVector::new(VecShape::new(1, 1));
//! x.define(&efield);
//! x.try_set_dot_mask_in(&MaskRegistry::new(), &[geom]).unwrap();
//! x.array_mut(0, 0).unwrap().fill_with(|p| 1.0 + p[0] as Real);
//! assert!((x.norm2() - 30.0_f64.sqrt()).abs() < 1e-12);
//! ```
//!
//! ## Mask lifetime
//!
//! Masks built through [`StateVector::set_dot_mask`](solver::StateVector::set_dot_mask)
//! live in a process-wide registry until
//! [`StateVector::clear_dot_mask`](solver::StateVector::clear_dot_mask) is
//! called, typically once at the end of a run.

pub mod algs;
pub mod data;
pub mod debug_invariants;
pub mod fields;
pub mod overlap;
pub mod solver;
pub mod state_error;
pub mod topology;

pub use debug_invariants::DebugInvariants;
pub use state_error::StateVecError;

/// Scalar type of every field value.
pub type Real = f64;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::Real;
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::communicator::{CommHandle, Communicator, NoComm, RayonComm};
    pub use crate::data::field_array::FieldArray;
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::fields::{FieldType, SolverVecKind};
    pub use crate::overlap::registry::MaskRegistry;
    pub use crate::solver::{MaskPolicy, SolverVector, StateVecConfig, StateVector, VecShape};
    pub use crate::state_error::StateVecError;
    pub use crate::topology::{BoxLayout, Centering, Geometry, IndexBox};
}
