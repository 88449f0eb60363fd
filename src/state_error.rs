//! StateVecError: Unified error type for mesh-solver-vec public APIs
//!
//! Every `try_*` operation returns this error. The infallible counterparts
//! panic with its message, since a violated precondition here is a bug in
//! the calling solver rather than a runtime condition.

use crate::topology::index_box::IntVect;
use thiserror::Error;

/// Unified error type for state-vector, mask and mesh-collaborator operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateVecError {
    /// A vector operation was called on (or with) a vector that was never defined.
    #[error("{op} called with an undefined StateVector")]
    Undefined { op: &'static str },
    /// `define` was called on a vector that is already defined.
    #[error("StateVector is already defined; redefinition is not allowed")]
    AlreadyDefined,
    /// Template or operand does not match the vector's (levels, components) shape.
    #[error("shape mismatch: expected {expected:?} (levels, components), found {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },
    /// Two operands differ in box layout, distribution or centering.
    #[error("partitioning mismatch at level {level}, component {component}")]
    PartitionMismatch { level: usize, component: usize },
    /// The dot product was requested before the ownership mask was built,
    /// or after it was cleared.
    #[error("ownership mask is not built (call set_dot_mask before dot_product)")]
    MaskNotBuilt,
    /// The shared mask does not line up with the vector's arrays.
    #[error("ownership mask is not aligned with vector data at level {level}, component {component}")]
    MaskMisaligned { level: usize, component: usize },
    /// Number of per-level geometries differs from the number of levels.
    #[error("expected {expected} level geometries, found {found}")]
    GeometryCount { expected: usize, found: usize },
    /// A box with `hi < lo` in some direction was used where a non-empty box is required.
    #[error("invalid (empty) box: lo={lo:?}, hi={hi:?}")]
    InvalidBox { lo: IntVect, hi: IntVect },
    /// Box list and owner list of a layout have different lengths.
    #[error("layout has {boxes} boxes but {owners} owners")]
    LayoutOwnersMismatch { boxes: usize, owners: usize },
    /// A layout with no patches.
    #[error("layout must contain at least one patch")]
    EmptyLayout,
    /// Two level domains are not related by a positive integer ratio.
    #[error("level domains are not related by an integer refinement ratio")]
    InvalidRefinement,
    /// An operation asked for more ghost points than an operand stores.
    #[error("requested {requested} ghost layers but only {available} are stored")]
    GhostTooWide { requested: usize, available: usize },
    /// Problem dimension outside `1..=SPACEDIM`.
    #[error("problem dimension must be between 1 and 3, got {0}")]
    InvalidSpaceDim(usize),
    /// A box uses a direction the problem dimension leaves unused, or a layout
    /// and the level geometry disagree on the problem dimension.
    #[error("problem dimension mismatch: expected {expected}, found {found}")]
    SpaceDimMismatch { expected: usize, found: usize },
    /// A point lies outside every local patch of the array.
    #[error("point {0:?} is not stored by any local patch")]
    PointOutOfRange(IntVect),
    /// Patch storage length does not match its data box.
    #[error("patch {patch} stores {found} values but its box holds {expected}")]
    PatchSizeMismatch {
        patch: usize,
        expected: usize,
        found: usize,
    },
    /// An array holds data for a patch the layout assigns to another rank.
    #[error("patch {patch} is owned by rank {owner}, not local rank {rank}")]
    ForeignPatch {
        patch: usize,
        owner: usize,
        rank: usize,
    },
    /// A slice write or read fell outside patch storage.
    #[error("storage range out of bounds: offset {offset}, len {len}")]
    StorageRange { offset: usize, len: usize },
    /// Communication backend failure.
    #[error("communication error: {0}")]
    CommError(String),
}
