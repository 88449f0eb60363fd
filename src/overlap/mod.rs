//! Ownership of duplicated mesh points.
//!
//! [`owner_mask`] classifies stored points as owned or duplicate;
//! [`registry`] caches the resulting masks per partitioning so every vector
//! of a solve shares one.

pub mod owner_mask;
pub mod registry;

pub use owner_mask::{MaskArray, OwnershipMask};
pub use registry::{MaskKey, MaskRegistry, SharedMask};
