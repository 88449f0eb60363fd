//! Mesh collaborator types: index boxes, patch layouts and level geometry.

pub mod geometry;
pub mod index_box;
pub mod layout;

pub use geometry::Geometry;
pub use index_box::{Centering, IndexBox, IntVect, SPACEDIM};
pub use layout::{BoxLayout, LayoutId};
