//! Patch layout of one refinement level: box array plus distribution map.
//!
//! A [`BoxLayout`] lists the cell-centered boxes of every patch on a level
//! together with the rank that owns each patch. All ranks hold the full
//! layout; a rank stores data only for the patches it owns.
//!
//! The problem dimension is a property of the whole layout: directions at or
//! beyond it hold the single index `0` and are never converted or grown. A
//! patch only one cell wide in a used direction is still a full patch.
//!
//! Each layout carries a [`LayoutId`] assigned at construction. Clones share
//! the id, so arrays allocated from one another can be checked for identical
//! partitioning without comparing box lists.

use crate::debug_invariants::DebugInvariants;
use crate::state_error::StateVecError;
use crate::topology::index_box::{Centering, IndexBox, SPACEDIM};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_LAYOUT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a layout.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayoutId(u64);

impl LayoutId {
    fn fresh() -> Self {
        LayoutId(NEXT_LAYOUT_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Box array + distribution map for one level.
///
/// # Invariants
/// - at least one patch;
/// - every box is non-empty;
/// - `owners.len() == boxes.len()`;
/// - every box holds only index `0` in directions `space_dim..`.
#[derive(Clone, Debug)]
pub struct BoxLayout {
    id: LayoutId,
    space_dim: usize,
    boxes: Vec<IndexBox>,
    owners: Vec<usize>,
}

impl BoxLayout {
    /// Build a layout from cell-centered patch boxes and their owning ranks.
    ///
    /// The problem dimension is the smallest one every box fits (see
    /// [`IndexBox::min_space_dim`]); use [`with_space_dim`](Self::with_space_dim)
    /// when all patches of a level happen to sit at index 0 of a used direction.
    ///
    /// # Errors
    /// `EmptyLayout` if `boxes` is empty, `LayoutOwnersMismatch` if the two
    /// lists differ in length, `InvalidBox` for an empty box.
    pub fn new(boxes: Vec<IndexBox>, owners: Vec<usize>) -> Result<Self, StateVecError> {
        let space_dim = boxes.iter().map(IndexBox::min_space_dim).max().unwrap_or(1);
        Self::with_space_dim(boxes, owners, space_dim)
    }

    /// Like [`new`](Self::new) with an explicit problem dimension.
    ///
    /// # Errors
    /// Those of `new`, plus `InvalidSpaceDim` outside `1..=3` and
    /// `SpaceDimMismatch` for a box using a direction beyond `space_dim`.
    pub fn with_space_dim(
        boxes: Vec<IndexBox>,
        owners: Vec<usize>,
        space_dim: usize,
    ) -> Result<Self, StateVecError> {
        let layout = Self {
            id: LayoutId::fresh(),
            space_dim,
            boxes,
            owners,
        };
        layout.validate_invariants()?;
        Ok(layout)
    }

    /// All patches owned by rank 0.
    pub fn serial(boxes: Vec<IndexBox>) -> Result<Self, StateVecError> {
        let owners = vec![0; boxes.len()];
        Self::new(boxes, owners)
    }

    /// Patch `i` goes to rank `i % n_ranks`.
    pub fn round_robin(boxes: Vec<IndexBox>, n_ranks: usize) -> Result<Self, StateVecError> {
        let n_ranks = n_ranks.max(1);
        let owners = (0..boxes.len()).map(|i| i % n_ranks).collect();
        Self::new(boxes, owners)
    }

    #[inline]
    pub fn id(&self) -> LayoutId {
        self.id
    }

    /// Number of used directions.
    #[inline]
    pub fn space_dim(&self) -> usize {
        self.space_dim
    }

    /// Number of patches.
    #[inline]
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Cell-centered box of patch `i`.
    #[inline]
    pub fn patch_box(&self, i: usize) -> IndexBox {
        self.boxes[i]
    }

    /// Box of patch `i` converted to `centering` in the used directions.
    #[inline]
    pub fn centered_box(&self, i: usize, centering: Centering) -> IndexBox {
        self.boxes[i].convert(centering, self.space_dim)
    }

    #[inline]
    pub fn owner(&self, i: usize) -> usize {
        self.owners[i]
    }

    pub fn boxes(&self) -> &[IndexBox] {
        &self.boxes
    }

    pub fn owners(&self) -> &[usize] {
        &self.owners
    }

    /// Indices of the patches owned by `rank`, ascending.
    pub fn local_patches(&self, rank: usize) -> impl Iterator<Item = usize> + '_ {
        self.owners
            .iter()
            .enumerate()
            .filter(move |&(_, &o)| o == rank)
            .map(|(i, _)| i)
    }

    /// Same box array, distribution map and problem dimension.
    ///
    /// Identity is checked first; structurally equal layouts built
    /// independently also match.
    pub fn same_partitioning(&self, other: &BoxLayout) -> bool {
        self.id == other.id
            || (self.space_dim == other.space_dim
                && self.boxes == other.boxes
                && self.owners == other.owners)
    }

    /// Every patch whose `centering`-converted box meets `query`, with the
    /// overlap, in patch order.
    pub fn intersections(&self, query: &IndexBox, centering: Centering) -> Vec<(usize, IndexBox)> {
        self.boxes
            .iter()
            .enumerate()
            .filter_map(|(i, b)| {
                b.convert(centering, self.space_dim)
                    .intersect(query)
                    .map(|x| (i, x))
            })
            .collect()
    }
}

impl PartialEq for BoxLayout {
    fn eq(&self, other: &Self) -> bool {
        self.same_partitioning(other)
    }
}

impl Eq for BoxLayout {}

impl DebugInvariants for BoxLayout {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "BoxLayout invalid");
    }

    fn validate_invariants(&self) -> Result<(), StateVecError> {
        if self.boxes.is_empty() {
            return Err(StateVecError::EmptyLayout);
        }
        if self.boxes.len() != self.owners.len() {
            return Err(StateVecError::LayoutOwnersMismatch {
                boxes: self.boxes.len(),
                owners: self.owners.len(),
            });
        }
        if !(1..=SPACEDIM).contains(&self.space_dim) {
            return Err(StateVecError::InvalidSpaceDim(self.space_dim));
        }
        if let Some(b) = self.boxes.iter().find(|b| b.is_empty()) {
            return Err(StateVecError::InvalidBox { lo: b.lo, hi: b.hi });
        }
        if let Some(b) = self.boxes.iter().find(|b| b.min_space_dim() > self.space_dim) {
            return Err(StateVecError::SpaceDimMismatch {
                expected: self.space_dim,
                found: b.min_space_dim(),
            });
        }
        Ok(())
    }
}
