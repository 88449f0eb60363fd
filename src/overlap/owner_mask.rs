//! Owner/duplicate classification of mesh points.
//!
//! A mesh point can be stored more than once: on two patches sharing a
//! nodal face, as a periodic image across the domain boundary, in a halo
//! layer, or on a coarse level underneath a finer one. The owner mask picks
//! exactly one owner per set of coincident points:
//!
//! 1. points of a patch's valid box start owned, halo points never are;
//! 2. for every periodic shift `s` (zero included) and every patch `j` that
//!    meets `valid_i + s`, the overlap shifted back by `-s` is a duplicate on
//!    patch `i` when `j < i`, or when `j == i` and `s` is lexicographically
//!    negative;
//! 3. optionally, coarse points covered by the next finer level are
//!    duplicates.
//!
//! Rule 2 makes the owner the copy on the lowest-index patch, and within that
//! patch the lexicographically smallest periodic image.

use std::cmp::Ordering;

use log::debug;
use rayon::prelude::*;

use crate::algs::reduction::owned_count;
use crate::data::field_array::FieldArray;
use crate::data::storage::Storage;
use crate::debug_invariants::DebugInvariants;
use crate::solver::config::MaskPolicy;
use crate::state_error::StateVecError;
use crate::topology::geometry::Geometry;
use crate::topology::index_box::{IntVect, SPACEDIM, ZERO, lex_cmp};
use crate::topology::layout::BoxLayout;

/// Per-point owner flags aligned with one field array: 1 = owned, 0 = duplicate.
pub type MaskArray = FieldArray<u8>;

/// Classify every stored point of `array` on a level with geometry `geom`.
pub fn owner_mask<V, S>(array: &FieldArray<V, S>, geom: &Geometry) -> MaskArray {
    let mut mask = MaskArray::like(array, array.n_ghost());
    let layout = array.layout();
    let centering = array.centering();
    let shifts = geom.periodic_shifts();

    mask.patches_mut().par_iter_mut().for_each(|patch| {
        let i = patch.index();
        let valid = patch.valid_box();
        let data_box = patch.data_box();
        let flags = patch.values_mut();
        for (w, p) in flags.iter_mut().zip(data_box.points()) {
            *w = u8::from(valid.contains(&p));
        }
        for s in &shifts {
            let negative = lex_cmp(s, &ZERO) == Ordering::Less;
            let back = negate(s);
            for (j, overlap) in layout.intersections(&valid.shift(s), centering) {
                if j < i || (j == i && negative) {
                    for p in overlap.shift(&back).points() {
                        if let Some(o) = data_box.offset_of(&p) {
                            flags[o] = 0;
                        }
                    }
                }
            }
        }
    });
    mask
}

/// Mark coarse points covered by `fine_layout` (refined by `ratio`) as duplicates.
pub fn exclude_covered(mask: &mut MaskArray, fine_layout: &BoxLayout, ratio: &IntVect) {
    let centering = mask.centering();
    let covered: Vec<_> = (0..fine_layout.len())
        .map(|i| fine_layout.centered_box(i, centering).coarsen_covered(ratio, centering))
        .collect();
    mask.patches_mut().par_iter_mut().for_each(|patch| {
        let valid = patch.valid_box();
        let data_box = patch.data_box();
        let flags = patch.values_mut();
        for region in covered.iter().filter_map(|c| c.intersect(&valid)) {
            for p in region.points() {
                if let Some(o) = data_box.offset_of(&p) {
                    flags[o] = 0;
                }
            }
        }
    });
}

fn negate(s: &IntVect) -> IntVect {
    let mut out = ZERO;
    for d in 0..SPACEDIM {
        out[d] = -s[d];
    }
    out
}

/// Owner masks for every (level, component) of a set of arrays.
///
/// Built once, read by every dot product over the same geometry, and cleared
/// explicitly by the driver that owns it.
#[derive(Debug, Default)]
pub struct OwnershipMask {
    built: bool,
    policy: MaskPolicy,
    masks: Vec<Vec<MaskArray>>,
}

impl OwnershipMask {
    pub fn new(policy: MaskPolicy) -> Self {
        Self {
            built: false,
            policy,
            masks: Vec::new(),
        }
    }

    #[inline]
    pub fn is_built(&self) -> bool {
        self.built
    }

    #[inline]
    pub fn policy(&self) -> MaskPolicy {
        self.policy
    }

    /// Classify the points of `arrays[level][component]` using one geometry
    /// per level. A no-op when already built.
    ///
    /// # Errors
    /// `GeometryCount` if `geoms.len() != arrays.len()`, `SpaceDimMismatch`
    /// if a layout and its level geometry disagree on the problem dimension,
    /// `InvalidRefinement` if adjacent level domains are not integer
    /// refinements of each other (only checked when covered coarse points are
    /// excluded).
    pub fn build<V, S>(&mut self, geoms: &[Geometry], arrays: &[Vec<FieldArray<V, S>>]) -> Result<(), StateVecError>
    where
        S: Storage<V>,
    {
        if self.built {
            return Ok(());
        }
        if geoms.len() != arrays.len() {
            return Err(StateVecError::GeometryCount {
                expected: arrays.len(),
                found: geoms.len(),
            });
        }
        for (level, geom) in arrays.iter().zip(geoms) {
            if let Some(a) = level.iter().find(|a| a.layout().space_dim() != geom.space_dim()) {
                return Err(StateVecError::SpaceDimMismatch {
                    expected: geom.space_dim(),
                    found: a.layout().space_dim(),
                });
            }
        }
        let mut masks: Vec<Vec<MaskArray>> = arrays
            .iter()
            .zip(geoms)
            .map(|(level, geom)| level.iter().map(|a| owner_mask(a, geom)).collect())
            .collect();

        if self.policy.exclude_covered_coarse {
            for lev in 0..masks.len().saturating_sub(1) {
                let ratio = geoms[lev].refinement_ratio(&geoms[lev + 1])?;
                for (comp, mask) in masks[lev].iter_mut().enumerate() {
                    if let Some(fine) = arrays[lev + 1].get(comp) {
                        exclude_covered(mask, fine.layout(), &ratio);
                    }
                }
            }
        }

        for (lev, level) in masks.iter().enumerate() {
            for (comp, mask) in level.iter().enumerate() {
                let owned = owned_count(mask);
                let stored: usize = mask.patches().iter().map(|p| p.values().len()).sum();
                debug!(
                    "owner mask rank {} level {lev} component {comp}: {owned} owned, {} duplicate",
                    mask.rank(),
                    stored - owned
                );
            }
        }

        self.masks = masks;
        self.built = true;
        #[cfg(any(debug_assertions, feature = "check-invariants"))]
        self.debug_assert_invariants();
        Ok(())
    }

    /// Release all mask storage; the mask must be rebuilt before further use.
    pub fn clear(&mut self) {
        self.masks.clear();
        self.built = false;
    }

    /// Owner flags of `(level, component)`.
    ///
    /// # Errors
    /// `MaskNotBuilt` before `build` or after `clear`; `MaskMisaligned` for a
    /// slot the mask does not have.
    pub fn weights(&self, level: usize, component: usize) -> Result<&MaskArray, StateVecError> {
        if !self.built {
            return Err(StateVecError::MaskNotBuilt);
        }
        self.masks
            .get(level)
            .and_then(|l| l.get(component))
            .ok_or(StateVecError::MaskMisaligned { level, component })
    }

    /// Locally owned point count of `(level, component)`.
    pub fn owned_points(&self, level: usize, component: usize) -> Result<usize, StateVecError> {
        self.weights(level, component).map(owned_count)
    }

    pub fn n_levels(&self) -> usize {
        self.masks.len()
    }
}

impl DebugInvariants for OwnershipMask {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "OwnershipMask invalid");
    }

    fn validate_invariants(&self) -> Result<(), StateVecError> {
        if !self.built {
            return if self.masks.is_empty() {
                Ok(())
            } else {
                Err(StateVecError::MaskNotBuilt)
            };
        }
        for level in &self.masks {
            for mask in level {
                mask.validate_invariants()?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::topology::index_box::{Centering, IndexBox};
    use std::sync::Arc;

    fn array(boxes: Vec<IndexBox>, centering: Centering, n_ghost: usize) -> FieldArray<f64> {
        let layout = Arc::new(BoxLayout::serial(boxes).unwrap());
        FieldArray::new(layout, centering, n_ghost, NoComm::handle())
    }

    fn flags(mask: &MaskArray) -> Vec<Vec<u8>> {
        mask.patches().iter().map(|p| p.values().to_vec()).collect()
    }

    #[test]
    fn cell_centered_patches_own_everything() {
        let a = array(vec![IndexBox::line(0, 3), IndexBox::line(4, 7)], Centering::CELL, 0);
        let g = Geometry::bounded(IndexBox::line(0, 7)).unwrap();
        let m = owner_mask(&a, &g);
        assert_eq!(owned_count(&m), 8);
    }

    #[test]
    fn shared_node_goes_to_lower_patch() {
        let a = array(vec![IndexBox::line(0, 3), IndexBox::line(4, 7)], Centering::NODE, 0);
        let g = Geometry::bounded(IndexBox::line(0, 7)).unwrap();
        let m = owner_mask(&a, &g);
        assert_eq!(flags(&m), vec![vec![1; 5], vec![0, 1, 1, 1, 1]]);
    }

    #[test]
    fn periodic_nodal_image_is_duplicate() {
        let a = array(vec![IndexBox::line(0, 7)], Centering::NODE, 0);
        let g = Geometry::new(IndexBox::line(0, 7), [true, false, false]).unwrap();
        let m = owner_mask(&a, &g);
        let mut want = vec![1u8; 9];
        want[8] = 0;
        assert_eq!(flags(&m), vec![want]);
    }

    #[test]
    fn periodic_image_on_another_patch() {
        let a = array(vec![IndexBox::line(0, 3), IndexBox::line(4, 7)], Centering::NODE, 0);
        let g = Geometry::new(IndexBox::line(0, 7), [true, false, false]).unwrap();
        let m = owner_mask(&a, &g);
        // node 8 on patch 1 is the image of node 0 on patch 0
        assert_eq!(flags(&m), vec![vec![1; 5], vec![0, 1, 1, 1, 0]]);
        assert_eq!(owned_count(&m), 8);
    }

    #[test]
    fn doubly_periodic_corner_has_one_owner() {
        let a = array(vec![IndexBox::plane([0, 0], [3, 3])], Centering::NODE, 0);
        let g = Geometry::new(IndexBox::plane([0, 0], [3, 3]), [true, true, false]).unwrap();
        let m = owner_mask(&a, &g);
        assert_eq!(owned_count(&m), 16);
        let patch = &m.patches()[0];
        assert_eq!(patch.value_at(&[0, 0, 0]), Some(1));
        for corner in [[4, 0, 0], [0, 4, 0], [4, 4, 0]] {
            assert_eq!(patch.value_at(&corner), Some(0));
        }
    }

    #[test]
    fn halo_points_are_never_owned() {
        let a = array(vec![IndexBox::line(0, 3), IndexBox::line(4, 7)], Centering::CELL, 2);
        let g = Geometry::bounded(IndexBox::line(0, 7)).unwrap();
        let m = owner_mask(&a, &g);
        assert_eq!(owned_count(&m), 8);
        assert_eq!(m.patches()[0].values().len(), 8);
    }

    #[test]
    fn covered_coarse_points_are_excluded() {
        let coarse = array(vec![IndexBox::line(0, 7)], Centering::NODE, 0);
        let fine = array(vec![IndexBox::line(4, 11)], Centering::NODE, 0);
        let gc = Geometry::bounded(IndexBox::line(0, 7)).unwrap();
        let gf = Geometry::bounded(IndexBox::line(0, 15)).unwrap();
        let arrays = vec![vec![coarse], vec![fine]];

        let mut mask = OwnershipMask::new(MaskPolicy::default());
        mask.build(&[gc, gf], &arrays).unwrap();
        // fine nodes 4..=12 cover coarse nodes 2..=6
        assert_eq!(mask.owned_points(0, 0).unwrap(), 9 - 5);
        assert_eq!(mask.owned_points(1, 0).unwrap(), 9);

        let mut single_level = OwnershipMask::new(MaskPolicy {
            exclude_covered_coarse: false,
        });
        single_level.build(&[gc, gf], &arrays).unwrap();
        assert_eq!(single_level.owned_points(0, 0).unwrap(), 9);
    }

    #[test]
    fn build_is_idempotent_and_clear_resets() {
        let a = array(vec![IndexBox::line(0, 3)], Centering::CELL, 0);
        let g = Geometry::bounded(IndexBox::line(0, 3)).unwrap();
        let arrays = vec![vec![a]];
        let mut mask = OwnershipMask::new(MaskPolicy::default());
        assert_eq!(mask.weights(0, 0).unwrap_err(), StateVecError::MaskNotBuilt);
        mask.build(&[g], &arrays).unwrap();
        mask.build(&[], &arrays).unwrap(); // already built: ignored
        assert_eq!(mask.owned_points(0, 0).unwrap(), 4);
        assert!(matches!(mask.weights(0, 1), Err(StateVecError::MaskMisaligned { level: 0, component: 1 })));
        mask.clear();
        assert!(!mask.is_built());
        assert_eq!(mask.n_levels(), 0);
        assert_eq!(mask.owned_points(0, 0).unwrap_err(), StateVecError::MaskNotBuilt);
    }

    #[test]
    fn one_cell_patch_keeps_its_upper_node() {
        let a = array(vec![IndexBox::line(0, 3), IndexBox::line(4, 4)], Centering::NODE, 1);
        let g = Geometry::bounded(IndexBox::line(0, 4)).unwrap();
        let m = owner_mask(&a, &g);
        // nodes 0..=5: node 4 is shared, node 5 only lives on the thin patch
        assert_eq!(owned_count(&m), 6);
        assert_eq!(flags(&m)[1], vec![0, 0, 1, 0]);
    }

    #[test]
    fn dimension_disagreement_is_an_error() {
        let flat = array(vec![IndexBox::plane([0, 0], [7, 0])], Centering::NODE, 0);
        let g = Geometry::bounded(IndexBox::plane([0, 0], [7, 3])).unwrap();
        let mut mask = OwnershipMask::new(MaskPolicy::default());
        let err = mask.build(&[g], &[vec![flat]]).unwrap_err();
        assert_eq!(err, StateVecError::SpaceDimMismatch { expected: 2, found: 1 });
    }

    #[test]
    fn geometry_count_is_checked() {
        let a = array(vec![IndexBox::line(0, 3)], Centering::CELL, 0);
        let mut mask = OwnershipMask::new(MaskPolicy::default());
        let err = mask.build(&[], &[vec![a]]).unwrap_err();
        assert_eq!(err, StateVecError::GeometryCount { expected: 1, found: 0 });
    }
}
