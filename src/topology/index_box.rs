//! Integer index boxes and staggering on a block-structured mesh.
//!
//! An [`IndexBox`] is an inclusive `lo..=hi` range of integer mesh indices.
//! Patches of a [`BoxLayout`](crate::topology::layout::BoxLayout) are stored
//! cell-centered; a field component converts them to its own [`Centering`]
//! before touching data. A nodal direction extends `hi` by one, which is what
//! makes neighbouring patches share points on their common face.

use itertools::iproduct;
use std::cmp::Ordering;

/// Number of stored directions. A problem of dimension `space_dim < SPACEDIM`
/// uses directions `0..space_dim` and keeps the single index `0` in the others.
pub const SPACEDIM: usize = 3;

/// Integer mesh index, one entry per direction.
pub type IntVect = [i64; SPACEDIM];

/// The origin index.
pub const ZERO: IntVect = [0; SPACEDIM];

/// Lexicographic comparison, first direction most significant.
#[inline]
pub fn lex_cmp(a: &IntVect, b: &IntVect) -> Ordering {
    a.iter().cmp(b.iter())
}

/// Per-direction staggering of a field component: `true` = nodal.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct Centering(pub [bool; SPACEDIM]);

impl Centering {
    /// Cell-centered in every direction.
    pub const CELL: Centering = Centering([false; SPACEDIM]);
    /// Nodal in every direction.
    pub const NODE: Centering = Centering([true; SPACEDIM]);

    /// Edge-centered along `dir`: cell-centered in `dir`, nodal elsewhere
    /// (the Yee-grid electric field component `E_dir`).
    pub fn edge(dir: usize) -> Self {
        let mut nodal = [true; SPACEDIM];
        nodal[dir] = false;
        Centering(nodal)
    }

    /// Face-centered normal to `dir`: nodal in `dir` only
    /// (the Yee-grid magnetic field component `B_dir`).
    pub fn face(dir: usize) -> Self {
        let mut nodal = [false; SPACEDIM];
        nodal[dir] = true;
        Centering(nodal)
    }

    #[inline]
    pub fn is_nodal(&self, dir: usize) -> bool {
        self.0[dir]
    }
}

/// Inclusive integer box `lo..=hi`. Empty when `hi < lo` in any direction.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct IndexBox {
    pub lo: IntVect,
    pub hi: IntVect,
}

impl IndexBox {
    #[inline]
    pub const fn new(lo: IntVect, hi: IntVect) -> Self {
        Self { lo, hi }
    }

    /// One-dimensional box `lo..=hi` along x with degenerate y and z.
    pub const fn line(lo: i64, hi: i64) -> Self {
        Self::new([lo, 0, 0], [hi, 0, 0])
    }

    /// Two-dimensional box in the x–y plane with degenerate z.
    pub const fn plane(lo: [i64; 2], hi: [i64; 2]) -> Self {
        Self::new([lo[0], lo[1], 0], [hi[0], hi[1], 0])
    }

    /// Smallest problem dimension this box fits: one past the highest
    /// direction holding an index other than `0`, at least 1.
    pub fn min_space_dim(&self) -> usize {
        (0..SPACEDIM)
            .rev()
            .find(|&d| self.lo[d] != 0 || self.hi[d] != 0)
            .map_or(1, |d| d + 1)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        (0..SPACEDIM).any(|d| self.hi[d] < self.lo[d])
    }

    /// Number of indices along `dir` (zero for an empty extent).
    #[inline]
    pub fn length(&self, dir: usize) -> i64 {
        (self.hi[dir] - self.lo[dir] + 1).max(0)
    }

    /// Total number of points in the box.
    pub fn num_points(&self) -> usize {
        (0..SPACEDIM).map(|d| self.length(d) as usize).product()
    }

    pub fn contains(&self, p: &IntVect) -> bool {
        (0..SPACEDIM).all(|d| self.lo[d] <= p[d] && p[d] <= self.hi[d])
    }

    /// True when `other` lies entirely inside `self`.
    pub fn contains_box(&self, other: &IndexBox) -> bool {
        other.is_empty() || (self.contains(&other.lo) && self.contains(&other.hi))
    }

    /// Intersection, or `None` if the boxes do not overlap.
    pub fn intersect(&self, other: &IndexBox) -> Option<IndexBox> {
        let mut lo = ZERO;
        let mut hi = ZERO;
        for d in 0..SPACEDIM {
            lo[d] = self.lo[d].max(other.lo[d]);
            hi[d] = self.hi[d].min(other.hi[d]);
        }
        let b = IndexBox::new(lo, hi);
        (!b.is_empty()).then_some(b)
    }

    pub fn shift(&self, s: &IntVect) -> IndexBox {
        let mut out = *self;
        for d in 0..SPACEDIM {
            out.lo[d] += s[d];
            out.hi[d] += s[d];
        }
        out
    }

    /// Grow by `n` layers in the first `space_dim` directions.
    pub fn grow(&self, n: usize, space_dim: usize) -> IndexBox {
        let n = n as i64;
        let mut out = *self;
        for d in 0..space_dim.min(SPACEDIM) {
            out.lo[d] -= n;
            out.hi[d] += n;
        }
        out
    }

    /// Convert a cell-centered box to `centering`: nodal directions among the
    /// first `space_dim` gain one index at the upper end. Unused directions
    /// keep their single index whatever the centering.
    pub fn convert(&self, centering: Centering, space_dim: usize) -> IndexBox {
        let mut out = *self;
        for d in 0..space_dim.min(SPACEDIM) {
            if centering.is_nodal(d) {
                out.hi[d] += 1;
            }
        }
        out
    }

    /// Coarse indices whose points are covered by this (fine, centered) box
    /// under refinement `ratio`.
    ///
    /// Cell directions use `floor(lo/r)..=floor(hi/r)` (fine boxes are assumed
    /// aligned to the coarse grid); nodal directions keep only the coarse nodes
    /// that coincide with a fine node, `ceil(lo/r)..=floor(hi/r)`.
    pub fn coarsen_covered(&self, ratio: &IntVect, centering: Centering) -> IndexBox {
        let mut out = *self;
        for d in 0..SPACEDIM {
            let r = ratio[d].max(1);
            out.hi[d] = self.hi[d].div_euclid(r);
            out.lo[d] = if centering.is_nodal(d) {
                -((-self.lo[d]).div_euclid(r))
            } else {
                self.lo[d].div_euclid(r)
            };
        }
        out
    }

    /// Linear offset of `p` in x-fastest order, or `None` if outside.
    #[inline]
    pub fn offset_of(&self, p: &IntVect) -> Option<usize> {
        if !self.contains(p) {
            return None;
        }
        let mut off = 0usize;
        let mut stride = 1usize;
        for d in 0..SPACEDIM {
            off += (p[d] - self.lo[d]) as usize * stride;
            stride *= self.length(d) as usize;
        }
        Some(off)
    }

    /// Iterate all points in x-fastest (Fortran) order.
    pub fn points(&self) -> impl Iterator<Item = IntVect> + '_ {
        let empty = self.is_empty();
        let (lo, hi) = if empty { (ZERO, [-1; SPACEDIM]) } else { (self.lo, self.hi) };
        iproduct!(lo[2]..=hi[2], lo[1]..=hi[1], lo[0]..=hi[0]).map(|(k, j, i)| [i, j, k])
    }
}
