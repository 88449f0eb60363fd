//! FieldArray: one scalar per mesh point of a level, distributed by patch.
//!
//! A `FieldArray<V>` couples a shared [`BoxLayout`] with the storage of the
//! patches the local rank owns. Each patch covers its valid box (the layout
//! box converted to the array's [`Centering`]) grown by `n_ghost` halo
//! layers. Halo values mirror neighbouring patches and are never owned.
//!
//! The elementwise primitives (`copy_from`, `plus`, `minus`, `saxpy`,
//! `lin_comb`) act on the valid region grown by a requested ghost width and
//! require both operands to share partitioning and centering. They run in
//! parallel over local patches.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use num_traits::Float;
use rayon::prelude::*;

use crate::algs::communicator::CommHandle;
use crate::data::storage::{Storage, VecStorage};
use crate::debug_invariants::DebugInvariants;
use crate::state_error::StateVecError;
use crate::topology::index_box::{Centering, IndexBox, IntVect};
use crate::topology::layout::BoxLayout;

/// Local storage for one patch.
#[derive(Clone, Debug)]
pub struct Patch<V, S = VecStorage<V>> {
    index: usize,
    valid: IndexBox,
    data_box: IndexBox,
    store: S,
    _marker: PhantomData<V>,
}

impl<V: Copy, S: Storage<V>> Patch<V, S> {
    fn alloc(index: usize, valid: IndexBox, n_ghost: usize, space_dim: usize, fill: V) -> Self {
        let data_box = valid.grow(n_ghost, space_dim);
        Self {
            index,
            valid,
            data_box,
            store: S::with_len(data_box.num_points(), fill),
            _marker: PhantomData,
        }
    }

    /// Patch index in the layout.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Centered box of points this patch is responsible for.
    #[inline]
    pub fn valid_box(&self) -> IndexBox {
        self.valid
    }

    /// Valid box grown by the halo width: every stored point.
    #[inline]
    pub fn data_box(&self) -> IndexBox {
        self.data_box
    }

    /// Stored values in x-fastest order over [`data_box`](Self::data_box).
    #[inline]
    pub fn values(&self) -> &[V] {
        self.store.as_slice()
    }

    #[inline]
    pub fn values_mut(&mut self) -> &mut [V] {
        self.store.as_mut_slice()
    }

    pub fn value_at(&self, p: &IntVect) -> Option<V> {
        self.data_box
            .offset_of(p)
            .and_then(|o| self.store.as_slice().get(o).copied())
    }
}

/// Distributed per-level array of `V`, one value per mesh point.
pub struct FieldArray<V, S = VecStorage<V>> {
    layout: Arc<BoxLayout>,
    centering: Centering,
    n_ghost: usize,
    comm: CommHandle,
    patches: Vec<Patch<V, S>>,
}

impl<V, S> fmt::Debug for FieldArray<V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldArray")
            .field("layout", &self.layout.id())
            .field("centering", &self.centering)
            .field("n_ghost", &self.n_ghost)
            .field("rank", &self.comm.rank())
            .field("local_patches", &self.patches.len())
            .finish()
    }
}

impl<V, S> FieldArray<V, S>
where
    V: Copy + Default + Send + Sync,
    S: Storage<V> + Send + Sync,
{
    /// Allocate the local patches of `layout` for the rank of `comm`, filled
    /// with `V::default()`.
    pub fn new(layout: Arc<BoxLayout>, centering: Centering, n_ghost: usize, comm: CommHandle) -> Self {
        let rank = comm.rank();
        let dim = layout.space_dim();
        let patches = layout
            .local_patches(rank)
            .map(|i| Patch::alloc(i, layout.centered_box(i, centering), n_ghost, dim, V::default()))
            .collect();
        let arr = Self {
            layout,
            centering,
            n_ghost,
            comm,
            patches,
        };
        #[cfg(any(debug_assertions, feature = "check-invariants"))]
        arr.debug_assert_invariants();
        arr
    }

    /// Allocate an array with the partitioning, centering and communicator
    /// of `template` and `n_ghost` halo layers, filled with `V::default()`.
    pub fn like<W, T>(template: &FieldArray<W, T>, n_ghost: usize) -> Self {
        Self::new(
            Arc::clone(&template.layout),
            template.centering,
            n_ghost,
            Arc::clone(&template.comm),
        )
    }

    /// Set every stored point, halo included, to `value`.
    pub fn set_val(&mut self, value: V) {
        self.patches
            .par_iter_mut()
            .for_each(|p| p.store.fill(value));
    }

    /// Set every stored point, halo included, from a function of its index.
    pub fn fill_with<F>(&mut self, f: F)
    where
        F: Fn(IntVect) -> V + Sync,
    {
        self.patches.par_iter_mut().for_each(|p| {
            let data_box = p.data_box;
            for (v, idx) in p.store.as_mut_slice().iter_mut().zip(data_box.points()) {
                *v = f(idx);
            }
        });
    }

    /// Value at `p` from the first local patch whose valid box contains it,
    /// falling back to halo copies.
    pub fn get(&self, p: &IntVect) -> Option<V> {
        self.patches
            .iter()
            .find(|patch| patch.valid.contains(p))
            .or_else(|| self.patches.iter().find(|patch| patch.data_box.contains(p)))
            .and_then(|patch| patch.value_at(p))
    }

    /// Write `value` into every local copy of point `p` (valid or halo).
    ///
    /// # Errors
    /// `PointOutOfRange` if no local patch stores `p`.
    pub fn set(&mut self, p: &IntVect, value: V) -> Result<(), StateVecError> {
        let mut hit = false;
        for patch in &mut self.patches {
            if let Some(o) = patch.data_box.offset_of(p) {
                patch.store.write_at(o, &[value])?;
                hit = true;
            }
        }
        if hit {
            Ok(())
        } else {
            Err(StateVecError::PointOutOfRange(*p))
        }
    }
}

impl<V, S> FieldArray<V, S> {
    #[inline]
    pub fn layout(&self) -> &BoxLayout {
        &self.layout
    }

    /// Shared handle to the layout.
    #[inline]
    pub fn layout_arc(&self) -> &Arc<BoxLayout> {
        &self.layout
    }

    #[inline]
    pub fn centering(&self) -> Centering {
        self.centering
    }

    #[inline]
    pub fn n_ghost(&self) -> usize {
        self.n_ghost
    }

    #[inline]
    pub fn comm(&self) -> &CommHandle {
        &self.comm
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    /// Local patches in ascending layout order.
    #[inline]
    pub fn patches(&self) -> &[Patch<V, S>] {
        &self.patches
    }

    #[inline]
    pub fn patches_mut(&mut self) -> &mut [Patch<V, S>] {
        &mut self.patches
    }

    /// Same box array, distribution map and centering.
    pub fn same_partitioning<W, T>(&self, other: &FieldArray<W, T>) -> bool {
        self.centering == other.centering && self.layout.same_partitioning(&other.layout)
    }

    fn check_binary<W, T>(&self, other: &FieldArray<W, T>, n_ghost: usize) -> Result<(), StateVecError> {
        if !self.same_partitioning(other) || self.patches.len() != other.patches.len() {
            return Err(StateVecError::PartitionMismatch {
                level: 0,
                component: 0,
            });
        }
        let available = self.n_ghost.min(other.n_ghost);
        if n_ghost > available {
            return Err(StateVecError::GhostTooWide {
                requested: n_ghost,
                available,
            });
        }
        Ok(())
    }
}

/// `(dst, src)` offsets of every point of `region` in two patch boxes.
fn paired_offsets<'a>(
    region: &'a IndexBox,
    dst: &'a IndexBox,
    src: &'a IndexBox,
) -> impl Iterator<Item = (usize, usize)> + 'a {
    region
        .points()
        .filter_map(move |p| Some((dst.offset_of(&p)?, src.offset_of(&p)?)))
}

impl<V, S> FieldArray<V, S>
where
    V: Float + Send + Sync,
    S: Storage<V> + Send + Sync,
{
    fn zip_apply<F>(&mut self, other: &Self, n_ghost: usize, op: F) -> Result<(), StateVecError>
    where
        F: Fn(&mut V, V) + Sync,
    {
        self.check_binary(other, n_ghost)?;
        let dim = self.layout.space_dim();
        self.patches
            .par_iter_mut()
            .zip(other.patches.par_iter())
            .for_each(|(d, s)| {
                let region = d.valid.grow(n_ghost, dim);
                if d.data_box == s.data_box && region == d.data_box {
                    for (x, &y) in d.store.as_mut_slice().iter_mut().zip(s.store.as_slice()) {
                        op(x, y);
                    }
                } else {
                    let (dst_box, src_box) = (d.data_box, s.data_box);
                    let src = s.store.as_slice();
                    let dst = d.store.as_mut_slice();
                    for (i, j) in paired_offsets(&region, &dst_box, &src_box) {
                        op(&mut dst[i], src[j]);
                    }
                }
            });
        Ok(())
    }

    /// `self = src` over the valid region grown by `n_ghost`.
    pub fn copy_from(&mut self, src: &Self, n_ghost: usize) -> Result<(), StateVecError> {
        self.zip_apply(src, n_ghost, |x, y| *x = y)
    }

    /// `self += src` over the valid region grown by `n_ghost`.
    pub fn plus(&mut self, src: &Self, n_ghost: usize) -> Result<(), StateVecError> {
        self.zip_apply(src, n_ghost, |x, y| *x = *x + y)
    }

    /// `self -= src` over the valid region grown by `n_ghost`.
    pub fn minus(&mut self, src: &Self, n_ghost: usize) -> Result<(), StateVecError> {
        self.zip_apply(src, n_ghost, |x, y| *x = *x - y)
    }

    /// `self += a * x` over the valid region grown by `n_ghost`.
    pub fn saxpy(&mut self, a: V, x: &Self, n_ghost: usize) -> Result<(), StateVecError> {
        self.zip_apply(x, n_ghost, move |d, s| *d = *d + a * s)
    }

    /// Multiply every stored value, halo included, by `a`.
    pub fn mult(&mut self, a: V) {
        self.patches.par_iter_mut().for_each(|p| {
            for v in p.store.as_mut_slice() {
                *v = *v * a;
            }
        });
    }

    /// `self = a * x + b * y` over the valid region grown by `n_ghost`.
    ///
    /// `self` must not alias `x` or `y`; the borrow checker enforces that.
    pub fn lin_comb(&mut self, a: V, x: &Self, b: V, y: &Self, n_ghost: usize) -> Result<(), StateVecError> {
        self.check_binary(x, n_ghost)?;
        self.check_binary(y, n_ghost)?;
        let dim = self.layout.space_dim();
        self.patches
            .par_iter_mut()
            .zip(x.patches.par_iter().zip(y.patches.par_iter()))
            .for_each(|(d, (px, py))| {
                let region = d.valid.grow(n_ghost, dim);
                let fast = region == d.data_box
                    && d.data_box == px.data_box
                    && d.data_box == py.data_box;
                let (xs, ys) = (px.store.as_slice(), py.store.as_slice());
                let dst_box = d.data_box;
                let dst = d.store.as_mut_slice();
                if fast {
                    for ((v, &xv), &yv) in dst.iter_mut().zip(xs).zip(ys) {
                        *v = a * xv + b * yv;
                    }
                } else {
                    for p in region.points() {
                        if let (Some(i), Some(j), Some(k)) = (
                            dst_box.offset_of(&p),
                            px.data_box.offset_of(&p),
                            py.data_box.offset_of(&p),
                        ) {
                            dst[i] = a * xs[j] + b * ys[k];
                        }
                    }
                }
            });
        Ok(())
    }
}

impl<V, S> DebugInvariants for FieldArray<V, S>
where
    S: Storage<V>,
{
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "FieldArray invalid");
    }

    fn validate_invariants(&self) -> Result<(), StateVecError> {
        self.layout.validate_invariants()?;
        let rank = self.comm.rank();
        let expected = self.layout.local_patches(rank).count();
        if expected != self.patches.len() {
            return Err(StateVecError::PartitionMismatch {
                level: 0,
                component: 0,
            });
        }
        for p in &self.patches {
            let owner = self.layout.owner(p.index);
            if owner != rank {
                return Err(StateVecError::ForeignPatch {
                    patch: p.index,
                    owner,
                    rank,
                });
            }
            let want = p.valid.grow(self.n_ghost, self.layout.space_dim()).num_points();
            if p.store.len() != want {
                return Err(StateVecError::PatchSizeMismatch {
                    patch: p.index,
                    expected: want,
                    found: p.store.len(),
                });
            }
        }
        Ok(())
    }
}
