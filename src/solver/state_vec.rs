//! `StateVector`: the unknown of an implicit field solve.
//!
//! A state vector packs one [`FieldArray`] per (refinement level, field
//! component) slot, all without halo layers, and provides the vector-space
//! operations Newton/Krylov iterations need. Data lives on the patches each
//! rank owns; only [`dot_product`](StateVector::dot_product) and
//! [`norm2`](StateVector::norm2) communicate.
//!
//! Points stored more than once (patch boundaries, periodic images, coarse
//! points under a finer level) must count once in inner products. The
//! ownership mask that decides this is built once per partitioning by
//! [`set_dot_mask`](StateVector::set_dot_mask), shared by every vector through
//! the process-wide [`MaskRegistry`], and released by
//! [`clear_dot_mask`](StateVector::clear_dot_mask).
//!
//! Every operation has a `try_*` form returning [`StateVecError`] and a
//! panicking form for solver code that treats a violated precondition as a
//! fatal error.
//!
//! ```ignore
//! let mut x = StateVector::new(VecShape::new(1, 3));
//! x.define(&efield_arrays);
//! x.set_dot_mask(&[geom]);
//! let mut r = StateVector::new(x.shape());
//! r.define_like(&x);
//! r.lin_comb(1.0, &b, -1.0, &ax);
//! let res = r.norm2();
//! ```

use std::ops::{AddAssign, SubAssign};

use log::{debug, trace};
use static_assertions::{assert_impl_all, assert_not_impl_any};

use crate::Real;
use crate::algs::communicator::CommHandle;
use crate::algs::reduction::{global_sum, local_masked_dot};
use crate::data::field_array::FieldArray;
use crate::data::storage::Storage;
use crate::debug_invariants::DebugInvariants;
use crate::overlap::registry::{MaskKey, MaskRegistry, SharedMask};
use crate::solver::config::{StateVecConfig, VecShape};
use crate::state_error::StateVecError;
use crate::topology::geometry::Geometry;

/// Distributed multi-level, multi-component solver vector.
///
/// Not `Clone`: copies are explicit through [`copy_from`](Self::copy_from) or
/// [`deep_copy`](Self::deep_copy). Transfer of ownership is a Rust move, or
/// [`move_from`](Self::move_from) to replace the contents of an existing vector.
#[derive(Debug, Default)]
pub struct StateVector {
    config: StateVecConfig,
    defined: bool,
    levels: Vec<Vec<FieldArray<Real>>>,
    /// Mask handle and the key it was requested under.
    mask: Option<(MaskKey, SharedMask)>,
}

assert_impl_all!(StateVector: Send, Sync);
assert_not_impl_any!(StateVector: Clone, Copy);

fn fatal<T>(op: &str, r: Result<T, StateVecError>) -> T {
    match r {
        Ok(v) => v,
        Err(e) => panic!("[state-vec] {op}: {e}"),
    }
}

/// Attach the slot coordinates to an error raised by a single-array primitive.
fn at_slot(e: StateVecError, level: usize, component: usize) -> StateVecError {
    match e {
        StateVecError::PartitionMismatch { .. } => StateVecError::PartitionMismatch { level, component },
        StateVecError::MaskMisaligned { .. } => StateVecError::MaskMisaligned { level, component },
        other => other,
    }
}

impl StateVector {
    /// Undefined vector of the given shape with the default mask policy.
    pub fn new(shape: VecShape) -> Self {
        Self::with_config(StateVecConfig {
            shape,
            ..StateVecConfig::default()
        })
    }

    pub fn with_config(config: StateVecConfig) -> Self {
        Self {
            config,
            defined: false,
            levels: Vec::new(),
            mask: None,
        }
    }

    #[inline]
    pub fn is_defined(&self) -> bool {
        self.defined
    }

    #[inline]
    pub fn shape(&self) -> VecShape {
        self.config.shape
    }

    #[inline]
    pub fn config(&self) -> &StateVecConfig {
        &self.config
    }

    #[inline]
    pub fn n_levels(&self) -> usize {
        self.config.shape.n_levels
    }

    #[inline]
    pub fn n_components(&self) -> usize {
        self.config.shape.n_components
    }

    /// Arrays by level, then component. Empty while undefined.
    pub fn levels(&self) -> &[Vec<FieldArray<Real>>] {
        &self.levels
    }

    pub fn array(&self, level: usize, component: usize) -> Option<&FieldArray<Real>> {
        self.levels.get(level).and_then(|l| l.get(component))
    }

    pub fn array_mut(&mut self, level: usize, component: usize) -> Option<&mut FieldArray<Real>> {
        self.levels.get_mut(level).and_then(|l| l.get_mut(component))
    }

    /// True once a built ownership mask is attached.
    pub fn has_dot_mask(&self) -> bool {
        self.mask.as_ref().is_some_and(|(_, m)| m.read().is_built())
    }

    fn check_defined(&self, op: &'static str) -> Result<(), StateVecError> {
        if self.defined {
            Ok(())
        } else {
            Err(StateVecError::Undefined { op })
        }
    }

    /// Both defined, same shape, slot-wise identical partitioning.
    fn check_operand(&self, other: &StateVector, op: &'static str) -> Result<(), StateVecError> {
        self.check_defined(op)?;
        other.check_defined(op)?;
        if self.shape() != other.shape() {
            return Err(StateVecError::ShapeMismatch {
                expected: self.shape().as_tuple(),
                found: other.shape().as_tuple(),
            });
        }
        for (lev, (xs, ys)) in self.levels.iter().zip(&other.levels).enumerate() {
            for (comp, (x, y)) in xs.iter().zip(ys).enumerate() {
                if !x.same_partitioning(y) {
                    return Err(StateVecError::PartitionMismatch {
                        level: lev,
                        component: comp,
                    });
                }
            }
        }
        Ok(())
    }

    /// Apply `f(self[l][c], other[l][c])` to every slot.
    fn zip_slots<F>(&mut self, other: &StateVector, op: &'static str, mut f: F) -> Result<(), StateVecError>
    where
        F: FnMut(&mut FieldArray<Real>, &FieldArray<Real>) -> Result<(), StateVecError>,
    {
        self.check_operand(other, op)?;
        for (lev, (xs, ys)) in self.levels.iter_mut().zip(&other.levels).enumerate() {
            for (comp, (x, y)) in xs.iter_mut().zip(ys).enumerate() {
                f(x, y).map_err(|e| at_slot(e, lev, comp))?;
            }
        }
        Ok(())
    }

    fn comm(&self) -> Result<&CommHandle, StateVecError> {
        self.levels
            .first()
            .and_then(|l| l.first())
            .map(FieldArray::comm)
            .ok_or(StateVecError::Undefined { op: "comm" })
    }

    // --- definition and copies ---

    /// Allocate ghost-free arrays with the partitioning, centering and
    /// communicator of `templates[level][component]`. Values start at zero.
    ///
    /// # Errors
    /// - `AlreadyDefined` if called twice;
    /// - `ShapeMismatch` if `templates` is not `n_levels x n_components`;
    /// - `PartitionMismatch` if the components of one level do not share a
    ///   box layout.
    pub fn try_define<V, S>(&mut self, templates: &[Vec<FieldArray<V, S>>]) -> Result<(), StateVecError>
    where
        S: Storage<V>,
    {
        if self.defined {
            return Err(StateVecError::AlreadyDefined);
        }
        let expected = self.shape().as_tuple();
        let bad_shape = expected.0 == 0
            || expected.1 == 0
            || templates.len() != expected.0
            || templates.iter().any(|l| l.len() != expected.1);
        if bad_shape {
            let found_comps = templates
                .iter()
                .map(Vec::len)
                .find(|&n| n != expected.1)
                .unwrap_or(expected.1);
            return Err(StateVecError::ShapeMismatch {
                expected,
                found: (templates.len(), found_comps),
            });
        }
        for (lev, level) in templates.iter().enumerate() {
            let first = level[0].layout();
            if let Some(comp) = level.iter().position(|t| !t.layout().same_partitioning(first)) {
                return Err(StateVecError::PartitionMismatch {
                    level: lev,
                    component: comp,
                });
            }
        }

        self.levels = templates
            .iter()
            .map(|level| level.iter().map(|t| FieldArray::like(t, 0)).collect())
            .collect();
        self.defined = true;
        #[cfg(any(debug_assertions, feature = "check-invariants"))]
        self.debug_assert_invariants();
        debug!(
            "StateVector defined: {} level(s) x {} component(s), {} local patch(es) on rank {}",
            expected.0,
            expected.1,
            self.levels.iter().flatten().map(|a| a.patches().len()).sum::<usize>(),
            self.levels[0][0].rank()
        );
        Ok(())
    }

    pub fn define<V, S>(&mut self, templates: &[Vec<FieldArray<V, S>>])
    where
        S: Storage<V>,
    {
        fatal("define", self.try_define(templates))
    }

    /// Define with the layout of another defined vector (values are not
    /// copied). Picks up `other`'s ownership mask when this vector has none.
    pub fn try_define_like(&mut self, other: &StateVector) -> Result<(), StateVecError> {
        other.check_defined("define_like")?;
        self.try_define(&other.levels)?;
        if self.mask.is_none() {
            self.mask = other.mask.clone();
        }
        Ok(())
    }

    pub fn define_like(&mut self, other: &StateVector) {
        fatal("define_like", self.try_define_like(other))
    }

    /// Deep copy of `src`'s values. An undefined vector first takes `src`'s
    /// configuration and layout.
    pub fn try_copy_from(&mut self, src: &StateVector) -> Result<(), StateVecError> {
        src.check_defined("copy_from")?;
        if !self.defined {
            self.config = src.config;
            self.try_define_like(src)?;
        }
        self.zip_slots(src, "copy_from", |x, y| x.copy_from(y, 0))
    }

    pub fn copy_from(&mut self, src: &StateVector) {
        fatal("copy_from", self.try_copy_from(src))
    }

    /// Copy the valid points of external arrays (halos allowed) into this vector.
    pub fn try_copy_from_fields<S>(&mut self, fields: &[Vec<FieldArray<Real, S>>]) -> Result<(), StateVecError>
    where
        S: Storage<Real> + Send + Sync,
    {
        self.check_defined("copy_from_fields")?;
        self.check_field_shape(fields.len(), fields.iter().map(Vec::len))?;
        for (lev, (xs, fs)) in self.levels.iter_mut().zip(fields).enumerate() {
            for (comp, (x, f)) in xs.iter_mut().zip(fs).enumerate() {
                copy_valid(x, f).map_err(|e| at_slot(e, lev, comp))?;
            }
        }
        Ok(())
    }

    pub fn copy_from_fields<S>(&mut self, fields: &[Vec<FieldArray<Real, S>>])
    where
        S: Storage<Real> + Send + Sync,
    {
        fatal("copy_from_fields", self.try_copy_from_fields(fields))
    }

    /// Write this vector's values into the valid points of external arrays.
    /// Halo points of `fields` are left untouched.
    pub fn try_copy_to_fields<S>(&self, fields: &mut [Vec<FieldArray<Real, S>>]) -> Result<(), StateVecError>
    where
        S: Storage<Real> + Send + Sync,
    {
        self.check_defined("copy_to_fields")?;
        self.check_field_shape(fields.len(), fields.iter().map(Vec::len))?;
        for (lev, (xs, fs)) in self.levels.iter().zip(fields.iter_mut()).enumerate() {
            for (comp, (x, f)) in xs.iter().zip(fs.iter_mut()).enumerate() {
                copy_valid(f, x).map_err(|e| at_slot(e, lev, comp))?;
            }
        }
        Ok(())
    }

    pub fn copy_to_fields<S>(&self, fields: &mut [Vec<FieldArray<Real, S>>])
    where
        S: Storage<Real> + Send + Sync,
    {
        fatal("copy_to_fields", self.try_copy_to_fields(fields))
    }

    fn check_field_shape<I>(&self, n_levels: usize, comps: I) -> Result<(), StateVecError>
    where
        I: IntoIterator<Item = usize>,
    {
        let expected = self.shape().as_tuple();
        let mut found = (n_levels, expected.1);
        if let Some(bad) = comps.into_iter().find(|&n| n != expected.1) {
            found.1 = bad;
        }
        if found == expected {
            Ok(())
        } else {
            Err(StateVecError::ShapeMismatch { expected, found })
        }
    }

    /// Replace this vector's contents with `src`'s, taking ownership of its
    /// arrays. The ownership mask travels with the data; if `src` has none,
    /// neither has this vector afterwards.
    pub fn move_from(&mut self, src: StateVector) {
        let StateVector {
            config,
            defined,
            levels,
            mask,
        } = src;
        self.config = config;
        self.defined = defined;
        self.levels = levels;
        self.mask = mask;
    }

    /// Independent vector with the same layout, values and mask.
    pub fn try_deep_copy(&self) -> Result<StateVector, StateVecError> {
        let mut out = StateVector::with_config(self.config);
        out.try_copy_from(self)?;
        Ok(out)
    }

    pub fn deep_copy(&self) -> StateVector {
        fatal("deep_copy", self.try_deep_copy())
    }

    // --- arithmetic ---

    pub fn try_add_assign(&mut self, rhs: &StateVector) -> Result<(), StateVecError> {
        self.zip_slots(rhs, "add_assign", |x, y| x.plus(y, 0))
    }

    pub fn try_sub_assign(&mut self, rhs: &StateVector) -> Result<(), StateVecError> {
        self.zip_slots(rhs, "sub_assign", |x, y| x.minus(y, 0))
    }

    /// `self = a * x + b * y`.
    pub fn try_lin_comb(&mut self, a: Real, x: &StateVector, b: Real, y: &StateVector) -> Result<(), StateVecError> {
        self.check_operand(x, "lin_comb")?;
        self.check_operand(y, "lin_comb")?;
        for (lev, (ds, (xs, ys))) in self
            .levels
            .iter_mut()
            .zip(x.levels.iter().zip(&y.levels))
            .enumerate()
        {
            for (comp, (d, (xa, ya))) in ds.iter_mut().zip(xs.iter().zip(ys)).enumerate() {
                d.lin_comb(a, xa, b, ya, 0).map_err(|e| at_slot(e, lev, comp))?;
            }
        }
        Ok(())
    }

    pub fn lin_comb(&mut self, a: Real, x: &StateVector, b: Real, y: &StateVector) {
        fatal("lin_comb", self.try_lin_comb(a, x, b, y))
    }

    /// `self += a * x`.
    pub fn try_increment(&mut self, x: &StateVector, a: Real) -> Result<(), StateVecError> {
        self.zip_slots(x, "increment", |d, s| d.saxpy(a, s, 0))
    }

    pub fn increment(&mut self, x: &StateVector, a: Real) {
        fatal("increment", self.try_increment(x, a))
    }

    /// `self *= a`.
    pub fn try_scale(&mut self, a: Real) -> Result<(), StateVecError> {
        self.check_defined("scale")?;
        self.levels.iter_mut().flatten().for_each(|x| x.mult(a));
        Ok(())
    }

    pub fn scale(&mut self, a: Real) {
        fatal("scale", self.try_scale(a))
    }

    pub fn try_set_value(&mut self, value: Real) -> Result<(), StateVecError> {
        self.check_defined("set_value")?;
        self.levels.iter_mut().flatten().for_each(|x| x.set_val(value));
        Ok(())
    }

    pub fn set_value(&mut self, value: Real) {
        fatal("set_value", self.try_set_value(value))
    }

    pub fn try_zero(&mut self) -> Result<(), StateVecError> {
        self.try_set_value(0.0)
    }

    pub fn zero(&mut self) {
        fatal("zero", self.try_zero())
    }

    // --- inner products ---

    /// Global inner product counting every physical point once.
    ///
    /// Collective: all ranks must call it together. The local part is a
    /// masked sum per slot; the global part is one reduction.
    ///
    /// # Errors
    /// `Undefined`, `ShapeMismatch`, `PartitionMismatch` as for every binary
    /// operation, `MaskNotBuilt` unless [`set_dot_mask`](Self::set_dot_mask)
    /// was called (and not cleared since).
    pub fn try_dot_product(&self, other: &StateVector) -> Result<Real, StateVecError> {
        self.check_operand(other, "dot_product")?;
        let (_, shared) = self.mask.as_ref().ok_or(StateVecError::MaskNotBuilt)?;
        let local = {
            let mask = shared.read();
            let mut local = 0.0;
            for (lev, (xs, ys)) in self.levels.iter().zip(&other.levels).enumerate() {
                for (comp, (x, y)) in xs.iter().zip(ys).enumerate() {
                    let w = mask.weights(lev, comp).map_err(|e| at_slot(e, lev, comp))?;
                    local += local_masked_dot(x, y, w).map_err(|e| at_slot(e, lev, comp))?;
                }
            }
            local
        };
        let comm = self.comm()?;
        let global = global_sum(comm.as_ref(), local)?;
        trace!("dot_product rank {}: local {local:e}, global {global:e}", comm.rank());
        Ok(global)
    }

    pub fn dot_product(&self, other: &StateVector) -> Real {
        fatal("dot_product", self.try_dot_product(other))
    }

    /// `sqrt(dot_product(self, self))`.
    pub fn try_norm2(&self) -> Result<Real, StateVecError> {
        Ok(self.try_dot_product(self)?.sqrt())
    }

    pub fn norm2(&self) -> Real {
        fatal("norm2", self.try_norm2())
    }

    // --- ownership mask ---

    /// Build (or reuse) the ownership mask for this vector's partitioning,
    /// one geometry per level, from the process-wide registry.
    pub fn try_set_dot_mask(&mut self, geoms: &[Geometry]) -> Result<(), StateVecError> {
        self.try_set_dot_mask_in(MaskRegistry::global(), geoms)
    }

    pub fn set_dot_mask(&mut self, geoms: &[Geometry]) {
        fatal("set_dot_mask", self.try_set_dot_mask(geoms))
    }

    /// Like [`try_set_dot_mask`](Self::try_set_dot_mask) with an explicit registry.
    ///
    /// Idempotent for the same geometries: a vector already holding a built
    /// mask for them keeps it. Different geometries replace the held mask.
    pub fn try_set_dot_mask_in(&mut self, registry: &MaskRegistry, geoms: &[Geometry]) -> Result<(), StateVecError> {
        self.check_defined("set_dot_mask")?;
        let key = MaskKey::new(geoms, &self.levels, self.config.mask_policy)?;
        if self.has_dot_mask() && self.mask.as_ref().is_some_and(|(held, _)| *held == key) {
            return Ok(());
        }
        let shared = registry.get_or_build(geoms, &self.levels, self.config.mask_policy)?;
        self.mask = Some((key, shared));
        Ok(())
    }

    /// Release every mask of the process-wide registry. Vectors that held one
    /// must call [`set_dot_mask`](Self::set_dot_mask) again before the next
    /// dot product.
    pub fn clear_dot_mask() {
        MaskRegistry::global().clear();
    }
}

/// `dst = src` on the valid points of `dst`, whatever halo either side carries.
fn copy_valid<S, T>(dst: &mut FieldArray<Real, S>, src: &FieldArray<Real, T>) -> Result<(), StateVecError>
where
    S: Storage<Real>,
    T: Storage<Real>,
{
    if !dst.same_partitioning(src) || dst.patches().len() != src.patches().len() {
        return Err(StateVecError::PartitionMismatch {
            level: 0,
            component: 0,
        });
    }
    for (d, s) in dst.patches_mut().iter_mut().zip(src.patches()) {
        let valid = d.valid_box();
        let (dst_box, src_box) = (d.data_box(), s.data_box());
        let (from, to) = (s.values(), d.values_mut());
        for p in valid.points() {
            if let (Some(i), Some(j)) = (dst_box.offset_of(&p), src_box.offset_of(&p)) {
                to[i] = from[j];
            }
        }
    }
    Ok(())
}

impl AddAssign<&StateVector> for StateVector {
    fn add_assign(&mut self, rhs: &StateVector) {
        fatal("+=", self.try_add_assign(rhs))
    }
}

impl SubAssign<&StateVector> for StateVector {
    fn sub_assign(&mut self, rhs: &StateVector) {
        fatal("-=", self.try_sub_assign(rhs))
    }
}

impl DebugInvariants for StateVector {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "StateVector invalid");
    }

    fn validate_invariants(&self) -> Result<(), StateVecError> {
        if !self.defined {
            return Ok(());
        }
        let expected = self.shape().as_tuple();
        let found = (self.levels.len(), self.levels.first().map_or(0, Vec::len));
        if found != expected || self.levels.iter().any(|l| l.len() != expected.1) {
            return Err(StateVecError::ShapeMismatch { expected, found });
        }
        for (lev, level) in self.levels.iter().enumerate() {
            for (comp, a) in level.iter().enumerate() {
                a.validate_invariants().map_err(|e| at_slot(e, lev, comp))?;
                if a.n_ghost() != 0 {
                    return Err(StateVecError::GhostTooWide {
                        requested: a.n_ghost(),
                        available: 0,
                    });
                }
                if !a.layout().same_partitioning(level[0].layout()) {
                    return Err(StateVecError::PartitionMismatch {
                        level: lev,
                        component: comp,
                    });
                }
            }
        }
        Ok(())
    }
}
