#![allow(dead_code)]
use std::sync::Arc;

use mesh_solver_vec::prelude::*;
use mesh_solver_vec::topology::IntVect;

/// `n` equal patches tiling cells `0..n*len` along x.
pub fn line_boxes(n: i64, len: i64) -> Vec<IndexBox> {
    (0..n).map(|i| IndexBox::line(i * len, (i + 1) * len - 1)).collect()
}

/// `n x n` equal patches tiling an x–y plane of `n*len` cells per side.
pub fn plane_boxes(n: i64, len: i64) -> Vec<IndexBox> {
    let mut boxes = Vec::new();
    for j in 0..n {
        for i in 0..n {
            boxes.push(IndexBox::plane([i * len, j * len], [(i + 1) * len - 1, (j + 1) * len - 1]));
        }
    }
    boxes
}

/// One level, one array per centering, all on `layout` with a one-cell halo.
pub fn level_arrays(layout: &Arc<BoxLayout>, centerings: &[Centering], comm: &CommHandle) -> Vec<FieldArray<Real>> {
    centerings
        .iter()
        .map(|&c| FieldArray::new(Arc::clone(layout), c, 1, Arc::clone(comm)))
        .collect()
}

/// Serial single-level templates over `boxes`.
pub fn serial_level(boxes: Vec<IndexBox>, centerings: &[Centering]) -> Vec<Vec<FieldArray<Real>>> {
    let layout = Arc::new(BoxLayout::serial(boxes).unwrap());
    vec![level_arrays(&layout, centerings, &NoComm::handle())]
}

/// Defined vector over `templates` with its ownership mask taken from `registry`.
pub fn masked_vector(
    templates: &[Vec<FieldArray<Real>>],
    geoms: &[Geometry],
    registry: &MaskRegistry,
    policy: MaskPolicy,
) -> StateVector {
    let mut v = StateVector::with_config(StateVecConfig {
        shape: VecShape::new(templates.len(), templates[0].len()),
        mask_policy: policy,
    });
    v.define(templates);
    v.try_set_dot_mask_in(registry, geoms).unwrap();
    v
}

/// Fill every slot from `f(level, component, point)`.
pub fn fill<F>(v: &mut StateVector, f: F)
where
    F: Fn(usize, usize, IntVect) -> Real + Sync,
{
    let shape = v.shape();
    for lev in 0..shape.n_levels {
        for comp in 0..shape.n_components {
            let f = &f;
            v.array_mut(lev, comp).unwrap().fill_with(move |p| f(lev, comp, p));
        }
    }
}

/// Small integer pattern, periodic with period `l` in x and y. Integer values
/// keep every sum exact, whatever the summation order.
pub fn periodic_pattern(comp: usize, p: IntVect, l: i64) -> Real {
    let (i, j) = (p[0].rem_euclid(l), p[1].rem_euclid(l));
    ((i + 2 * j + 3 * comp as i64) % 5 - 2) as Real
}

pub fn assert_close(a: Real, b: Real) {
    let tol = 1e-9 * (1.0 + a.abs().max(b.abs()));
    assert!((a - b).abs() <= tol, "{a} != {b}");
}
