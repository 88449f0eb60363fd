mod util;
use util::*;

use mesh_solver_vec::prelude::*;
use proptest::prelude::*;

fn nodal_pair() -> (Vec<Vec<FieldArray<Real>>>, Geometry) {
    let templates = serial_level(line_boxes(2, 4), &[Centering::NODE, Centering::CELL]);
    (templates, Geometry::bounded(IndexBox::line(0, 7)).unwrap())
}

fn vector_from(values: &[Real], registry: &MaskRegistry) -> StateVector {
    let (t, g) = nodal_pair();
    let mut v = masked_vector(&t, &[g], registry, MaskPolicy::default());
    fill(&mut v, |_, comp, p| values[(p[0] as usize + comp) % values.len()]);
    v
}

#[test]
fn four_cells_one_through_four() {
    let registry = MaskRegistry::new();
    let t = serial_level(vec![IndexBox::line(0, 3)], &[Centering::CELL]);
    let g = Geometry::bounded(IndexBox::line(0, 3)).unwrap();
    let mut x = masked_vector(&t, &[g], &registry, MaskPolicy::default());
    fill(&mut x, |_, _, p| 1.0 + p[0] as Real);
    assert_close(x.norm2(), 30.0_f64.sqrt());
}

#[test]
fn shared_boundary_point_counts_once() {
    let registry = MaskRegistry::new();
    let t = serial_level(line_boxes(2, 4), &[Centering::NODE]);
    let g = Geometry::bounded(IndexBox::line(0, 7)).unwrap();
    let mut x = masked_vector(&t, &[g], &registry, MaskPolicy::default());
    x.set_value(1.0);
    assert_eq!(x.dot_product(&x), 9.0);
}

#[test]
fn zero_vector_has_zero_norm() {
    let registry = MaskRegistry::new();
    let mut x = vector_from(&[3.0, -1.0, 2.0], &registry);
    x.zero();
    assert_eq!(x.norm2(), 0.0);
}

#[test]
fn copy_then_dot_is_norm_squared() {
    let registry = MaskRegistry::new();
    let x = vector_from(&[0.5, -2.0, 1.5, 4.0], &registry);
    let mut y = StateVector::new(x.shape());
    y.copy_from(&x);
    assert_close(x.dot_product(&y), x.norm2().powi(2));
}

#[test]
fn add_then_subtract_restores_values() {
    let registry = MaskRegistry::new();
    let x = vector_from(&[1.0, 2.0, 3.0], &registry);
    let y = vector_from(&[-4.0, 0.25, 8.0, 1.0], &registry);
    let mut z = x.deep_copy();
    z += &y;
    z -= &y;
    let mut diff = StateVector::new(x.shape());
    diff.define_like(&x);
    diff.lin_comb(1.0, &z, -1.0, &x);
    assert_eq!(diff.norm2(), 0.0);
}

#[test]
fn undefined_vector_cannot_be_scaled_or_dotted() {
    let registry = MaskRegistry::new();
    let x = vector_from(&[1.0], &registry);
    let mut u = StateVector::new(x.shape());
    assert!(matches!(u.try_scale(2.0), Err(StateVecError::Undefined { .. })));
    assert!(matches!(x.try_dot_product(&u), Err(StateVecError::Undefined { .. })));
}

#[test]
#[should_panic(expected = "[state-vec] lin_comb")]
fn mismatched_operands_are_fatal() {
    let registry = MaskRegistry::new();
    let x = vector_from(&[1.0], &registry);
    let (t, _) = nodal_pair(); // same boxes, different layout instance
    let other_layout = serial_level(line_boxes(4, 2), &[Centering::NODE, Centering::CELL]);
    let mut y = StateVector::new(x.shape());
    y.define(&t);
    let mut z = StateVector::new(x.shape());
    z.define(&other_layout);
    z.lin_comb(1.0, &x, 1.0, &y);
}

proptest! {
    #[test]
    fn dot_is_bilinear(
        xs in prop::collection::vec(-10.0f64..10.0, 9),
        ys in prop::collection::vec(-10.0f64..10.0, 9),
        zs in prop::collection::vec(-10.0f64..10.0, 9),
        a in -5.0f64..5.0,
        b in -5.0f64..5.0,
    ) {
        let registry = MaskRegistry::new();
        let x = vector_from(&xs, &registry);
        let y = vector_from(&ys, &registry);
        let z = vector_from(&zs, &registry);
        let mut w = StateVector::new(x.shape());
        w.define_like(&x);
        w.lin_comb(a, &x, b, &y);
        let lhs = w.dot_product(&z);
        let rhs = a * x.dot_product(&z) + b * y.dot_product(&z);
        let scale = 1.0 + (a.abs() + b.abs()) * 2000.0;
        prop_assert!((lhs - rhs).abs() <= 1e-10 * scale, "{} vs {}", lhs, rhs);
    }

    #[test]
    fn self_dot_is_non_negative_and_zero_only_for_zero(
        xs in prop::collection::vec(-3i32..3, 9),
    ) {
        let registry = MaskRegistry::new();
        let vals: Vec<Real> = xs.iter().map(|&v| Real::from(v)).collect();
        let x = vector_from(&vals, &registry);
        let d = x.dot_product(&x);
        prop_assert!(d >= 0.0);
        prop_assert_eq!(d == 0.0, xs.iter().all(|&v| v == 0));
    }

    #[test]
    fn increment_matches_lin_comb(
        xs in prop::collection::vec(-10.0f64..10.0, 9),
        ys in prop::collection::vec(-10.0f64..10.0, 9),
        a in -5.0f64..5.0,
    ) {
        let registry = MaskRegistry::new();
        let x = vector_from(&xs, &registry);
        let y = vector_from(&ys, &registry);
        let mut p = x.deep_copy();
        p.increment(&y, a);
        let mut q = StateVector::new(x.shape());
        q.define_like(&x);
        q.lin_comb(1.0, &x, a, &y);
        q -= &p;
        prop_assert!(q.norm2() <= 1e-12 * (1.0 + p.norm2()));
    }
}
