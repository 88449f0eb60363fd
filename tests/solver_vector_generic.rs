mod util;
use util::*;

use mesh_solver_vec::prelude::*;

/// Modified Gram–Schmidt written only against the solver-facing trait.
fn orthonormalize<V: SolverVector<Scalar = Real>>(vs: &mut [V]) {
    for i in 0..vs.len() {
        let (done, rest) = vs.split_at_mut(i);
        let v = &mut rest[0];
        for q in done.iter() {
            let c = v.dot(q);
            v.increment(q, -c);
        }
        let n = v.norm2();
        v.scale(1.0 / n);
    }
}

/// One step of a Richardson iteration `x ← x + ω (b - x)` for the identity.
fn richardson_step<V: SolverVector<Scalar = Real>>(x: &mut V, b: &V, omega: Real) -> Real {
    let mut r = x.new_like();
    r.lin_comb(1.0, b, -1.0, x);
    x.increment(&r, omega);
    r.norm2()
}

fn basis() -> Vec<StateVector> {
    let registry = MaskRegistry::new();
    let templates = serial_level(line_boxes(2, 4), &[Centering::NODE, Centering::CELL]);
    let geom = Geometry::bounded(IndexBox::line(0, 7)).unwrap();
    let x = masked_vector(&templates, &[geom], &registry, MaskPolicy::default());
    (0..3)
        .map(|k| {
            let mut v = x.new_like();
            fill(&mut v, |_, comp, p| ((p[0] + comp as i64) as Real).powi(k));
            v
        })
        .collect()
}

#[test]
fn gram_schmidt_produces_orthonormal_vectors() {
    let mut vs = basis();
    orthonormalize(&mut vs);
    for (i, a) in vs.iter().enumerate() {
        for (j, b) in vs.iter().enumerate() {
            let want = if i == j { 1.0 } else { 0.0 };
            let got = SolverVector::dot(a, b);
            assert!((got - want).abs() < 1e-10, "<q{i}, q{j}> = {got}");
        }
    }
}

#[test]
fn richardson_on_identity_converges_in_one_full_step() {
    let vs = basis();
    let b = &vs[2];
    let mut x = b.new_like();
    let r0 = richardson_step(&mut x, b, 0.5);
    assert_close(r0, b.norm2());
    let r1 = richardson_step(&mut x, b, 1.0);
    assert_close(r1, 0.5 * r0);
    let r2 = richardson_step(&mut x, b, 1.0);
    assert!(r2 < 1e-12);
}

#[test]
fn trait_copy_and_zero() {
    let vs = basis();
    let mut c = StateVector::new(vs[1].shape());
    SolverVector::copy_from(&mut c, &vs[1]);
    assert_close(SolverVector::dot(&c, &vs[1]), vs[1].norm2().powi(2));
    SolverVector::zero(&mut c);
    assert_eq!(SolverVector::norm2(&c), 0.0);
    SolverVector::set_value(&mut c, 2.0);
    let mut d = StateVector::new(c.shape());
    SolverVector::define_like(&mut d, &c);
    d.lin_comb(0.5, &c, 0.0, &c);
    assert_eq!(d.dot_product(&c), 2.0 * 17.0);
}
