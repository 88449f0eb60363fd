use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use mesh_solver_vec::prelude::*;

/// `n x n` patches of `len^2` cells, three Yee-staggered electric field components.
fn random_vector(n: i64, len: i64, seed: u64, registry: &MaskRegistry) -> StateVector {
    let mut boxes = Vec::new();
    for j in 0..n {
        for i in 0..n {
            boxes.push(IndexBox::plane([i * len, j * len], [(i + 1) * len - 1, (j + 1) * len - 1]));
        }
    }
    let side = n * len;
    let layout = Arc::new(BoxLayout::serial(boxes).unwrap());
    let templates: Vec<Vec<FieldArray<Real>>> = vec![
        SolverVecKind::Electromagnetic
            .centerings()
            .into_iter()
            .map(|c| FieldArray::<Real>::new(Arc::clone(&layout), c, 2, NoComm::handle()))
            .collect(),
    ];
    let geom = Geometry::new(IndexBox::plane([0, 0], [side - 1, side - 1]), [true, true, false]).unwrap();

    let mut v = StateVector::new(VecShape::for_kind(SolverVecKind::Electromagnetic, 1));
    v.define(&templates);
    v.try_set_dot_mask_in(registry, &[geom]).unwrap();
    let mut rng = SmallRng::seed_from_u64(seed);
    for comp in 0..3 {
        for patch in v.array_mut(0, comp).unwrap().patches_mut() {
            for x in patch.values_mut() {
                *x = rng.r#gen::<f64>() - 0.5;
            }
        }
    }
    v
}

fn bench_dot(c: &mut Criterion) {
    let mut group = c.benchmark_group("state_vec");
    for &(n, len) in &[(2i64, 32i64), (4, 32), (8, 32)] {
        let registry = MaskRegistry::new();
        let x = random_vector(n, len, 42, &registry);
        let y = random_vector(n, len, 7, &registry);
        let label = format!("{n}x{n}x{len}");

        group.bench_with_input(BenchmarkId::new("dot_product", &label), &(), |b, _| {
            b.iter(|| black_box(x.dot_product(&y)))
        });

        let mut z = StateVector::new(x.shape());
        z.define_like(&x);
        group.bench_with_input(BenchmarkId::new("lin_comb", &label), &(), |b, _| {
            b.iter(|| z.lin_comb(black_box(0.5), &x, black_box(-1.5), &y))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_dot);
criterion_main!(benches);
