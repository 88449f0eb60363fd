mod util;
use util::*;

use std::sync::Arc;

use mesh_solver_vec::prelude::*;

/// Dot product of the periodic pattern with itself on `n_ranks` thread ranks;
/// every rank must report the same value.
fn dot_on_ranks(n_ranks: usize, centerings: &[Centering]) -> Vec<Real> {
    let layout = Arc::new(BoxLayout::round_robin(plane_boxes(3, 4), n_ranks).unwrap());
    let geom = Geometry::new(IndexBox::plane([0, 0], [11, 11]), [true, false, false]).unwrap();
    let registry = MaskRegistry::new();
    let comms = RayonComm::handles(n_ranks);

    std::thread::scope(|s| {
        let handles: Vec<_> = comms
            .iter()
            .map(|comm| {
                let layout = Arc::clone(&layout);
                let registry = &registry;
                s.spawn(move || {
                    let templates = vec![level_arrays(&layout, centerings, comm)];
                    let mut x = masked_vector(&templates, &[geom], registry, MaskPolicy::default());
                    fill(&mut x, |_, comp, p| periodic_pattern(comp, p, 12));
                    let mut y = StateVector::new(x.shape());
                    y.define_like(&x);
                    y.set_value(1.0);
                    let xy = x.dot_product(&y);
                    (x.dot_product(&x), xy)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| {
                let (xx, xy) = h.join().unwrap();
                xx + 1000.0 * xy
            })
            .collect()
    })
}

#[test]
fn thread_ranks_agree_with_serial() {
    let centerings = [Centering::NODE, Centering::edge(0), Centering::CELL];
    let serial = dot_on_ranks(1, &centerings);
    for n in [2, 3, 4] {
        let parallel = dot_on_ranks(n, &centerings);
        assert_eq!(parallel.len(), n);
        assert!(parallel.iter().all(|&d| d == serial[0]), "{n} ranks: {parallel:?} vs {serial:?}");
    }
}

#[test]
fn single_rank_matches_direct_sum() {
    let centerings = [Centering::NODE];
    let got = dot_on_ranks(1, &centerings)[0];
    // periodic in x: 12 distinct columns; bounded in y: 13 node rows
    let mut xx = 0.0;
    let mut xy = 0.0;
    for j in 0..=12 {
        for i in 0..12 {
            let v = periodic_pattern(0, [i, j, 0], 12);
            xx += v * v;
            xy += v;
        }
    }
    assert_eq!(got, xx + 1000.0 * xy);
}
