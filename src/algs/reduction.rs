//! Ownership-masked inner products.
//!
//! The local part of a dot product only sums points the mask marks as owned,
//! so values replicated between patches, periodic images or halo layers are
//! counted once across all ranks. The global part is a single collective sum.

use rayon::prelude::*;

use crate::algs::communicator::Communicator;
use crate::data::field_array::FieldArray;
use crate::data::storage::Storage;
use crate::state_error::StateVecError;

/// Local `Σ mask·x·y` over the patches of this rank.
///
/// `x`, `y` and `mask` must share partitioning and centering, and the mask
/// must cover exactly the same stored points as `x` and `y`.
///
/// # Determinism
/// Per-patch partial sums are combined in patch order, so the result does not
/// depend on thread scheduling.
pub fn local_masked_dot<S, M>(
    x: &FieldArray<f64, S>,
    y: &FieldArray<f64, S>,
    mask: &FieldArray<u8, M>,
) -> Result<f64, StateVecError>
where
    S: Storage<f64> + Sync,
    M: Storage<u8> + Sync,
{
    if !x.same_partitioning(y) || x.patches().len() != y.patches().len() {
        return Err(StateVecError::PartitionMismatch {
            level: 0,
            component: 0,
        });
    }
    let aligned = x.same_partitioning(mask)
        && x.patches().len() == mask.patches().len()
        && x
            .patches()
            .iter()
            .zip(y.patches())
            .zip(mask.patches())
            .all(|((px, py), pm)| px.data_box() == py.data_box() && px.data_box() == pm.data_box());
    if !aligned {
        return Err(StateVecError::MaskMisaligned {
            level: 0,
            component: 0,
        });
    }

    let partials: Vec<f64> = x
        .patches()
        .par_iter()
        .zip(y.patches().par_iter())
        .zip(mask.patches().par_iter())
        .map(|((px, py), pm)| {
            px.values()
                .iter()
                .zip(py.values())
                .zip(pm.values())
                .filter(|&(_, &w)| w != 0)
                .map(|((&a, &b), _)| a * b)
                .sum::<f64>()
        })
        .collect();
    Ok(partials.iter().sum())
}

/// Sum `local` across every rank of `comm`; all ranks receive the same value.
pub fn global_sum<C>(comm: &C, local: f64) -> Result<f64, StateVecError>
where
    C: Communicator + ?Sized,
{
    let mut buf = [local];
    comm.allreduce_sum(&mut buf)?;
    Ok(buf[0])
}

/// Number of locally owned points in `mask`.
pub fn owned_count<M: Storage<u8>>(mask: &FieldArray<u8, M>) -> usize {
    mask.patches()
        .iter()
        .map(|p| p.values().iter().filter(|&&w| w != 0).count())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::topology::index_box::{Centering, IndexBox};
    use crate::topology::layout::BoxLayout;
    use std::sync::Arc;

    #[test]
    fn masked_points_are_skipped() {
        let layout = Arc::new(BoxLayout::serial(vec![IndexBox::line(0, 3)]).unwrap());
        let mut x = FieldArray::<f64>::new(layout, Centering::CELL, 0, NoComm::handle());
        x.fill_with(|p| 1.0 + p[0] as f64);
        let mut mask = FieldArray::<u8>::like(&x, 0);
        mask.set_val(1);
        assert_eq!(local_masked_dot(&x, &x, &mask).unwrap(), 30.0);
        mask.set(&[3, 0, 0], 0).unwrap();
        assert_eq!(local_masked_dot(&x, &x, &mask).unwrap(), 14.0);
        assert_eq!(owned_count(&mask), 3);
        assert_eq!(global_sum(&NoComm, 14.0).unwrap(), 14.0);
    }

    #[test]
    fn mask_with_wrong_halo_is_misaligned() {
        let layout = Arc::new(BoxLayout::serial(vec![IndexBox::line(0, 3)]).unwrap());
        let x = FieldArray::<f64>::new(layout, Centering::CELL, 0, NoComm::handle());
        let mask = FieldArray::<u8>::like(&x, 1);
        assert!(matches!(
            local_masked_dot(&x, &x, &mask),
            Err(StateVecError::MaskMisaligned { .. })
        ));
    }
}
