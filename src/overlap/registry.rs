//! Process-wide cache of ownership masks.
//!
//! Every vector of a solve shares one mask per (rank, policy, geometry,
//! partitioning) combination. The registry hands out [`SharedMask`] handles;
//! [`MaskRegistry::clear`] invalidates all of them in place, so a vector still
//! holding a handle sees `MaskNotBuilt` instead of stale flags.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use log::{debug, warn};
use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::data::field_array::FieldArray;
use crate::data::storage::Storage;
use crate::overlap::owner_mask::OwnershipMask;
use crate::solver::config::MaskPolicy;
use crate::state_error::StateVecError;
use crate::topology::geometry::Geometry;
use crate::topology::index_box::Centering;
use crate::topology::layout::LayoutId;

/// Handle to a mask shared by every vector defined on the same partitioning.
pub type SharedMask = Arc<RwLock<OwnershipMask>>;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ComponentKey {
    layout: LayoutId,
    centering: Centering,
    n_ghost: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct LevelKey {
    geometry: Geometry,
    components: Vec<ComponentKey>,
}

/// Identifies the arrays a mask was built for.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MaskKey {
    rank: usize,
    policy: MaskPolicy,
    levels: Vec<LevelKey>,
}

impl MaskKey {
    /// # Errors
    /// `GeometryCount` if `geoms.len() != arrays.len()`.
    pub fn new<V, S>(
        geoms: &[Geometry],
        arrays: &[Vec<FieldArray<V, S>>],
        policy: MaskPolicy,
    ) -> Result<Self, StateVecError> {
        if geoms.len() != arrays.len() {
            return Err(StateVecError::GeometryCount {
                expected: arrays.len(),
                found: geoms.len(),
            });
        }
        let rank = arrays
            .first()
            .and_then(|l| l.first())
            .map_or(0, |a| a.rank());
        let levels = geoms
            .iter()
            .zip(arrays)
            .map(|(geometry, level)| LevelKey {
                geometry: *geometry,
                components: level
                    .iter()
                    .map(|a| ComponentKey {
                        layout: a.layout().id(),
                        centering: a.centering(),
                        n_ghost: a.n_ghost(),
                    })
                    .collect(),
            })
            .collect();
        Ok(Self {
            rank,
            policy,
            levels,
        })
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn n_levels(&self) -> usize {
        self.levels.len()
    }
}

/// Concurrent map from [`MaskKey`] to built masks.
#[derive(Debug, Default)]
pub struct MaskRegistry {
    masks: DashMap<MaskKey, SharedMask>,
}

static GLOBAL_MASKS: Lazy<MaskRegistry> = Lazy::new(MaskRegistry::new);

impl MaskRegistry {
    pub fn new() -> Self {
        Self {
            masks: DashMap::new(),
        }
    }

    /// The registry used by [`StateVector::set_dot_mask`](crate::solver::StateVector::set_dot_mask).
    pub fn global() -> &'static MaskRegistry {
        &GLOBAL_MASKS
    }

    /// Return the mask for `arrays`, building it on first request.
    ///
    /// # Errors
    /// Propagates key and build errors; nothing is cached on failure.
    pub fn get_or_build<V, S>(
        &self,
        geoms: &[Geometry],
        arrays: &[Vec<FieldArray<V, S>>],
        policy: MaskPolicy,
    ) -> Result<SharedMask, StateVecError>
    where
        S: Storage<V>,
    {
        let key = MaskKey::new(geoms, arrays, policy)?;
        match self.masks.entry(key) {
            Entry::Occupied(e) => {
                let shared = Arc::clone(e.get());
                if !shared.read().is_built() {
                    warn!("rebuilding cleared owner mask for rank {}", e.key().rank());
                    shared.write().build(geoms, arrays)?;
                }
                Ok(shared)
            }
            Entry::Vacant(v) => {
                let mut mask = OwnershipMask::new(policy);
                mask.build(geoms, arrays)?;
                debug!(
                    "owner mask built for rank {} over {} level(s)",
                    v.key().rank(),
                    v.key().n_levels()
                );
                let shared = Arc::new(RwLock::new(mask));
                v.insert(Arc::clone(&shared));
                Ok(shared)
            }
        }
    }

    pub fn get(&self, key: &MaskKey) -> Option<SharedMask> {
        self.masks.get(key).map(|m| Arc::clone(m.value()))
    }

    pub fn contains(&self, key: &MaskKey) -> bool {
        self.masks.contains_key(key)
    }

    /// Drop one mask; outstanding handles to it become unbuilt.
    pub fn release(&self, key: &MaskKey) -> bool {
        match self.masks.remove(key) {
            Some((_, shared)) => {
                shared.write().clear();
                true
            }
            None => false,
        }
    }

    /// Drop every mask; outstanding handles become unbuilt.
    pub fn clear(&self) {
        for entry in self.masks.iter() {
            entry.value().write().clear();
        }
        let n = self.masks.len();
        self.masks.clear();
        debug!("cleared {n} owner mask(s)");
    }

    pub fn len(&self) -> usize {
        self.masks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }
}
