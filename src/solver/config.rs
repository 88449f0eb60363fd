//! Construction-time configuration of state vectors and their ownership masks.

use crate::fields::SolverVecKind;

/// Number of refinement levels and field components packed in a vector.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct VecShape {
    pub n_levels: usize,
    pub n_components: usize,
}

impl VecShape {
    pub const fn new(n_levels: usize, n_components: usize) -> Self {
        Self {
            n_levels,
            n_components,
        }
    }

    pub fn for_kind(kind: SolverVecKind, n_levels: usize) -> Self {
        Self::new(n_levels, kind.n_components())
    }

    #[inline]
    pub fn as_tuple(&self) -> (usize, usize) {
        (self.n_levels, self.n_components)
    }
}

impl Default for VecShape {
    fn default() -> Self {
        Self::for_kind(SolverVecKind::default(), 1)
    }
}

/// How duplicate points are classified when building an ownership mask.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct MaskPolicy {
    /// Exclude coarse points covered by the next finer level, so coarse/fine
    /// coincident representations count once (on the fine level).
    pub exclude_covered_coarse: bool,
}

impl Default for MaskPolicy {
    fn default() -> Self {
        Self {
            exclude_covered_coarse: true,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StateVecConfig {
    pub shape: VecShape,
    #[serde(default)]
    pub mask_policy: MaskPolicy,
}

impl StateVecConfig {
    pub fn for_kind(kind: SolverVecKind, n_levels: usize) -> Self {
        Self {
            shape: VecShape::for_kind(kind, n_levels),
            mask_policy: MaskPolicy::default(),
        }
    }
}
