//! Problem domain and periodicity of one refinement level.

use crate::state_error::StateVecError;
use crate::topology::index_box::{IndexBox, IntVect, SPACEDIM, ZERO};

/// Cell-centered problem domain of a level plus per-direction periodicity.
///
/// The periodic period in direction `d` is the number of domain cells along
/// `d`. Only the first [`space_dim`](Self::space_dim) directions take part;
/// periodic flags beyond them are ignored.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Geometry {
    pub domain: IndexBox,
    pub periodic: [bool; SPACEDIM],
    space_dim: usize,
}

impl Geometry {
    /// Geometry whose problem dimension is the smallest one `domain` fits.
    pub fn new(domain: IndexBox, periodic: [bool; SPACEDIM]) -> Result<Self, StateVecError> {
        Self::with_space_dim(domain, periodic, domain.min_space_dim())
    }

    /// Geometry with an explicit problem dimension, for domains that are one
    /// cell wide at index 0 of a used direction.
    ///
    /// # Errors
    /// `InvalidBox` for an empty domain, `InvalidSpaceDim` outside `1..=3`,
    /// `SpaceDimMismatch` if the domain uses a direction beyond `space_dim`.
    pub fn with_space_dim(
        domain: IndexBox,
        periodic: [bool; SPACEDIM],
        space_dim: usize,
    ) -> Result<Self, StateVecError> {
        if domain.is_empty() {
            return Err(StateVecError::InvalidBox {
                lo: domain.lo,
                hi: domain.hi,
            });
        }
        if !(1..=SPACEDIM).contains(&space_dim) {
            return Err(StateVecError::InvalidSpaceDim(space_dim));
        }
        if domain.min_space_dim() > space_dim {
            return Err(StateVecError::SpaceDimMismatch {
                expected: space_dim,
                found: domain.min_space_dim(),
            });
        }
        Ok(Self {
            domain,
            periodic,
            space_dim,
        })
    }

    /// Non-periodic in every direction.
    pub fn bounded(domain: IndexBox) -> Result<Self, StateVecError> {
        Self::new(domain, [false; SPACEDIM])
    }

    /// Number of used directions.
    #[inline]
    pub fn space_dim(&self) -> usize {
        self.space_dim
    }

    /// Whether direction `d` is used and periodic.
    #[inline]
    pub fn is_periodic(&self, d: usize) -> bool {
        d < self.space_dim && self.periodic[d]
    }

    pub fn is_any_periodic(&self) -> bool {
        (0..SPACEDIM).any(|d| self.is_periodic(d))
    }

    /// Period (domain length in cells) along `d`, zero if not periodic.
    #[inline]
    pub fn period(&self, d: usize) -> i64 {
        if self.is_periodic(d) {
            self.domain.length(d)
        } else {
            0
        }
    }

    /// All periodic image shifts `{-L, 0, +L}^p` over periodic directions,
    /// the zero shift first.
    pub fn periodic_shifts(&self) -> Vec<IntVect> {
        let mut shifts = vec![ZERO];
        for d in 0..SPACEDIM {
            let l = self.period(d);
            if l == 0 {
                continue;
            }
            let mut next = Vec::with_capacity(shifts.len() * 3);
            for s in &shifts {
                for k in [0, -l, l] {
                    let mut t = *s;
                    t[d] += k;
                    next.push(t);
                }
            }
            shifts = next;
        }
        shifts
    }

    /// Refinement ratio from `self` (coarse) to `fine`, per direction.
    /// Unused directions have ratio 1.
    ///
    /// # Errors
    /// `SpaceDimMismatch` if the levels differ in dimension,
    /// `InvalidRefinement` unless every used fine domain length is a positive
    /// integer multiple of the coarse one.
    pub fn refinement_ratio(&self, fine: &Geometry) -> Result<IntVect, StateVecError> {
        if self.space_dim != fine.space_dim {
            return Err(StateVecError::SpaceDimMismatch {
                expected: self.space_dim,
                found: fine.space_dim,
            });
        }
        let mut ratio = [1; SPACEDIM];
        for d in 0..self.space_dim {
            let c = self.domain.length(d);
            let f = fine.domain.length(d);
            if c == 0 || f < c || f % c != 0 {
                return Err(StateVecError::InvalidRefinement);
            }
            ratio[d] = f / c;
        }
        Ok(ratio)
    }
}
