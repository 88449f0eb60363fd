//! Field families of the simulation and the solver-vector presets built on them.

use crate::topology::index_box::Centering;

/// Field families stored on the mesh.
///
/// `*_fp` live on the fine patch of a level, `*_cp` on its coarse patch,
/// `*_aux` are the gathered fields particles see, `*_avg_*` are time averages.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FieldType {
    EfieldAux,
    BfieldAux,
    EfieldFp,
    BfieldFp,
    CurrentFp,
    CurrentFpNodal,
    RhoFp,
    FFp,
    GFp,
    PhiFp,
    VectorPotentialFp,
    EfieldCp,
    BfieldCp,
    CurrentCp,
    RhoCp,
    FCp,
    GCp,
    EdgeLengths,
    FaceAreas,
    EfieldAvgFp,
    BfieldAvgFp,
    EfieldAvgCp,
    BfieldAvgCp,
}

/// What an implicit solve iterates on; fixes the component count.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SolverVecKind {
    /// Three electric field components (implicit electromagnetic schemes).
    #[default]
    Electromagnetic,
    /// Electrostatic potential only.
    Electrostatic,
    /// Transverse vector potential plus scalar potential.
    Darwin,
}

impl SolverVecKind {
    pub fn n_components(self) -> usize {
        match self {
            SolverVecKind::Electromagnetic => 3,
            SolverVecKind::Electrostatic => 1,
            SolverVecKind::Darwin => 4,
        }
    }

    /// `(field, component)` backing each vector component slot.
    pub fn slots(self) -> Vec<(FieldType, usize)> {
        match self {
            SolverVecKind::Electromagnetic => (0..3).map(|d| (FieldType::EfieldFp, d)).collect(),
            SolverVecKind::Electrostatic => vec![(FieldType::PhiFp, 0)],
            SolverVecKind::Darwin => {
                let mut s: Vec<_> = (0..3).map(|d| (FieldType::VectorPotentialFp, d)).collect();
                s.push((FieldType::PhiFp, 0));
                s
            }
        }
    }

    /// Yee-grid staggering of each component slot.
    pub fn centerings(self) -> Vec<Centering> {
        self.slots()
            .into_iter()
            .map(|(field, d)| match field {
                FieldType::PhiFp => Centering::NODE,
                _ => Centering::edge(d),
            })
            .collect()
    }
}
