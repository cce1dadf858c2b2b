use super::kernel::KernelError;
use super::params::CljParameter;
use crate::core::geometry::{AABox, CoordinateGroup};
use nalgebra::Vector3;

/// Per-atom force accumulators laid out like a molecule's groups.
pub type ForceTable = Vec<Vec<Vector3<f64>>>;

/// A molecule as seen by the kernels: its cut-groups and the nonbonded
/// parameters of every atom, group by group.
#[derive(Debug, Clone, PartialEq)]
pub struct CljMolecule {
    groups: Vec<CoordinateGroup>,
    params: Vec<Vec<CljParameter>>,
    aabox: AABox,
}

impl CljMolecule {
    /// # Errors
    ///
    /// Returns [`KernelError::ParameterMismatch`] if the number of parameter
    /// arrays or the length of any of them disagrees with the groups.
    pub fn new(
        groups: Vec<CoordinateGroup>,
        params: Vec<Vec<CljParameter>>,
    ) -> Result<Self, KernelError> {
        if groups.len() != params.len() {
            return Err(KernelError::GroupCountMismatch {
                groups: groups.len(),
                params: params.len(),
            });
        }
        for (i, (group, group_params)) in groups.iter().zip(&params).enumerate() {
            if group.len() != group_params.len() {
                return Err(KernelError::ParameterMismatch {
                    group: i,
                    atoms: group.len(),
                    params: group_params.len(),
                });
            }
        }
        let aabox = groups
            .iter()
            .fold(AABox::empty(), |acc, g| acc.union(g.aabox()));
        Ok(Self {
            groups,
            params,
            aabox,
        })
    }

    /// A molecule made of one cut-group.
    pub fn single(group: CoordinateGroup, params: Vec<CljParameter>) -> Result<Self, KernelError> {
        Self::new(vec![group], vec![params])
    }

    /// The same molecule with new coordinates, e.g. after a move.
    pub fn with_groups(&self, groups: Vec<CoordinateGroup>) -> Result<Self, KernelError> {
        Self::new(groups, self.params.clone())
    }

    #[inline]
    pub fn groups(&self) -> &[CoordinateGroup] {
        &self.groups
    }

    #[inline]
    pub fn params(&self) -> &[Vec<CljParameter>] {
        &self.params
    }

    #[inline]
    pub fn n_groups(&self) -> usize {
        self.groups.len()
    }

    pub fn n_atoms(&self) -> usize {
        self.groups.iter().map(CoordinateGroup::len).sum()
    }

    pub fn group_sizes(&self) -> Vec<usize> {
        self.groups.iter().map(CoordinateGroup::len).collect()
    }

    /// Box around every group of the molecule.
    #[inline]
    pub fn aabox(&self) -> &AABox {
        &self.aabox
    }

    pub fn all_params(&self) -> impl Iterator<Item = &CljParameter> {
        self.params.iter().flatten()
    }

    /// A zeroed force table matching this molecule's layout.
    pub fn zero_forces(&self) -> ForceTable {
        self.groups
            .iter()
            .map(|g| vec![Vector3::zeros(); g.len()])
            .collect()
    }

    /// Checks that `forces` has exactly this molecule's layout.
    pub(crate) fn check_force_table(&self, forces: &ForceTable) -> Result<(), KernelError> {
        if forces.len() != self.groups.len()
            || forces.iter().zip(&self.groups).any(|(f, g)| f.len() != g.len())
        {
            return Err(KernelError::Incompatible(format!(
                "force table of shape {:?} does not match molecule groups {:?}",
                forces.iter().map(Vec::len).collect::<Vec<_>>(),
                self.group_sizes()
            )));
        }
        Ok(())
    }
}
