use super::molecule::{CljMolecule, ForceTable};
use super::params::{CljParameter, LjPair, LjPairTable};
use super::potentials::{PairForce, PairPotential};
use super::switching::SwitchingFunction;
use super::term::CljEnergy;
use crate::core::geometry::CoordinateGroup;
use crate::core::space::{DeltaMatrix, DistMatrix, DistanceKind, Space};
use nalgebra::Vector3;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum KernelError {
    #[error("Incompatible molecule layout: {0}")]
    Incompatible(String),

    #[error("{0} is not implemented")]
    Unimplemented(&'static str),

    #[error("Unknown LJ type id {0}")]
    UnknownLjId(u32),

    #[error("Group {group} has {atoms} atoms but {params} parameters")]
    ParameterMismatch {
        group: usize,
        atoms: usize,
        params: usize,
    },

    #[error("Got {groups} coordinate groups but {params} parameter arrays")]
    GroupCountMismatch { groups: usize, params: usize },
}

/// Scratch matrices reused across group pairs. One per worker.
#[derive(Debug, Clone, Default)]
pub struct KernelWorkspace {
    pub(crate) distances: DistMatrix,
    pub(crate) deltas: DeltaMatrix,
}

impl KernelWorkspace {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Mixed LJ parameters for two atoms, or `None` if either has the null id.
#[inline]
pub(crate) fn lj_pair<'t>(
    table: &'t LjPairTable,
    a: &CljParameter,
    b: &CljParameter,
) -> Option<&'t LjPair> {
    (a.has_lj() && b.has_lj()).then(|| table.pair(a.lj_id, b.lj_id))
}

/// Switching factors and their derivatives at one group-pair distance.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SwitchState {
    pub active: bool,
    pub coulomb: f64,
    pub lj: f64,
    pub d_coulomb: f64,
    pub d_lj: f64,
}

impl SwitchState {
    #[inline]
    pub(crate) fn at(switching: &SwitchingFunction, min_dist: f64) -> Self {
        if min_dist > switching.feather_distance() {
            Self {
                active: true,
                coulomb: switching.electrostatic_scale_factor(min_dist),
                lj: switching.vdw_scale_factor(min_dist),
                d_coulomb: switching.d_electrostatic_scale_factor(min_dist),
                d_lj: switching.d_vdw_scale_factor(min_dist),
            }
        } else {
            Self {
                active: false,
                coulomb: 1.0,
                lj: 1.0,
                d_coulomb: 0.0,
                d_lj: 0.0,
            }
        }
    }

    #[inline]
    pub(crate) fn apply(&self, energy: CljEnergy) -> CljEnergy {
        if self.active {
            energy.scaled(self.coulomb, self.lj)
        } else {
            energy
        }
    }
}

#[inline]
pub(crate) fn unit_or_zero(v: Vector3<f64>) -> Vector3<f64> {
    let norm = v.norm();
    if norm > 0.0 { v / norm } else { Vector3::zeros() }
}

/// Evaluates a pair potential between cut-groups of different molecules.
///
/// Each group pair is pruned on its bounding boxes, then on the true minimum
/// distance, before the atom-pair loop runs. Group-pair energies whose
/// minimum distance lies beyond the feather are scaled by the switching
/// function evaluated at that distance.
///
/// Every public entry point checks LJ ids against the pair table before any
/// pair is evaluated.
#[derive(Debug, Clone)]
pub struct InterGroupKernel<'a, P> {
    potential: P,
    space: Space,
    switching: SwitchingFunction,
    lj_table: &'a LjPairTable,
    shift_electrostatics: bool,
    cutoff: f64,
}

impl<'a, P: PairPotential> InterGroupKernel<'a, P> {
    pub fn new(
        potential: P,
        space: Space,
        switching: SwitchingFunction,
        lj_table: &'a LjPairTable,
    ) -> Self {
        Self {
            potential,
            space,
            switching,
            lj_table,
            shift_electrostatics: false,
            cutoff: switching.cutoff_distance(),
        }
    }

    /// Subtract `(sum q_A)(sum q_B) / cutoff` from every group-pair Coulomb
    /// energy, so that the net interaction of two groups vanishes at the
    /// cutoff.
    pub fn with_electrostatic_shift(mut self, shift: bool) -> Self {
        self.shift_electrostatics = shift;
        self
    }

    #[inline]
    pub fn potential(&self) -> &P {
        &self.potential
    }

    #[inline]
    pub fn space(&self) -> &Space {
        &self.space
    }

    #[inline]
    pub fn switching(&self) -> &SwitchingFunction {
        &self.switching
    }

    #[inline]
    pub fn lj_table(&self) -> &'a LjPairTable {
        self.lj_table
    }

    #[inline]
    pub fn shifts_electrostatics(&self) -> bool {
        self.shift_electrostatics
    }

    /// Checks every LJ id of `molecule` against the pair table.
    pub fn validate(&self, molecule: &CljMolecule) -> Result<(), KernelError> {
        self.lj_table.validate(molecule.all_params())
    }

    /// The shift subtracted per unit of `q_i q_j`, zero when disabled.
    #[inline]
    fn shift_per_qq(&self) -> f64 {
        let cutoff = self.switching.electrostatic_cutoff();
        if self.shift_electrostatics && cutoff.is_finite() {
            1.0 / cutoff
        } else {
            0.0
        }
    }

    /// Checks the parameter row of group `index` (0 or 1 of the pair): its
    /// length and its LJ ids.
    fn check_group(
        &self,
        index: usize,
        group: &CoordinateGroup,
        params: &[CljParameter],
    ) -> Result<(), KernelError> {
        if params.len() != group.len() {
            return Err(KernelError::ParameterMismatch {
                group: index,
                atoms: group.len(),
                params: params.len(),
            });
        }
        self.lj_table.validate(params)
    }

    /// Coulomb and LJ energy between two cut-groups.
    ///
    /// # Errors
    ///
    /// * [`KernelError::ParameterMismatch`] if a parameter row does not have
    ///   one entry per atom of its group.
    /// * [`KernelError::UnknownLjId`] if an LJ id is missing from the table.
    pub fn group_energy(
        &self,
        group0: &CoordinateGroup,
        params0: &[CljParameter],
        group1: &CoordinateGroup,
        params1: &[CljParameter],
        workspace: &mut KernelWorkspace,
    ) -> Result<CljEnergy, KernelError> {
        self.check_group(0, group0, params0)?;
        self.check_group(1, group1, params1)?;
        Ok(self.pruned_group_energy(group0, params0, group1, params1, workspace))
    }

    fn pruned_group_energy(
        &self,
        group0: &CoordinateGroup,
        params0: &[CljParameter],
        group1: &CoordinateGroup,
        params1: &[CljParameter],
        workspace: &mut KernelWorkspace,
    ) -> CljEnergy {
        if self.space.beyond_groups(self.cutoff, group0, group1) {
            return CljEnergy::default();
        }
        self.group_energy_unpruned(group0, params0, group1, params1, workspace)
    }

    fn group_energy_unpruned(
        &self,
        group0: &CoordinateGroup,
        params0: &[CljParameter],
        group1: &CoordinateGroup,
        params1: &[CljParameter],
        workspace: &mut KernelWorkspace,
    ) -> CljEnergy {
        let min_dist = self.space.distance_matrix(
            group0,
            group1,
            DistanceKind::Distance,
            &mut workspace.distances,
        );
        if min_dist > self.cutoff {
            return CljEnergy::default();
        }

        let mut energy = CljEnergy::default();
        for (i, a) in params0.iter().enumerate() {
            for (b, &r) in params1.iter().zip(workspace.distances.row(i)) {
                let qq = a.reduced_charge * b.reduced_charge;
                energy += self
                    .potential
                    .pair_energy(qq, lj_pair(self.lj_table, a, b), r);
            }
        }

        let shift = self.shift_per_qq();
        if shift != 0.0 {
            let q0: f64 = params0.iter().map(|p| p.reduced_charge).sum();
            let q1: f64 = params1.iter().map(|p| p.reduced_charge).sum();
            energy.coulomb -= q0 * q1 * shift;
        }

        SwitchState::at(&self.switching, min_dist).apply(energy)
    }

    /// Energy between two whole molecules.
    ///
    /// The molecule boxes are tested first. When both molecules are a single
    /// cut-group that test already covers the group pair, so the group-level
    /// box test is skipped.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::UnknownLjId`] if either molecule carries an LJ id
    /// outside the pair table.
    pub fn molecule_energy(
        &self,
        mol0: &CljMolecule,
        mol1: &CljMolecule,
        workspace: &mut KernelWorkspace,
    ) -> Result<CljEnergy, KernelError> {
        self.validate(mol0)?;
        self.validate(mol1)?;

        if self.space.beyond(self.cutoff, mol0.aabox(), mol1.aabox()) {
            return Ok(CljEnergy::default());
        }

        if let ([g0], [p0], [g1], [p1]) =
            (mol0.groups(), mol0.params(), mol1.groups(), mol1.params())
        {
            return Ok(self.group_energy_unpruned(g0, p0, g1, p1, workspace));
        }

        let mut total = CljEnergy::default();
        for (g0, p0) in mol0.groups().iter().zip(mol0.params()) {
            for (g1, p1) in mol1.groups().iter().zip(mol1.params()) {
                total += self.pruned_group_energy(g0, p0, g1, p1, workspace);
            }
        }
        Ok(total)
    }
}

impl<P: PairForce> InterGroupKernel<'_, P> {
    /// Adds the forces between two cut-groups to `forces0` and `forces1`.
    ///
    /// Inside the switching window every atom pair also picks up
    /// `-S'(R) e_ij` along the unit separation of the two group centers, the
    /// derivative of the group-level scale factor.
    ///
    /// # Errors
    ///
    /// As [`InterGroupKernel::group_energy`], plus
    /// [`KernelError::Incompatible`] if a force slice does not have one entry
    /// per atom of its group.
    pub fn group_force(
        &self,
        group0: &CoordinateGroup,
        params0: &[CljParameter],
        group1: &CoordinateGroup,
        params1: &[CljParameter],
        forces0: &mut [Vector3<f64>],
        forces1: &mut [Vector3<f64>],
        workspace: &mut KernelWorkspace,
    ) -> Result<(), KernelError> {
        self.check_group(0, group0, params0)?;
        self.check_group(1, group1, params1)?;
        for (group, forces) in [(group0, forces0.len()), (group1, forces1.len())] {
            if forces != group.len() {
                return Err(KernelError::Incompatible(format!(
                    "{forces} force slots for a group of {} atoms",
                    group.len()
                )));
            }
        }
        self.pruned_group_force(group0, params0, group1, params1, forces0, forces1, workspace);
        Ok(())
    }

    fn pruned_group_force(
        &self,
        group0: &CoordinateGroup,
        params0: &[CljParameter],
        group1: &CoordinateGroup,
        params1: &[CljParameter],
        forces0: &mut [Vector3<f64>],
        forces1: &mut [Vector3<f64>],
        workspace: &mut KernelWorkspace,
    ) {
        if self.space.beyond_groups(self.cutoff, group0, group1) {
            return;
        }
        self.group_force_unpruned(group0, params0, group1, params1, forces0, forces1, workspace);
    }

    fn group_force_unpruned(
        &self,
        group0: &CoordinateGroup,
        params0: &[CljParameter],
        group1: &CoordinateGroup,
        params1: &[CljParameter],
        forces0: &mut [Vector3<f64>],
        forces1: &mut [Vector3<f64>],
        workspace: &mut KernelWorkspace,
    ) {
        let min_dist = self.space.delta_matrix(group0, group1, &mut workspace.deltas);
        if min_dist > self.cutoff {
            return;
        }

        let switch = SwitchState::at(&self.switching, min_dist);
        let direction = if switch.active {
            unit_or_zero(self.space.group_separation(group0, group1))
        } else {
            Vector3::zeros()
        };
        let shift = self.shift_per_qq();

        for (i, (a, f0)) in params0.iter().zip(forces0.iter_mut()).enumerate() {
            let mut force_i = Vector3::zeros();
            for ((b, f1), delta) in params1
                .iter()
                .zip(forces1.iter_mut())
                .zip(workspace.deltas.row(i))
            {
                let r = delta.norm();
                let qq = a.reduced_charge * b.reduced_charge;
                let lj = lj_pair(self.lj_table, a, b);

                let (fc, fl) = self.potential.pair_force(qq, lj, r);
                let mut f = delta * ((switch.coulomb * fc + switch.lj * fl) / r);
                if switch.active {
                    let e = self.potential.pair_energy(qq, lj, r);
                    let coulomb = e.coulomb - qq * shift;
                    f -= direction * (switch.d_coulomb * coulomb + switch.d_lj * e.lj);
                }

                force_i += f;
                *f1 -= f;
            }
            *f0 += force_i;
        }
    }

    /// Adds the forces between two molecules to their force tables.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::UnknownLjId`] for an LJ id outside the pair
    /// table, or [`KernelError::Incompatible`] if a force table does not match
    /// its molecule's layout.
    pub fn molecule_force(
        &self,
        mol0: &CljMolecule,
        mol1: &CljMolecule,
        forces0: &mut ForceTable,
        forces1: &mut ForceTable,
        workspace: &mut KernelWorkspace,
    ) -> Result<(), KernelError> {
        self.validate(mol0)?;
        self.validate(mol1)?;
        mol0.check_force_table(forces0)?;
        mol1.check_force_table(forces1)?;

        if self.space.beyond(self.cutoff, mol0.aabox(), mol1.aabox()) {
            return Ok(());
        }

        if let ([g0], [p0], [g1], [p1], [f0], [f1]) = (
            mol0.groups(),
            mol0.params(),
            mol1.groups(),
            mol1.params(),
            forces0.as_mut_slice(),
            forces1.as_mut_slice(),
        ) {
            self.group_force_unpruned(g0, p0, g1, p1, f0, f1, workspace);
            return Ok(());
        }

        for ((g0, p0), f0) in mol0.groups().iter().zip(mol0.params()).zip(forces0.iter_mut()) {
            for ((g1, p1), f1) in mol1.groups().iter().zip(mol1.params()).zip(forces1.iter_mut()) {
                self.pruned_group_force(g0, p0, g1, p1, f0, f1, workspace);
            }
        }
        Ok(())
    }
}
