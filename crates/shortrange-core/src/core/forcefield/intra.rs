use super::kernel::{KernelError, KernelWorkspace, SwitchState, lj_pair, unit_or_zero};
use super::molecule::{CljMolecule, ForceTable};
use super::params::{CljParameter, LjPairTable};
use super::potentials::{PairForce, PairPotential};
use super::switching::SwitchingFunction;
use super::term::CljEnergy;
use crate::core::geometry::CoordinateGroup;
use crate::core::space::{DistanceKind, Space};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Factors applied to the Coulomb and LJ energy of one atom pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleFactor {
    pub coulomb: f64,
    pub lj: f64,
}

impl ScaleFactor {
    pub const ONE: ScaleFactor = ScaleFactor {
        coulomb: 1.0,
        lj: 1.0,
    };
    pub const ZERO: ScaleFactor = ScaleFactor {
        coulomb: 0.0,
        lj: 0.0,
    };

    pub fn new(coulomb: f64, lj: f64) -> Self {
        Self { coulomb, lj }
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.coulomb == 0.0 && self.lj == 0.0
    }
}

impl Default for ScaleFactor {
    fn default() -> Self {
        ScaleFactor::ONE
    }
}

#[derive(Debug, Clone, PartialEq)]
enum GroupPairScales {
    Uniform(ScaleFactor),
    /// Row-major over (atoms of the lower group, atoms of the higher group).
    PerAtom { ncols: usize, scales: Vec<ScaleFactor> },
}

/// Read-only view of the scales of one (ordered) group pair.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ScaleView<'a> {
    Uniform(ScaleFactor),
    PerAtom {
        ncols: usize,
        scales: &'a [ScaleFactor],
        transposed: bool,
    },
}

impl ScaleView<'_> {
    #[inline]
    fn get(&self, i: usize, j: usize) -> ScaleFactor {
        match *self {
            ScaleView::Uniform(scale) => scale,
            ScaleView::PerAtom {
                ncols,
                scales,
                transposed,
            } => {
                let index = if transposed { j * ncols + i } else { i * ncols + j };
                scales.get(index).copied().unwrap_or(ScaleFactor::ONE)
            }
        }
    }
}

/// Intramolecular nonbonded scale factors (exclusions, 1-4 scaling).
///
/// Stored sparsely per pair of cut-groups. Group pairs without an entry use
/// the default scale, and a group pair whose atoms all share one scale is kept
/// as a single value.
#[derive(Debug, Clone, PartialEq)]
pub struct NonBondedPairs {
    group_sizes: Vec<usize>,
    default: ScaleFactor,
    pairs: HashMap<(usize, usize), GroupPairScales>,
}

impl NonBondedPairs {
    pub fn new(group_sizes: Vec<usize>, default: ScaleFactor) -> Self {
        Self {
            group_sizes,
            default,
            pairs: HashMap::new(),
        }
    }

    /// Every pair of `molecule` interacts with the full potential.
    pub fn for_molecule(molecule: &CljMolecule) -> Self {
        Self::new(molecule.group_sizes(), ScaleFactor::ONE)
    }

    #[inline]
    pub fn group_sizes(&self) -> &[usize] {
        &self.group_sizes
    }

    #[inline]
    pub fn default_scale(&self) -> ScaleFactor {
        self.default
    }

    pub fn is_compatible_with(&self, molecule: &CljMolecule) -> bool {
        self.group_sizes.len() == molecule.n_groups()
            && self
                .group_sizes
                .iter()
                .zip(molecule.groups())
                .all(|(&n, g)| n == g.len())
    }

    fn check_atom(&self, group: usize, atom: usize) -> Result<(), KernelError> {
        match self.group_sizes.get(group) {
            Some(&n) if atom < n => Ok(()),
            _ => Err(KernelError::Incompatible(format!(
                "atom {atom} of group {group} is outside a molecule with groups {:?}",
                self.group_sizes
            ))),
        }
    }

    /// Uses one scale for every atom pair between two groups.
    pub fn set_group_pair(
        &mut self,
        group0: usize,
        group1: usize,
        scale: ScaleFactor,
    ) -> Result<(), KernelError> {
        self.check_atom(group0, 0)?;
        self.check_atom(group1, 0)?;
        let key = (group0.min(group1), group0.max(group1));
        self.pairs.insert(key, GroupPairScales::Uniform(scale));
        Ok(())
    }

    /// Sets the scale of one atom pair, given as `(group, atom)`.
    pub fn set(
        &mut self,
        atom0: (usize, usize),
        atom1: (usize, usize),
        scale: ScaleFactor,
    ) -> Result<(), KernelError> {
        self.check_atom(atom0.0, atom0.1)?;
        self.check_atom(atom1.0, atom1.1)?;

        let (lo, hi) = if atom0.0 <= atom1.0 {
            (atom0, atom1)
        } else {
            (atom1, atom0)
        };
        let nrows = self.group_sizes[lo.0];
        let ncols = self.group_sizes[hi.0];
        let default = self.default;

        let entry = self
            .pairs
            .entry((lo.0, hi.0))
            .or_insert(GroupPairScales::Uniform(default));
        if let GroupPairScales::Uniform(uniform) = *entry {
            *entry = GroupPairScales::PerAtom {
                ncols,
                scales: vec![uniform; nrows * ncols],
            };
        }
        if let GroupPairScales::PerAtom { ncols, scales } = entry {
            scales[lo.1 * *ncols + hi.1] = scale;
            if lo.0 == hi.0 {
                scales[hi.1 * *ncols + lo.1] = scale;
            }
        }
        Ok(())
    }

    /// Scale of the atom pair `(group0, atom0)`-`(group1, atom1)`.
    pub fn get(&self, atom0: (usize, usize), atom1: (usize, usize)) -> ScaleFactor {
        self.view(atom0.0, atom1.0).get(atom0.1, atom1.1)
    }

    pub(crate) fn view(&self, group0: usize, group1: usize) -> ScaleView<'_> {
        let key = (group0.min(group1), group0.max(group1));
        match self.pairs.get(&key) {
            None => ScaleView::Uniform(self.default),
            Some(GroupPairScales::Uniform(scale)) => ScaleView::Uniform(*scale),
            Some(GroupPairScales::PerAtom { ncols, scales }) => ScaleView::PerAtom {
                ncols: *ncols,
                scales,
                transposed: group0 > group1,
            },
        }
    }
}

/// A subset of the atoms of one molecule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomSelection {
    selected: Vec<Vec<bool>>,
}

impl AtomSelection {
    pub fn none(group_sizes: &[usize]) -> Self {
        Self {
            selected: group_sizes.iter().map(|&n| vec![false; n]).collect(),
        }
    }

    pub fn all(group_sizes: &[usize]) -> Self {
        Self {
            selected: group_sizes.iter().map(|&n| vec![true; n]).collect(),
        }
    }

    pub fn select(&mut self, group: usize, atom: usize) -> Result<&mut Self, KernelError> {
        let Some(flag) = self.selected.get_mut(group).and_then(|g| g.get_mut(atom)) else {
            return Err(KernelError::Incompatible(format!(
                "cannot select atom {atom} of group {group}"
            )));
        };
        *flag = true;
        Ok(self)
    }

    pub fn select_group(&mut self, group: usize) -> Result<&mut Self, KernelError> {
        let Some(flags) = self.selected.get_mut(group) else {
            return Err(KernelError::Incompatible(format!("cannot select group {group}")));
        };
        flags.fill(true);
        Ok(self)
    }

    #[inline]
    pub fn contains(&self, group: usize, atom: usize) -> bool {
        self.selected
            .get(group)
            .and_then(|g| g.get(atom))
            .copied()
            .unwrap_or(false)
    }

    pub fn group_has_any(&self, group: usize) -> bool {
        self.selected
            .get(group)
            .is_some_and(|g| g.iter().any(|&s| s))
    }

    pub fn complement(&self) -> Self {
        Self {
            selected: self
                .selected
                .iter()
                .map(|g| g.iter().map(|&s| !s).collect())
                .collect(),
        }
    }

    pub fn n_selected(&self) -> usize {
        self.selected.iter().flatten().filter(|&&s| s).count()
    }

    pub fn is_empty(&self) -> bool {
        self.n_selected() == 0
    }

    pub fn group_sizes(&self) -> Vec<usize> {
        self.selected.iter().map(Vec::len).collect()
    }

    fn matches(&self, molecule: &CljMolecule) -> bool {
        self.selected.len() == molecule.n_groups()
            && self
                .selected
                .iter()
                .zip(molecule.groups())
                .all(|(s, g)| s.len() == g.len())
    }
}

/// Evaluates a pair potential between the atoms of one molecule, with the
/// per-pair scale factors of a [`NonBondedPairs`] table.
///
/// Atom pairs inside one cut-group are never switched. Pairs across two
/// cut-groups are pruned and switched exactly like intermolecular group
/// pairs.
#[derive(Debug, Clone)]
pub struct IntraMolecularKernel<'a, P> {
    potential: P,
    space: Space,
    switching: SwitchingFunction,
    lj_table: &'a LjPairTable,
    cutoff: f64,
}

impl<'a, P: PairPotential> IntraMolecularKernel<'a, P> {
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
            cutoff: switching.cutoff_distance(),
        }
    }

    #[inline]
    pub fn potential(&self) -> &P {
        &self.potential
    }

    #[inline]
    pub fn switching(&self) -> &SwitchingFunction {
        &self.switching
    }

    /// Checks LJ ids and that `pairs` was built for this molecule's layout.
    pub fn validate(&self, molecule: &CljMolecule, pairs: &NonBondedPairs) -> Result<(), KernelError> {
        self.lj_table.validate(molecule.all_params())?;
        check_pairs(molecule, pairs)
    }

    /// Energy of every atom pair in `molecule`, each counted once.
    pub fn molecule_energy(
        &self,
        molecule: &CljMolecule,
        pairs: &NonBondedPairs,
        workspace: &mut KernelWorkspace,
    ) -> Result<CljEnergy, KernelError> {
        self.validate(molecule, pairs)?;
        Ok(self.sum_energy(molecule, pairs, workspace, |_, _, _, _| true))
    }

    /// Energy between the atoms of `selection0` and those of `selection1`.
    ///
    /// An unordered atom pair `{a, b}` is counted once when one atom is in the
    /// first selection and the other in the second, even if both atoms are in
    /// both selections. With a selection and its complement this is the
    /// energy of a fragment with the rest of its molecule.
    pub fn fragment_energy(
        &self,
        molecule: &CljMolecule,
        pairs: &NonBondedPairs,
        selection0: &AtomSelection,
        selection1: &AtomSelection,
        workspace: &mut KernelWorkspace,
    ) -> Result<CljEnergy, KernelError> {
        self.validate(molecule, pairs)?;
        for selection in [selection0, selection1] {
            if !selection.matches(molecule) {
                return Err(KernelError::Incompatible(format!(
                    "selection over groups {:?} does not match molecule groups {:?}",
                    selection.group_sizes(),
                    molecule.group_sizes()
                )));
            }
        }

        Ok(self.sum_energy(molecule, pairs, workspace, |g0, i, g1, j| {
            (selection0.contains(g0, i) && selection1.contains(g1, j))
                || (selection1.contains(g0, i) && selection0.contains(g1, j))
        }))
    }

    fn sum_energy(
        &self,
        molecule: &CljMolecule,
        pairs: &NonBondedPairs,
        workspace: &mut KernelWorkspace,
        counted: impl Fn(usize, usize, usize, usize) -> bool,
    ) -> CljEnergy {
        let groups = molecule.groups();
        let params = molecule.params();
        let mut total = CljEnergy::default();

        for g0 in 0..groups.len() {
            total += self.self_energy(
                &groups[g0],
                &params[g0],
                pairs.view(g0, g0),
                |i, j| counted(g0, i, g0, j),
                workspace,
            );
            for g1 in (g0 + 1)..groups.len() {
                total += self.group_pair_energy(
                    &groups[g0],
                    &params[g0],
                    &groups[g1],
                    &params[g1],
                    pairs.view(g0, g1),
                    |i, j| counted(g0, i, g1, j),
                    workspace,
                );
            }
        }
        total
    }

    fn self_energy(
        &self,
        group: &CoordinateGroup,
        params: &[CljParameter],
        scales: ScaleView<'_>,
        counted: impl Fn(usize, usize) -> bool,
        workspace: &mut KernelWorkspace,
    ) -> CljEnergy {
        self.space.distance_matrix(group, group, DistanceKind::Distance, &mut workspace.distances);

        let mut energy = CljEnergy::default();
        for (i, a) in params.iter().enumerate() {
            let row = workspace.distances.row(i);
            for (j, b) in params.iter().enumerate().skip(i + 1) {
                let scale = scales.get(i, j);
                if scale.is_zero() || !counted(i, j) {
                    continue;
                }
                let qq = a.reduced_charge * b.reduced_charge;
                energy += self
                    .potential
                    .pair_energy(qq, lj_pair(self.lj_table, a, b), row[j])
                    .scaled(scale.coulomb, scale.lj);
            }
        }
        energy
    }

    fn group_pair_energy(
        &self,
        group0: &CoordinateGroup,
        params0: &[CljParameter],
        group1: &CoordinateGroup,
        params1: &[CljParameter],
        scales: ScaleView<'_>,
        counted: impl Fn(usize, usize) -> bool,
        workspace: &mut KernelWorkspace,
    ) -> CljEnergy {
        if self.space.beyond_groups(self.cutoff, group0, group1) {
            return CljEnergy::default();
        }
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
            for (j, (b, &r)) in params1.iter().zip(workspace.distances.row(i)).enumerate() {
                let scale = scales.get(i, j);
                if scale.is_zero() || !counted(i, j) {
                    continue;
                }
                let qq = a.reduced_charge * b.reduced_charge;
                energy += self
                    .potential
                    .pair_energy(qq, lj_pair(self.lj_table, a, b), r)
                    .scaled(scale.coulomb, scale.lj);
            }
        }
        SwitchState::at(&self.switching, min_dist).apply(energy)
    }
}

impl<P: PairForce> IntraMolecularKernel<'_, P> {
    /// Adds the intramolecular forces of `molecule` to `forces`.
    pub fn molecule_force(
        &self,
        molecule: &CljMolecule,
        pairs: &NonBondedPairs,
        forces: &mut ForceTable,
        workspace: &mut KernelWorkspace,
    ) -> Result<(), KernelError> {
        self.validate(molecule, pairs)?;
        molecule.check_force_table(forces)?;

        let groups = molecule.groups();
        let params = molecule.params();
        for g0 in 0..groups.len() {
            self.self_force(&groups[g0], &params[g0], pairs.view(g0, g0), &mut forces[g0], workspace);
            for g1 in (g0 + 1)..groups.len() {
                let (lo, hi) = forces.split_at_mut(g1);
                self.group_pair_force(
                    &groups[g0],
                    &params[g0],
                    &groups[g1],
                    &params[g1],
                    pairs.view(g0, g1),
                    &mut lo[g0],
                    &mut hi[0],
                    workspace,
                );
            }
        }
        Ok(())
    }

    fn self_force(
        &self,
        group: &CoordinateGroup,
        params: &[CljParameter],
        scales: ScaleView<'_>,
        forces: &mut [Vector3<f64>],
        workspace: &mut KernelWorkspace,
    ) {
        self.space.delta_matrix(group, group, &mut workspace.deltas);

        for (i, a) in params.iter().enumerate() {
            for (j, b) in params.iter().enumerate().skip(i + 1) {
                let scale = scales.get(i, j);
                let Some(delta) = workspace.deltas.get(i, j) else {
                    continue;
                };
                if scale.is_zero() {
                    continue;
                }
                let r = delta.norm();
                let qq = a.reduced_charge * b.reduced_charge;
                let (fc, fl) = self.potential.pair_force(qq, lj_pair(self.lj_table, a, b), r);
                let f = delta * ((scale.coulomb * fc + scale.lj * fl) / r);
                forces[i] += f;
                forces[j] -= f;
            }
        }
    }

    fn group_pair_force(
        &self,
        group0: &CoordinateGroup,
        params0: &[CljParameter],
        group1: &CoordinateGroup,
        params1: &[CljParameter],
        scales: ScaleView<'_>,
        forces0: &mut [Vector3<f64>],
        forces1: &mut [Vector3<f64>],
        workspace: &mut KernelWorkspace,
    ) {
        if self.space.beyond_groups(self.cutoff, group0, group1) {
            return;
        }
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

        for (i, (a, f0)) in params0.iter().zip(forces0.iter_mut()).enumerate() {
            for (j, ((b, f1), delta)) in params1
                .iter()
                .zip(forces1.iter_mut())
                .zip(workspace.deltas.row(i))
                .enumerate()
            {
                let scale = scales.get(i, j);
                if scale.is_zero() {
                    continue;
                }
                let r = delta.norm();
                let qq = a.reduced_charge * b.reduced_charge;
                let lj = lj_pair(self.lj_table, a, b);

                let (fc, fl) = self.potential.pair_force(qq, lj, r);
                let mut f = delta
                    * ((switch.coulomb * scale.coulomb * fc + switch.lj * scale.lj * fl) / r);
                if switch.active {
                    let e = self.potential.pair_energy(qq, lj, r);
                    f -= direction
                        * (switch.d_coulomb * scale.coulomb * e.coulomb
                            + switch.d_lj * scale.lj * e.lj);
                }
                *f0 += f;
                *f1 -= f;
            }
        }
    }
}

fn check_pairs(molecule: &CljMolecule, pairs: &NonBondedPairs) -> Result<(), KernelError> {
    if pairs.is_compatible_with(molecule) {
        Ok(())
    } else {
        Err(KernelError::Incompatible(format!(
            "nonbonded pair table for groups {:?} used with molecule groups {:?}",
            pairs.group_sizes(),
            molecule.group_sizes()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::params::{CombiningRule, LjParameter};
    use crate::core::forcefield::potentials::CljPotential;
    use nalgebra::Point3;

    fn group(points: &[[f64; 3]]) -> CoordinateGroup {
        CoordinateGroup::new(points.iter().map(|p| Point3::new(p[0], p[1], p[2])).collect())
    }

    fn lj_table() -> LjPairTable {
        LjPairTable::new(
            &[LjParameter::new(3.0, 0.15), LjParameter::new(2.5, 0.05)],
            CombiningRule::Arithmetic,
        )
    }

    /// Butane-like chain split into two cut-groups of two atoms.
    fn chain() -> CljMolecule {
        CljMolecule::new(
            vec![
                group(&[[0.0, 0.0, 0.0], [1.5, 0.2, 0.0]]),
                group(&[[2.1, 1.5, 0.1], [3.6, 1.6, -0.3]]),
            ],
            vec![
                vec![CljParameter::new(0.3, 1), CljParameter::new(-0.2, 2)],
                vec![CljParameter::new(-0.4, 2), CljParameter::new(0.3, 1)],
            ],
        )
        .unwrap()
    }

    fn kernel(table: &LjPairTable) -> IntraMolecularKernel<'_, CljPotential> {
        IntraMolecularKernel::new(CljPotential, Space::cartesian(), SwitchingFunction::NoCutoff, table)
    }

    fn brute_force(mol: &CljMolecule, pairs: &NonBondedPairs, table: &LjPairTable) -> CljEnergy {
        let atoms: Vec<_> = mol
            .groups()
            .iter()
            .zip(mol.params())
            .enumerate()
            .flat_map(|(g, (group, params))| {
                group
                    .points()
                    .iter()
                    .zip(params)
                    .enumerate()
                    .map(move |(i, (p, q))| ((g, i), *p, *q))
            })
            .collect();
        let mut total = CljEnergy::default();
        for (a, (ia, pa, qa)) in atoms.iter().enumerate() {
            for (ib, pb, qb) in &atoms[a + 1..] {
                let s = pairs.get(*ia, *ib);
                let e = CljPotential.pair_energy(
                    qa.reduced_charge * qb.reduced_charge,
                    lj_pair(table, qa, qb),
                    (pa - pb).norm(),
                );
                total += e.scaled(s.coulomb, s.lj);
            }
        }
        total
    }

    #[test]
    fn molecule_energy_counts_every_pair_once() {
        let table = lj_table();
        let mol = chain();
        let pairs = NonBondedPairs::for_molecule(&mol);
        let energy = kernel(&table)
            .molecule_energy(&mol, &pairs, &mut KernelWorkspace::new())
            .unwrap();
        let expected = brute_force(&mol, &pairs, &table);
        assert!((energy.coulomb - expected.coulomb).abs() < 1e-10);
        assert!((energy.lj - expected.lj).abs() < 1e-10);
    }

    #[test]
    fn exclusions_and_scaled_pairs_are_applied() {
        let table = lj_table();
        let mol = chain();
        let mut pairs = NonBondedPairs::for_molecule(&mol);
        pairs.set((0, 0), (0, 1), ScaleFactor::ZERO).unwrap();
        pairs.set((1, 0), (0, 1), ScaleFactor::ZERO).unwrap();
        pairs.set((0, 0), (1, 1), ScaleFactor::new(0.5, 0.125)).unwrap();

        assert_eq!(pairs.get((0, 1), (1, 0)), ScaleFactor::ZERO);
        assert_eq!(pairs.get((1, 1), (0, 0)), ScaleFactor::new(0.5, 0.125));
        assert_eq!(pairs.get((1, 0), (1, 1)), ScaleFactor::ONE);

        let energy = kernel(&table)
            .molecule_energy(&mol, &pairs, &mut KernelWorkspace::new())
            .unwrap();
        let expected = brute_force(&mol, &pairs, &table);
        assert!((energy.coulomb - expected.coulomb).abs() < 1e-10);
        assert!((energy.lj - expected.lj).abs() < 1e-10);

        let unscaled = kernel(&table)
            .molecule_energy(&mol, &NonBondedPairs::for_molecule(&mol), &mut KernelWorkspace::new())
            .unwrap();
        assert!((energy.total() - unscaled.total()).abs() > 1e-6);
    }

    #[test]
    fn uniform_group_pair_scale_is_used() {
        let mol = chain();
        let mut pairs = NonBondedPairs::for_molecule(&mol);
        pairs.set_group_pair(1, 0, ScaleFactor::new(0.25, 0.5)).unwrap();
        assert_eq!(pairs.get((0, 1), (1, 1)), ScaleFactor::new(0.25, 0.5));
        assert!(pairs.set_group_pair(2, 0, ScaleFactor::ONE).is_err());
    }

    #[test]
    fn fragment_and_rest_partition_the_molecule_energy() {
        let table = lj_table();
        let mol = chain();
        let pairs = NonBondedPairs::for_molecule(&mol);
        let k = kernel(&table);
        let mut ws = KernelWorkspace::new();

        let mut fragment = AtomSelection::none(&mol.group_sizes());
        fragment.select(0, 1).unwrap().select(1, 0).unwrap();
        let rest = fragment.complement();

        let inside = k.fragment_energy(&mol, &pairs, &fragment, &fragment, &mut ws).unwrap();
        let outside = k.fragment_energy(&mol, &pairs, &rest, &rest, &mut ws).unwrap();
        let between = k.fragment_energy(&mol, &pairs, &fragment, &rest, &mut ws).unwrap();
        let total = k.molecule_energy(&mol, &pairs, &mut ws).unwrap();

        let sum = inside + outside + between;
        assert!((sum.coulomb - total.coulomb).abs() < 1e-10);
        assert!((sum.lj - total.lj).abs() < 1e-10);
    }

    #[test]
    fn overlapping_selections_do_not_double_count() {
        let table = lj_table();
        let mol = chain();
        let pairs = NonBondedPairs::for_molecule(&mol);
        let k = kernel(&table);
        let mut ws = KernelWorkspace::new();

        let all = AtomSelection::all(&mol.group_sizes());
        let everything = k.fragment_energy(&mol, &pairs, &all, &all, &mut ws).unwrap();
        let total = k.molecule_energy(&mol, &pairs, &mut ws).unwrap();
        assert!((everything.total() - total.total()).abs() < 1e-10);

        let mut first = AtomSelection::none(&mol.group_sizes());
        first.select_group(0).unwrap();
        let a = k.fragment_energy(&mol, &pairs, &first, &all, &mut ws).unwrap();
        let b = k.fragment_energy(&mol, &pairs, &all, &first, &mut ws).unwrap();
        assert!((a.total() - b.total()).abs() < 1e-12);
    }

    #[test]
    fn mismatched_tables_are_incompatible() {
        let table = lj_table();
        let mol = chain();
        let pairs = NonBondedPairs::new(vec![2, 3], ScaleFactor::ONE);
        let result = kernel(&table).molecule_energy(&mol, &pairs, &mut KernelWorkspace::new());
        assert!(matches!(result, Err(KernelError::Incompatible(_))));

        let good = NonBondedPairs::for_molecule(&mol);
        let selection = AtomSelection::all(&[4]);
        let result = kernel(&table).fragment_energy(&mol, &good, &selection, &selection, &mut KernelWorkspace::new());
        assert!(matches!(result, Err(KernelError::Incompatible(_))));
    }

    #[test]
    fn lj_ids_outside_the_table_are_rejected() {
        let short = LjPairTable::new(&[LjParameter::new(3.0, 0.15)], CombiningRule::Arithmetic);
        let mol = chain();
        let pairs = NonBondedPairs::for_molecule(&mol);
        let k = kernel(&short);
        let mut ws = KernelWorkspace::new();

        let energy = k.molecule_energy(&mol, &pairs, &mut ws);
        assert!(matches!(energy, Err(KernelError::UnknownLjId(2))));

        let all = AtomSelection::all(&mol.group_sizes());
        let fragment = k.fragment_energy(&mol, &pairs, &all, &all, &mut ws);
        assert!(matches!(fragment, Err(KernelError::UnknownLjId(2))));

        let mut forces = mol.zero_forces();
        let force = k.molecule_force(&mol, &pairs, &mut forces, &mut ws);
        assert!(matches!(force, Err(KernelError::UnknownLjId(2))));
    }

    #[test]
    fn intramolecular_force_is_negative_numerical_gradient() {
        let table = lj_table();
        let mol = chain();
        let mut pairs = NonBondedPairs::for_molecule(&mol);
        pairs.set((0, 0), (0, 1), ScaleFactor::ZERO).unwrap();
        pairs.set((0, 0), (1, 1), ScaleFactor::new(0.5, 0.5)).unwrap();
        let k = kernel(&table);
        let mut ws = KernelWorkspace::new();

        let mut forces = mol.zero_forces();
        k.molecule_force(&mol, &pairs, &mut forces, &mut ws).unwrap();

        let h = 1e-6;
        for g in 0..2 {
            for atom in 0..2 {
                for axis in 0..3 {
                    let mut step = Vector3::zeros();
                    step[axis] = h;
                    let displaced = |sign: f64| {
                        let mut groups = mol.groups().to_vec();
                        let mut editor = groups[g].edit();
                        editor.translate_point(atom, &(step * sign)).unwrap();
                        groups[g] = editor.commit();
                        mol.with_groups(groups).unwrap()
                    };
                    let plus = k.molecule_energy(&displaced(1.0), &pairs, &mut ws).unwrap();
                    let minus = k.molecule_energy(&displaced(-1.0), &pairs, &mut ws).unwrap();
                    let gradient = (plus.total() - minus.total()) / (2.0 * h);
                    assert!(
                        (forces[g][atom][axis] + gradient).abs() < 1e-5,
                        "group {g} atom {atom} axis {axis}"
                    );
                }
            }
        }
    }
}
