use super::check_nonbonded;
use crate::core::forcefield::intra::{IntraMolecularKernel, NonBondedPairs};
use crate::core::forcefield::kernel::{InterGroupKernel, KernelError, KernelWorkspace};
use crate::core::forcefield::molecule::{CljMolecule, ForceTable};
use crate::core::forcefield::params::LjPairTable;
use crate::core::forcefield::potentials::PairForce;
use crate::engine::Potential;
use crate::engine::config::KernelConfig;
use crate::engine::error::EngineError;
use itertools::Itertools;
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Computes the force on every atom of every molecule, returned as one
/// [`ForceTable`] per molecule in input order.
///
/// # Errors
///
/// Soft-core potentials have no analytic force and yield
/// [`KernelError::Unimplemented`].
#[instrument(skip_all, name = "forces_task")]
pub fn run(
    config: &KernelConfig,
    molecules: &[CljMolecule],
    nonbonded: &[NonBondedPairs],
    lj_table: &LjPairTable,
) -> Result<Vec<ForceTable>, EngineError> {
    let potential = config.potential();
    info!(
        molecules = molecules.len(),
        potential = potential.name(),
        "Starting force pass."
    );
    check_nonbonded(molecules, nonbonded)?;

    let forces = match potential {
        Potential::Clj(p) => evaluate(p, config, molecules, nonbonded, lj_table)?,
        Potential::SoftClj(_) => {
            return Err(KernelError::Unimplemented("soft-core force evaluation").into());
        }
    };

    info!("Force pass finished.");
    Ok(forces)
}

fn evaluate<P: PairForce + Copy>(
    potential: P,
    config: &KernelConfig,
    molecules: &[CljMolecule],
    nonbonded: &[NonBondedPairs],
    lj_table: &LjPairTable,
) -> Result<Vec<ForceTable>, EngineError> {
    if !config.switching.is_force_safe() {
        warn!("Switching function has a discontinuous derivative; forces will not conserve energy.");
    }

    let inter = InterGroupKernel::new(potential, config.space, config.switching, lj_table)
        .with_electrostatic_shift(config.shift_electrostatics);
    for molecule in molecules {
        inter.validate(molecule)?;
    }

    let zero_forces = || -> Vec<ForceTable> {
        molecules.iter().map(CljMolecule::zero_forces).collect()
    };
    let pairs: Vec<(usize, usize)> = (0..molecules.len()).tuple_combinations().collect();

    #[cfg(feature = "parallel")]
    let mut forces = pairs
        .par_iter()
        .try_fold(
            || (KernelWorkspace::new(), zero_forces()),
            |(mut workspace, mut tables), &(i, j)| {
                let (fi, fj) = pair_mut(&mut tables, i, j);
                inter.molecule_force(&molecules[i], &molecules[j], fi, fj, &mut workspace)?;
                Ok::<_, KernelError>((workspace, tables))
            },
        )
        .map(|partial| partial.map(|(_, tables)| tables))
        .try_reduce(zero_forces, |mut acc, tables| {
            add_tables(&mut acc, &tables);
            Ok(acc)
        })?;

    #[cfg(not(feature = "parallel"))]
    let mut forces = {
        let mut tables = zero_forces();
        let mut workspace = KernelWorkspace::new();
        for &(i, j) in &pairs {
            let (fi, fj) = pair_mut(&mut tables, i, j);
            inter.molecule_force(&molecules[i], &molecules[j], fi, fj, &mut workspace)?;
        }
        tables
    };

    debug!(molecule_pairs = pairs.len(), "Intermolecular forces accumulated.");

    if nonbonded.is_empty() {
        return Ok(forces);
    }

    let intra = IntraMolecularKernel::new(potential, config.space, config.switching, lj_table);

    #[cfg(feature = "parallel")]
    molecules
        .par_iter()
        .zip(nonbonded)
        .zip(forces.par_iter_mut())
        .try_for_each_init(KernelWorkspace::new, |workspace, ((molecule, pairs), table)| {
            intra.molecule_force(molecule, pairs, table, workspace)
        })?;

    #[cfg(not(feature = "parallel"))]
    {
        let mut workspace = KernelWorkspace::new();
        for ((molecule, pairs), table) in molecules.iter().zip(nonbonded).zip(forces.iter_mut()) {
            intra.molecule_force(molecule, pairs, table, &mut workspace)?;
        }
    }

    debug!("Intramolecular forces accumulated.");
    Ok(forces)
}

/// Two distinct force tables, `i < j`.
fn pair_mut(tables: &mut [ForceTable], i: usize, j: usize) -> (&mut ForceTable, &mut ForceTable) {
    let (lo, hi) = tables.split_at_mut(j);
    (&mut lo[i], &mut hi[0])
}

#[cfg(feature = "parallel")]
fn add_tables(acc: &mut [ForceTable], other: &[ForceTable]) {
    for (acc_table, table) in acc.iter_mut().zip(other) {
        for (acc_group, group) in acc_table.iter_mut().zip(table) {
            for (a, f) in acc_group.iter_mut().zip(group) {
                *a += f;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::intra::ScaleFactor;
    use crate::core::forcefield::params::{CljParameter, CombiningRule, LjParameter};
    use crate::core::forcefield::potentials::SoftCoreParams;
    use crate::core::forcefield::switching::SwitchingFunction;
    use crate::core::geometry::CoordinateGroup;
    use crate::core::space::Space;
    use crate::engine::tasks::total_energy;
    use nalgebra::{Point3, Vector3};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn lj_table() -> LjPairTable {
        LjPairTable::new(&[LjParameter::new(3.0, 0.2)], CombiningRule::Geometric)
    }

    /// Two-group molecules with a charged LJ site in each group, on a jittered
    /// 6 Å lattice so that no two molecules overlap.
    fn molecules(n: usize, seed: u64) -> Vec<CljMolecule> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|m| {
                let base = Point3::new(
                    (m % 4) as f64 * 6.0 + rng.gen_range(-0.5..0.5),
                    (m / 4 % 4) as f64 * 6.0 + rng.gen_range(-0.5..0.5),
                    (m / 16) as f64 * 6.0 + rng.gen_range(-0.5..0.5),
                );
                let g0 = CoordinateGroup::new(vec![base, base + Vector3::new(1.1, 0.0, 0.0)]);
                let g1 = CoordinateGroup::new(vec![
                    base + Vector3::new(0.0, 1.5, 0.0),
                    base + Vector3::new(0.0, 1.5, 1.2),
                ]);
                let params = vec![
                    vec![CljParameter::new(0.5, 1), CljParameter::new(-0.3, 0)],
                    vec![CljParameter::new(-0.4, 1), CljParameter::new(0.2, 0)],
                ];
                CljMolecule::new(vec![g0, g1], params).unwrap()
            })
            .collect()
    }

    fn net_force(forces: &[ForceTable]) -> Vector3<f64> {
        forces.iter().flatten().flatten().sum()
    }

    #[test]
    fn net_force_vanishes() {
        let table = lj_table();
        let molecules = molecules(25, 42);
        let nonbonded: Vec<_> = molecules.iter().map(NonBondedPairs::for_molecule).collect();
        let config = KernelConfig::builder()
            .switching(SwitchingFunction::charmm(9.0, 7.0).unwrap())
            .build()
            .unwrap();

        let forces = run(&config, &molecules, &nonbonded, &table).unwrap();

        assert_eq!(forces.len(), molecules.len());
        assert!(net_force(&forces).norm() < 1e-8);
    }

    #[test]
    fn forces_match_numerical_gradient_inside_feather() {
        let table = lj_table();
        let molecules = molecules(6, 9);
        let mut nonbonded: Vec<_> = molecules.iter().map(NonBondedPairs::for_molecule).collect();
        for pairs in &mut nonbonded {
            pairs.set((0, 0), (0, 1), ScaleFactor::ZERO).unwrap();
            pairs.set_group_pair(0, 1, ScaleFactor::new(0.5, 0.5)).unwrap();
        }
        let config = KernelConfig::builder()
            .switching(SwitchingFunction::charmm(200.0, 190.0).unwrap())
            .build()
            .unwrap();
        let forces = run(&config, &molecules, &nonbonded, &table).unwrap();

        let h = 1e-5;
        let energy_with = |m: usize, g: usize, a: usize, axis: usize, step: f64| {
            let mut moved = molecules.clone();
            let mut delta = Vector3::zeros();
            delta[axis] = step;
            let mut groups = moved[m].groups().to_vec();
            let mut editor = groups[g].edit();
            editor.translate_point(a, &delta).unwrap();
            groups[g] = editor.commit();
            moved[m] = moved[m].with_groups(groups).unwrap();
            total_energy::run(&config, &moved, &nonbonded, &table)
                .unwrap()
                .total()
        };

        for (m, g, a) in [(0, 0, 0), (2, 1, 1), (5, 0, 1)] {
            for axis in 0..3 {
                let numerical = -(energy_with(m, g, a, axis, h) - energy_with(m, g, a, axis, -h)) / (2.0 * h);
                let analytic = forces[m][g][a][axis];
                assert!(
                    (numerical - analytic).abs() < 1e-4 * analytic.abs().max(1.0),
                    "atom ({m},{g},{a}) axis {axis}: numerical {numerical}, analytic {analytic}"
                );
            }
        }
    }

    #[test]
    fn soft_core_forces_are_unimplemented() {
        let table = lj_table();
        let molecules = molecules(3, 1);
        let config = KernelConfig::builder()
            .switching(SwitchingFunction::charmm(9.0, 7.0).unwrap())
            .soft_core(SoftCoreParams::default())
            .build()
            .unwrap();

        let result = run(&config, &molecules, &[], &table);
        assert!(matches!(
            result,
            Err(EngineError::Kernel {
                source: KernelError::Unimplemented(_)
            })
        ));
    }

    #[test]
    fn periodic_image_forces_balance() {
        let table = lj_table();
        let molecules = molecules(20, 77);
        let config = KernelConfig::builder()
            .space(Space::cubic_box(25.0).unwrap())
            .switching(SwitchingFunction::charmm(10.0, 8.0).unwrap())
            .shift_electrostatics(true)
            .build()
            .unwrap();

        let forces = run(&config, &molecules, &[], &table).unwrap();
        assert!(net_force(&forces).norm() < 1e-8);
    }
}
