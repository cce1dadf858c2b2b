use super::check_nonbonded;
use crate::core::forcefield::intra::{IntraMolecularKernel, NonBondedPairs};
use crate::core::forcefield::kernel::{InterGroupKernel, KernelWorkspace};
use crate::core::forcefield::molecule::CljMolecule;
use crate::core::forcefield::params::LjPairTable;
use crate::core::forcefield::potentials::PairPotential;
use crate::core::forcefield::term::CljEnergy;
use crate::engine::Potential;
use crate::engine::config::KernelConfig;
use crate::engine::error::EngineError;
use itertools::Itertools;
use tracing::{debug, info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Sums the intermolecular energy over every unordered pair of `molecules`,
/// plus the intramolecular energy of each molecule when `nonbonded` holds one
/// pair table per molecule. An empty `nonbonded` skips intramolecular terms.
#[instrument(skip_all, name = "total_energy_task")]
pub fn run(
    config: &KernelConfig,
    molecules: &[CljMolecule],
    nonbonded: &[NonBondedPairs],
    lj_table: &LjPairTable,
) -> Result<CljEnergy, EngineError> {
    let potential = config.potential();
    info!(
        molecules = molecules.len(),
        potential = potential.name(),
        "Starting total energy pass."
    );
    check_nonbonded(molecules, nonbonded)?;

    let energy = match potential {
        Potential::Clj(p) => evaluate(p, config, molecules, nonbonded, lj_table)?,
        Potential::SoftClj(p) => evaluate(p, config, molecules, nonbonded, lj_table)?,
    };

    info!(
        coulomb = energy.coulomb,
        lj = energy.lj,
        "Total energy pass finished."
    );
    Ok(energy)
}

fn evaluate<P: PairPotential + Copy>(
    potential: P,
    config: &KernelConfig,
    molecules: &[CljMolecule],
    nonbonded: &[NonBondedPairs],
    lj_table: &LjPairTable,
) -> Result<CljEnergy, EngineError> {
    let inter = InterGroupKernel::new(potential, config.space, config.switching, lj_table)
        .with_electrostatic_shift(config.shift_electrostatics);
    for molecule in molecules {
        inter.validate(molecule)?;
    }

    let pairs: Vec<(usize, usize)> = (0..molecules.len()).tuple_combinations().collect();

    #[cfg(feature = "parallel")]
    let inter_energy = pairs
        .par_iter()
        .map_init(KernelWorkspace::new, |workspace, &(i, j)| {
            inter.molecule_energy(&molecules[i], &molecules[j], workspace)
        })
        .try_reduce(CljEnergy::default, |acc, energy| Ok(acc + energy))?;

    #[cfg(not(feature = "parallel"))]
    let inter_energy = {
        let mut workspace = KernelWorkspace::new();
        pairs
            .iter()
            .map(|&(i, j)| inter.molecule_energy(&molecules[i], &molecules[j], &mut workspace))
            .try_fold(CljEnergy::default(), |acc, energy| energy.map(|e| acc + e))?
    };

    debug!(
        molecule_pairs = pairs.len(),
        total = inter_energy.total(),
        "Intermolecular energy summed."
    );

    if nonbonded.is_empty() {
        return Ok(inter_energy);
    }

    let intra = IntraMolecularKernel::new(potential, config.space, config.switching, lj_table);

    #[cfg(feature = "parallel")]
    let intra_energy = molecules
        .par_iter()
        .zip(nonbonded)
        .map_init(KernelWorkspace::new, |workspace, (molecule, pairs)| {
            intra.molecule_energy(molecule, pairs, workspace)
        })
        .try_reduce(CljEnergy::default, |acc, energy| Ok(acc + energy))?;

    #[cfg(not(feature = "parallel"))]
    let intra_energy = {
        let mut workspace = KernelWorkspace::new();
        molecules
            .iter()
            .zip(nonbonded)
            .map(|(molecule, pairs)| intra.molecule_energy(molecule, pairs, &mut workspace))
            .try_fold(CljEnergy::default(), |acc, energy| energy.map(|e| acc + e))?
    };

    debug!(total = intra_energy.total(), "Intramolecular energy summed.");
    Ok(inter_energy + intra_energy)
}
