//! Data-parallel passes over many molecules or atoms.
//!
//! Each task validates its inputs once, then fans the independent group or
//! cell pairs out over the rayon pool (or a plain loop without the `parallel`
//! feature). Every worker owns its own [`KernelWorkspace`] and partial sum,
//! and the partial sums are reduced once at the end of the pass.
//!
//! [`KernelWorkspace`]: crate::core::forcefield::kernel::KernelWorkspace

pub mod forces;
pub mod grid_energy;
pub mod total_energy;

use crate::core::forcefield::intra::NonBondedPairs;
use crate::core::forcefield::kernel::KernelError;
use crate::core::forcefield::molecule::CljMolecule;

/// Checks that intramolecular tables, if any, line up with the molecules.
///
/// An empty `nonbonded` slice means intramolecular terms are skipped.
pub(crate) fn check_nonbonded(
    molecules: &[CljMolecule],
    nonbonded: &[NonBondedPairs],
) -> Result<(), KernelError> {
    if nonbonded.is_empty() {
        return Ok(());
    }
    if nonbonded.len() != molecules.len() {
        return Err(KernelError::Incompatible(format!(
            "{} nonbonded pair tables for {} molecules",
            nonbonded.len(),
            molecules.len()
        )));
    }
    match molecules
        .iter()
        .zip(nonbonded)
        .position(|(mol, pairs)| !pairs.is_compatible_with(mol))
    {
        Some(index) => Err(KernelError::Incompatible(format!(
            "nonbonded pair table {index} does not match its molecule"
        ))),
        None => Ok(()),
    }
}
