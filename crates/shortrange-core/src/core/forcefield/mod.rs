//! # Force Field Module
//!
//! The nonbonded Coulomb plus Lennard-Jones (CLJ) forcefield: parameters,
//! switching functions, pair potentials and the kernels that sum them over
//! pairs of cut-groups.
//!
//! ## Overview
//!
//! - **Parameters** ([`params`]) - per-atom reduced charges and LJ type ids,
//!   and the dense table of mixed LJ pair parameters the kernels look ids up in
//! - **Switching** ([`switching`]) - `NoCutoff`, harmonic and CHARMM
//!   switching functions with separate electrostatic and vdW windows
//! - **Pair potentials** ([`potentials`]) - plain CLJ and the soft-core
//!   variant used along alchemical paths
//! - **Kernels** ([`kernel`], [`intra`]) - group-pair energy and force
//!   evaluation between molecules and within one molecule
//! - **Energies** ([`term`]) - the `CljEnergy` accumulator
//!
//! ## Usage
//!
//! ```ignore
//! use shortrange::core::forcefield::kernel::{InterGroupKernel, KernelWorkspace};
//! use shortrange::core::forcefield::potentials::CljPotential;
//!
//! let kernel = InterGroupKernel::new(CljPotential, space, switching, &lj_table);
//! let energy = kernel.molecule_energy(&mol0, &mol1, &mut KernelWorkspace::new())?;
//! ```

pub mod intra;
pub mod kernel;
pub mod molecule;
pub mod params;
pub mod potentials;
pub mod switching;
pub mod term;
