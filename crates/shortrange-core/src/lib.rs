//! # shortrange
//!
//! A high-performance library for evaluating short-range pairwise interactions
//! (Coulomb and Lennard-Jones) between groups of particles, with bounding-volume
//! pruning, periodic boundaries and smooth cutoff switching.
//!
//! ## Architectural Philosophy
//!
//! The library is split into two layers:
//!
//! - **[`core`]: The Foundation.** Stateless geometry (`AABox`, `CoordinateGroup`),
//!   distance metrics (`Space`), the cell list (`SpatialGrid`) and the pure
//!   mathematics of the forcefield (switching functions, pair potentials and the
//!   group-pair kernels).
//!
//! - **[`engine`]: The Orchestration Layer.** Validated configuration, error
//!   aggregation and the data-parallel passes that sum energies and forces over
//!   many molecules.

pub mod core;
pub mod engine;
