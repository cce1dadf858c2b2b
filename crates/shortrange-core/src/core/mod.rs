//! # Core Module
//!
//! The computational foundation of the crate. Everything in here is either an
//! immutable value type or a pure function of its inputs, so all of it can be
//! shared freely between worker threads during an energy or force pass.
//!
//! ## Architecture
//!
//! - **Bounding volumes and coordinates** ([`geometry`]) - `AABox` and the
//!   copy-on-write `CoordinateGroup` with its batching editor
//! - **Distance metrics** ([`space`]) - open (`Cartesian`) and periodic
//!   (`PeriodicBox`) spaces, distance matrices and minimum-image handling
//! - **Cell lists** ([`grid`]) - packed cell indices and the `SpatialGrid`
//!   that enumerates occupied cell pairs within a cutoff
//! - **Forcefield** ([`forcefield`]) - switching functions, parameters, pair
//!   potentials and the inter/intra group kernels
//!
//! ## Units
//!
//! Distances are in Ångström. Charges are *reduced* (pre-multiplied by the
//! square root of the Coulomb constant) so that `q_i * q_j / r` is directly an
//! energy in kcal/mol.

pub mod forcefield;
pub mod geometry;
pub mod grid;
pub mod space;
