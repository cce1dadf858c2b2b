//! # Engine Module
//!
//! Orchestration on top of [`crate::core`]: validated configuration, error
//! aggregation and the data-parallel energy and force passes.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - `KernelConfig`, its builder and TOML
//!   loading
//! - **Error Handling** ([`error`]) - `EngineError`, which every lower-level
//!   error converts into
//! - **Tasks** ([`tasks`]) - total energy, forces and grid-based energy over
//!   whole systems

pub mod config;
pub mod error;
pub mod tasks;

use crate::core::forcefield::potentials::{CljPotential, SoftCljPotential};

/// The pair potential a pass runs with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Potential {
    Clj(CljPotential),
    SoftClj(SoftCljPotential),
}

impl Potential {
    pub fn name(&self) -> &'static str {
        match self {
            Potential::Clj(_) => "clj",
            Potential::SoftClj(_) => "soft-clj",
        }
    }

    pub fn is_soft_core(&self) -> bool {
        matches!(self, Potential::SoftClj(_))
    }
}
