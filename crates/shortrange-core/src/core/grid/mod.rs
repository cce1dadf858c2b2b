//! # Grid Module
//!
//! A cell list over atoms: space is cut into cubic cells of fixed side, each
//! occupied cell keeps its atoms in struct-of-arrays form, and pairs of
//! occupied cells are enumerated together with a conservative lower bound on
//! the distance between any two of their atoms.
//!
//! - [`BoxIndex`] - packed 64-bit cell key
//! - [`SpatialGrid`] - the cell list itself
//! - [`CellPair`] - an occupied cell pair with its minimum distance

mod cells;
mod index;

pub use cells::{AtomBag, CellPair, SpatialGrid};
pub use index::BoxIndex;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GridError {
    #[error(
        "Cell index overflow on axis {axis}: coordinate {coordinate} with cell length {cell_length} does not fit in 16 bits"
    )]
    IndexOverflow {
        axis: char,
        coordinate: f64,
        cell_length: f64,
    },

    #[error("Atom slot {0} does not fit in 16 bits")]
    AtomIndexOverflow(usize),

    #[error("Cell length must be positive and finite, got {0}")]
    InvalidCellLength(f64),

    #[error("Got {positions} positions but {params} parameters")]
    LengthMismatch { positions: usize, params: usize },

    #[error("Cannot pair grids with different cell lengths ({left} and {right})")]
    CellLengthMismatch { left: f64, right: f64 },
}
