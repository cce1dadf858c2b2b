//! Bounding volumes and immutable coordinate storage.

pub mod aabox;
pub mod coords;

pub use aabox::AABox;
pub use coords::{CoordinateGroup, CoordinateGroupEditor, GeometryError};
