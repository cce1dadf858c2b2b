use thiserror::Error;

use super::config::ConfigError;
use crate::core::forcefield::kernel::KernelError;
use crate::core::forcefield::switching::SwitchingError;
use crate::core::geometry::GeometryError;
use crate::core::grid::GridError;
use crate::core::space::SpaceError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Geometry error: {source}")]
    Geometry {
        #[from]
        source: GeometryError,
    },

    #[error("Space error: {source}")]
    Space {
        #[from]
        source: SpaceError,
    },

    #[error("Spatial grid error: {source}")]
    Grid {
        #[from]
        source: GridError,
    },

    #[error("Switching function error: {source}")]
    Switching {
        #[from]
        source: SwitchingError,
    },

    #[error("Kernel evaluation failed: {source}")]
    Kernel {
        #[from]
        source: KernelError,
    },
}
