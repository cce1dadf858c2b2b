use crate::core::forcefield::kernel::lj_pair;
use crate::core::forcefield::params::{CljParameter, LjPairTable};
use crate::core::forcefield::potentials::PairPotential;
use crate::core::forcefield::term::CljEnergy;
use crate::core::grid::{CellPair, SpatialGrid};
use crate::engine::Potential;
use crate::engine::config::KernelConfig;
use crate::engine::error::EngineError;
use nalgebra::Point3;
use tracing::{debug, info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Energy of a flat set of atoms, found by binning them on a [`SpatialGrid`]
/// and only visiting cell pairs that can hold atoms within the cutoff.
///
/// Switching is applied per atom pair at that pair's separation, and every
/// pair interacts through the minimum image. Dummy atoms are ignored.
#[instrument(skip_all, name = "grid_energy_task")]
pub fn run(
    config: &KernelConfig,
    positions: &[Point3<f64>],
    params: &[CljParameter],
    lj_table: &LjPairTable,
) -> Result<CljEnergy, EngineError> {
    let potential = config.potential();
    info!(
        atoms = positions.len(),
        potential = potential.name(),
        "Starting grid energy pass."
    );
    lj_table.validate(params)?;

    let grid = SpatialGrid::new(positions, params, config.cell_length()?)?;
    let cutoff = config.switching.cutoff_distance();
    let cell_pairs = if cutoff.is_finite() {
        grid.get_distances_within(&config.space, cutoff)
    } else {
        grid.get_distances(&config.space)
    };
    debug!(
        cells = grid.n_cells(),
        cell_pairs = cell_pairs.len(),
        "Cell pairs enumerated."
    );

    let energy = match potential {
        Potential::Clj(p) => evaluate(&p, config, &grid, &cell_pairs, lj_table),
        Potential::SoftClj(p) => evaluate(&p, config, &grid, &cell_pairs, lj_table),
    };

    info!(
        coulomb = energy.coulomb,
        lj = energy.lj,
        "Grid energy pass finished."
    );
    Ok(energy)
}

fn evaluate<P: PairPotential>(
    potential: &P,
    config: &KernelConfig,
    grid: &SpatialGrid,
    cell_pairs: &[CellPair],
    lj_table: &LjPairTable,
) -> CljEnergy {
    let switching = &config.switching;
    let cutoff = switching.cutoff_distance();

    let cell_pair_energy = |pair: &CellPair| -> CljEnergy {
        let (Some(bag0), Some(bag1)) = (grid.get(pair.cell0), grid.get(pair.cell1)) else {
            return CljEnergy::default();
        };
        let same_cell = pair.cell0 == pair.cell1;

        let mut energy = CljEnergy::default();
        for a in 0..bag0.len() {
            let pa = bag0.position(a);
            let qa = bag0.param(a);
            let start = if same_cell { a + 1 } else { 0 };
            for b in start..bag1.len() {
                let r = config.space.point_distance(&pa, &bag1.position(b));
                if r > cutoff {
                    continue;
                }
                let qb = bag1.param(b);
                let e = potential.pair_energy(
                    qa.reduced_charge * qb.reduced_charge,
                    lj_pair(lj_table, &qa, &qb),
                    r,
                );
                energy += e.scaled(
                    switching.electrostatic_scale_factor(r),
                    switching.vdw_scale_factor(r),
                );
            }
        }
        energy
    };

    #[cfg(feature = "parallel")]
    let iterator = cell_pairs.par_iter();

    #[cfg(not(feature = "parallel"))]
    let iterator = cell_pairs.iter();

    iterator.map(cell_pair_energy).sum()
}
