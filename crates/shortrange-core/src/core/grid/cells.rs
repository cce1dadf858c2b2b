use super::{BoxIndex, GridError};
use crate::core::forcefield::params::CljParameter;
use crate::core::geometry::AABox;
use crate::core::space::Space;
use itertools::Itertools;
use nalgebra::Point3;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::{debug, trace};

const SQRT_TABLE_SIZE: usize = 4096;
const COMMENSURATE_TOLERANCE: f64 = 1e-6;

/// Square root of a small non-negative integer, served from a lookup table.
fn lattice_sqrt(n: u64) -> f64 {
    static TABLE: OnceLock<Vec<f64>> = OnceLock::new();
    let table = TABLE.get_or_init(|| (0..SQRT_TABLE_SIZE).map(|i| (i as f64).sqrt()).collect());
    usize::try_from(n)
        .ok()
        .and_then(|i| table.get(i).copied())
        .unwrap_or_else(|| (n as f64).sqrt())
}

/// Squared number of whole empty cells between two cells offset by `offset`.
#[inline]
fn lattice_gap2(offset: [i64; 3]) -> u64 {
    offset
        .iter()
        .map(|&d| {
            let gap = (d.unsigned_abs()).saturating_sub(1);
            gap * gap
        })
        .sum()
}

/// The atoms of one cell, stored as parallel arrays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AtomBag {
    indices: Vec<usize>,
    x: Vec<f64>,
    y: Vec<f64>,
    z: Vec<f64>,
    charges: Vec<f64>,
    lj_ids: Vec<u32>,
}

impl AtomBag {
    fn push(&mut self, index: usize, position: &Point3<f64>, param: &CljParameter) {
        self.indices.push(index);
        self.x.push(position.x);
        self.y.push(position.y);
        self.z.push(position.z);
        self.charges.push(param.reduced_charge);
        self.lj_ids.push(param.lj_id);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Indices of the atoms in the array the grid was built from.
    #[inline]
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    #[inline]
    pub fn x(&self) -> &[f64] {
        &self.x
    }

    #[inline]
    pub fn y(&self) -> &[f64] {
        &self.y
    }

    #[inline]
    pub fn z(&self) -> &[f64] {
        &self.z
    }

    #[inline]
    pub fn charges(&self) -> &[f64] {
        &self.charges
    }

    #[inline]
    pub fn lj_ids(&self) -> &[u32] {
        &self.lj_ids
    }

    #[inline]
    pub fn position(&self, slot: usize) -> Point3<f64> {
        Point3::new(self.x[slot], self.y[slot], self.z[slot])
    }

    #[inline]
    pub fn param(&self, slot: usize) -> CljParameter {
        CljParameter::new(self.charges[slot], self.lj_ids[slot])
    }

    /// Tight box around the atoms actually stored in the cell.
    pub fn aabox(&self) -> AABox {
        let points: Vec<_> = (0..self.len()).map(|slot| self.position(slot)).collect();
        AABox::from_points(&points)
    }
}

/// Two occupied cells and a lower bound on the distance between their atoms.
///
/// For pairs within one grid `cell0 <= cell1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellPair {
    pub cell0: BoxIndex,
    pub cell1: BoxIndex,
    pub min_distance: f64,
}

#[derive(Debug, Clone, Copy)]
enum CellMetric<'a> {
    /// Open space: integer lattice distance between cubes.
    Lattice,
    /// Periodic box holding a whole number of cells per axis.
    WrappedLattice([i64; 3]),
    /// Anything else: exact box-to-box distance from the space.
    Exact(&'a Space),
}

/// A cell list over a set of atoms.
///
/// Every non-dummy atom is stored in exactly one cell, the one whose center
/// is nearest (`floor(x / cell_length + 0.5)` per axis). Only occupied cells
/// are kept.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    cell_length: f64,
    cells: BTreeMap<BoxIndex, AtomBag>,
    n_atoms: usize,
}

impl SpatialGrid {
    /// Buckets atoms into cells of side `cell_length`.
    ///
    /// Dummy atoms (zero charge and null LJ id) are skipped.
    ///
    /// # Errors
    ///
    /// * [`GridError::InvalidCellLength`] if `cell_length` is not positive.
    /// * [`GridError::LengthMismatch`] if `positions` and `params` differ in length.
    /// * [`GridError::IndexOverflow`] if a coordinate falls outside the packable
    ///   cell range.
    pub fn new(
        positions: &[Point3<f64>],
        params: &[CljParameter],
        cell_length: f64,
    ) -> Result<Self, GridError> {
        if !(cell_length > 0.0 && cell_length.is_finite()) {
            return Err(GridError::InvalidCellLength(cell_length));
        }
        if positions.len() != params.len() {
            return Err(GridError::LengthMismatch {
                positions: positions.len(),
                params: params.len(),
            });
        }

        let mut keyed = positions
            .iter()
            .zip(params)
            .enumerate()
            .filter(|(_, (_, param))| !param.is_dummy())
            .map(|(i, (p, _))| BoxIndex::from_point(p, cell_length).map(|cell| (cell, i)))
            .collect::<Result<Vec<_>, _>>()?;
        keyed.sort_by_key(|&(cell, _)| cell);

        let n_atoms = keyed.len();
        let mut cells = BTreeMap::new();
        for (cell, chunk) in &keyed.into_iter().chunk_by(|&(cell, _)| cell) {
            let mut bag = AtomBag::default();
            for (_, i) in chunk {
                bag.push(i, &positions[i], &params[i]);
            }
            cells.insert(cell, bag);
        }

        debug!(
            "Built spatial grid: {} atoms in {} cells (cell length {:.3})",
            n_atoms,
            cells.len(),
            cell_length
        );

        Ok(Self {
            cell_length,
            cells,
            n_atoms,
        })
    }

    #[inline]
    pub fn cell_length(&self) -> f64 {
        self.cell_length
    }

    #[inline]
    pub fn n_atoms(&self) -> usize {
        self.n_atoms
    }

    #[inline]
    pub fn n_cells(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> impl Iterator<Item = (&BoxIndex, &AtomBag)> {
        self.cells.iter()
    }

    pub fn get(&self, cell: BoxIndex) -> Option<&AtomBag> {
        self.cells.get(&cell.cell())
    }

    /// The cubic volume of `cell`.
    pub fn cell_box(&self, cell: BoxIndex) -> AABox {
        cell.aabox(self.cell_length)
    }

    /// Every unordered pair of occupied cells, self-pairs included.
    pub fn get_distances(&self, space: &Space) -> Vec<CellPair> {
        self.self_pairs(space, None)
    }

    /// Unordered pairs of occupied cells whose minimum distance is at most
    /// `cutoff`.
    pub fn get_distances_within(&self, space: &Space, cutoff: f64) -> Vec<CellPair> {
        self.self_pairs(space, Some(cutoff))
    }

    /// Every pair `(a, b)` with `a` from `self` and `b` from `other`.
    pub fn get_distances_between(
        &self,
        space: &Space,
        other: &SpatialGrid,
    ) -> Result<Vec<CellPair>, GridError> {
        self.cross_pairs(space, other, None)
    }

    /// Pairs `(a, b)` across the two grids within `cutoff`.
    pub fn get_distances_between_within(
        &self,
        space: &Space,
        other: &SpatialGrid,
        cutoff: f64,
    ) -> Result<Vec<CellPair>, GridError> {
        self.cross_pairs(space, other, Some(cutoff))
    }

    fn metric<'a>(&self, space: &'a Space) -> CellMetric<'a> {
        let Some(box_length) = space.box_length() else {
            return CellMetric::Lattice;
        };

        let mut n_cells = [0i64; 3];
        for axis in 0..3 {
            let ratio = box_length[axis] / self.cell_length;
            let rounded = ratio.round();
            if rounded < 1.0 || (ratio - rounded).abs() > COMMENSURATE_TOLERANCE * ratio.max(1.0) {
                debug!(
                    "Box length {:.4} is not a whole number of cells of {:.4}; using exact cell distances",
                    box_length[axis], self.cell_length
                );
                return CellMetric::Exact(space);
            }
            n_cells[axis] = rounded as i64;
        }
        CellMetric::WrappedLattice(n_cells)
    }

    fn cell_distance(&self, metric: CellMetric<'_>, a: BoxIndex, b: BoxIndex) -> f64 {
        let offset = a.offset_to(b).map(i64::from);
        match metric {
            CellMetric::Lattice => self.cell_length * lattice_sqrt(lattice_gap2(offset)),
            CellMetric::WrappedLattice(n_cells) => {
                let mut wrapped = [0i64; 3];
                for axis in 0..3 {
                    let d = offset[axis].rem_euclid(n_cells[axis]);
                    wrapped[axis] = d.min(n_cells[axis] - d);
                }
                self.cell_length * lattice_sqrt(lattice_gap2(wrapped))
            }
            CellMetric::Exact(space) => {
                space.minimum_distance_boxes(&self.cell_box(a), &self.cell_box(b))
            }
        }
    }

    fn self_pairs(&self, space: &Space, cutoff: Option<f64>) -> Vec<CellPair> {
        let metric = self.metric(space);

        // Shell size in f64: huge or infinite cutoffs fall through to the
        // all-pairs scan.
        if let (CellMetric::Lattice, Some(cutoff)) = (metric, cutoff) {
            let shell = (cutoff / self.cell_length).floor() + 1.0;
            let shell_cells = (2.0 * shell + 1.0).powi(3);
            if shell.is_finite() && shell_cells < self.cells.len() as f64 {
                return self.shell_pairs(shell as i64, cutoff);
            }
        }

        let keys: Vec<BoxIndex> = self.cells.keys().copied().collect();
        let mut pairs = Vec::new();
        for (a, &cell0) in keys.iter().enumerate() {
            for &cell1 in &keys[a..] {
                let min_distance = self.cell_distance(metric, cell0, cell1);
                if cutoff.is_none_or(|c| min_distance <= c) {
                    pairs.push(CellPair {
                        cell0,
                        cell1,
                        min_distance,
                    });
                }
            }
        }

        trace!("Enumerated {} cell pairs over {} cells", pairs.len(), keys.len());
        pairs
    }

    /// Walks the neighbour shell of each occupied cell instead of all cell
    /// pairs. Only valid in open space.
    fn shell_pairs(&self, shell: i64, cutoff: f64) -> Vec<CellPair> {
        let mut pairs = Vec::new();
        for &cell0 in self.cells.keys() {
            let (i0, j0, k0) = (i64::from(cell0.i()), i64::from(cell0.j()), i64::from(cell0.k()));
            for di in -shell..=shell {
                for dj in -shell..=shell {
                    for dk in -shell..=shell {
                        let (Ok(i), Ok(j), Ok(k)) = (
                            i16::try_from(i0 + di),
                            i16::try_from(j0 + dj),
                            i16::try_from(k0 + dk),
                        ) else {
                            continue;
                        };
                        let cell1 = BoxIndex::new(i, j, k);
                        if cell1 < cell0 || !self.cells.contains_key(&cell1) {
                            continue;
                        }
                        let min_distance =
                            self.cell_length * lattice_sqrt(lattice_gap2([di, dj, dk]));
                        if min_distance <= cutoff {
                            pairs.push(CellPair {
                                cell0,
                                cell1,
                                min_distance,
                            });
                        }
                    }
                }
            }
        }
        pairs.sort_by_key(|p| (p.cell0, p.cell1));
        trace!("Enumerated {} cell pairs by neighbour shell", pairs.len());
        pairs
    }

    fn cross_pairs(
        &self,
        space: &Space,
        other: &SpatialGrid,
        cutoff: Option<f64>,
    ) -> Result<Vec<CellPair>, GridError> {
        if (self.cell_length - other.cell_length).abs() > f64::EPSILON * self.cell_length {
            return Err(GridError::CellLengthMismatch {
                left: self.cell_length,
                right: other.cell_length,
            });
        }

        let metric = self.metric(space);
        let pairs = self
            .cells
            .keys()
            .cartesian_product(other.cells.keys())
            .filter_map(|(&cell0, &cell1)| {
                let min_distance = self.cell_distance(metric, cell0, cell1);
                cutoff.is_none_or(|c| min_distance <= c).then_some(CellPair {
                    cell0,
                    cell1,
                    min_distance,
                })
            })
            .collect();
        Ok(pairs)
    }
}
