use super::GridError;
use crate::core::geometry::AABox;
use nalgebra::{Point3, Vector3};
use std::fmt;

const BIAS: i32 = 1 << 15;
const FIELD_MASK: u64 = 0xFFFF;
const I_SHIFT: u32 = 48;
const J_SHIFT: u32 = 32;
const K_SHIFT: u32 = 16;

/// Packed key of a grid cell, optionally tagged with an atom slot in that cell.
///
/// The three signed 16-bit cell coordinates are stored biased in the upper 48
/// bits, so ordering the packed `u64` orders cells lexicographically by
/// `(i, j, k)`. The low 16 bits hold `atom + 1`, with zero meaning "cell only".
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BoxIndex(u64);

impl BoxIndex {
    /// Index of the cell with integer coordinates `(i, j, k)`.
    pub fn new(i: i16, j: i16, k: i16) -> Self {
        let pack = |v: i16| (i32::from(v) + BIAS) as u64;
        Self((pack(i) << I_SHIFT) | (pack(j) << J_SHIFT) | (pack(k) << K_SHIFT))
    }

    /// Cell containing `point` for cubic cells of side `cell_length`.
    ///
    /// Cell `(i, j, k)` is centred on `(i, j, k) * cell_length`, i.e. each
    /// coordinate is mapped with `floor(x / cell_length + 0.5)`.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::IndexOverflow`] if a coordinate does not fit in 16
    /// bits, which means the cell length is too small for the coordinate range.
    pub fn from_point(point: &Point3<f64>, cell_length: f64) -> Result<Self, GridError> {
        let inv = 1.0 / cell_length;
        let to_cell = |value: f64, axis: char| -> Result<i16, GridError> {
            let cell = (value * inv + 0.5).floor();
            if cell >= f64::from(i16::MIN) && cell <= f64::from(i16::MAX) {
                Ok(cell as i16)
            } else {
                Err(GridError::IndexOverflow {
                    axis,
                    coordinate: value,
                    cell_length,
                })
            }
        };
        Ok(Self::new(
            to_cell(point.x, 'x')?,
            to_cell(point.y, 'y')?,
            to_cell(point.z, 'z')?,
        ))
    }

    /// Tags this cell key with the slot of an atom inside the cell.
    pub fn with_atom(self, atom: usize) -> Result<Self, GridError> {
        atom.checked_add(1)
            .and_then(|slot| u16::try_from(slot).ok())
            .map(|slot| Self((self.0 & !FIELD_MASK) | u64::from(slot)))
            .ok_or(GridError::AtomIndexOverflow(atom))
    }

    /// The key of the cell alone, without an atom slot.
    #[inline]
    pub fn cell(self) -> Self {
        Self(self.0 & !FIELD_MASK)
    }

    #[inline]
    fn unpack(self, shift: u32) -> i16 {
        (((self.0 >> shift) & FIELD_MASK) as i32 - BIAS) as i16
    }

    #[inline]
    pub fn i(self) -> i16 {
        self.unpack(I_SHIFT)
    }

    #[inline]
    pub fn j(self) -> i16 {
        self.unpack(J_SHIFT)
    }

    #[inline]
    pub fn k(self) -> i16 {
        self.unpack(K_SHIFT)
    }

    #[inline]
    pub fn atom(self) -> Option<usize> {
        match self.0 & FIELD_MASK {
            0 => None,
            slot => Some(slot as usize - 1),
        }
    }

    #[inline]
    pub fn packed(self) -> u64 {
        self.0
    }

    /// Integer offset `other - self` in cell units.
    #[inline]
    pub fn offset_to(self, other: BoxIndex) -> [i32; 3] {
        [
            i32::from(other.i()) - i32::from(self.i()),
            i32::from(other.j()) - i32::from(self.j()),
            i32::from(other.k()) - i32::from(self.k()),
        ]
    }

    pub fn center(self, cell_length: f64) -> Point3<f64> {
        Point3::new(
            f64::from(self.i()) * cell_length,
            f64::from(self.j()) * cell_length,
            f64::from(self.k()) * cell_length,
        )
    }

    /// The cubic volume covered by this cell.
    pub fn aabox(self, cell_length: f64) -> AABox {
        AABox::from_center_and_half_extents(
            self.center(cell_length),
            Vector3::repeat(0.5 * cell_length),
        )
    }
}

impl fmt::Debug for BoxIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.atom() {
            Some(atom) => write!(f, "BoxIndex({}, {}, {} : {})", self.i(), self.j(), self.k(), atom),
            None => write!(f, "BoxIndex({}, {}, {})", self.i(), self.j(), self.k()),
        }
    }
}
