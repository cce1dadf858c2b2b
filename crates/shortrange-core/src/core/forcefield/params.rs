use super::kernel::KernelError;
use serde::{Deserialize, Serialize};

/// Coulomb constant `1 / (4 pi eps0)` in kcal·Å/(mol·e²).
pub const COULOMB_CONSTANT: f64 = 332.0637;

/// LJ type id reserved for atoms without a van der Waals term.
pub const NULL_LJ_ID: u32 = 0;

/// Per-atom nonbonded parameters as handed over by the parameter database.
///
/// The charge is *reduced*: it has already been multiplied by
/// `sqrt(COULOMB_CONSTANT)`, so `q_i * q_j / r` is an energy in kcal/mol.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CljParameter {
    pub reduced_charge: f64,
    pub lj_id: u32,
}

impl CljParameter {
    pub fn new(reduced_charge: f64, lj_id: u32) -> Self {
        Self {
            reduced_charge,
            lj_id,
        }
    }

    /// Builds a parameter from a partial charge in units of the elementary charge.
    pub fn from_charge(charge: f64, lj_id: u32) -> Self {
        Self::new(charge * COULOMB_CONSTANT.sqrt(), lj_id)
    }

    /// The partial charge in units of the elementary charge.
    pub fn charge(&self) -> f64 {
        self.reduced_charge / COULOMB_CONSTANT.sqrt()
    }

    #[inline]
    pub fn has_lj(&self) -> bool {
        self.lj_id != NULL_LJ_ID
    }

    /// An atom that contributes nothing: no charge and no LJ type.
    #[inline]
    pub fn is_dummy(&self) -> bool {
        self.reduced_charge == 0.0 && !self.has_lj()
    }
}

/// Per-type Lennard-Jones parameters (`sigma` in Å, `epsilon` in kcal/mol).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LjParameter {
    pub sigma: f64,
    pub epsilon: f64,
}

impl LjParameter {
    pub fn new(sigma: f64, epsilon: f64) -> Self {
        Self { sigma, epsilon }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CombiningRule {
    /// Lorentz-Berthelot: arithmetic mean of sigma, geometric mean of epsilon.
    #[default]
    Arithmetic,
    /// Geometric mean of both sigma and epsilon.
    Geometric,
}

impl CombiningRule {
    pub fn combine(&self, a: &LjParameter, b: &LjParameter) -> LjPair {
        let epsilon = (a.epsilon * b.epsilon).sqrt();
        let sigma = match self {
            CombiningRule::Arithmetic => 0.5 * (a.sigma + b.sigma),
            CombiningRule::Geometric => (a.sigma * b.sigma).sqrt(),
        };
        LjPair::new(sigma, epsilon)
    }
}

/// Mixed LJ parameters for one pair of types, with the powers the kernels need
/// precomputed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LjPair {
    sigma: f64,
    epsilon: f64,
    sigma6: f64,
    four_epsilon: f64,
}

impl Default for LjPair {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl LjPair {
    pub fn new(sigma: f64, epsilon: f64) -> Self {
        Self {
            sigma,
            epsilon,
            sigma6: sigma.powi(6),
            four_epsilon: 4.0 * epsilon,
        }
    }

    #[inline]
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    #[inline]
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    #[inline]
    pub fn sigma6(&self) -> f64 {
        self.sigma6
    }

    #[inline]
    pub fn four_epsilon(&self) -> f64 {
        self.four_epsilon
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.epsilon == 0.0
    }
}

/// Dense table of mixed LJ parameters indexed by pairs of LJ type ids.
///
/// Type ids run from 1 to `n_types`; id 0 ([`NULL_LJ_ID`]) maps to a zero
/// pair.
#[derive(Debug, Clone, PartialEq)]
pub struct LjPairTable {
    n_types: usize,
    pairs: Vec<LjPair>,
}

impl Default for LjPairTable {
    /// A table with no LJ types, for purely electrostatic systems.
    fn default() -> Self {
        Self::new(&[], CombiningRule::default())
    }
}

impl LjPairTable {
    /// Mixes every pair of `types` with `rule`. `types[0]` gets id 1.
    pub fn new(types: &[LjParameter], rule: CombiningRule) -> Self {
        let n_types = types.len();
        let stride = n_types + 1;
        let mut pairs = vec![LjPair::default(); stride * stride];
        for (a, param_a) in types.iter().enumerate() {
            for (b, param_b) in types.iter().enumerate() {
                pairs[(a + 1) * stride + (b + 1)] = rule.combine(param_a, param_b);
            }
        }
        Self { n_types, pairs }
    }

    #[inline]
    pub fn n_types(&self) -> usize {
        self.n_types
    }

    #[inline]
    pub fn contains(&self, lj_id: u32) -> bool {
        (lj_id as usize) <= self.n_types
    }

    /// Overrides the mixed parameters of one pair (both orders), e.g. for
    /// explicit pair-specific corrections.
    pub fn set_pair(&mut self, id0: u32, id1: u32, pair: LjPair) -> Result<(), KernelError> {
        for id in [id0, id1] {
            if id == NULL_LJ_ID || !self.contains(id) {
                return Err(KernelError::UnknownLjId(id));
            }
        }
        let stride = self.n_types + 1;
        self.pairs[id0 as usize * stride + id1 as usize] = pair;
        self.pairs[id1 as usize * stride + id0 as usize] = pair;
        Ok(())
    }

    pub fn get(&self, id0: u32, id1: u32) -> Option<&LjPair> {
        if self.contains(id0) && self.contains(id1) {
            Some(self.pair(id0, id1))
        } else {
            None
        }
    }

    /// Lookup for ids already passed through [`LjPairTable::validate`]. An id
    /// outside the table panics on the slice index, so every public kernel
    /// entry point that can reach this validates its parameters first.
    #[inline]
    pub(crate) fn pair(&self, id0: u32, id1: u32) -> &LjPair {
        &self.pairs[id0 as usize * (self.n_types + 1) + id1 as usize]
    }

    /// Checks that every LJ id in `params` is known to the table.
    pub fn validate<'p>(
        &self,
        params: impl IntoIterator<Item = &'p CljParameter>,
    ) -> Result<(), KernelError> {
        match params.into_iter().find(|p| !self.contains(p.lj_id)) {
            Some(bad) => Err(KernelError::UnknownLjId(bad.lj_id)),
            None => Ok(()),
        }
    }
}
