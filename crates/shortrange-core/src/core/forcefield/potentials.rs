use super::params::LjPair;
use super::term::CljEnergy;
use serde::{Deserialize, Serialize};

/// Energy of a single atom pair.
///
/// `qq` is the product of the two reduced charges, `lj` the mixed LJ
/// parameters (`None` when either atom has the null LJ id) and `r` the pair
/// distance in Å.
pub trait PairPotential: Send + Sync {
    fn pair_energy(&self, qq: f64, lj: Option<&LjPair>, r: f64) -> CljEnergy;
}

/// Radial force of a single atom pair.
///
/// Returns `-dE/dr` for the Coulomb and LJ components separately, so that the
/// caller can scale them with different switching factors. Positive values
/// push the atoms apart.
pub trait PairForce: PairPotential {
    fn pair_force(&self, qq: f64, lj: Option<&LjPair>, r: f64) -> (f64, f64);
}

#[inline]
pub fn coulomb(qq: f64, r: f64) -> f64 {
    qq / r
}

#[inline]
pub fn lennard_jones_12_6(lj: &LjPair, r: f64) -> f64 {
    let sr6 = lj.sigma6() / (r * r).powi(3);
    lj.four_epsilon() * (sr6 * sr6 - sr6)
}

/// Plain Coulomb plus 12-6 Lennard-Jones.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CljPotential;

impl PairPotential for CljPotential {
    #[inline]
    fn pair_energy(&self, qq: f64, lj: Option<&LjPair>, r: f64) -> CljEnergy {
        CljEnergy {
            coulomb: coulomb(qq, r),
            lj: lj.map_or(0.0, |lj| lennard_jones_12_6(lj, r)),
        }
    }
}

impl PairForce for CljPotential {
    #[inline]
    fn pair_force(&self, qq: f64, lj: Option<&LjPair>, r: f64) -> (f64, f64) {
        let inv_r = 1.0 / r;
        let coulomb_force = qq * inv_r * inv_r;
        let lj_force = lj.map_or(0.0, |lj| {
            let sr6 = lj.sigma6() * inv_r.powi(6);
            6.0 * lj.four_epsilon() * inv_r * (2.0 * sr6 * sr6 - sr6)
        });
        (coulomb_force, lj_force)
    }
}

/// Softening parameters for alchemical pair potentials.
///
/// `alpha` runs from 0 (plain potential) to 1 (fully softened).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SoftCoreParams {
    pub alpha: f64,
    pub coulomb_power: i32,
    pub lj_power: i32,
}

impl Default for SoftCoreParams {
    fn default() -> Self {
        Self {
            alpha: 0.0,
            coulomb_power: 0,
            lj_power: 1,
        }
    }
}

/// Soft-core Coulomb plus LJ.
///
/// Coulomb: `(1 - alpha)^n qq / sqrt(alpha + r²)`.
/// LJ: `4 eps [t² - t]` with `t = sigma⁶ / (alpha^m sigma⁶ + r⁶)`.
///
/// Only energies are available; there is no [`PairForce`] implementation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoftCljPotential {
    params: SoftCoreParams,
    coulomb_scale: f64,
    alpha_m: f64,
}

impl SoftCljPotential {
    pub fn new(params: SoftCoreParams) -> Self {
        Self {
            params,
            coulomb_scale: (1.0 - params.alpha).powi(params.coulomb_power),
            alpha_m: params.alpha.powi(params.lj_power),
        }
    }

    #[inline]
    pub fn params(&self) -> &SoftCoreParams {
        &self.params
    }
}

impl Default for SoftCljPotential {
    fn default() -> Self {
        Self::new(SoftCoreParams::default())
    }
}

impl PairPotential for SoftCljPotential {
    #[inline]
    fn pair_energy(&self, qq: f64, lj: Option<&LjPair>, r: f64) -> CljEnergy {
        let r2 = r * r;
        let coulomb = self.coulomb_scale * qq / (self.params.alpha + r2).sqrt();
        let lj = lj.map_or(0.0, |lj| {
            let t = lj.sigma6() / (self.alpha_m * lj.sigma6() + r2 * r2 * r2);
            lj.four_epsilon() * (t * t - t)
        });
        CljEnergy { coulomb, lj }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argon() -> LjPair {
        LjPair::new(3.4, 0.238)
    }

    #[test]
    fn lj_is_zero_at_sigma_and_minimal_at_r_min() {
        let lj = argon();
        assert!(lennard_jones_12_6(&lj, 3.4).abs() < 1e-12);
        let r_min = 2f64.powf(1.0 / 6.0) * 3.4;
        assert!((lennard_jones_12_6(&lj, r_min) + 0.238).abs() < 1e-12);
    }

    #[test]
    fn null_lj_contributes_nothing() {
        let e = CljPotential.pair_energy(2.0, None, 4.0);
        assert_eq!(e, CljEnergy::new(0.5, 0.0));
    }

    #[test]
    fn clj_force_is_negative_derivative_of_energy() {
        let lj = argon();
        let h = 1e-6;
        for r in [3.0, 3.8, 5.5] {
            let (fc, fl) = CljPotential.pair_force(-1.3, Some(&lj), r);
            let ep = CljPotential.pair_energy(-1.3, Some(&lj), r + h);
            let em = CljPotential.pair_energy(-1.3, Some(&lj), r - h);
            assert!((fc + (ep.coulomb - em.coulomb) / (2.0 * h)).abs() < 1e-6);
            assert!((fl + (ep.lj - em.lj) / (2.0 * h)).abs() < 1e-6);
        }
        let (_, fl_at_min) = CljPotential.pair_force(0.0, Some(&lj), 2f64.powf(1.0 / 6.0) * 3.4);
        assert!(fl_at_min.abs() < 1e-10);
    }

    #[test]
    fn soft_core_reduces_to_plain_clj_without_softening() {
        let soft = SoftCljPotential::new(SoftCoreParams {
            alpha: 0.0,
            coulomb_power: 1,
            lj_power: 2,
        });
        let lj = argon();
        for r in [2.5, 3.4, 7.0] {
            let a = soft.pair_energy(0.7, Some(&lj), r);
            let b = CljPotential.pair_energy(0.7, Some(&lj), r);
            assert!((a.coulomb - b.coulomb).abs() < 1e-12);
            assert!((a.lj - b.lj).abs() < 1e-12);
        }
    }

    #[test]
    fn soft_core_is_finite_at_zero_separation() {
        let soft = SoftCljPotential::new(SoftCoreParams {
            alpha: 0.5,
            coulomb_power: 1,
            lj_power: 1,
        });
        let e = soft.pair_energy(1.0, Some(&argon()), 0.0);
        assert!(e.coulomb.is_finite() && e.lj.is_finite());
        assert!((e.coulomb - 0.5 / 0.5f64.sqrt()).abs() < 1e-12);
        // t = 1 / alpha, so 4 eps (t² - t) = 4 eps * 2
        assert!((e.lj - 4.0 * 0.238 * 2.0).abs() < 1e-9);
    }
}
