use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SwitchingError {
    #[error("Cutoff must be positive and finite, got {0}")]
    NonPositiveCutoff(f64),

    #[error("Feather distance must be non-negative, got {0}")]
    NegativeFeather(f64),

    #[error("Feather distance {feather} lies beyond the cutoff {cutoff}")]
    FeatherBeyondCutoff { feather: f64, cutoff: f64 },
}

/// The `(feather, cutoff)` breakpoints of one switched term.
///
/// Below `feather` the scale factor is exactly 1, at or beyond `cutoff` it is
/// exactly 0. A window with `feather == cutoff` is a hard step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwitchingWindow {
    cutoff: f64,
    feather: f64,
    cutoff2: f64,
    feather2: f64,
    inv_width2: f64,
}

impl SwitchingWindow {
    pub fn new(cutoff: f64, feather: f64) -> Result<Self, SwitchingError> {
        if !(cutoff > 0.0 && cutoff.is_finite()) {
            return Err(SwitchingError::NonPositiveCutoff(cutoff));
        }
        if !(feather >= 0.0) {
            return Err(SwitchingError::NegativeFeather(feather));
        }
        if feather > cutoff {
            return Err(SwitchingError::FeatherBeyondCutoff { feather, cutoff });
        }

        let cutoff2 = cutoff * cutoff;
        let feather2 = feather * feather;
        let width2 = cutoff2 - feather2;
        Ok(Self {
            cutoff,
            feather,
            cutoff2,
            feather2,
            inv_width2: if width2 > 0.0 { 1.0 / width2 } else { 0.0 },
        })
    }

    #[inline]
    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    #[inline]
    pub fn feather(&self) -> f64 {
        self.feather
    }

    #[inline]
    fn harmonic(&self, r: f64) -> f64 {
        if r >= self.cutoff {
            0.0
        } else if r <= self.feather {
            1.0
        } else {
            (self.cutoff2 - r * r) * self.inv_width2
        }
    }

    #[inline]
    fn d_harmonic(&self, r: f64) -> f64 {
        if r >= self.cutoff || r <= self.feather {
            0.0
        } else {
            -2.0 * r * self.inv_width2
        }
    }

    #[inline]
    fn charmm(&self, r: f64) -> f64 {
        if r >= self.cutoff {
            0.0
        } else if r <= self.feather {
            1.0
        } else {
            let r2 = r * r;
            let a = self.cutoff2 - r2;
            a * a * (self.cutoff2 + 2.0 * r2 - 3.0 * self.feather2) * self.inv_width2.powi(3)
        }
    }

    #[inline]
    fn d_charmm(&self, r: f64) -> f64 {
        if r >= self.cutoff || r <= self.feather {
            0.0
        } else {
            let r2 = r * r;
            12.0 * r * (self.cutoff2 - r2) * (self.feather2 - r2) * self.inv_width2.powi(3)
        }
    }
}

/// Smoothly takes an interaction to zero between a feather distance and a
/// cutoff. Electrostatic and van der Waals terms carry their own windows.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SwitchingFunction {
    /// No cutoff at all: every scale factor is 1.
    #[default]
    NoCutoff,
    /// Quadratic decay in `r²`. Its derivative jumps at both breakpoints, so
    /// it is not safe for force evaluation.
    Harmonic {
        electrostatic: SwitchingWindow,
        vdw: SwitchingWindow,
    },
    /// The CHARMM switching polynomial, continuous in value and first
    /// derivative at both breakpoints.
    Charmm {
        electrostatic: SwitchingWindow,
        vdw: SwitchingWindow,
    },
}

impl SwitchingFunction {
    pub fn no_cutoff() -> Self {
        SwitchingFunction::NoCutoff
    }

    pub fn harmonic(cutoff: f64, feather: f64) -> Result<Self, SwitchingError> {
        let window = SwitchingWindow::new(cutoff, feather)?;
        Ok(SwitchingFunction::Harmonic {
            electrostatic: window,
            vdw: window,
        })
    }

    pub fn harmonic_split(
        elec_cutoff: f64,
        elec_feather: f64,
        vdw_cutoff: f64,
        vdw_feather: f64,
    ) -> Result<Self, SwitchingError> {
        Ok(SwitchingFunction::Harmonic {
            electrostatic: SwitchingWindow::new(elec_cutoff, elec_feather)?,
            vdw: SwitchingWindow::new(vdw_cutoff, vdw_feather)?,
        })
    }

    pub fn charmm(cutoff: f64, feather: f64) -> Result<Self, SwitchingError> {
        let window = SwitchingWindow::new(cutoff, feather)?;
        Ok(SwitchingFunction::Charmm {
            electrostatic: window,
            vdw: window,
        })
    }

    pub fn charmm_split(
        elec_cutoff: f64,
        elec_feather: f64,
        vdw_cutoff: f64,
        vdw_feather: f64,
    ) -> Result<Self, SwitchingError> {
        Ok(SwitchingFunction::Charmm {
            electrostatic: SwitchingWindow::new(elec_cutoff, elec_feather)?,
            vdw: SwitchingWindow::new(vdw_cutoff, vdw_feather)?,
        })
    }

    fn windows(&self) -> Option<(&SwitchingWindow, &SwitchingWindow)> {
        match self {
            SwitchingFunction::NoCutoff => None,
            SwitchingFunction::Harmonic { electrostatic, vdw }
            | SwitchingFunction::Charmm { electrostatic, vdw } => Some((electrostatic, vdw)),
        }
    }

    /// Largest distance at which either term is still non-zero.
    pub fn cutoff_distance(&self) -> f64 {
        self.windows()
            .map_or(f64::INFINITY, |(e, v)| e.cutoff.max(v.cutoff))
    }

    /// Distance below which neither term is scaled.
    pub fn feather_distance(&self) -> f64 {
        self.windows()
            .map_or(f64::INFINITY, |(e, v)| e.feather.min(v.feather))
    }

    pub fn electrostatic_cutoff(&self) -> f64 {
        self.windows().map_or(f64::INFINITY, |(e, _)| e.cutoff)
    }

    pub fn electrostatic_feather(&self) -> f64 {
        self.windows().map_or(f64::INFINITY, |(e, _)| e.feather)
    }

    pub fn vdw_cutoff(&self) -> f64 {
        self.windows().map_or(f64::INFINITY, |(_, v)| v.cutoff)
    }

    pub fn vdw_feather(&self) -> f64 {
        self.windows().map_or(f64::INFINITY, |(_, v)| v.feather)
    }

    /// Whether the scale factors have a continuous first derivative.
    pub fn is_force_safe(&self) -> bool {
        !matches!(self, SwitchingFunction::Harmonic { .. })
    }

    pub fn electrostatic_scale_factor(&self, r: f64) -> f64 {
        match self {
            SwitchingFunction::NoCutoff => 1.0,
            SwitchingFunction::Harmonic { electrostatic, .. } => electrostatic.harmonic(r),
            SwitchingFunction::Charmm { electrostatic, .. } => electrostatic.charmm(r),
        }
    }

    pub fn vdw_scale_factor(&self, r: f64) -> f64 {
        match self {
            SwitchingFunction::NoCutoff => 1.0,
            SwitchingFunction::Harmonic { vdw, .. } => vdw.harmonic(r),
            SwitchingFunction::Charmm { vdw, .. } => vdw.charmm(r),
        }
    }

    pub fn d_electrostatic_scale_factor(&self, r: f64) -> f64 {
        match self {
            SwitchingFunction::NoCutoff => 0.0,
            SwitchingFunction::Harmonic { electrostatic, .. } => electrostatic.d_harmonic(r),
            SwitchingFunction::Charmm { electrostatic, .. } => electrostatic.d_charmm(r),
        }
    }

    pub fn d_vdw_scale_factor(&self, r: f64) -> f64 {
        match self {
            SwitchingFunction::NoCutoff => 0.0,
            SwitchingFunction::Harmonic { vdw, .. } => vdw.d_harmonic(r),
            SwitchingFunction::Charmm { vdw, .. } => vdw.d_charmm(r),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_switched() -> Vec<SwitchingFunction> {
        vec![
            SwitchingFunction::harmonic(10.0, 8.0).unwrap(),
            SwitchingFunction::charmm(10.0, 8.0).unwrap(),
        ]
    }

    #[test]
    fn scale_is_one_at_feather_and_zero_at_cutoff() {
        for f in all_switched() {
            assert_eq!(f.electrostatic_scale_factor(8.0), 1.0);
            assert_eq!(f.vdw_scale_factor(8.0), 1.0);
            assert_eq!(f.electrostatic_scale_factor(10.0), 0.0);
            assert_eq!(f.vdw_scale_factor(10.0), 0.0);
            assert_eq!(f.electrostatic_scale_factor(3.0), 1.0);
            assert_eq!(f.electrostatic_scale_factor(25.0), 0.0);
        }
    }

    #[test]
    fn scale_is_non_increasing_between_breakpoints() {
        for f in all_switched() {
            let mut previous = f.electrostatic_scale_factor(8.0);
            for step in 1..=200 {
                let r = 8.0 + 2.0 * f64::from(step) / 200.0;
                let s = f.electrostatic_scale_factor(r);
                assert!(s <= previous + 1e-15, "{f:?} increases at r = {r}");
                assert!((0.0..=1.0).contains(&s));
                previous = s;
            }
        }
    }

    #[test]
    fn charmm_derivative_matches_finite_difference_and_vanishes_at_breakpoints() {
        let f = SwitchingFunction::charmm(12.0, 9.0).unwrap();
        let h = 1e-6;
        for r in [9.2, 10.0, 10.7, 11.5, 11.9] {
            let numeric = (f.vdw_scale_factor(r + h) - f.vdw_scale_factor(r - h)) / (2.0 * h);
            assert!((numeric - f.d_vdw_scale_factor(r)).abs() < 1e-6, "r = {r}");
        }
        assert!(f.d_vdw_scale_factor(9.0 + 1e-9).abs() < 1e-6);
        assert!(f.d_vdw_scale_factor(12.0 - 1e-9).abs() < 1e-6);
        assert!(f.is_force_safe());
    }

    #[test]
    fn harmonic_derivative_is_discontinuous_and_not_force_safe() {
        let f = SwitchingFunction::harmonic(10.0, 8.0).unwrap();
        assert!(f.d_electrostatic_scale_factor(8.0 + 1e-9) < -0.4);
        assert!(!f.is_force_safe());
    }

    #[test]
    fn no_cutoff_never_scales() {
        let f = SwitchingFunction::no_cutoff();
        assert_eq!(f.electrostatic_scale_factor(1.0e6), 1.0);
        assert_eq!(f.d_vdw_scale_factor(1.0e6), 0.0);
        assert!(f.cutoff_distance().is_infinite());
    }

    #[test]
    fn split_windows_are_independent() {
        let f = SwitchingFunction::charmm_split(15.0, 12.0, 10.0, 8.0).unwrap();
        assert_eq!(f.cutoff_distance(), 15.0);
        assert_eq!(f.feather_distance(), 8.0);
        assert_eq!(f.vdw_scale_factor(11.0), 0.0);
        assert_eq!(f.electrostatic_scale_factor(11.0), 1.0);
    }

    #[test]
    fn equal_feather_and_cutoff_is_a_step() {
        let f = SwitchingFunction::harmonic(10.0, 10.0).unwrap();
        assert_eq!(f.electrostatic_scale_factor(9.999), 1.0);
        assert_eq!(f.electrostatic_scale_factor(10.0), 0.0);
        assert_eq!(f.d_electrostatic_scale_factor(10.0), 0.0);
    }

    #[test]
    fn invalid_windows_are_rejected() {
        assert!(matches!(
            SwitchingFunction::harmonic(0.0, 0.0),
            Err(SwitchingError::NonPositiveCutoff(_))
        ));
        assert!(matches!(
            SwitchingFunction::charmm(10.0, -1.0),
            Err(SwitchingError::NegativeFeather(_))
        ));
        assert!(matches!(
            SwitchingFunction::charmm(10.0, 11.0),
            Err(SwitchingError::FeatherBeyondCutoff { .. })
        ));
    }
}
