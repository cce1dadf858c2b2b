use crate::core::forcefield::params::{CombiningRule, LjPairTable, LjParameter};
use crate::core::forcefield::potentials::{CljPotential, SoftCljPotential, SoftCoreParams};
use crate::core::forcefield::switching::{SwitchingError, SwitchingFunction};
use crate::core::space::{Space, SpaceError};
use crate::engine::Potential;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },

    #[error("Invalid space: {0}")]
    Space(#[from] SpaceError),

    #[error("Invalid switching function: {0}")]
    Switching(#[from] SwitchingError),

    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
}

/// Serialized form of a [`Space`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SpaceDescriptor {
    #[default]
    Cartesian,
    PeriodicBox {
        min: [f64; 3],
        max: [f64; 3],
    },
}

impl TryFrom<&SpaceDescriptor> for Space {
    type Error = SpaceError;

    fn try_from(descriptor: &SpaceDescriptor) -> Result<Self, Self::Error> {
        match descriptor {
            SpaceDescriptor::Cartesian => Ok(Space::cartesian()),
            SpaceDescriptor::PeriodicBox { min, max } => {
                Space::periodic(Point3::from(*min), Point3::from(*max))
            }
        }
    }
}

/// Serialized form of a [`SwitchingFunction`].
///
/// `cutoff` and `feather` apply to both terms unless `vdw-cutoff` /
/// `vdw-feather` give the van der Waals window separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SwitchingDescriptor {
    NoCutoff,
    #[serde(rename_all = "kebab-case")]
    Harmonic {
        cutoff: f64,
        feather: f64,
        vdw_cutoff: Option<f64>,
        vdw_feather: Option<f64>,
    },
    #[serde(rename_all = "kebab-case")]
    Charmm {
        cutoff: f64,
        feather: f64,
        vdw_cutoff: Option<f64>,
        vdw_feather: Option<f64>,
    },
}

impl TryFrom<&SwitchingDescriptor> for SwitchingFunction {
    type Error = SwitchingError;

    fn try_from(descriptor: &SwitchingDescriptor) -> Result<Self, Self::Error> {
        match *descriptor {
            SwitchingDescriptor::NoCutoff => Ok(SwitchingFunction::NoCutoff),
            SwitchingDescriptor::Harmonic {
                cutoff,
                feather,
                vdw_cutoff,
                vdw_feather,
            } => SwitchingFunction::harmonic_split(
                cutoff,
                feather,
                vdw_cutoff.unwrap_or(cutoff),
                vdw_feather.unwrap_or(feather),
            ),
            SwitchingDescriptor::Charmm {
                cutoff,
                feather,
                vdw_cutoff,
                vdw_feather,
            } => SwitchingFunction::charmm_split(
                cutoff,
                feather,
                vdw_cutoff.unwrap_or(cutoff),
                vdw_feather.unwrap_or(feather),
            ),
        }
    }
}

/// The on-disk layout of a kernel configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct KernelConfigFile {
    #[serde(default)]
    pub space: SpaceDescriptor,
    pub switching: SwitchingDescriptor,
    #[serde(default)]
    pub combining_rule: CombiningRule,
    #[serde(default)]
    pub soft_core: Option<SoftCoreParams>,
    #[serde(default)]
    pub shift_electrostatics: bool,
    #[serde(default)]
    pub cell_length: Option<f64>,
}

/// Validated settings shared by every engine task.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelConfig {
    pub space: Space,
    pub switching: SwitchingFunction,
    pub combining_rule: CombiningRule,
    pub soft_core: Option<SoftCoreParams>,
    pub shift_electrostatics: bool,
    cell_length: Option<f64>,
}

impl KernelConfig {
    pub fn builder() -> KernelConfigBuilder {
        KernelConfigBuilder::new()
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: KernelConfigFile = toml::from_str(content).map_err(|e| ConfigError::Toml {
            path: "<string>".to_string(),
            source: e,
        })?;
        Self::try_from(file)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let file: KernelConfigFile = toml::from_str(&content).map_err(|e| ConfigError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::try_from(file)
    }

    /// Cell length for spatial grids: the configured value, or the cutoff.
    pub fn cell_length(&self) -> Result<f64, ConfigError> {
        match self.cell_length {
            Some(length) => Ok(length),
            None => {
                let cutoff = self.switching.cutoff_distance();
                if cutoff.is_finite() {
                    Ok(cutoff)
                } else {
                    Err(ConfigError::MissingParameter("cell_length"))
                }
            }
        }
    }

    /// Builds the LJ pair table for `types` (id 1 onwards) under the configured
    /// combining rule. Explicit pair overrides go through
    /// [`LjPairTable::set_pair`] on the result.
    pub fn lj_table(&self, types: &[LjParameter]) -> LjPairTable {
        LjPairTable::new(types, self.combining_rule)
    }

    /// The pair potential selected by the soft-core settings.
    pub fn potential(&self) -> Potential {
        match self.soft_core {
            Some(params) => Potential::SoftClj(SoftCljPotential::new(params)),
            None => Potential::Clj(CljPotential),
        }
    }
}

impl TryFrom<KernelConfigFile> for KernelConfig {
    type Error = ConfigError;

    fn try_from(file: KernelConfigFile) -> Result<Self, Self::Error> {
        let mut builder = KernelConfigBuilder::new()
            .space(Space::try_from(&file.space)?)
            .switching(SwitchingFunction::try_from(&file.switching)?)
            .combining_rule(file.combining_rule)
            .shift_electrostatics(file.shift_electrostatics);
        if let Some(params) = file.soft_core {
            builder = builder.soft_core(params);
        }
        if let Some(length) = file.cell_length {
            builder = builder.cell_length(length);
        }
        builder.build()
    }
}

#[derive(Default)]
pub struct KernelConfigBuilder {
    space: Option<Space>,
    switching: Option<SwitchingFunction>,
    combining_rule: Option<CombiningRule>,
    soft_core: Option<SoftCoreParams>,
    shift_electrostatics: Option<bool>,
    cell_length: Option<f64>,
}

impl KernelConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn space(mut self, space: Space) -> Self {
        self.space = Some(space);
        self
    }
    pub fn switching(mut self, switching: SwitchingFunction) -> Self {
        self.switching = Some(switching);
        self
    }
    pub fn combining_rule(mut self, rule: CombiningRule) -> Self {
        self.combining_rule = Some(rule);
        self
    }
    pub fn soft_core(mut self, params: SoftCoreParams) -> Self {
        self.soft_core = Some(params);
        self
    }
    pub fn shift_electrostatics(mut self, shift: bool) -> Self {
        self.shift_electrostatics = Some(shift);
        self
    }
    pub fn cell_length(mut self, length: f64) -> Self {
        self.cell_length = Some(length);
        self
    }

    pub fn build(self) -> Result<KernelConfig, ConfigError> {
        let switching = self
            .switching
            .ok_or(ConfigError::MissingParameter("switching"))?;

        if let Some(params) = &self.soft_core {
            if !(0.0..=1.0).contains(&params.alpha) {
                return Err(ConfigError::InvalidValue {
                    parameter: "soft_core.alpha",
                    reason: format!("must lie in [0, 1], got {}", params.alpha),
                });
            }
            if params.coulomb_power < 0 || params.lj_power < 1 {
                return Err(ConfigError::InvalidValue {
                    parameter: "soft_core",
                    reason: format!(
                        "powers must be coulomb >= 0 and lj >= 1, got {} and {}",
                        params.coulomb_power, params.lj_power
                    ),
                });
            }
        }
        if let Some(length) = self.cell_length {
            if !(length > 0.0 && length.is_finite()) {
                return Err(ConfigError::InvalidValue {
                    parameter: "cell_length",
                    reason: format!("must be positive, got {length}"),
                });
            }
        }

        Ok(KernelConfig {
            space: self.space.unwrap_or_default(),
            switching,
            combining_rule: self.combining_rule.unwrap_or_default(),
            soft_core: self.soft_core,
            shift_electrostatics: self.shift_electrostatics.unwrap_or(false),
            cell_length: self.cell_length,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PERIODIC_CHARMM: &str = r#"
combining-rule = "geometric"
shift-electrostatics = true
cell-length = 6.0

[space]
type = "periodic-box"
min = [0.0, 0.0, 0.0]
max = [30.0, 30.0, 30.0]

[switching]
type = "charmm"
cutoff = 12.0
feather = 10.0
vdw-cutoff = 9.0
vdw-feather = 8.0

[soft-core]
alpha = 0.25
coulomb-power = 1
lj-power = 2
"#;

    #[test]
    fn from_toml_str_parses_every_section() {
        let config = KernelConfig::from_toml_str(PERIODIC_CHARMM).unwrap();
        assert!(config.space.is_periodic());
        assert_eq!(config.switching.electrostatic_cutoff(), 12.0);
        assert_eq!(config.switching.vdw_feather(), 8.0);
        assert!(config.switching.is_force_safe());
        assert_eq!(config.combining_rule, CombiningRule::Geometric);
        assert!(config.shift_electrostatics);
        assert_eq!(config.cell_length().unwrap(), 6.0);
        assert!(matches!(config.potential(), Potential::SoftClj(_)));
    }

    #[test]
    fn defaults_apply_to_omitted_sections() {
        let config = KernelConfig::from_toml_str("[switching]\ntype = \"harmonic\"\ncutoff = 10.0\nfeather = 9.0\n").unwrap();
        assert_eq!(config.space, Space::cartesian());
        assert_eq!(config.combining_rule, CombiningRule::Arithmetic);
        assert!(!config.shift_electrostatics);
        assert_eq!(config.cell_length().unwrap(), 10.0);
        assert!(matches!(config.potential(), Potential::Clj(_)));
    }

    #[test]
    fn lj_table_follows_the_configured_combining_rule() {
        let types = [LjParameter::new(3.0, 0.2), LjParameter::new(4.0, 0.05)];
        let geometric = KernelConfig::from_toml_str(PERIODIC_CHARMM).unwrap().lj_table(&types);
        let arithmetic = KernelConfig::builder()
            .switching(SwitchingFunction::NoCutoff)
            .build()
            .unwrap()
            .lj_table(&types);

        assert_eq!(geometric.n_types(), 2);
        assert!((geometric.get(1, 2).unwrap().sigma() - 12.0f64.sqrt()).abs() < 1e-12);
        assert!((arithmetic.get(1, 2).unwrap().sigma() - 3.5).abs() < 1e-12);
        assert!((geometric.get(1, 2).unwrap().epsilon() - 0.1).abs() < 1e-12);
        assert!((arithmetic.get(1, 2).unwrap().epsilon() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("kernel.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(PERIODIC_CHARMM.as_bytes()).unwrap();

        let config = KernelConfig::load(&path).unwrap();
        assert_eq!(config, KernelConfig::from_toml_str(PERIODIC_CHARMM).unwrap());

        let missing = KernelConfig::load(&dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn invalid_values_are_reported() {
        let bad_box = "[space]\ntype = \"periodic-box\"\nmin = [0.0, 0.0, 0.0]\nmax = [10.0, -1.0, 10.0]\n[switching]\ntype = \"no-cutoff\"\n";
        assert!(matches!(KernelConfig::from_toml_str(bad_box), Err(ConfigError::Space(_))));

        let bad_feather = "[switching]\ntype = \"charmm\"\ncutoff = 10.0\nfeather = 12.0\n";
        assert!(matches!(
            KernelConfig::from_toml_str(bad_feather),
            Err(ConfigError::Switching(SwitchingError::FeatherBeyondCutoff { .. }))
        ));

        let unknown_key = "colour = \"blue\"\n[switching]\ntype = \"no-cutoff\"\n";
        assert!(matches!(KernelConfig::from_toml_str(unknown_key), Err(ConfigError::Toml { .. })));
    }

    #[test]
    fn builder_requires_switching_and_validates_soft_core() {
        assert!(matches!(
            KernelConfigBuilder::new().build(),
            Err(ConfigError::MissingParameter("switching"))
        ));

        let result = KernelConfig::builder()
            .switching(SwitchingFunction::NoCutoff)
            .soft_core(SoftCoreParams {
                alpha: 1.5,
                coulomb_power: 1,
                lj_power: 1,
            })
            .build();
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));

        let no_cutoff = KernelConfig::builder()
            .switching(SwitchingFunction::NoCutoff)
            .build()
            .unwrap();
        assert!(matches!(
            no_cutoff.cell_length(),
            Err(ConfigError::MissingParameter("cell_length"))
        ));
    }
}
