use crate::error::{CliError, Result};
use freeze::core::kernel::{GaussianTerm, Kernel};
use freeze::core::models::region::{Axis, PlacementRegion};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct PartialGridConfig {
    pub voxel_size: Option<f64>,
    pub spacing: Option<[f64; 3]>,
    pub extent: Option<[usize; 3]>,
    pub origin: Option<[f64; 3]>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum PartialAxis {
    X,
    Y,
    Z,
}

impl From<PartialAxis> for Axis {
    fn from(p: PartialAxis) -> Self {
        match p {
            PartialAxis::X => Axis::X,
            PartialAxis::Y => Axis::Y,
            PartialAxis::Z => Axis::Z,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum PartialRegion {
    Cuboid {
        min: [f64; 3],
        max: [f64; 3],
    },
    Cylinder {
        center: [f64; 3],
        radius: f64,
        length: f64,
        axis: PartialAxis,
    },
}

impl From<PartialRegion> for PlacementRegion {
    fn from(p: PartialRegion) -> Self {
        match p {
            PartialRegion::Cuboid { min, max } => PlacementRegion::Cuboid {
                min: min.into(),
                max: max.into(),
            },
            PartialRegion::Cylinder {
                center,
                radius,
                length,
                axis,
            } => PlacementRegion::Cylinder {
                center: center.into(),
                radius,
                length,
                axis: axis.into(),
            },
        }
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct PartialPlacementConfig {
    pub max_attempts: Option<usize>,
    pub overlap_tolerance: Option<f64>,
    pub bounding_margin: Option<f64>,
    pub protrusion_margin: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct PartialRasterConfig {
    pub kernel_cutoff: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct PartialBackgroundConfig {
    pub mean: Option<f64>,
    pub variance: Option<f64>,
    pub correlation_length: Option<f64>,
}

/// A `[kernel.<name>]` table: a Gaussian sum given as `[fraction, width]` pairs.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PartialKernel {
    pub terms: Vec<[f64; 2]>,
}

impl From<&PartialKernel> for Kernel {
    fn from(p: &PartialKernel) -> Self {
        Kernel::GaussianSum {
            terms: p
                .terms
                .iter()
                .map(|&[fraction, width]| GaussianTerm { fraction, width })
                .collect(),
        }
    }
}

/// One `[[entity]]` table: a point table on disk and how many copies to place.
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct PartialEntity {
    /// Defaults to the point table's file stem.
    pub id: Option<String>,
    /// CSV point table, relative to the configuration file.
    pub points: String,
    pub count: usize,
    /// Roll, pitch and yaw in degrees; every instance gets this rotation.
    pub fixed_orientation: Option<[f64; 3]>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct PartialFreezeConfig {
    pub seed: Option<u64>,
    pub grid: Option<PartialGridConfig>,
    pub region: Option<PartialRegion>,
    pub placement: Option<PartialPlacementConfig>,
    pub raster: Option<PartialRasterConfig>,
    pub background: Option<PartialBackgroundConfig>,
    #[serde(default, rename = "kernel")]
    pub kernels: BTreeMap<String, PartialKernel>,
    #[serde(default, rename = "entity")]
    pub entities: Vec<PartialEntity>,
}

impl PartialFreezeConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    pub fn from_toml_str(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Applies `KEY=VALUE` overrides given with `-S/--set`.
    pub fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value_str)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };
            let key = key.trim();
            let value_str = value_str.trim();

            match key {
                "seed" => self.seed = Some(parse_value(key, value_str)?),
                "grid.voxel-size" => {
                    let grid = self.grid.get_or_insert_with(Default::default);
                    grid.voxel_size = Some(parse_value(key, value_str)?);
                    grid.spacing = None;
                }
                "placement.max-attempts" => {
                    self.placement
                        .get_or_insert_with(Default::default)
                        .max_attempts = Some(parse_value(key, value_str)?);
                }
                "placement.overlap-tolerance" => {
                    self.placement
                        .get_or_insert_with(Default::default)
                        .overlap_tolerance = Some(parse_value(key, value_str)?);
                }
                "placement.bounding-margin" => {
                    self.placement
                        .get_or_insert_with(Default::default)
                        .bounding_margin = Some(parse_value(key, value_str)?);
                }
                "placement.protrusion-margin" => {
                    self.placement
                        .get_or_insert_with(Default::default)
                        .protrusion_margin = Some(parse_value(key, value_str)?);
                }
                "raster.kernel-cutoff" => {
                    self.raster
                        .get_or_insert_with(Default::default)
                        .kernel_cutoff = Some(parse_value(key, value_str)?);
                }
                "background.mean" => {
                    self.background.get_or_insert_with(Default::default).mean =
                        Some(parse_value(key, value_str)?);
                }
                "background.variance" => {
                    self.background
                        .get_or_insert_with(Default::default)
                        .variance = Some(parse_value(key, value_str)?);
                }
                "background.correlation-length" => {
                    self.background
                        .get_or_insert_with(Default::default)
                        .correlation_length = Some(parse_value(key, value_str)?);
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid value for {}: {}", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
        seed = 11

        [grid]
        voxel-size = 2.0
        extent = [32, 32, 16]
        origin = [-32.0, -32.0, 0.0]

        [region]
        type = "cylinder"
        center = [0.0, 0.0, 16.0]
        radius = 20.0
        length = 24.0
        axis = "z"

        [placement]
        max-attempts = 500
        overlap-tolerance = 1.5
        protrusion-margin = 4.0

        [background]
        mean = 0.1
        variance = 0.01
        correlation-length = 3.0

        [kernel.carbon]
        terms = [[0.7, 0.4], [0.3, 1.1]]

        [[entity]]
        points = "proteins/ribosome.csv"
        count = 4

        [[entity]]
        id = "ion"
        points = "ion.csv"
        count = 100
        fixed-orientation = [0.0, 0.0, 90.0]
    "#;

    #[test]
    fn full_file_deserializes() {
        let config = PartialFreezeConfig::from_toml_str(FULL).unwrap();
        assert_eq!(config.seed, Some(11));
        let grid = config.grid.unwrap();
        assert_eq!(grid.voxel_size, Some(2.0));
        assert_eq!(grid.extent, Some([32, 32, 16]));
        assert_eq!(
            config.region,
            Some(PartialRegion::Cylinder {
                center: [0.0, 0.0, 16.0],
                radius: 20.0,
                length: 24.0,
                axis: PartialAxis::Z,
            })
        );
        assert_eq!(config.placement.unwrap().max_attempts, Some(500));
        assert_eq!(config.entities.len(), 2);
        let carbon = Kernel::from(&config.kernels["carbon"]);
        assert_eq!(
            carbon.terms(),
            vec![
                GaussianTerm {
                    fraction: 0.7,
                    width: 0.4
                },
                GaussianTerm {
                    fraction: 0.3,
                    width: 1.1
                },
            ]
        );
        assert_eq!(config.entities[1].id.as_deref(), Some("ion"));
        assert_eq!(config.entities[1].fixed_orientation, Some([0.0, 0.0, 90.0]));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result = PartialFreezeConfig::from_toml_str("[grid]\nvoxel-sise = 1.0\n");
        assert!(result.is_err());
    }

    #[test]
    fn set_values_override_and_create_sections() {
        let mut config = PartialFreezeConfig::from_toml_str(FULL).unwrap();
        config
            .apply_set_values(&[
                "background.variance=0.04".to_string(),
                "raster.kernel-cutoff = 3".to_string(),
                "grid.voxel-size=1.0".to_string(),
            ])
            .unwrap();

        assert_eq!(config.background.unwrap().variance, Some(0.04));
        assert_eq!(config.raster.unwrap().kernel_cutoff, Some(3.0));
        assert_eq!(config.grid.unwrap().voxel_size, Some(1.0));
    }

    #[test]
    fn malformed_set_values_are_rejected() {
        let mut config = PartialFreezeConfig::default();
        assert!(matches!(
            config.apply_set_values(&["seed".to_string()]),
            Err(CliError::Config(_))
        ));
        assert!(matches!(
            config.apply_set_values(&["placement.max-attempts=many".to_string()]),
            Err(CliError::Config(_))
        ));
        assert!(matches!(
            config.apply_set_values(&["grid.shape=3".to_string()]),
            Err(CliError::Config(_))
        ));
    }
}
