mod defaults;
mod file;
mod models;

pub use file::PartialFreezeConfig;
pub use models::{AppConfig, EntityEntry};

use crate::cli::ConfigArgs;
use crate::error::{CliError, Result};
use crate::points::{self, KernelTable};
use defaults::DefaultsConfig;
use file::{PartialBackgroundConfig, PartialEntity, PartialGridConfig};
use freeze::core::utils::geometry::rotation_from_euler_degrees;
use freeze::engine::config::{self as core_config, BackgroundSpec, Orientation};
use std::path::Path;
use tracing::info;

/// Loads the configuration file named in `args`, applies the command-line overrides and
/// builds a validated core configuration together with every entity's point table.
pub fn build_config(args: &ConfigArgs) -> Result<AppConfig> {
    let partial = PartialFreezeConfig::from_file(&args.config)?;
    let base_dir = args.config.parent().unwrap_or_else(|| Path::new("."));
    partial.merge_with_cli(args, base_dir)
}

impl PartialFreezeConfig {
    pub fn merge_with_cli(mut self, args: &ConfigArgs, base_dir: &Path) -> Result<AppConfig> {
        self.apply_set_values(&args.set_values)?;
        let defaults = DefaultsConfig::default();

        let grid = self.grid.take().unwrap_or_default();
        let placement = self.placement.take().unwrap_or_default();
        let raster = self.raster.take().unwrap_or_default();

        let mut builder = core_config::FreezeConfigBuilder::new()
            .extent(
                grid.extent
                    .ok_or_else(|| CliError::Config("`grid.extent` is required.".to_string()))?,
            )
            .origin(grid.origin.unwrap_or(defaults.origin))
            .max_attempts(
                args.max_attempts
                    .or(placement.max_attempts)
                    .unwrap_or(defaults.max_attempts),
            )
            .overlap_tolerance(
                args.tolerance
                    .or(placement.overlap_tolerance)
                    .unwrap_or(defaults.overlap_tolerance),
            )
            .bounding_margin(placement.bounding_margin.unwrap_or(defaults.bounding_margin))
            .protrusion_margin(placement.protrusion_margin)
            .kernel_cutoff(raster.kernel_cutoff.unwrap_or(defaults.kernel_cutoff))
            .seed(args.seed.or(self.seed));

        builder = Self::merge_spacing(builder, &grid)?;
        if let Some(region) = self.region.take() {
            builder = builder.region(region.into());
        }
        builder = builder.background(Self::merge_background(
            args.no_background,
            self.background.take(),
            &defaults,
        ));

        let core_config = builder
            .build()
            .map_err(|e| CliError::Config(e.to_string()))?;

        if self.entities.is_empty() {
            return Err(CliError::Config(
                "At least one `[[entity]]` table is required.".to_string(),
            ));
        }
        let kernels: KernelTable = self
            .kernels
            .iter()
            .map(|(name, kernel)| (name.clone(), kernel.into()))
            .collect();
        let entities = self
            .entities
            .iter()
            .map(|entity| Self::load_entity(entity, base_dir, &kernels))
            .collect::<Result<Vec<_>>>()?;
        info!(
            entities = entities.len(),
            "Configuration loaded and validated."
        );

        Ok(AppConfig {
            entities,
            core_config,
        })
    }

    fn merge_spacing(
        builder: core_config::FreezeConfigBuilder,
        grid: &PartialGridConfig,
    ) -> Result<core_config::FreezeConfigBuilder> {
        match (grid.voxel_size, grid.spacing) {
            (Some(_), Some(_)) => Err(CliError::Config(
                "Use either `grid.voxel-size` or `grid.spacing`, not both.".to_string(),
            )),
            (Some(size), None) => Ok(builder.voxel_size(size)),
            (None, Some(spacing)) => Ok(builder.voxel_spacing(spacing)),
            (None, None) => Err(CliError::Config(
                "`grid.voxel-size` or `grid.spacing` is required.".to_string(),
            )),
        }
    }

    fn merge_background(
        cli_no_background: bool,
        partial: Option<PartialBackgroundConfig>,
        defaults: &DefaultsConfig,
    ) -> Option<BackgroundSpec> {
        if cli_no_background {
            return None;
        }
        partial.map(|p| BackgroundSpec {
            mean: p.mean.unwrap_or(defaults.background_mean),
            variance: p.variance.unwrap_or(defaults.background_variance),
            correlation_length: p.correlation_length,
        })
    }

    fn load_entity(
        entity: &PartialEntity,
        base_dir: &Path,
        kernels: &KernelTable,
    ) -> Result<EntityEntry> {
        let path = base_dir.join(&entity.points);
        let id = match &entity.id {
            Some(id) => id.clone(),
            None => path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    CliError::Config(format!(
                        "Cannot derive an entity id from '{}'; set `id` explicitly.",
                        entity.points
                    ))
                })?,
        };
        let orientation = match entity.fixed_orientation {
            Some([roll, pitch, yaw]) => {
                Orientation::Fixed(rotation_from_euler_degrees(roll, pitch, yaw))
            }
            None => Orientation::Random,
        };
        Ok(EntityEntry {
            template: points::load_template(&path, &id, kernels)?,
            count: entity.count,
            orientation,
        })
    }
}
