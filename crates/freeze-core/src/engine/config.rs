use crate::core::kernel::DEFAULT_CUTOFF;
use crate::core::models::grid::GridGeometry;
use crate::core::models::region::PlacementRegion;
use crate::core::models::template::EntityTemplate;
use nalgebra::{Rotation3, Vector3};
use thiserror::Error;

pub const DEFAULT_MAX_ATTEMPTS: usize = 1000;
pub const DEFAULT_OVERLAP_TOLERANCE: f64 = 0.0;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Voxel spacing must be positive and finite on every axis, got {0:?}")]
    NonPositiveSpacing([f64; 3]),

    #[error("Grid extent must be non-zero on every axis, got {0:?}")]
    EmptyExtent([usize; 3]),

    #[error("Grid extent {0:?} has more voxels than can be allocated")]
    GridTooLarge([usize; 3]),

    #[error("Grid origin must be finite, got {0:?}")]
    NonFiniteOrigin([f64; 3]),

    #[error("Placement region is malformed: {0}")]
    MalformedRegion(String),

    #[error(
        "Placement region {region_min:?}..{region_max:?} lies outside the grid {grid_min:?}..{grid_max:?}"
    )]
    RegionOutsideGrid {
        region_min: [f64; 3],
        region_max: [f64; 3],
        grid_min: [f64; 3],
        grid_max: [f64; 3],
    },

    #[error("Placement attempt budget must be at least 1")]
    ZeroAttemptBudget,

    #[error("Parameter '{name}' must be {requirement}, got {value}")]
    OutOfRange {
        name: &'static str,
        requirement: &'static str,
        value: f64,
    },
}

/// How a placed entity is oriented.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Orientation {
    /// A fresh uniformly random rotation for every candidate pose.
    Random,
    /// The same rotation for every instance.
    Fixed(Rotation3<f64>),
}

/// One requested entity: a caller-owned template, how many copies to place and how to
/// orient them.
#[derive(Debug, Clone, Copy)]
pub struct EntitySpec<'a> {
    pub template: &'a EntityTemplate,
    pub count: usize,
    pub orientation: Orientation,
}

impl<'a> EntitySpec<'a> {
    pub fn new(template: &'a EntityTemplate, count: usize) -> Self {
        Self {
            template,
            count,
            orientation: Orientation::Random,
        }
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VolumeSpec {
    pub geometry: GridGeometry,
    pub region: PlacementRegion,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacementConfig {
    /// Minimum surface gap between two accepted bounding spheres.
    pub overlap_tolerance: f64,
    /// Candidate poses tried per requested instance before giving up on it.
    pub max_attempts: usize,
    /// Extra radius added to every template's bounding sphere.
    pub bounding_margin: f64,
    /// How far a bounding sphere may reach past the grid box; `None` means unlimited.
    pub protrusion_margin: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterConfig {
    /// Kernel support in units of kernel width.
    pub kernel_cutoff: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackgroundSpec {
    pub mean: f64,
    pub variance: f64,
    /// Gaussian correlation length in world units; `None` or zero gives white noise.
    pub correlation_length: Option<f64>,
}

impl BackgroundSpec {
    pub fn white(mean: f64, variance: f64) -> Self {
        Self {
            mean,
            variance,
            correlation_length: None,
        }
    }

    pub fn correlated(mean: f64, variance: f64, correlation_length: f64) -> Self {
        Self {
            mean,
            variance,
            correlation_length: Some(correlation_length),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FreezeConfig {
    pub volume: VolumeSpec,
    pub placement: PlacementConfig,
    pub raster: RasterConfig,
    pub background: Option<BackgroundSpec>,
    /// Seed of the run's random generator; `None` draws one from the OS.
    pub seed: Option<u64>,
}

impl FreezeConfig {
    /// Checks every constraint that must hold before any placement attempt is made.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let geometry = &self.volume.geometry;
        let spacing = geometry.spacing;
        if !spacing.iter().all(|s| s.is_finite() && *s > 0.0) {
            return Err(ConfigError::NonPositiveSpacing(spacing.into()));
        }
        if geometry.shape.contains(&0) {
            return Err(ConfigError::EmptyExtent(geometry.shape));
        }
        if geometry.checked_len().is_none() {
            return Err(ConfigError::GridTooLarge(geometry.shape));
        }
        if !geometry.origin.iter().all(|o| o.is_finite()) {
            return Err(ConfigError::NonFiniteOrigin(geometry.origin.into()));
        }

        let region = &self.volume.region;
        if !region.is_well_formed() {
            return Err(ConfigError::MalformedRegion(format!("{:?}", region)));
        }
        let (region_min, region_max) = region.bounding_box();
        let (grid_min, grid_max) = (geometry.world_min(), geometry.world_max());
        let inside = (0..3).all(|a| region_min[a] >= grid_min[a] && region_max[a] <= grid_max[a]);
        if !inside {
            return Err(ConfigError::RegionOutsideGrid {
                region_min: region_min.into(),
                region_max: region_max.into(),
                grid_min: grid_min.into(),
                grid_max: grid_max.into(),
            });
        }

        let placement = &self.placement;
        if placement.max_attempts == 0 {
            return Err(ConfigError::ZeroAttemptBudget);
        }
        require(
            "overlap_tolerance",
            "finite",
            placement.overlap_tolerance,
            placement.overlap_tolerance.is_finite(),
        )?;
        require(
            "bounding_margin",
            "non-negative and finite",
            placement.bounding_margin,
            placement.bounding_margin.is_finite() && placement.bounding_margin >= 0.0,
        )?;
        if let Some(margin) = placement.protrusion_margin {
            require(
                "protrusion_margin",
                "non-negative",
                margin,
                margin >= 0.0 && !margin.is_nan(),
            )?;
        }

        let cutoff = self.raster.kernel_cutoff;
        require(
            "kernel_cutoff",
            "positive and finite",
            cutoff,
            cutoff.is_finite() && cutoff > 0.0,
        )?;

        if let Some(background) = &self.background {
            require(
                "background.mean",
                "finite",
                background.mean,
                background.mean.is_finite(),
            )?;
            require(
                "background.variance",
                "non-negative and finite",
                background.variance,
                background.variance.is_finite() && background.variance >= 0.0,
            )?;
            if let Some(length) = background.correlation_length {
                require(
                    "background.correlation_length",
                    "non-negative and finite",
                    length,
                    length.is_finite() && length >= 0.0,
                )?;
            }
        }
        Ok(())
    }
}

fn require(
    name: &'static str,
    requirement: &'static str,
    value: f64,
    ok: bool,
) -> Result<(), ConfigError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            requirement,
            value,
        })
    }
}

#[derive(Default)]
pub struct FreezeConfigBuilder {
    spacing: Option<Vector3<f64>>,
    extent: Option<[usize; 3]>,
    origin: Option<Vector3<f64>>,
    region: Option<PlacementRegion>,
    overlap_tolerance: Option<f64>,
    max_attempts: Option<usize>,
    bounding_margin: Option<f64>,
    protrusion_margin: Option<f64>,
    kernel_cutoff: Option<f64>,
    background: Option<BackgroundSpec>,
    seed: Option<u64>,
}

impl FreezeConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn voxel_size(mut self, size: f64) -> Self {
        self.spacing = Some(Vector3::repeat(size));
        self
    }
    pub fn voxel_spacing(mut self, spacing: [f64; 3]) -> Self {
        self.spacing = Some(spacing.into());
        self
    }
    pub fn extent(mut self, extent: [usize; 3]) -> Self {
        self.extent = Some(extent);
        self
    }
    pub fn origin(mut self, origin: [f64; 3]) -> Self {
        self.origin = Some(origin.into());
        self
    }
    pub fn region(mut self, region: PlacementRegion) -> Self {
        self.region = Some(region);
        self
    }
    pub fn overlap_tolerance(mut self, tolerance: f64) -> Self {
        self.overlap_tolerance = Some(tolerance);
        self
    }
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = Some(attempts);
        self
    }
    pub fn bounding_margin(mut self, margin: f64) -> Self {
        self.bounding_margin = Some(margin);
        self
    }
    pub fn protrusion_margin(mut self, margin: Option<f64>) -> Self {
        self.protrusion_margin = margin;
        self
    }
    pub fn kernel_cutoff(mut self, cutoff: f64) -> Self {
        self.kernel_cutoff = Some(cutoff);
        self
    }
    pub fn background(mut self, background: Option<BackgroundSpec>) -> Self {
        self.background = background;
        self
    }
    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Assembles and validates the configuration. Without an explicit region the whole
    /// grid box is the placement region.
    pub fn build(self) -> Result<FreezeConfig, ConfigError> {
        let spacing = self
            .spacing
            .ok_or(ConfigError::MissingParameter("voxel_spacing"))?;
        let extent = self.extent.ok_or(ConfigError::MissingParameter("extent"))?;
        let geometry = GridGeometry::new(
            extent,
            spacing,
            self.origin.unwrap_or_else(Vector3::zeros),
        );
        let region = self.region.unwrap_or_else(|| PlacementRegion::Cuboid {
            min: geometry.world_min(),
            max: geometry.world_max(),
        });

        let config = FreezeConfig {
            volume: VolumeSpec { geometry, region },
            placement: PlacementConfig {
                overlap_tolerance: self
                    .overlap_tolerance
                    .unwrap_or(DEFAULT_OVERLAP_TOLERANCE),
                max_attempts: self.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
                bounding_margin: self.bounding_margin.unwrap_or(0.0),
                protrusion_margin: self.protrusion_margin,
            },
            raster: RasterConfig {
                kernel_cutoff: self.kernel_cutoff.unwrap_or(DEFAULT_CUTOFF),
            },
            background: self.background,
            seed: self.seed,
        };
        config.validate()?;
        Ok(config)
    }
}
