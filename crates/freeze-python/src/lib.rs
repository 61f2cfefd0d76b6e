use freeze::core::kernel::{GaussianTerm, Kernel};
use freeze::core::models::region::{Axis, PlacementRegion};
use freeze::core::models::template::{EntityTemplate, PointContribution};
use freeze::core::utils::geometry::rotation_from_euler_degrees;
use freeze::engine::config::{
    BackgroundSpec, ConfigError, EntitySpec, FreezeConfigBuilder, Orientation,
};
use freeze::engine::error::EngineError;
use freeze::engine::progress::ProgressReporter;
use freeze::engine::report::EntityReport;
use freeze::workflows::freeze::{FreezeResult, run};
use nalgebra::Vector3;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

fn config_err(err: ConfigError) -> PyErr {
    PyValueError::new_err(err.to_string())
}

fn engine_err(err: EngineError) -> PyErr {
    match &err {
        EngineError::InvalidConfiguration(_) => PyValueError::new_err(err.to_string()),
        _ => PyRuntimeError::new_err(err.to_string()),
    }
}

/// A point as passed from Python: `(x, y, z, weight, width)` for a Gaussian, or
/// `(x, y, z, weight, [(fraction, width), ...])` for a Gaussian sum.
#[derive(Debug, Clone, FromPyObject)]
enum PointArg {
    Gaussian(f64, f64, f64, f64, f64),
    Sum(f64, f64, f64, f64, Vec<(f64, f64)>),
}

impl From<PointArg> for PointContribution {
    fn from(arg: PointArg) -> Self {
        match arg {
            PointArg::Gaussian(x, y, z, weight, width) => {
                PointContribution::gaussian(Vector3::new(x, y, z), weight, width)
            }
            PointArg::Sum(x, y, z, weight, terms) => {
                let terms = terms
                    .into_iter()
                    .map(|(fraction, width)| GaussianTerm { fraction, width })
                    .collect();
                PointContribution::new(
                    Vector3::new(x, y, z),
                    weight,
                    Kernel::GaussianSum { terms },
                )
            }
        }
    }
}

/// `(Template, count)` or `(Template, count, (roll, pitch, yaw))` in degrees.
#[derive(FromPyObject)]
enum EntityArg {
    Oriented(PyTemplate, usize, [f64; 3]),
    Plain(PyTemplate, usize),
}

impl EntityArg {
    fn spec(&self) -> EntitySpec<'_> {
        match self {
            Self::Plain(template, count) => EntitySpec::new(&template.inner, *count),
            Self::Oriented(template, count, [roll, pitch, yaw]) => {
                let rotation = rotation_from_euler_degrees(*roll, *pitch, *yaw);
                EntitySpec::new(&template.inner, *count)
                    .with_orientation(Orientation::Fixed(rotation))
            }
        }
    }
}

/// `(center, radius, length, axis)` with `axis` one of `"x"`, `"y"`, `"z"`.
type CylinderArg = ([f64; 3], f64, f64, String);

fn grid_spacing(voxel_size: Option<f64>, spacing: Option<[f64; 3]>) -> Result<[f64; 3], String> {
    match (voxel_size, spacing) {
        (Some(size), None) => Ok([size; 3]),
        (None, Some(spacing)) => Ok(spacing),
        (Some(_), Some(_)) => Err("give either voxel_size or spacing, not both".into()),
        (None, None) => Err("voxel_size or spacing is required".into()),
    }
}

fn placement_region(
    region_min: Option<[f64; 3]>,
    region_max: Option<[f64; 3]>,
    cylinder: Option<CylinderArg>,
) -> Result<Option<PlacementRegion>, String> {
    match (region_min, region_max, cylinder) {
        (None, None, None) => Ok(None),
        (Some(min), Some(max), None) => Ok(Some(PlacementRegion::Cuboid {
            min: min.into(),
            max: max.into(),
        })),
        (None, None, Some((center, radius, length, axis))) => {
            let axis = match axis.to_ascii_lowercase().as_str() {
                "x" => Axis::X,
                "y" => Axis::Y,
                "z" => Axis::Z,
                other => return Err(format!("cylinder axis must be x, y or z, got {:?}", other)),
            };
            Ok(Some(PlacementRegion::Cylinder {
                center: center.into(),
                radius,
                length,
                axis,
            }))
        }
        (_, _, Some(_)) => Err("cylinder cannot be combined with region_min/region_max".into()),
        _ => Err("region_min and region_max must be given together".into()),
    }
}

/// A rigid entity: point contributions relative to the entity's own frame, each
/// `(x, y, z, weight, width)` or `(x, y, z, weight, [(fraction, width), ...])`.
#[pyclass(module = "pyfreeze", name = "Template")]
#[derive(Clone)]
struct PyTemplate {
    inner: EntityTemplate,
}

#[pymethods]
impl PyTemplate {
    #[new]
    fn new(id: String, points: Vec<PointArg>) -> Self {
        let points = points.into_iter().map(Into::into).collect();
        Self {
            inner: EntityTemplate::new(id, points),
        }
    }

    #[getter]
    fn id(&self) -> &str {
        self.inner.id()
    }

    #[getter]
    fn total_weight(&self) -> f64 {
        self.inner.total_weight()
    }

    fn __len__(&self) -> usize {
        self.inner.points().len()
    }

    /// Raises `ValueError` if the template would be rejected by the placement engine.
    fn validate(&self) -> PyResult<()> {
        self.inner
            .validate()
            .map_err(|defect| PyValueError::new_err(format!("{}: {}", self.inner.id(), defect)))
    }

    fn __repr__(&self) -> String {
        format!(
            "Template(id={:?}, points={})",
            self.inner.id(),
            self.inner.points().len()
        )
    }
}

#[pyclass(module = "pyfreeze", name = "EntityReport", frozen)]
#[derive(Clone)]
struct PyEntityReport {
    #[pyo3(get)]
    template_id: String,
    #[pyo3(get)]
    requested: usize,
    #[pyo3(get)]
    placed: usize,
    #[pyo3(get)]
    attempts: usize,
    #[pyo3(get)]
    error: Option<String>,
    #[pyo3(get)]
    translations: Vec<[f64; 3]>,
    #[pyo3(get)]
    rotations: Vec<[[f64; 3]; 3]>,
}

impl From<&EntityReport> for PyEntityReport {
    fn from(report: &EntityReport) -> Self {
        Self {
            template_id: report.template_id.clone(),
            requested: report.requested,
            placed: report.placed,
            attempts: report.attempts,
            error: report.error.clone(),
            translations: report.poses.iter().map(|p| p.translation).collect(),
            rotations: report.poses.iter().map(|p| p.rotation).collect(),
        }
    }
}

#[pymethods]
impl PyEntityReport {
    #[getter]
    fn is_complete(&self) -> bool {
        self.placed >= self.requested
    }

    fn __repr__(&self) -> String {
        format!(
            "EntityReport(template_id={:?}, placed={}/{})",
            self.template_id, self.placed, self.requested
        )
    }
}

/// Finished density grid plus the placement report. `data` is flat with x varying fastest.
#[pyclass(module = "pyfreeze", name = "FreezeResult", frozen)]
struct PyFreezeResult {
    #[pyo3(get)]
    shape: [usize; 3],
    #[pyo3(get)]
    spacing: [f64; 3],
    #[pyo3(get)]
    origin: [f64; 3],
    #[pyo3(get)]
    data: Vec<f64>,
    #[pyo3(get)]
    entities: Vec<PyEntityReport>,
    #[pyo3(get)]
    template_errors: Vec<String>,
    #[pyo3(get)]
    clipped_mass: f64,
    #[pyo3(get)]
    seed: u64,
}

impl From<FreezeResult> for PyFreezeResult {
    fn from(result: FreezeResult) -> Self {
        let entities = result.report.entities.iter().map(Into::into).collect();
        let template_errors = result
            .template_errors
            .iter()
            .map(|e| e.to_string())
            .collect();
        let (geometry, data) = result.grid.into_parts();
        Self {
            shape: geometry.shape,
            spacing: geometry.spacing.into(),
            origin: geometry.origin.into(),
            data,
            entities,
            template_errors,
            clipped_mass: result.clipped_mass,
            seed: result.seed,
        }
    }
}

#[pymethods]
impl PyFreezeResult {
    #[getter]
    fn total_placed(&self) -> usize {
        self.entities.iter().map(|e| e.placed).sum()
    }

    #[getter]
    fn is_complete(&self) -> bool {
        self.entities.iter().all(|e| e.placed >= e.requested)
    }

    fn __repr__(&self) -> String {
        format!(
            "FreezeResult(shape={:?}, placed={}, seed={})",
            self.shape,
            self.total_placed(),
            self.seed
        )
    }
}

/// Places `entities`, rasterizes them and optionally adds an ice background.
///
/// Each entity is `(Template, count)` or `(Template, count, (roll, pitch, yaw))` for a
/// fixed orientation in degrees. The grid spacing is either the scalar `voxel_size` or the
/// per-axis `spacing`. The region is the whole grid, a cuboid from `region_min` and
/// `region_max`, or a `cylinder`. The GIL is released while the pipeline runs.
#[pyfunction]
#[pyo3(
    name = "freeze",
    signature = (
        entities,
        extent,
        voxel_size = None,
        *,
        spacing = None,
        origin = None,
        region_min = None,
        region_max = None,
        cylinder = None,
        overlap_tolerance = 0.0,
        max_attempts = 1000,
        bounding_margin = 0.0,
        protrusion_margin = None,
        kernel_cutoff = 4.0,
        background_mean = None,
        background_variance = 0.0,
        correlation_length = None,
        seed = None,
    )
)]
#[allow(clippy::too_many_arguments)]
fn run_freeze(
    py: Python<'_>,
    entities: Vec<EntityArg>,
    extent: [usize; 3],
    voxel_size: Option<f64>,
    spacing: Option<[f64; 3]>,
    origin: Option<[f64; 3]>,
    region_min: Option<[f64; 3]>,
    region_max: Option<[f64; 3]>,
    cylinder: Option<CylinderArg>,
    overlap_tolerance: f64,
    max_attempts: usize,
    bounding_margin: f64,
    protrusion_margin: Option<f64>,
    kernel_cutoff: f64,
    background_mean: Option<f64>,
    background_variance: f64,
    correlation_length: Option<f64>,
    seed: Option<u64>,
) -> PyResult<PyFreezeResult> {
    let spacing = grid_spacing(voxel_size, spacing).map_err(PyValueError::new_err)?;
    let mut builder = FreezeConfigBuilder::new()
        .extent(extent)
        .voxel_spacing(spacing)
        .overlap_tolerance(overlap_tolerance)
        .max_attempts(max_attempts)
        .bounding_margin(bounding_margin)
        .protrusion_margin(protrusion_margin)
        .kernel_cutoff(kernel_cutoff)
        .seed(seed)
        .background(background_mean.map(|mean| BackgroundSpec {
            mean,
            variance: background_variance,
            correlation_length,
        }));
    if let Some(origin) = origin {
        builder = builder.origin(origin);
    }
    if let Some(region) =
        placement_region(region_min, region_max, cylinder).map_err(PyValueError::new_err)?
    {
        builder = builder.region(region);
    }
    let config = builder.build().map_err(config_err)?;

    let result = py.allow_threads(|| {
        let specs: Vec<EntitySpec<'_>> = entities.iter().map(EntityArg::spec).collect();
        run(&specs, &config, &ProgressReporter::new())
    });
    result.map(Into::into).map_err(engine_err)
}

#[pymodule]
fn pyfreeze(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyTemplate>()?;
    m.add_class::<PyEntityReport>()?;
    m.add_class::<PyFreezeResult>()?;
    m.add_function(wrap_pyfunction!(run_freeze, m)?)?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    Ok(())
}
