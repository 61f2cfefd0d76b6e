use crate::error::{CliError, Result};
use freeze::core::models::grid::VoxelGrid;
use freeze::engine::report::EntityReport;
use freeze::workflows::freeze::FreezeResult;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Sidecar header describing the layout of the raw grid file.
#[derive(Debug, Serialize)]
struct GridHeader<'a> {
    data: &'a str,
    dtype: &'static str,
    byte_order: &'static str,
    /// Index order of the raw values; x varies fastest.
    order: &'static str,
    shape: [usize; 3],
    spacing: [f64; 3],
    origin: [f64; 3],
}

#[derive(Debug, Serialize)]
struct ReportFile<'a> {
    /// Kept as a string: TOML integers are signed 64-bit.
    seed: String,
    total_requested: usize,
    total_placed: usize,
    clipped_mass: f64,
    #[serde(rename = "entity")]
    entities: &'a [EntityReport],
}

/// Paths written for one output stem.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPaths {
    pub raw: PathBuf,
    pub header: PathBuf,
    pub report: PathBuf,
}

impl OutputPaths {
    pub fn from_stem(stem: &Path) -> Self {
        let with_suffix = |suffix: &str| {
            let mut name = stem.as_os_str().to_os_string();
            name.push(suffix);
            PathBuf::from(name)
        };
        Self {
            raw: with_suffix(".raw"),
            header: with_suffix(".toml"),
            report: with_suffix(".report.toml"),
        }
    }
}

fn output_error(path: &Path, source: impl Into<anyhow::Error>) -> CliError {
    CliError::Output {
        path: path.to_path_buf(),
        source: source.into(),
    }
}

/// Writes the grid as little-endian `f32` values in storage order.
pub fn write_raw_grid(grid: &VoxelGrid, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| output_error(path, e))?;
    let mut writer = BufWriter::new(file);
    for value in grid.data() {
        writer
            .write_all(&(*value as f32).to_le_bytes())
            .map_err(|e| output_error(path, e))?;
    }
    writer.flush().map_err(|e| output_error(path, e))
}

pub fn write_grid_header(grid: &VoxelGrid, raw_path: &Path, path: &Path) -> Result<()> {
    let geometry = grid.geometry();
    let data_name = raw_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let header = GridHeader {
        data: &data_name,
        dtype: "f32",
        byte_order: "little",
        order: "xyz",
        shape: geometry.shape,
        spacing: geometry.spacing.into(),
        origin: geometry.origin.into(),
    };
    let text = toml::to_string_pretty(&header).map_err(|e| output_error(path, e))?;
    std::fs::write(path, text).map_err(|e| output_error(path, e))
}

pub fn write_report(result: &FreezeResult, path: &Path) -> Result<()> {
    let report = ReportFile {
        seed: result.seed.to_string(),
        total_requested: result.report.total_requested(),
        total_placed: result.report.total_placed(),
        clipped_mass: result.clipped_mass,
        entities: &result.report.entities,
    };
    let text = toml::to_string_pretty(&report).map_err(|e| output_error(path, e))?;
    std::fs::write(path, text).map_err(|e| output_error(path, e))
}

/// Writes grid, header and report next to `stem`, creating the parent directory if needed.
pub fn write_all(result: &FreezeResult, stem: &Path) -> Result<OutputPaths> {
    let paths = OutputPaths::from_stem(stem);
    if let Some(parent) = stem.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    write_raw_grid(&result.grid, &paths.raw)?;
    write_grid_header(&result.grid, &paths.raw, &paths.header)?;
    write_report(result, &paths.report)?;
    info!(
        raw = %paths.raw.display(),
        report = %paths.report.display(),
        "Output written."
    );
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use freeze::core::models::grid::GridGeometry;
    use freeze::core::models::template::{EntityTemplate, PointContribution};
    use freeze::engine::config::{EntitySpec, FreezeConfigBuilder};
    use freeze::engine::progress::ProgressReporter;
    use freeze::workflows::freeze::run;
    use nalgebra::Vector3;

    fn small_result() -> FreezeResult {
        let template = EntityTemplate::new(
            "atom",
            vec![PointContribution::gaussian(Vector3::zeros(), 1.0, 0.7)],
        );
        let config = FreezeConfigBuilder::new()
            .voxel_size(0.5)
            .extent([6, 5, 4])
            .seed(Some(3))
            .build()
            .unwrap();
        run(
            &[EntitySpec::new(&template, 2)],
            &config,
            &ProgressReporter::new(),
        )
        .unwrap()
    }

    #[test]
    fn output_paths_append_suffixes_to_the_stem() {
        let paths = OutputPaths::from_stem(Path::new("out/sample.v1"));
        assert_eq!(paths.raw, PathBuf::from("out/sample.v1.raw"));
        assert_eq!(paths.header, PathBuf::from("out/sample.v1.toml"));
        assert_eq!(paths.report, PathBuf::from("out/sample.v1.report.toml"));
    }

    #[test]
    fn raw_grid_holds_little_endian_f32_in_storage_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.raw");
        let mut grid = VoxelGrid::zeros(GridGeometry::cubic([3, 2, 2], 1.0));
        grid.add(1, 0, 0, 0.5);
        grid.add(2, 1, 1, -2.0);

        write_raw_grid(&grid, &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 12 * 4);
        let values: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(values[1], 0.5);
        assert_eq!(values[11], -2.0);
        assert_eq!(values.iter().filter(|v| **v != 0.0).count(), 2);
    }

    #[test]
    fn write_all_produces_header_and_report() {
        let dir = tempfile::tempdir().unwrap();
        let stem = dir.path().join("nested").join("sample");
        let result = small_result();

        let paths = write_all(&result, &stem).unwrap();

        let header: toml::Table =
            toml::from_str(&std::fs::read_to_string(&paths.header).unwrap()).unwrap();
        assert_eq!(header["data"].as_str(), Some("sample.raw"));
        assert_eq!(header["dtype"].as_str(), Some("f32"));
        assert_eq!(header["shape"].as_array().unwrap().len(), 3);
        assert_eq!(header["spacing"][0].as_float(), Some(0.5));

        let report: toml::Table =
            toml::from_str(&std::fs::read_to_string(&paths.report).unwrap()).unwrap();
        assert_eq!(report["seed"].as_str(), Some("3"));
        assert_eq!(report["total_requested"].as_integer(), Some(2));
        let entity = &report["entity"][0];
        assert_eq!(entity["template_id"].as_str(), Some("atom"));
        assert_eq!(
            entity["poses"].as_array().unwrap().len() as i64,
            entity["placed"].as_integer().unwrap()
        );

        assert_eq!(std::fs::metadata(&paths.raw).unwrap().len(), 6 * 5 * 4 * 4);
    }
}
