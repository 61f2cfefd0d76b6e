use crate::error::{CliError, Result};
use anyhow::{anyhow, bail};
use freeze::core::kernel::Kernel;
use freeze::core::models::template::{EntityTemplate, PointContribution};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Named kernels that point tables may refer to through their `kernel` column.
pub type KernelTable = BTreeMap<String, Kernel>;

/// One row of a point table. Positions and widths share the grid's length unit.
///
/// A row carries either a Gaussian `width` or the name of a kernel from the
/// configuration's `[kernel.<name>]` tables.
#[derive(Debug, Deserialize)]
struct PointRecord {
    x: f64,
    y: f64,
    z: f64,
    weight: f64,
    #[serde(default)]
    width: Option<f64>,
    #[serde(default)]
    kernel: Option<String>,
}

impl PointRecord {
    fn into_point(self, kernels: &KernelTable) -> anyhow::Result<PointContribution> {
        let kernel = match (self.width, self.kernel) {
            (Some(width), None) => Kernel::gaussian(width),
            (None, Some(name)) => kernels
                .get(&name)
                .cloned()
                .ok_or_else(|| anyhow!("unknown kernel '{}'", name))?,
            (Some(_), Some(name)) => {
                bail!("row gives both a width and the kernel '{}'", name)
            }
            (None, None) => bail!("row needs either a width or a kernel name"),
        };
        Ok(PointContribution::new(
            [self.x, self.y, self.z].into(),
            self.weight,
            kernel,
        ))
    }
}

fn read_points<R: Read>(
    reader: R,
    kernels: &KernelTable,
) -> anyhow::Result<Vec<PointContribution>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(reader);
    reader
        .deserialize::<PointRecord>()
        .enumerate()
        .map(|(row, record)| {
            record?
                .into_point(kernels)
                .map_err(|e| e.context(format!("point {}", row + 1)))
        })
        .collect()
}

/// Reads a CSV point table with the header `x,y,z,weight,width` (or a `kernel` column
/// naming an entry of `kernels`) into a template.
///
/// Templates are not validated here; the placement engine reports defective ones.
pub fn load_template(path: &Path, id: &str, kernels: &KernelTable) -> Result<EntityTemplate> {
    let file = std::fs::File::open(path)?;
    let points = read_points(file, kernels).map_err(|e| CliError::FileParsing {
        path: path.to_path_buf(),
        source: e,
    })?;
    debug!(id, points = points.len(), "Loaded point table {:?}", path);
    Ok(EntityTemplate::new(id, points))
}
