use super::config::EntitySpec;
use super::progress::{Progress, ProgressReporter};
use crate::core::kernel::BallSamples;
use crate::core::models::grid::{GridGeometry, VoxelGrid};
use crate::core::models::ids::InstanceId;
use crate::core::models::instance::PlacedInstance;
use crate::core::models::template::EntityTemplate;
use slotmap::SlotMap;
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Instances whose splats are prepared and deposited together.
const INSTANCES_PER_BATCH: usize = 1024;

/// One Gaussian term of one point, sampled inside its cutoff ball.
#[derive(Debug, Clone, Copy)]
struct Splat {
    /// Mass of the term divided by the discrete ball normalisation.
    scale: f64,
    ball: BallSamples,
}

impl Splat {
    /// Adds this splat's contribution to the z-slab `k`, given as an `nx * ny` slice.
    #[inline]
    fn deposit_slab(&self, buffer: &[f64], slab: &mut [f64], k: usize, nx: usize, ny: usize) {
        let k = k as isize;
        let ax = &self.ball.axes[0];
        let bounds = [(0, nx as isize), (0, ny as isize), (k, k + 1)];
        self.ball.for_each_row(buffer, bounds, |_, j, (x0, x1), wzy| {
            let a = self.scale * wzy;
            let j = j as usize;
            let row = &mut slab[j * nx..(j + 1) * nx];
            for i in x0..x1 {
                row[i as usize] += a * ax.weight(buffer, i);
            }
        });
    }
}

/// Splats of a run of instances, with their axis samples in one shared buffer.
#[derive(Debug, Default)]
struct SplatBatch {
    splats: Vec<Splat>,
    buffer: Vec<f64>,
    /// Splat indices touching each z-slab, in splat order.
    slabs: Vec<Vec<usize>>,
    nominal: f64,
}

impl SplatBatch {
    fn clear(&mut self) {
        self.splats.clear();
        self.buffer.clear();
        self.nominal = 0.0;
    }

    fn push(
        &mut self,
        instance: &PlacedInstance,
        template: &EntityTemplate,
        geometry: &GridGeometry,
        cutoff: f64,
    ) {
        for point in template.points() {
            let world = instance.pose.apply(&point.offset);
            let center = geometry.world_to_voxel(&world);
            for term in point.kernel.terms() {
                let width = geometry.spacing.map(|s| term.width / s);
                let ball = BallSamples::sample(&center, &width, cutoff, &mut self.buffer);
                let mass = point.weight * term.fraction;
                self.nominal += mass;
                self.splats.push(Splat {
                    scale: mass / ball.norm,
                    ball,
                });
            }
        }
    }

    fn deposit(&mut self, grid: &mut VoxelGrid) {
        let [nx, ny, nz] = grid.shape();
        self.slabs.resize_with(nz, Vec::new);
        self.slabs.iter_mut().for_each(Vec::clear);
        for (idx, splat) in self.splats.iter().enumerate() {
            if let Some((z0, z1)) = splat.ball.z_range(nz) {
                for slab in &mut self.slabs[z0..z1] {
                    slab.push(idx);
                }
            }
        }

        let (splats, buffer) = (&self.splats, &self.buffer);
        let fill = |(k, (slab, members)): (usize, (&mut [f64], &Vec<usize>))| {
            for &idx in members {
                splats[idx].deposit_slab(buffer, slab, k, nx, ny);
            }
        };

        #[cfg(feature = "parallel")]
        grid.data_mut()
            .par_chunks_mut(nx * ny)
            .zip(self.slabs.par_iter())
            .enumerate()
            .for_each(fill);

        #[cfg(not(feature = "parallel"))]
        grid.data_mut()
            .chunks_mut(nx * ny)
            .zip(self.slabs.iter())
            .enumerate()
            .for_each(fill);
    }
}

/// Adds the density of one placed instance to `grid`.
///
/// Every point of `template` is moved by the instance pose and spread over the voxels
/// within `cutoff` kernel widths of it. Voxels outside the grid are skipped and their
/// share of the mass is lost.
pub fn rasterize(
    instance: &PlacedInstance,
    template: &EntityTemplate,
    grid: &mut VoxelGrid,
    cutoff: f64,
) {
    let geometry = *grid.geometry();
    let mut batch = SplatBatch::default();
    batch.push(instance, template, &geometry, cutoff);
    batch.deposit(grid);
}

/// Rasterizes every instance in acceptance order. Returns the mass that fell outside the
/// grid.
///
/// Instances are processed in batches; within a batch each splat is bucketed by the
/// z-slabs it touches. With the `parallel` feature the slabs are filled independently.
/// Each voxel still receives its contributions in instance order, so the result does not
/// depend on the thread count.
#[instrument(skip_all, name = "rasterizer")]
pub fn rasterize_all(
    instances: &SlotMap<InstanceId, PlacedInstance>,
    entities: &[EntitySpec<'_>],
    grid: &mut VoxelGrid,
    cutoff: f64,
    reporter: &ProgressReporter,
) -> f64 {
    let geometry = *grid.geometry();
    let ordered: Vec<_> = instances
        .values()
        .filter_map(|instance| match entities.get(instance.entity) {
            Some(entity) => Some((instance, entity.template)),
            None => {
                warn!(
                    id = ?instance.id,
                    entity = instance.entity,
                    "Instance refers to an unknown entity; skipped."
                );
                None
            }
        })
        .collect();

    let batches = ordered.chunks(INSTANCES_PER_BATCH);
    debug!(
        instances = ordered.len(),
        batches = batches.len(),
        "Rasterizing kernel splats."
    );
    reporter.report(Progress::TaskStart {
        total_steps: batches.len() as u64,
    });

    let before = grid.sum();
    let mut nominal = 0.0;
    let mut batch = SplatBatch::default();
    for chunk in batches {
        batch.clear();
        for (instance, template) in chunk {
            batch.push(instance, template, &geometry, cutoff);
        }
        nominal += batch.nominal;
        batch.deposit(grid);
        reporter.report(Progress::TaskIncrement);
    }
    reporter.report(Progress::TaskFinish);

    let deposited = grid.sum() - before;
    let clipped = (nominal - deposited).max(0.0);
    info!(deposited, clipped, "Rasterization complete.");
    clipped
}
