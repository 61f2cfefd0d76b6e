use super::config::BackgroundSpec;
use super::error::EngineError;
use crate::core::models::grid::{GridGeometry, VoxelGrid};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use tracing::{debug, info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Smoothing taps extend this many standard deviations each way.
const SMOOTHING_CUTOFF: f64 = 4.0;
/// Taps are folded onto the ring anyway; beyond a few wraps they only add rounding.
const MAX_WRAPS: usize = 8;

/// Additive ice density with the same shape as the grid it will be merged into.
#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundField {
    shape: [usize; 3],
    data: Vec<f64>,
}

impl BackgroundField {
    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            0.0
        } else {
            self.data.iter().sum::<f64>() / self.data.len() as f64
        }
    }

    pub fn variance(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        self.data.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / self.data.len() as f64
    }
}

/// A periodic 1D smoothing kernel as `(shift, weight)` pairs on a ring of length `n`.
#[derive(Debug, Clone, PartialEq)]
struct RingKernel {
    taps: Vec<(usize, f64)>,
}

impl RingKernel {
    /// Gaussian with standard deviation `sigma` (in samples), wrapped onto `n` positions.
    fn gaussian(n: usize, sigma: f64) -> Self {
        let reach = ((SMOOTHING_CUTOFF * sigma).ceil() as usize).min(MAX_WRAPS * n);
        let mut folded = vec![0.0; n];
        for t in -(reach as isize)..=(reach as isize) {
            let d = t as f64 / sigma;
            folded[t.rem_euclid(n as isize) as usize] += (-0.5 * d * d).exp();
        }
        let total: f64 = folded.iter().sum();
        let taps = folded
            .into_iter()
            .enumerate()
            .filter(|(_, w)| *w > 0.0)
            .map(|(shift, w)| (shift, w / total))
            .collect();
        Self { taps }
    }

    fn identity() -> Self {
        Self {
            taps: vec![(0, 1.0)],
        }
    }

    fn l2_norm(&self) -> f64 {
        self.taps.iter().map(|(_, w)| w * w).sum::<f64>().sqrt()
    }
}

/// Writes into `slab` (the z-slab `k` of the output) the circular convolution of `input`
/// along `axis`.
fn smooth_slab(
    input: &[f64],
    slab: &mut [f64],
    k: usize,
    shape: [usize; 3],
    axis: usize,
    kernel: &RingKernel,
) {
    let [nx, ny, nz] = shape;
    for j in 0..ny {
        for i in 0..nx {
            let mut acc = 0.0;
            for &(shift, w) in &kernel.taps {
                let (si, sj, sk) = match axis {
                    0 => ((i + shift) % nx, j, k),
                    1 => (i, (j + shift) % ny, k),
                    _ => (i, j, (k + shift) % nz),
                };
                acc += w * input[(sk * ny + sj) * nx + si];
            }
            slab[j * nx + i] = acc;
        }
    }
}

fn smooth_axis(data: &[f64], shape: [usize; 3], axis: usize, kernel: &RingKernel) -> Vec<f64> {
    let slab_len = shape[0] * shape[1];
    let mut out = vec![0.0; data.len()];

    #[cfg(feature = "parallel")]
    out.par_chunks_mut(slab_len)
        .enumerate()
        .for_each(|(k, slab)| smooth_slab(data, slab, k, shape, axis, kernel));

    #[cfg(not(feature = "parallel"))]
    out.chunks_mut(slab_len)
        .enumerate()
        .for_each(|(k, slab)| smooth_slab(data, slab, k, shape, axis, kernel));

    out
}

/// Unit-variance Gaussian random field on the grid. With a positive correlation length
/// the white noise is smoothed by a periodic Gaussian and rescaled so the per-voxel
/// variance stays exactly one.
fn unit_field<R: Rng + ?Sized>(
    geometry: &GridGeometry,
    correlation_length: f64,
    rng: &mut R,
) -> Vec<f64> {
    let mut field: Vec<f64> = (0..geometry.len())
        .map(|_| StandardNormal.sample(rng))
        .collect();

    if correlation_length <= 0.0 {
        return field;
    }

    let mut norm = 1.0;
    for axis in 0..3 {
        let sigma = correlation_length / geometry.spacing[axis];
        let kernel = if sigma > 0.0 && sigma.is_finite() {
            RingKernel::gaussian(geometry.shape[axis], sigma)
        } else {
            RingKernel::identity()
        };
        debug!(axis, sigma, taps = kernel.taps.len(), "Smoothing background axis.");
        norm *= kernel.l2_norm();
        field = smooth_axis(&field, geometry.shape, axis, &kernel);
    }

    if norm > 0.0 {
        field.iter_mut().for_each(|v| *v /= norm);
    }
    field
}

/// Draws a background field with the requested statistics.
///
/// Fails with `NumericOverflow` if any voxel comes out non-finite; no partial field is
/// returned in that case.
#[instrument(skip_all, name = "background_synthesizer")]
pub fn synthesize<R: Rng + ?Sized>(
    geometry: &GridGeometry,
    spec: &BackgroundSpec,
    rng: &mut R,
) -> Result<BackgroundField, EngineError> {
    let correlation_length = spec.correlation_length.unwrap_or(0.0);
    let field = unit_field(geometry, correlation_length, rng);

    let scale = spec.variance.sqrt();
    let mut data = Vec::with_capacity(field.len());
    for (index, z) in field.into_iter().enumerate() {
        let value = spec.mean + scale * z;
        if !value.is_finite() {
            return Err(EngineError::NumericOverflow { index, value });
        }
        data.push(value);
    }

    let field = BackgroundField {
        shape: geometry.shape,
        data,
    };
    info!(
        mean = field.mean(),
        variance = field.variance(),
        correlation_length,
        "Background field synthesized."
    );
    Ok(field)
}

/// Adds `field` to `grid` voxel by voxel.
pub fn merge(grid: &mut VoxelGrid, field: &BackgroundField) -> Result<(), EngineError> {
    if grid.shape() != field.shape {
        return Err(EngineError::ShapeMismatch {
            expected: grid.shape(),
            found: field.shape,
        });
    }
    grid.data_mut()
        .iter_mut()
        .zip(&field.data)
        .for_each(|(v, b)| *v += b);
    Ok(())
}
