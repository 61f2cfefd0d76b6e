use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use thiserror::Error;

/// Kernel support in units of kernel width beyond which contributions are exactly zero.
pub const DEFAULT_CUTOFF: f64 = 4.0;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum KernelDefect {
    #[error("kernel width must be positive and finite, got {0}")]
    NonPositiveWidth(f64),
    #[error("Gaussian sum has no terms")]
    EmptySum,
    #[error("Gaussian sum fraction must be non-negative and finite, got {0}")]
    InvalidFraction(f64),
    #[error("Gaussian sum fractions add up to zero")]
    ZeroTotalFraction,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaussianTerm {
    pub fraction: f64,
    pub width: f64,
}

/// Spatial spread of a single point contribution.
///
/// A closed set of kernel shapes: every variant integrates to one over all space, so the
/// density deposited by a point equals its declared scattering weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Kernel {
    /// Isotropic normalised Gaussian with standard deviation `width`.
    Gaussian { width: f64 },
    /// Weighted sum of isotropic Gaussians, e.g. a tabulated atomic form factor.
    /// Fractions are renormalised to sum to one.
    GaussianSum { terms: Vec<GaussianTerm> },
}

impl Kernel {
    pub fn gaussian(width: f64) -> Self {
        Self::Gaussian { width }
    }

    pub fn validate(&self) -> Result<(), KernelDefect> {
        match self {
            Self::Gaussian { width } => check_width(*width),
            Self::GaussianSum { terms } => {
                if terms.is_empty() {
                    return Err(KernelDefect::EmptySum);
                }
                let mut total = 0.0;
                for term in terms {
                    if !term.fraction.is_finite() || term.fraction < 0.0 {
                        return Err(KernelDefect::InvalidFraction(term.fraction));
                    }
                    check_width(term.width)?;
                    total += term.fraction;
                }
                if total <= 0.0 {
                    return Err(KernelDefect::ZeroTotalFraction);
                }
                Ok(())
            }
        }
    }

    /// Terms with fractions normalised to sum to one; zero-fraction terms are dropped.
    pub fn terms(&self) -> Vec<GaussianTerm> {
        match self {
            Self::Gaussian { width } => vec![GaussianTerm {
                fraction: 1.0,
                width: *width,
            }],
            Self::GaussianSum { terms } => {
                let total: f64 = terms.iter().map(|t| t.fraction).sum();
                terms
                    .iter()
                    .filter(|t| t.fraction > 0.0)
                    .map(|t| GaussianTerm {
                        fraction: t.fraction / total,
                        width: t.width,
                    })
                    .collect()
            }
        }
    }

    pub fn max_width(&self) -> f64 {
        match self {
            Self::Gaussian { width } => *width,
            Self::GaussianSum { terms } => terms
                .iter()
                .filter(|t| t.fraction > 0.0)
                .map(|t| t.width)
                .fold(0.0, f64::max),
        }
    }

}

fn check_width(width: f64) -> Result<(), KernelDefect> {
    if width.is_finite() && width > 0.0 {
        Ok(())
    } else {
        Err(KernelDefect::NonPositiveWidth(width))
    }
}

#[inline]
fn gaussian_density(r2: f64, width: f64) -> f64 {
    let norm = (2.0 * PI).powf(1.5) * width.powi(3);
    (-0.5 * r2 / (width * width)).exp() / norm
}

/// Density contributed by a point of the given `weight` at `offset` from the point.
///
/// Each Gaussian term is truncated to exactly zero beyond `cutoff` widths.
pub fn evaluate(kernel: &Kernel, weight: f64, offset: &Vector3<f64>, cutoff: f64) -> f64 {
    let r2 = offset.norm_squared();
    kernel
        .terms()
        .iter()
        .filter(|term| r2 <= (cutoff * term.width).powi(2))
        .fold(0.0, |acc, term| {
            acc + weight * term.fraction * gaussian_density(r2, term.width)
        })
}

/// Unnormalised Gaussian samples along one grid axis.
///
/// The samples live in a caller-owned buffer: `buffer[offset + n]` belongs to voxel index
/// `start + n`. The window may extend past either end of the grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisWindow {
    pub start: isize,
    pub len: usize,
    offset: usize,
    center: f64,
    width: f64,
    collapsed: bool,
}

impl AxisWindow {
    /// Samples a Gaussian of `width` (voxel units) centred at `center` (continuous voxel
    /// coordinate, integers are voxel centres) at every voxel within `cutoff` widths, and
    /// appends the samples to `buffer`.
    ///
    /// A kernel too narrow to reach any voxel centre collapses onto the nearest voxel.
    pub fn sample(center: f64, width: f64, cutoff: f64, buffer: &mut Vec<f64>) -> Self {
        let offset = buffer.len();
        let reach = cutoff * width;
        let lo = (center - reach).ceil() as isize;
        let hi = (center + reach).floor() as isize;

        if hi < lo {
            return Self::nearest(center, buffer);
        }

        buffer.extend((lo..=hi).map(|i| {
            let d = (i as f64 - center) / width;
            (-0.5 * d * d).exp()
        }));
        Self {
            start: lo,
            len: (hi - lo + 1) as usize,
            offset,
            center,
            width,
            collapsed: false,
        }
    }

    fn nearest(center: f64, buffer: &mut Vec<f64>) -> Self {
        let offset = buffer.len();
        buffer.push(1.0);
        Self {
            start: center.round() as isize,
            len: 1,
            offset,
            center,
            width: 1.0,
            collapsed: true,
        }
    }

    pub fn end(&self) -> isize {
        self.start + self.len as isize
    }

    #[inline]
    pub fn weight(&self, buffer: &[f64], index: isize) -> f64 {
        buffer[self.offset + (index - self.start) as usize]
    }

    /// Squared distance of voxel `index` from the centre, in kernel widths. A collapsed
    /// window holds the centre itself.
    #[inline]
    pub fn dist2(&self, index: isize) -> f64 {
        if self.collapsed {
            return 0.0;
        }
        let d = (index as f64 - self.center) / self.width;
        d * d
    }

    /// Half-open index range whose squared distance is at most `rem`, within the window.
    pub fn within(&self, rem: f64) -> Option<(isize, isize)> {
        if rem < 0.0 {
            return None;
        }
        if self.collapsed {
            return Some((self.start, self.end()));
        }
        let half = rem.sqrt() * self.width;
        let lo = ((self.center - half).ceil() as isize).max(self.start);
        let hi = ((self.center + half).floor() as isize + 1).min(self.end());
        (lo < hi).then_some((lo, hi))
    }
}

/// A Gaussian sampled at the voxel centres inside the ball of radius `cutoff` widths.
///
/// The ball is separable row by row: each z index leaves a disc, each (z, y) pair a run
/// of x indices. `norm` is the sum of all samples in the ball, out-of-grid part included,
/// so dividing by it makes the discrete mass exactly one when nothing is clipped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BallSamples {
    pub axes: [AxisWindow; 3],
    pub norm: f64,
    cutoff2: f64,
}

impl BallSamples {
    /// Samples a Gaussian centred at `center` (continuous voxel coordinates) with per-axis
    /// `width` in voxel units. Appends the axis samples to `buffer`.
    pub fn sample(
        center: &Vector3<f64>,
        width: &Vector3<f64>,
        cutoff: f64,
        buffer: &mut Vec<f64>,
    ) -> Self {
        let offset = buffer.len();
        let axes = [
            AxisWindow::sample(center.x, width.x, cutoff, buffer),
            AxisWindow::sample(center.y, width.y, cutoff, buffer),
            AxisWindow::sample(center.z, width.z, cutoff, buffer),
        ];
        let mut ball = Self {
            axes,
            norm: 0.0,
            cutoff2: cutoff * cutoff,
        };
        ball.norm = ball.unclipped_sum(buffer);

        if ball.norm > 0.0 {
            return ball;
        }
        // No voxel centre falls inside the ball; keep the mass on the nearest voxel.
        buffer.truncate(offset);
        Self {
            axes: [
                AxisWindow::nearest(center.x, buffer),
                AxisWindow::nearest(center.y, buffer),
                AxisWindow::nearest(center.z, buffer),
            ],
            norm: 1.0,
            cutoff2: cutoff * cutoff,
        }
    }

    fn unclipped_sum(&self, buffer: &[f64]) -> f64 {
        let all = (isize::MIN, isize::MAX);
        let ax = &self.axes[0];
        let mut total = 0.0;
        self.for_each_row(buffer, [all; 3], |_, _, (x0, x1), scale| {
            total += scale * (x0..x1).map(|i| ax.weight(buffer, i)).sum::<f64>();
        });
        total
    }

    /// Half-open z range of the ball, clipped to `[0, nz)`.
    pub fn z_range(&self, nz: usize) -> Option<(usize, usize)> {
        let (lo, hi) = self.axes[2].within(self.cutoff2)?;
        let (lo, hi) = (lo.max(0), hi.min(nz as isize));
        (lo < hi).then_some((lo as usize, hi as usize))
    }

    /// Calls `row(k, j, (x0, x1), wz * wy)` for every row of the ball, restricted to the
    /// half-open index `bounds` of each axis.
    pub fn for_each_row(
        &self,
        buffer: &[f64],
        bounds: [(isize, isize); 3],
        mut row: impl FnMut(isize, isize, (isize, isize), f64),
    ) {
        let [ax, ay, az] = &self.axes;
        let Some((z0, z1)) = az.within(self.cutoff2) else {
            return;
        };
        for k in z0.max(bounds[2].0)..z1.min(bounds[2].1) {
            let rem_z = self.cutoff2 - az.dist2(k);
            let Some((y0, y1)) = ay.within(rem_z) else {
                continue;
            };
            let wz = az.weight(buffer, k);
            for j in y0.max(bounds[1].0)..y1.min(bounds[1].1) {
                let Some((x0, x1)) = ax.within(rem_z - ay.dist2(j)) else {
                    continue;
                };
                let (x0, x1) = (x0.max(bounds[0].0), x1.min(bounds[0].1));
                if x0 < x1 {
                    row(k, j, (x0, x1), wz * ay.weight(buffer, j));
                }
            }
        }
    }
}
