use nalgebra::Vector3;
use rand::Rng;
use std::f64::consts::TAU;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// The two axes spanning the plane perpendicular to this one.
    fn perpendicular(self) -> (usize, usize) {
        match self {
            Axis::X => (1, 2),
            Axis::Y => (2, 0),
            Axis::Z => (0, 1),
        }
    }
}

/// Sub-volume of world space in which entity centres may be placed.
#[derive(Debug, Clone, PartialEq)]
pub enum PlacementRegion {
    /// Axis-aligned box, bounds inclusive. A thin box models a lamella.
    Cuboid {
        min: Vector3<f64>,
        max: Vector3<f64>,
    },
    /// Circular cylinder aligned with a grid axis, e.g. a sample in a capillary.
    Cylinder {
        center: Vector3<f64>,
        radius: f64,
        length: f64,
        axis: Axis,
    },
}

impl PlacementRegion {
    pub fn contains(&self, point: &Vector3<f64>) -> bool {
        match self {
            Self::Cuboid { min, max } => (0..3).all(|a| point[a] >= min[a] && point[a] <= max[a]),
            Self::Cylinder {
                center,
                radius,
                length,
                axis,
            } => {
                let d = point - center;
                let (u, v) = axis.perpendicular();
                d[axis.index()].abs() <= 0.5 * length
                    && d[u] * d[u] + d[v] * d[v] <= radius * radius
            }
        }
    }

    /// Axis-aligned bounding box of the region.
    pub fn bounding_box(&self) -> (Vector3<f64>, Vector3<f64>) {
        match self {
            Self::Cuboid { min, max } => (*min, *max),
            Self::Cylinder {
                center,
                radius,
                length,
                axis,
            } => {
                let mut half = Vector3::repeat(*radius);
                half[axis.index()] = 0.5 * length;
                (center - half, center + half)
            }
        }
    }

    pub fn volume(&self) -> f64 {
        match self {
            Self::Cuboid { min, max } => (max - min).iter().map(|e| e.max(0.0)).product(),
            Self::Cylinder { radius, length, .. } => {
                std::f64::consts::PI * radius * radius * length
            }
        }
    }

    pub fn is_well_formed(&self) -> bool {
        match self {
            Self::Cuboid { min, max } => (0..3).all(|a| {
                min[a].is_finite() && max[a].is_finite() && min[a] <= max[a]
            }),
            Self::Cylinder {
                center,
                radius,
                length,
                ..
            } => {
                center.iter().all(|c| c.is_finite())
                    && radius.is_finite()
                    && *radius >= 0.0
                    && length.is_finite()
                    && *length >= 0.0
            }
        }
    }

    /// Draws a point uniformly distributed over the region.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Vector3<f64> {
        match self {
            Self::Cuboid { min, max } => {
                Vector3::from_fn(|a, _| lerp(min[a], max[a], rng.r#gen::<f64>()))
            }
            Self::Cylinder {
                center,
                radius,
                length,
                axis,
            } => {
                let r = radius * rng.r#gen::<f64>().sqrt();
                let theta = TAU * rng.r#gen::<f64>();
                let h = length * (rng.r#gen::<f64>() - 0.5);
                let (u, v) = axis.perpendicular();
                let mut offset = Vector3::zeros();
                offset[u] = r * theta.cos();
                offset[v] = r * theta.sin();
                offset[axis.index()] = h;
                center + offset
            }
        }
    }
}

#[inline]
fn lerp(lo: f64, hi: f64, t: f64) -> f64 {
    lo + (hi - lo) * t
}
