use super::pose::Pose;
use nalgebra::Vector3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    pub center: Vector3<f64>,
    pub radius: f64,
}

impl BoundingSphere {
    pub fn new(center: Vector3<f64>, radius: f64) -> Self {
        Self { center, radius }
    }

    /// World-space sphere of a template-frame sphere under `pose`.
    pub fn transformed(&self, pose: &Pose) -> Self {
        Self::new(pose.apply(&self.center), self.radius)
    }

    pub fn is_degenerate(&self) -> bool {
        !(self.radius > 0.0 && self.radius.is_finite())
            || !self.center.iter().all(|c| c.is_finite())
    }

    /// Gap between the two surfaces; negative when the spheres interpenetrate.
    #[inline]
    pub fn separation(&self, other: &Self) -> f64 {
        (self.center - other.center).norm() - self.radius - other.radius
    }

    pub fn inflated(&self, amount: f64) -> Self {
        Self::new(self.center, self.radius + amount)
    }

    pub fn aabb(&self) -> (Vector3<f64>, Vector3<f64>) {
        let r = Vector3::repeat(self.radius);
        (self.center - r, self.center + r)
    }

    /// Largest distance by which the sphere pokes out of the box `[min, max]`.
    pub fn protrusion(&self, min: &Vector3<f64>, max: &Vector3<f64>) -> f64 {
        let (lo, hi) = self.aabb();
        (0..3)
            .map(|axis| (min[axis] - lo[axis]).max(hi[axis] - max[axis]))
            .fold(0.0, f64::max)
    }
}
