use nalgebra::{Rotation3, Vector3};

/// Rigid placement of a template in world space: rotate about the template origin, then
/// translate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub translation: Vector3<f64>,
    pub rotation: Rotation3<f64>,
}

impl Pose {
    pub fn new(translation: Vector3<f64>, rotation: Rotation3<f64>) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    pub fn at(translation: Vector3<f64>) -> Self {
        Self::new(translation, Rotation3::identity())
    }

    #[inline]
    pub fn apply(&self, offset: &Vector3<f64>) -> Vector3<f64> {
        self.translation + self.rotation * offset
    }

    pub fn rotation_rows(&self) -> [[f64; 3]; 3] {
        let m = self.rotation.matrix();
        [
            [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
            [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
            [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
        ]
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::at(Vector3::zeros())
    }
}
