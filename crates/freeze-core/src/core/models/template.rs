use super::bounds::BoundingSphere;
use crate::core::kernel::{Kernel, KernelDefect};
use nalgebra::Vector3;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum TemplateDefect {
    #[error("template has no point contributions")]
    EmptyPointList,
    #[error("point {index} has an invalid kernel: {source}")]
    InvalidKernel {
        index: usize,
        #[source]
        source: KernelDefect,
    },
    #[error("point {index} weight must be positive and finite, got {weight}")]
    InvalidWeight { index: usize, weight: f64 },
    #[error("point {index} has a non-finite offset")]
    NonFiniteOffset { index: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointContribution {
    pub offset: Vector3<f64>,
    pub weight: f64,
    pub kernel: Kernel,
}

impl PointContribution {
    pub fn new(offset: Vector3<f64>, weight: f64, kernel: Kernel) -> Self {
        Self {
            offset,
            weight,
            kernel,
        }
    }

    pub fn gaussian(offset: Vector3<f64>, weight: f64, width: f64) -> Self {
        Self::new(offset, weight, Kernel::gaussian(width))
    }
}

/// Immutable description of one placeable unit: a rigid cloud of point contributions
/// expressed relative to the template's own frame.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityTemplate {
    id: String,
    points: Vec<PointContribution>,
}

impl EntityTemplate {
    pub fn new(id: impl Into<String>, points: Vec<PointContribution>) -> Self {
        Self {
            id: id.into(),
            points,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn points(&self) -> &[PointContribution] {
        &self.points
    }

    pub fn total_weight(&self) -> f64 {
        self.points.iter().map(|p| p.weight).sum()
    }

    pub fn centroid(&self) -> Option<Vector3<f64>> {
        if self.points.is_empty() {
            return None;
        }
        let sum = self
            .points
            .iter()
            .fold(Vector3::zeros(), |acc, p| acc + p.offset);
        Some(sum / self.points.len() as f64)
    }

    pub fn validate(&self) -> Result<(), TemplateDefect> {
        if self.points.is_empty() {
            return Err(TemplateDefect::EmptyPointList);
        }
        for (index, point) in self.points.iter().enumerate() {
            point
                .kernel
                .validate()
                .map_err(|source| TemplateDefect::InvalidKernel { index, source })?;
            if !(point.weight.is_finite() && point.weight > 0.0) {
                return Err(TemplateDefect::InvalidWeight {
                    index,
                    weight: point.weight,
                });
            }
            if !point.offset.iter().all(|c| c.is_finite()) {
                return Err(TemplateDefect::NonFiniteOffset { index });
            }
        }
        Ok(())
    }

    /// Bounding sphere in the template frame: centred on the point centroid, reaching
    /// one kernel width past the farthest point, plus `margin`.
    pub fn local_bounds(&self, margin: f64) -> Option<BoundingSphere> {
        let centroid = self.centroid()?;
        let radius = self
            .points
            .iter()
            .map(|p| (p.offset - centroid).norm() + p.kernel.max_width())
            .fold(0.0, f64::max);
        Some(BoundingSphere::new(centroid, radius + margin))
    }
}
