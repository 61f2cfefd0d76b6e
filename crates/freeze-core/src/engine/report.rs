use super::error::EngineError;
use crate::core::models::pose::Pose;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedPose {
    pub translation: [f64; 3],
    pub rotation: [[f64; 3]; 3],
}

impl From<&Pose> for PlacedPose {
    fn from(pose: &Pose) -> Self {
        Self {
            translation: pose.translation.into(),
            rotation: pose.rotation_rows(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Shortfall {
    pub template_id: String,
    pub requested: usize,
    pub placed: usize,
}

/// Placement outcome of one requested entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityReport {
    pub template_id: String,
    pub requested: usize,
    pub placed: usize,
    /// Candidate poses evaluated, accepted or not.
    pub attempts: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub poses: Vec<PlacedPose>,
}

impl EntityReport {
    pub fn new(template_id: impl Into<String>, requested: usize) -> Self {
        Self {
            template_id: template_id.into(),
            requested,
            placed: 0,
            attempts: 0,
            error: None,
            poses: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.placed >= self.requested
    }

    pub fn shortfall(&self) -> Option<Shortfall> {
        (!self.is_complete()).then(|| Shortfall {
            template_id: self.template_id.clone(),
            requested: self.requested,
            placed: self.placed,
        })
    }
}

/// Requested versus achieved counts for every entity, in the caller's order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlacementReport {
    pub entities: Vec<EntityReport>,
}

impl PlacementReport {
    pub fn total_requested(&self) -> usize {
        self.entities.iter().map(|e| e.requested).sum()
    }

    pub fn total_placed(&self) -> usize {
        self.entities.iter().map(|e| e.placed).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.entities.iter().all(EntityReport::is_complete)
    }

    pub fn shortfalls(&self) -> Vec<Shortfall> {
        self.entities
            .iter()
            .filter_map(EntityReport::shortfall)
            .collect()
    }

    /// Turns any unmet quota into a `PlacementShortfall` error for callers that cannot
    /// accept an under-filled sample.
    pub fn ensure_complete(&self) -> Result<(), EngineError> {
        let shortfalls = self.shortfalls();
        if shortfalls.is_empty() {
            Ok(())
        } else {
            Err(EngineError::PlacementShortfall { shortfalls })
        }
    }
}
