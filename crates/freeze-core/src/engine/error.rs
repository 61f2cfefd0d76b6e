use super::config::ConfigError;
use super::report::Shortfall;
use super::state::PipelineStage;
use crate::core::models::template::TemplateDefect;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigError),

    #[error("Degenerate template '{template}': {defect}")]
    DegenerateTemplate {
        template: String,
        #[source]
        defect: TemplateDefect,
    },

    #[error("Placement fell short of the requested count for {} entity type(s)", .shortfalls.len())]
    PlacementShortfall { shortfalls: Vec<Shortfall> },

    #[error("Background synthesis produced a non-finite value ({value}) at voxel {index}")]
    NumericOverflow { index: usize, value: f64 },

    #[error("Field shape {found:?} does not match grid shape {expected:?}")]
    ShapeMismatch {
        expected: [usize; 3],
        found: [usize; 3],
    },

    #[error("Pipeline cannot move from stage {from:?} to {to:?}")]
    InvalidTransition {
        from: PipelineStage,
        to: PipelineStage,
    },

    #[error("Internal logic error: {0}")]
    Internal(String),
}
