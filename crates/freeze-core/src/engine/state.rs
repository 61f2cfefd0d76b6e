use super::error::EngineError;

/// Stages of a single freezing run. Stages only ever move forward, one step at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PipelineStage {
    #[default]
    Unplaced,
    Placing,
    Placed,
    Rasterizing,
    Accumulated,
    BackgroundMerged,
    Final,
}

impl PipelineStage {
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Unplaced => Some(Self::Placing),
            Self::Placing => Some(Self::Placed),
            Self::Placed => Some(Self::Rasterizing),
            Self::Rasterizing => Some(Self::Accumulated),
            Self::Accumulated => Some(Self::BackgroundMerged),
            Self::BackgroundMerged => Some(Self::Final),
            Self::Final => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct PipelineState {
    stage: PipelineStage,
}

impl PipelineState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    /// Moves to `to`, which must be the immediate successor of the current stage.
    pub fn advance(&mut self, to: PipelineStage) -> Result<(), EngineError> {
        if self.stage.next() != Some(to) {
            return Err(EngineError::InvalidTransition {
                from: self.stage,
                to,
            });
        }
        tracing::debug!(from = ?self.stage, to = ?to, "Pipeline stage transition.");
        self.stage = to;
        Ok(())
    }
}
