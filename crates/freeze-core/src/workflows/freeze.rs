use crate::core::models::grid::VoxelGrid;
use crate::core::models::ids::InstanceId;
use crate::core::models::instance::PlacedInstance;
use crate::engine::background;
use crate::engine::config::{EntitySpec, FreezeConfig};
use crate::engine::error::EngineError;
use crate::engine::placement;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::rasterize;
use crate::engine::report::PlacementReport;
use crate::engine::state::{PipelineStage, PipelineState};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use slotmap::SlotMap;
use tracing::{info, instrument, warn};

#[derive(Debug)]
pub struct FreezeResult {
    /// Entity density plus background, owned by the caller from here on.
    pub grid: VoxelGrid,
    pub report: PlacementReport,
    /// Templates that could not be used, in entity order.
    pub template_errors: Vec<EngineError>,
    pub instances: SlotMap<InstanceId, PlacedInstance>,
    /// Entity mass that fell outside the grid during rasterization.
    pub clipped_mass: f64,
    /// Seed that reproduces this run.
    pub seed: u64,
}

/// Runs the whole freezing pipeline: placement, rasterization and background merge.
///
/// An unmet placement quota is not an error; it shows up in `report`. Callers that need
/// every instance placed should check [`PlacementReport::ensure_complete`].
#[instrument(skip_all, name = "freeze_workflow")]
pub fn run(
    entities: &[EntitySpec<'_>],
    config: &FreezeConfig,
    reporter: &ProgressReporter,
) -> Result<FreezeResult, EngineError> {
    config.validate()?;

    let seed = config
        .seed
        .unwrap_or_else(|| rand::thread_rng().r#gen::<u64>());
    let mut rng = StdRng::seed_from_u64(seed);
    info!(
        seed,
        entities = entities.len(),
        shape = ?config.volume.geometry.shape,
        "Starting freeze workflow."
    );

    let mut state = PipelineState::new();

    // === Phase 1: Placement ===
    state.advance(PipelineStage::Placing)?;
    let outcome = reporter.phase("Placement", || {
        Ok::<_, EngineError>(placement::place(
            entities,
            &config.volume,
            &config.placement,
            &mut rng,
            reporter,
        ))
    })?;
    state.advance(PipelineStage::Placed)?;

    for shortfall in outcome.report.shortfalls() {
        reporter.report(Progress::Message(format!(
            "Placed {}/{} instances of '{}'",
            shortfall.placed, shortfall.requested, shortfall.template_id
        )));
    }

    // === Phase 2: Rasterization ===
    state.advance(PipelineStage::Rasterizing)?;
    let mut grid = VoxelGrid::zeros(config.volume.geometry);
    let clipped_mass = reporter.phase("Rasterization", || {
        Ok::<_, EngineError>(rasterize::rasterize_all(
            &outcome.instances,
            entities,
            &mut grid,
            config.raster.kernel_cutoff,
            reporter,
        ))
    })?;
    state.advance(PipelineStage::Accumulated)?;

    // === Phase 3: Background ===
    match &config.background {
        Some(spec) => reporter.phase("Background", || {
            let field = background::synthesize(&config.volume.geometry, spec, &mut rng)?;
            background::merge(&mut grid, &field)
        })?,
        None => info!("No background requested; grid holds entity density only."),
    }
    state.advance(PipelineStage::BackgroundMerged)?;
    state.advance(PipelineStage::Final)?;

    if !outcome.report.is_complete() {
        warn!(
            placed = outcome.report.total_placed(),
            requested = outcome.report.total_requested(),
            "Freeze finished with a placement shortfall."
        );
    }
    info!(
        placed = outcome.report.total_placed(),
        total_density = grid.sum(),
        "Freeze workflow complete."
    );

    Ok(FreezeResult {
        grid,
        report: outcome.report,
        template_errors: outcome.errors,
        instances: outcome.instances,
        clipped_mass,
        seed,
    })
}
