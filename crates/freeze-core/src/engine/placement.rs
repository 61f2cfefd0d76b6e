use super::config::{EntitySpec, Orientation, PlacementConfig, VolumeSpec};
use super::error::EngineError;
use super::progress::{Progress, ProgressReporter};
use super::report::{EntityReport, PlacedPose, PlacementReport};
use super::spatial_index::SpatialIndex;
use crate::core::models::bounds::BoundingSphere;
use crate::core::models::ids::InstanceId;
use crate::core::models::instance::PlacedInstance;
use crate::core::models::pose::Pose;
use crate::core::utils::geometry::random_rotation;
use rand::Rng;
use slotmap::SlotMap;
use tracing::{debug, info, instrument, trace, warn};

/// Accepted instances plus the per-entity bookkeeping of a placement pass.
#[derive(Debug)]
pub struct PlacementOutcome {
    /// Accepted instances in acceptance order.
    pub instances: SlotMap<InstanceId, PlacedInstance>,
    /// Bounding spheres of exactly the accepted instances.
    pub index: SpatialIndex,
    pub report: PlacementReport,
    /// Per-template failures; the affected entities have no instances.
    pub errors: Vec<EngineError>,
}

/// Sequential rejection-sampling placer.
///
/// Every accepted instance is inserted into the spatial index before the next candidate
/// is drawn, so each candidate sees all earlier acceptances.
pub struct PlacementEngine<'a> {
    volume: &'a VolumeSpec,
    config: &'a PlacementConfig,
    index: SpatialIndex,
    instances: SlotMap<InstanceId, PlacedInstance>,
}

impl<'a> PlacementEngine<'a> {
    pub fn new(volume: &'a VolumeSpec, config: &'a PlacementConfig, cell_size: f64) -> Self {
        Self {
            volume,
            config,
            index: SpatialIndex::new(cell_size),
            instances: SlotMap::with_key(),
        }
    }

    /// Places all entities in the given order; earlier entities get first pick of space.
    #[instrument(skip_all, name = "placement_engine")]
    pub fn place_all<R: Rng + ?Sized>(
        mut self,
        entities: &[EntitySpec<'_>],
        rng: &mut R,
        reporter: &ProgressReporter,
    ) -> PlacementOutcome {
        let total_requested: usize = entities.iter().map(|e| e.count).sum();
        info!(
            entities = entities.len(),
            requested = total_requested,
            "Starting entity placement."
        );
        reporter.report(Progress::TaskStart {
            total_steps: total_requested as u64,
        });

        let mut report = PlacementReport::default();
        let mut errors = Vec::new();

        for (entity_idx, entity) in entities.iter().enumerate() {
            match self.place_entity(entity_idx, entity, rng, reporter) {
                Ok(entity_report) => report.entities.push(entity_report),
                Err(err) => {
                    warn!(template = entity.template.id(), error = %err, "Skipping entity.");
                    let mut entity_report = EntityReport::new(entity.template.id(), entity.count);
                    entity_report.error = Some(err.to_string());
                    report.entities.push(entity_report);
                    errors.push(err);
                }
            }
        }

        reporter.report(Progress::TaskFinish);
        info!(
            placed = report.total_placed(),
            requested = report.total_requested(),
            "Entity placement complete."
        );

        PlacementOutcome {
            instances: self.instances,
            index: self.index,
            report,
            errors,
        }
    }

    fn place_entity<R: Rng + ?Sized>(
        &mut self,
        entity_idx: usize,
        entity: &EntitySpec<'_>,
        rng: &mut R,
        reporter: &ProgressReporter,
    ) -> Result<EntityReport, EngineError> {
        let template = entity.template;
        template
            .validate()
            .map_err(|defect| EngineError::DegenerateTemplate {
                template: template.id().to_string(),
                defect,
            })?;
        let local_bounds = template
            .local_bounds(self.config.bounding_margin)
            .ok_or_else(|| EngineError::Internal("validated template has no bounds".into()))?;

        let mut entity_report = EntityReport::new(template.id(), entity.count);
        for _ in 0..entity.count {
            let (accepted, attempts) =
                self.try_place_one(entity_idx, &local_bounds, entity.orientation, rng);
            entity_report.attempts += attempts;
            if let Some(id) = accepted {
                entity_report.placed += 1;
                entity_report
                    .poses
                    .push(PlacedPose::from(&self.instances[id].pose));
            }
            reporter.report(Progress::TaskIncrement);
        }

        if entity_report.is_complete() {
            debug!(
                template = template.id(),
                placed = entity_report.placed,
                attempts = entity_report.attempts,
                "Entity fully placed."
            );
        } else {
            warn!(
                template = template.id(),
                requested = entity_report.requested,
                placed = entity_report.placed,
                "Attempt budget exhausted before the requested count was reached."
            );
            reporter.report(Progress::Message(format!(
                "{}: placed {}/{}",
                template.id(),
                entity_report.placed,
                entity_report.requested
            )));
        }
        Ok(entity_report)
    }

    /// Samples candidate poses until one is accepted or the budget runs out. Returns the
    /// accepted id, if any, and the number of candidates drawn.
    fn try_place_one<R: Rng + ?Sized>(
        &mut self,
        entity_idx: usize,
        local_bounds: &BoundingSphere,
        orientation: Orientation,
        rng: &mut R,
    ) -> (Option<InstanceId>, usize) {
        for attempt in 1..=self.config.max_attempts {
            let translation = self.volume.region.sample(rng);
            let rotation = match orientation {
                Orientation::Random => random_rotation(rng),
                Orientation::Fixed(rotation) => rotation,
            };
            let pose = Pose::new(translation, rotation);
            let bounds = local_bounds.transformed(&pose);

            if !self.accepts(&pose, &bounds) {
                continue;
            }

            let id = self.instances.insert_with_key(|id| PlacedInstance {
                id,
                entity: entity_idx,
                pose,
                bounds,
            });
            self.index.insert(id, bounds);
            trace!(?id, attempt, "Candidate accepted.");
            return (Some(id), attempt);
        }
        (None, self.config.max_attempts)
    }

    fn accepts(&self, pose: &Pose, bounds: &BoundingSphere) -> bool {
        if !self.volume.region.contains(&pose.translation) {
            return false;
        }
        if let Some(margin) = self.config.protrusion_margin {
            let geometry = &self.volume.geometry;
            if bounds.protrusion(&geometry.world_min(), &geometry.world_max()) > margin {
                return false;
            }
        }
        self.index
            .find_conflict(bounds, self.config.overlap_tolerance)
            .is_none()
    }
}

/// Index cell size for a set of entities: the largest bounding diameter, but never below
/// the smallest voxel edge.
pub fn suggested_cell_size(entities: &[EntitySpec<'_>], margin: f64, min_size: f64) -> f64 {
    entities
        .iter()
        .filter(|e| e.template.validate().is_ok())
        .filter_map(|e| e.template.local_bounds(margin))
        .map(|b| 2.0 * b.radius)
        .fold(min_size, f64::max)
}

/// Runs a full placement pass over `entities` within `volume`.
pub fn place<R: Rng + ?Sized>(
    entities: &[EntitySpec<'_>],
    volume: &VolumeSpec,
    config: &PlacementConfig,
    rng: &mut R,
    reporter: &ProgressReporter,
) -> PlacementOutcome {
    let min_voxel = volume.geometry.spacing.min();
    let cell_size = suggested_cell_size(entities, config.bounding_margin, min_voxel);
    debug!(cell_size, "Spatial index cell size chosen.");
    PlacementEngine::new(volume, config, cell_size).place_all(entities, rng, reporter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::grid::GridGeometry;
    use crate::core::models::region::PlacementRegion;
    use crate::core::models::template::{EntityTemplate, PointContribution};
    use crate::core::utils::geometry::rotation_from_euler_degrees;
    use itertools::Itertools;
    use nalgebra::Vector3;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn volume(size: f64) -> VolumeSpec {
        let n = size as usize;
        VolumeSpec {
            geometry: GridGeometry::cubic([n, n, n], 1.0),
            region: PlacementRegion::Cuboid {
                min: Vector3::zeros(),
                max: Vector3::repeat(size),
            },
        }
    }

    fn config(max_attempts: usize, tolerance: f64) -> PlacementConfig {
        PlacementConfig {
            overlap_tolerance: tolerance,
            max_attempts,
            bounding_margin: 0.0,
            protrusion_margin: None,
        }
    }

    fn ball(id: &str, width: f64) -> EntityTemplate {
        EntityTemplate::new(
            id,
            vec![PointContribution::gaussian(Vector3::zeros(), 1.0, width)],
        )
    }

    fn instance_spheres(outcome: &PlacementOutcome) -> Vec<BoundingSphere> {
        outcome.instances.values().map(|i| i.bounds).collect()
    }

    #[test]
    fn single_entity_is_placed_inside_region() {
        let volume = volume(10.0);
        let config = config(100, 0.0);
        let template = ball("atom", 1.0);
        let mut rng = StdRng::seed_from_u64(1);

        let outcome = place(
            &[EntitySpec::new(&template, 1)],
            &volume,
            &config,
            &mut rng,
            &ProgressReporter::new(),
        );

        assert_eq!(outcome.report.entities[0].placed, 1);
        assert_eq!(outcome.report.entities[0].poses.len(), 1);
        let instance = outcome.instances.values().next().unwrap();
        assert!(volume.region.contains(&instance.pose.translation));
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn accepted_instances_never_overlap() {
        let volume = volume(20.0);
        let config = config(200, 0.0);
        let template = ball("blob", 1.5);
        let mut rng = StdRng::seed_from_u64(5);

        let outcome = place(
            &[EntitySpec::new(&template, 200)],
            &volume,
            &config,
            &mut rng,
            &ProgressReporter::new(),
        );

        let spheres = instance_spheres(&outcome);
        assert!(spheres.len() > 10);
        for (a, b) in spheres.iter().tuple_combinations() {
            assert!(a.separation(b) >= 0.0);
        }
    }

    #[test]
    fn index_holds_exactly_the_accepted_instances() {
        let volume = volume(12.0);
        let config = config(40, 0.0);
        let small = ball("small", 0.6);
        let large = ball("large", 1.4);
        let broken = EntityTemplate::new("broken", vec![]);
        let mut rng = StdRng::seed_from_u64(21);

        let outcome = place(
            &[
                EntitySpec::new(&large, 30),
                EntitySpec::new(&broken, 4),
                EntitySpec::new(&small, 60),
            ],
            &volume,
            &config,
            &mut rng,
            &ProgressReporter::new(),
        );

        // Budget exhaustion and the broken template both leave rejected candidates behind.
        assert!(outcome.report.total_placed() < outcome.report.total_requested());
        assert_eq!(outcome.index.len(), outcome.instances.len());
        assert_eq!(outcome.index.len(), outcome.report.total_placed());
        for (id, instance) in &outcome.instances {
            assert!(outcome.index.contains(id));
            assert_eq!(outcome.index.bounds(id), Some(&instance.bounds));
        }
    }

    #[test]
    fn positive_tolerance_enforces_minimum_gap() {
        let volume = volume(20.0);
        let config = config(100, 1.0);
        let template = ball("blob", 1.0);
        let mut rng = StdRng::seed_from_u64(9);

        let outcome = place(
            &[EntitySpec::new(&template, 100)],
            &volume,
            &config,
            &mut rng,
            &ProgressReporter::new(),
        );

        for (a, b) in instance_spheres(&outcome).iter().tuple_combinations() {
            assert!(a.separation(b) >= 1.0);
        }
    }

    #[test]
    fn exhausted_budget_is_reported_as_shortfall() {
        let volume = volume(4.0);
        let config = config(50, 0.0);
        let template = ball("big", 1.5);
        let mut rng = StdRng::seed_from_u64(2);

        let outcome = place(
            &[EntitySpec::new(&template, 20)],
            &volume,
            &config,
            &mut rng,
            &ProgressReporter::new(),
        );

        let entity = &outcome.report.entities[0];
        assert_eq!(entity.requested, 20);
        assert!(entity.placed < 20);
        assert_eq!(entity.placed, outcome.instances.len());
        assert!(outcome.report.ensure_complete().is_err());
    }

    #[test]
    fn degenerate_template_is_isolated() {
        let volume = volume(10.0);
        let config = config(100, 0.0);
        let broken = EntityTemplate::new("broken", vec![]);
        let good = ball("good", 0.5);
        let mut rng = StdRng::seed_from_u64(3);

        let outcome = place(
            &[EntitySpec::new(&broken, 3), EntitySpec::new(&good, 2)],
            &volume,
            &config,
            &mut rng,
            &ProgressReporter::new(),
        );

        assert_eq!(outcome.errors.len(), 1);
        assert!(matches!(
            outcome.errors[0],
            EngineError::DegenerateTemplate { .. }
        ));
        assert_eq!(outcome.report.entities[0].placed, 0);
        assert!(outcome.report.entities[0].error.is_some());
        assert_eq!(outcome.report.entities[1].placed, 2);
        assert!(outcome.instances.values().all(|i| i.entity == 1));
    }

    #[test]
    fn fixed_orientation_is_used_verbatim() {
        let volume = volume(10.0);
        let config = config(100, 0.0);
        let template = ball("fixed", 0.5);
        let rotation = rotation_from_euler_degrees(10.0, 20.0, 30.0);
        let mut rng = StdRng::seed_from_u64(4);

        let outcome = place(
            &[EntitySpec::new(&template, 3).with_orientation(Orientation::Fixed(rotation))],
            &volume,
            &config,
            &mut rng,
            &ProgressReporter::new(),
        );

        assert!(outcome.instances.values().all(|i| i.pose.rotation == rotation));
    }

    #[test]
    fn protrusion_margin_keeps_spheres_near_the_grid() {
        let volume = volume(10.0);
        let mut config = config(500, 0.0);
        config.protrusion_margin = Some(0.0);
        let template = ball("edge", 1.0);
        let mut rng = StdRng::seed_from_u64(8);

        let outcome = place(
            &[EntitySpec::new(&template, 30)],
            &volume,
            &config,
            &mut rng,
            &ProgressReporter::new(),
        );

        let (min, max) = (volume.geometry.world_min(), volume.geometry.world_max());
        for sphere in instance_spheres(&outcome) {
            assert!(sphere.protrusion(&min, &max) <= 0.0);
        }
    }

    #[test]
    fn same_seed_gives_same_placement() {
        let volume = volume(15.0);
        let config = config(100, 0.0);
        let template = ball("repeat", 1.0);
        let run = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            place(
                &[EntitySpec::new(&template, 25)],
                &volume,
                &config,
                &mut rng,
                &ProgressReporter::new(),
            )
            .report
        };
        assert_eq!(run(17), run(17));
    }
}
