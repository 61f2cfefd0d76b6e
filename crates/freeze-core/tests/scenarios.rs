use freeze::core::models::region::{Axis, PlacementRegion};
use freeze::core::models::template::{EntityTemplate, PointContribution};
use freeze::engine::config::{BackgroundSpec, EntitySpec, FreezeConfigBuilder};
use freeze::engine::error::EngineError;
use freeze::engine::progress::ProgressReporter;
use freeze::workflows::freeze::run;
use itertools::Itertools;
use nalgebra::Vector3;

fn point_template(id: &str, width: f64) -> EntityTemplate {
    EntityTemplate::new(
        id,
        vec![PointContribution::gaussian(Vector3::zeros(), 1.0, width)],
    )
}

fn trimer() -> EntityTemplate {
    EntityTemplate::new(
        "trimer",
        vec![
            PointContribution::gaussian(Vector3::new(1.2, 0.0, 0.0), 6.0, 0.7),
            PointContribution::gaussian(Vector3::new(-0.6, 1.0, 0.0), 7.0, 0.7),
            PointContribution::gaussian(Vector3::new(-0.6, -1.0, 0.0), 8.0, 0.7),
        ],
    )
}

#[test]
fn single_instance_in_small_grid_deposits_unit_mass() {
    let template = point_template("atom", 1.0);
    let config = FreezeConfigBuilder::new()
        .voxel_size(1.0)
        .extent([10, 10, 10])
        .seed(Some(1))
        .build()
        .unwrap();

    let result = run(
        &[EntitySpec::new(&template, 1)],
        &config,
        &ProgressReporter::new(),
    )
    .unwrap();

    assert_eq!(result.report.entities[0].requested, 1);
    assert_eq!(result.report.entities[0].placed, 1);
    // The whole grid is the region, so part of the kernel may hang over an edge.
    assert!(result.grid.sum() <= 1.0 + 1e-9);
    assert!((result.grid.sum() + result.clipped_mass - 1.0).abs() < 1e-9);
}

#[test]
fn single_centred_instance_deposits_exactly_unit_mass() {
    let template = point_template("atom", 1.0);
    let config = FreezeConfigBuilder::new()
        .voxel_size(1.0)
        .extent([10, 10, 10])
        .region(PlacementRegion::Cuboid {
            min: Vector3::repeat(5.0),
            max: Vector3::repeat(5.0),
        })
        .seed(Some(1))
        .build()
        .unwrap();

    let result = run(
        &[EntitySpec::new(&template, 1)],
        &config,
        &ProgressReporter::new(),
    )
    .unwrap();

    assert_eq!(result.report.total_placed(), 1);
    assert!((result.grid.sum() - 1.0).abs() < 1e-9);
}

#[test]
fn contained_instances_deposit_their_combined_weight() {
    let atom = point_template("atom", 0.8);
    let trimer = trimer();
    let config = FreezeConfigBuilder::new()
        .voxel_size(1.0)
        .extent([24, 24, 24])
        .region(PlacementRegion::Cuboid {
            min: Vector3::repeat(8.0),
            max: Vector3::repeat(16.0),
        })
        .max_attempts(200)
        .seed(Some(11))
        .build()
        .unwrap();

    let result = run(
        &[EntitySpec::new(&trimer, 4), EntitySpec::new(&atom, 6)],
        &config,
        &ProgressReporter::new(),
    )
    .unwrap();

    let entities = &result.report.entities;
    assert!(result.report.total_placed() >= 2);
    let expected = entities[0].placed as f64 * trimer.total_weight()
        + entities[1].placed as f64 * atom.total_weight();
    // Kernels reach at most 4 units from a centre, and centres stay 8 units from the faces.
    assert!(result.clipped_mass.abs() < 1e-9);
    assert!((result.grid.sum() - expected).abs() < 1e-9 * expected);
}

#[test]
fn over_subscribed_volume_falls_short_without_overlap() {
    let small = point_template("small", 1.0);
    let large = point_template("large", 1.5);
    let config = FreezeConfigBuilder::new()
        .voxel_size(1.0)
        .extent([12, 12, 12])
        .max_attempts(200)
        .seed(Some(2024))
        .build()
        .unwrap();
    let entities = [EntitySpec::new(&large, 150), EntitySpec::new(&small, 150)];

    let result = run(&entities, &config, &ProgressReporter::new()).unwrap();

    let report = &result.report;
    assert!(report.entities.iter().any(|e| e.placed < e.requested));
    assert!(!report.is_complete());
    assert!(matches!(
        report.ensure_complete(),
        Err(EngineError::PlacementShortfall { .. })
    ));

    let spheres: Vec<_> = result.instances.values().map(|i| i.bounds).collect();
    assert_eq!(spheres.len(), report.total_placed());
    for (a, b) in spheres.iter().tuple_combinations() {
        assert!(a.separation(b) >= 0.0);
    }
}

#[test]
fn white_background_hits_target_mean() {
    let config = FreezeConfigBuilder::new()
        .voxel_size(1.0)
        .extent([64, 64, 64])
        .background(Some(BackgroundSpec::correlated(0.1, 0.01, 0.0)))
        .seed(Some(99))
        .build()
        .unwrap();

    let result = run(&[], &config, &ProgressReporter::new()).unwrap();

    // Standard error of the mean is 0.1 / 512; allow ten of them.
    assert!((result.grid.mean() - 0.1).abs() < 2e-3);
    assert!((result.grid.variance() - 0.01).abs() < 5e-4);
}

#[test]
fn instance_on_region_boundary_is_clipped_not_wrapped() {
    let template = point_template("edge", 1.0);
    let config = FreezeConfigBuilder::new()
        .voxel_size(1.0)
        .extent([10, 10, 10])
        .region(PlacementRegion::Cuboid {
            min: Vector3::new(0.0, 5.0, 5.0),
            max: Vector3::new(0.0, 5.0, 5.0),
        })
        .kernel_cutoff(5.0)
        .seed(Some(4))
        .build()
        .unwrap();

    let result = run(
        &[EntitySpec::new(&template, 1)],
        &config,
        &ProgressReporter::new(),
    )
    .unwrap();

    assert_eq!(result.report.total_placed(), 1);
    let grid = &result.grid;
    assert!(grid.sum() < 0.75);
    assert!(result.clipped_mass > 0.25);
    for k in 0..10 {
        for j in 0..10 {
            assert_eq!(grid.get(9, j, k), Some(0.0));
        }
    }
}

#[test]
fn same_seed_reproduces_the_grid_exactly() {
    let trimer = trimer();
    let atom = point_template("atom", 0.8);
    let config = FreezeConfigBuilder::new()
        .voxel_spacing([1.0, 1.0, 2.0])
        .extent([24, 24, 12])
        .background(Some(BackgroundSpec::correlated(0.3, 0.02, 2.0)))
        .seed(Some(31337))
        .build()
        .unwrap();
    let entities = [EntitySpec::new(&trimer, 10), EntitySpec::new(&atom, 20)];

    let a = run(&entities, &config, &ProgressReporter::new()).unwrap();
    let b = run(&entities, &config, &ProgressReporter::new()).unwrap();

    assert_eq!(a.report, b.report);
    assert_eq!(a.grid.data(), b.grid.data());
}

#[test]
fn cylinder_region_keeps_centres_inside() {
    let template = point_template("atom", 0.5);
    let region = PlacementRegion::Cylinder {
        center: Vector3::new(10.0, 10.0, 10.0),
        radius: 4.0,
        length: 12.0,
        axis: Axis::Y,
    };
    let config = FreezeConfigBuilder::new()
        .voxel_size(1.0)
        .extent([20, 20, 20])
        .region(region.clone())
        .seed(Some(8))
        .build()
        .unwrap();

    let result = run(
        &[EntitySpec::new(&template, 40)],
        &config,
        &ProgressReporter::new(),
    )
    .unwrap();

    assert!(result.report.total_placed() > 0);
    for instance in result.instances.values() {
        assert!(region.contains(&instance.pose.translation));
    }
}

#[test]
fn degenerate_template_does_not_stop_the_run() {
    let broken = point_template("broken", -1.0);
    let good = trimer();
    let config = FreezeConfigBuilder::new()
        .voxel_size(1.0)
        .extent([16, 16, 16])
        .seed(Some(5))
        .build()
        .unwrap();

    let result = run(
        &[EntitySpec::new(&broken, 3), EntitySpec::new(&good, 2)],
        &config,
        &ProgressReporter::new(),
    )
    .unwrap();

    assert_eq!(result.template_errors.len(), 1);
    assert!(matches!(
        result.template_errors[0],
        EngineError::DegenerateTemplate { .. }
    ));
    assert_eq!(result.report.entities[0].placed, 0);
    assert!(result.report.entities[0].error.is_some());
    assert_eq!(result.report.entities[1].placed, 2);
}

#[test]
fn earlier_entities_are_placed_first() {
    let first = point_template("first", 1.5);
    let second = point_template("second", 1.5);
    let config = FreezeConfigBuilder::new()
        .voxel_size(1.0)
        .extent([8, 8, 8])
        .max_attempts(100)
        .seed(Some(6))
        .build()
        .unwrap();

    let result = run(
        &[EntitySpec::new(&first, 4), EntitySpec::new(&second, 50)],
        &config,
        &ProgressReporter::new(),
    )
    .unwrap();

    let entities = &result.report.entities;
    assert_eq!(entities[0].placed, 4);
    assert!(entities[1].placed < entities[1].requested);
}
