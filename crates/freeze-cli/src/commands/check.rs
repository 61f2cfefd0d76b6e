use crate::cli::CheckArgs;
use crate::config;
use crate::error::Result;
use tracing::info;

/// Loads and validates the configuration and every point table, then prints a summary.
pub fn run(args: CheckArgs) -> Result<()> {
    let app_config = config::build_config(&args.config)?;
    let core = &app_config.core_config;
    let geometry = &core.volume.geometry;

    println!(
        "Grid: {:?} voxels, spacing {:?}, origin {:?}",
        geometry.shape,
        <[f64; 3]>::from(geometry.spacing),
        <[f64; 3]>::from(geometry.origin)
    );
    let [nx, ny, nz] = geometry.shape;
    println!(
        "Voxel centres from {:?} to {:?}, grid volume {:.3}",
        <[f64; 3]>::from(geometry.voxel_center(0, 0, 0)),
        <[f64; 3]>::from(geometry.voxel_center(nx - 1, ny - 1, nz - 1)),
        geometry.len() as f64 * geometry.voxel_volume()
    );
    println!(
        "Region: {:?} (volume {:.3})",
        core.volume.region,
        core.volume.region.volume()
    );

    let mut defects = 0;
    for entry in &app_config.entities {
        let template = &entry.template;
        match template.validate() {
            Ok(()) => println!(
                "  {:<24} x{:<6} {} point(s), total weight {:.3}",
                template.id(),
                entry.count,
                template.points().len(),
                template.total_weight()
            ),
            Err(defect) => {
                defects += 1;
                println!("  {:<24} x{:<6} unusable: {}", template.id(), entry.count, defect);
            }
        }
    }
    info!(defects, "Configuration check complete.");
    if defects > 0 {
        println!("{} template(s) would be skipped.", defects);
    } else {
        println!("✓ Configuration is valid.");
    }
    Ok(())
}
