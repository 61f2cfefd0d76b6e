use crate::cli::RunArgs;
use crate::config;
use crate::error::Result;
use crate::output;
use crate::utils::progress::CliProgressHandler;
use freeze::engine::progress::ProgressReporter;
use freeze::workflows;
use tracing::{info, warn};

pub fn run(args: RunArgs) -> Result<()> {
    info!("Loading configuration from {:?}", &args.config.config);
    let app_config = config::build_config(&args.config)?;
    let entities = app_config.entity_specs();

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Freezing {} entity type(s)...", entities.len());
    info!("Invoking the core freeze workflow...");
    let result = workflows::freeze::run(&entities, &app_config.core_config, &reporter)?;

    for error in &result.template_errors {
        warn!("{}", error);
        println!("Warning: {}", error);
    }
    for entity in &result.report.entities {
        println!(
            "  {:<24} {:>6}/{:<6} placed ({} attempts)",
            entity.template_id, entity.placed, entity.requested, entity.attempts
        );
    }

    let paths = output::write_all(&result, &args.output)?;
    println!(
        "✓ Grid written to {} (seed {}), report to {}",
        paths.raw.display(),
        result.seed,
        paths.report.display()
    );

    if args.strict {
        result.report.ensure_complete()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use crate::error::CliError;
    use clap::Parser;
    use freeze::engine::error::EngineError;
    use std::fs;
    use std::path::Path;

    fn run_args(config_path: &Path, output: &Path, extra: &[&str]) -> RunArgs {
        let mut argv = vec![
            "freeze".to_string(),
            "run".to_string(),
            "-c".to_string(),
            config_path.display().to_string(),
            "-o".to_string(),
            output.display().to_string(),
        ];
        argv.extend(extra.iter().map(|s| s.to_string()));
        match Cli::parse_from(argv).command {
            Commands::Run(args) => args,
            other => panic!("Expected 'run' subcommand, got {:?}", other),
        }
    }

    fn write_workspace(dir: &Path, count: usize) -> std::path::PathBuf {
        fs::write(dir.join("atom.csv"), "x,y,z,weight,width\n0,0,0,1,1\n").unwrap();
        let config_path = dir.join("volume.toml");
        fs::write(
            &config_path,
            format!(
                r#"
                seed = 5

                [grid]
                voxel-size = 1.0
                extent = [8, 8, 8]

                [placement]
                max-attempts = 50

                [background]
                mean = 0.05
                variance = 0.0001

                [[entity]]
                points = "atom.csv"
                count = {}
                "#,
                count
            ),
        )
        .unwrap();
        config_path
    }

    #[test]
    fn run_writes_grid_header_and_report() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = write_workspace(dir.path(), 2);
        let stem = dir.path().join("out").join("sample");

        run(run_args(&config_path, &stem, &[])).unwrap();

        assert_eq!(
            fs::metadata(dir.path().join("out/sample.raw")).unwrap().len(),
            8 * 8 * 8 * 4
        );
        assert!(dir.path().join("out/sample.toml").exists());
        assert!(dir.path().join("out/sample.report.toml").exists());
    }

    #[test]
    fn strict_run_fails_on_shortfall_but_still_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = write_workspace(dir.path(), 500);
        let stem = dir.path().join("crowded");

        let result = run(run_args(&config_path, &stem, &["--strict"]));

        assert!(matches!(
            result,
            Err(CliError::FreezeCore(EngineError::PlacementShortfall { .. }))
        ));
        assert!(dir.path().join("crowded.report.toml").exists());
    }
}
