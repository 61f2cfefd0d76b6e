use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Freeze Developers",
    version,
    about = "Freeze CLI - Synthesize density volumes of frozen cryo-EM specimens: non-overlapping entity placement, kernel rasterization and vitreous-ice background.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for rasterization and background smoothing.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Place entities, rasterize them and add the ice background; write grid and report.
    Run(RunArgs),
    /// Load and validate a configuration and its point tables without running anything.
    Check(CheckArgs),
}

/// Configuration source plus the overrides shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Path to the volume configuration file in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub config: PathBuf,

    /// Override the random seed. Without a seed in either place a fresh one is drawn.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Override `placement.max-attempts`, the candidate budget per requested instance.
    #[arg(short = 'a', long = "attempts", value_name = "INT")]
    pub max_attempts: Option<usize>,

    /// Override `placement.overlap-tolerance`, the minimum gap between bounding spheres.
    #[arg(short = 't', long, value_name = "FLOAT", allow_negative_numbers = true)]
    pub tolerance: Option<f64>,

    /// Skip the ice background, even if it is defined in the config file.
    #[arg(long)]
    pub no_background: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S background.variance=0.02
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Output path stem; writes `<stem>.raw`, `<stem>.toml` and `<stem>.report.toml`.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Fail if any entity falls short of its requested count.
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for the `check` subcommand.
#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_arguments_parse_with_overrides() {
        let cli = Cli::parse_from([
            "freeze",
            "-vv",
            "run",
            "-c",
            "volume.toml",
            "-o",
            "out/sample",
            "--seed",
            "7",
            "--attempts",
            "50",
            "--tolerance",
            "-0.5",
            "--strict",
            "-S",
            "background.mean=0.2",
        ]);

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.config.config, PathBuf::from("volume.toml"));
                assert_eq!(args.output, PathBuf::from("out/sample"));
                assert_eq!(args.config.seed, Some(7));
                assert_eq!(args.config.max_attempts, Some(50));
                assert_eq!(args.config.tolerance, Some(-0.5));
                assert!(args.strict);
                assert!(!args.config.no_background);
                assert_eq!(args.config.set_values, vec!["background.mean=0.2"]);
            }
            other => panic!("expected run, got {:?}", other),
        }
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["freeze", "-q", "-v", "check", "-c", "a.toml"]);
        assert!(result.is_err());
    }

    #[test]
    fn run_requires_output() {
        let result = Cli::try_parse_from(["freeze", "run", "-c", "a.toml"]);
        assert!(result.is_err());
    }
}
