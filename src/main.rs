//! xpmigrate CLI entrypoint.
//!
//! This is the main entrypoint for the xpmigrate command-line tool.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use xp_migration::cli::{Cli, Commands, OutputFormatter};
use xp_migration::config::{ConfigParser, ConfigValidator, MigrationConfig, find_config_file};
use xp_migration::error::{MigrationError, Result, SourceOperation};
use xp_migration::io::{FileSystemSource, FileSystemTarget};
use xp_migration::planner::{Plan, PlanGenerator};
use xp_migration::resource::GroupVersionKind;

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Dispatches the parsed command.
fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);

    match cli.command {
        Commands::Plan {
            source,
            output_dir,
            plan_file,
            skip_gvks,
            error_on_invalid_patch_schema,
            seed,
        } => cmd_plan(
            cli.config.as_ref(),
            &PlanArgs {
                source,
                output_dir,
                plan_file,
                skip_gvks,
                error_on_invalid_patch_schema,
                seed,
            },
            &formatter,
        ),
        Commands::Validate { warnings } => cmd_validate(cli.config.as_ref(), warnings, &formatter),
        Commands::Show { plan_file } => cmd_show(&plan_file, &formatter),
    }
}

/// Arguments of the plan command that override the configuration.
struct PlanArgs {
    source: PathBuf,
    output_dir: PathBuf,
    plan_file: PathBuf,
    skip_gvks: Vec<GroupVersionKind>,
    error_on_invalid_patch_schema: bool,
    seed: Option<u64>,
}

/// Generate a migration plan.
fn cmd_plan(config_path: Option<&PathBuf>, args: &PlanArgs, formatter: &OutputFormatter) -> Result<()> {
    let (mut config, base_dir) = load_config(config_path)?;

    // Command-line flags extend the configuration
    config.skip_gvks.extend(args.skip_gvks.iter().cloned());
    config.error_on_invalid_patch_schema |= args.error_on_invalid_patch_schema;
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    let result = ConfigValidator::new().validate(&config)?;
    for warning in &result.warnings {
        warn!("{warning}");
    }

    let registry = config.build_registry(&base_dir)?;
    let source = FileSystemSource::new(&args.source).map_err(|source| MigrationError::Source {
        operation: SourceOperation::Open,
        source,
    })?;
    let target = FileSystemTarget::new(&args.output_dir);
    info!(
        "Planning migration of {} into {}",
        args.source.display(),
        args.output_dir.display()
    );

    let mut generator = PlanGenerator::new(&registry, source, target, config.to_options())
        .with_name_generator(config.name_generator());
    let outcome = generator.generate_plan();
    let written = generator.target().written().len();
    let plan = generator.into_plan();

    if let Err(e) = outcome {
        eprintln!(
            "{}",
            formatter.error(&format!(
                "Plan is incomplete after {} steps and must not be executed",
                plan.step_count()
            ))
        );
        return Err(e);
    }

    plan.save(&args.plan_file)?;
    eprintln!("{}", formatter.format_plan(&plan));
    eprintln!(
        "{}",
        formatter.success(&format!(
            "Wrote {written} manifests and plan {}",
            args.plan_file.display()
        ))
    );
    Ok(())
}

/// Validate configuration.
fn cmd_validate(config_path: Option<&PathBuf>, show_warnings: bool, formatter: &OutputFormatter) -> Result<()> {
    let (config, base_dir) = load_config(config_path)?;
    info!("Validating configuration");

    let result = ConfigValidator::new().check(&config);
    eprintln!("{}", formatter.format_validation(&result, show_warnings));
    if result.is_valid() {
        // Loading the CRDs catches unreadable or malformed files
        config.build_registry(&base_dir)?;
    }

    // Show summary
    eprintln!("\nConfiguration summary:");
    eprintln!("  Rewrites: {}", config.rewrites.len());
    eprintln!("  Skipped type identifiers: {}", config.skip_gvks.len());
    eprintln!("  CRD files: {}", config.crds.len());
    eprintln!("  Invalid patches: {}", if config.error_on_invalid_patch_schema { "fail" } else { "drop" });

    ConfigValidator::new().validate(&config).map(|_| ())
}

/// Show a stored plan.
fn cmd_show(plan_file: &Path, formatter: &OutputFormatter) -> Result<()> {
    let plan = Plan::load(plan_file)?;
    eprintln!("{}", formatter.format_plan(&plan));
    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Loads the configuration and the directory its relative paths resolve against.
///
/// Without an explicit path, a missing configuration file yields the defaults.
fn load_config(config_path: Option<&PathBuf>) -> Result<(MigrationConfig, PathBuf)> {
    let config_file = match config_path {
        Some(path) => path.clone(),
        None => match find_config_file(".") {
            Ok(path) => path,
            Err(_) => {
                debug!("Using default configuration");
                let mut config = MigrationConfig::default();
                ConfigParser::apply_env_overrides(&mut config)?;
                return Ok((config, PathBuf::from(".")));
            }
        },
    };
    debug!("Loading configuration from: {}", config_file.display());

    let parser = ConfigParser::new().with_base_path(config_file.parent().unwrap_or_else(|| Path::new(".")));
    parser.load_dotenv()?;
    let config = parser.load_with_env(&config_file)?;
    Ok((config, parser.base_dir()))
}
