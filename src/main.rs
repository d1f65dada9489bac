mod batch;
mod cli;
mod color;
mod config;
mod evaluator;
mod execution;
mod registry;
mod resolver;
mod telemetry;
mod utils;
mod version;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use cli::{check::check_cmd, list::list_cmd, resolve::resolve_cmd, run::run_cmd, ColorMode, Context};

#[derive(
    Parser, Default, Clone, Copy, ValueEnum, strum_macros::Display, strum_macros::EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum RequestedColorMode {
    #[default]
    Auto,
    On,
    Off,
}

#[derive(Parser)]
#[command(name = "xeval")]
#[command(
    about = "Resolve and run model-backed document evaluators",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Read configuration from this file instead of the default locations
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Capability registry to load (.yml, .yaml, .json or .toml)
    #[arg(long, global = true)]
    registry: Option<PathBuf>,
    #[arg(long, global = true, default_value_t = RequestedColorMode::default())]
    color: RequestedColorMode,
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the model of each evaluator
    Resolve(ResolveArgs),
    /// List the contents of the capability registry
    List(ListArgs),
    /// Validate evaluator descriptors, their documentation, and their models
    Check(CheckArgs),
    /// Run evaluators over a document
    Run(RunArgs),
}

/// Output formats
#[derive(
    Parser, ValueEnum, Default, Clone, Copy, strum_macros::Display, strum_macros::EnumString,
)]
#[strum(serialize_all = "snake_case")]
pub(crate) enum ListingFormat {
    /// Format the output as a table
    #[default]
    Table,
    /// Format the output as JSON
    Json,
    /// Format the output as a table without a header
    HeaderlessTable,
}

#[derive(Parser)]
pub(crate) struct ResolveArgs {
    /// Descriptor files, directories, or evaluator names (default: every evaluator)
    evaluators: Vec<String>,
    /// Output the listing with the specified format
    #[arg(short, long, default_value_t = ListingFormat::default())]
    format: ListingFormat,
}

/// Possible listings
#[derive(Subcommand)]
pub(crate) enum ListObject {
    /// Model entries, highest version first within each tier
    Models(ListModelArgs),
    /// Provider families and their namespace prefixes
    Families,
}

#[derive(Parser)]
pub(crate) struct ListArgs {
    /// Output the listing with the specified format
    #[arg(short, long, default_value_t = ListingFormat::default())]
    format: ListingFormat,
    /// List the specified object
    #[command(subcommand)]
    object: ListObject,
}

#[derive(Parser, Default)]
pub(crate) struct ListModelArgs {
    /// Limit listing to the specified family
    #[arg(long)]
    family: Option<String>,
    /// Limit listing to the specified tier
    #[arg(long)]
    tier: Option<String>,
}

#[derive(Parser)]
pub(crate) struct CheckArgs {
    /// Descriptor files, directories, or evaluator names (default: every evaluator)
    evaluators: Vec<String>,
}

#[derive(Parser)]
pub(crate) struct RunArgs {
    /// The document to evaluate
    document: PathBuf,
    /// Descriptor files, directories, or evaluator names (default: every evaluator)
    evaluators: Vec<String>,
    /// Seconds before an evaluation process is killed
    #[arg(long)]
    timeout: Option<u64>,
    /// Number of evaluators run at once
    #[arg(short, long)]
    jobs: Option<usize>,
    /// Write each evaluator's output to this directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
    /// Evaluation command and its arguments after `--`, overriding the configured one
    #[arg(last = true, value_name = "COMMAND")]
    exec: Vec<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    color::configure_color(ColorMode::resolve_auto(cli.color));

    let config = match config::read_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => die!("{}", err),
    };

    telemetry::init_tracing(
        cli.log_json || config.logging.json.unwrap_or(false),
        telemetry::level_for(cli.verbose, config.logging.level.as_deref()),
    );

    let registry_path = cli
        .registry
        .clone()
        .unwrap_or_else(|| config.registry_path());

    // the only place the registry is loaded; everything below shares this snapshot
    let registry = match registry::load_path(&registry_path) {
        Ok(registry) => Arc::new(registry),
        Err(err) => die!("{}", err),
    };

    let ctx = Context { config, registry };

    let passed = match &cli.command {
        Commands::Resolve(args) => resolve_cmd(&ctx, args),
        Commands::List(args) => list_cmd(&ctx, args),
        Commands::Check(args) => check_cmd(&ctx, args),
        Commands::Run(args) => run_cmd(&ctx, args).await,
    };

    if !passed {
        std::process::exit(utils::errors::DEFAULT_EXIT_CODE);
    }
}
