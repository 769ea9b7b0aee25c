use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use siteforge::config::Config;
use siteforge::error::{SfResult, SiteForgeError};
use siteforge::geometry::{CandidateSet, Region};
use siteforge::population::{DensityPopulation, PopulationSource, RasterPopulation};
use siteforge::scorer::Scorer;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::{error, info, Level};

mod cmd;
mod reports;

#[derive(Parser, Debug)]
#[command(author, version, about = "Service-site coverage optimizer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Candidate sites (.json or .csv)
    #[arg(global = true, short, long, default_value = "data/candidates.json")]
    candidates: String,

    /// Service region (GeoJSON)
    #[arg(global = true, short, long, default_value = "data/region.geojson")]
    region: String,

    /// Population raster (JSON grid)
    #[arg(global = true, short, long)]
    population: Option<String>,

    /// Uniform population per square unit, used when no raster is given
    #[arg(global = true, long)]
    density: Option<f64>,

    /// Drop candidates closer than this to an earlier one
    #[arg(global = true, long, default_value_t = 0.0)]
    dedup_threshold: f64,

    /// JSON config file; flags typed on the command line override it
    #[arg(global = true, long)]
    config: Option<String>,

    #[arg(global = true, long, default_value = "results")]
    results: PathBuf,

    #[arg(global = true, long, default_value_t = false)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the genetic algorithm
    Ga(cmd::search::GaArgs),
    /// Run a constructive heuristic
    Heuristic(cmd::heuristic::HeuristicArgs),
    /// Tune GA or heuristic parameters
    Tune(cmd::tune::TuneArgs),
    /// Score an existing set of sites
    Evaluate(cmd::evaluate::EvaluateArgs),
}

fn main() {
    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    tracing_subscriber::fmt()
        .with_max_level(if cli.debug { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli, &matches) {
        error!("{}", e);
        process::exit(1);
    }
}

fn run(cli: Cli, matches: &clap::ArgMatches) -> SfResult<()> {
    let (cli_config, sub_name) = match &cli.command {
        Commands::Ga(args) => (&args.config, "ga"),
        Commands::Heuristic(args) => (&args.config, "heuristic"),
        Commands::Tune(args) => (&args.config, "tune"),
        Commands::Evaluate(args) => (&args.config, "evaluate"),
    };
    let sub_matches = matches.subcommand_matches(sub_name).ok_or_else(|| {
        SiteForgeError::Config(format!("missing matches for '{}'", sub_name))
    })?;

    let config = match &cli.config {
        Some(path) => {
            info!("Loading config from {}", path);
            let mut base = Config::load_from_file(path)?;
            base.merge_from_cli(cli_config, sub_matches);
            base
        }
        None => cli_config.clone(),
    };

    let candidates = Arc::new(CandidateSet::load_from_file(
        &cli.candidates,
        cli.dedup_threshold,
    )?);
    let region = Arc::new(Region::load_from_file(&cli.region)?);
    let population: Arc<dyn PopulationSource> = match (&cli.population, cli.density) {
        (Some(path), _) => Arc::new(RasterPopulation::load_from_file(path)?),
        (None, Some(density)) => Arc::new(DensityPopulation::new(density)),
        (None, None) => {
            return Err(SiteForgeError::Config(
                "either --population or --density is required".to_string(),
            ))
        }
    };

    let scorer = Arc::new(Scorer::new(
        candidates,
        region,
        population,
        config.scoring.clone(),
    ));
    let ctx = cmd::Context {
        config,
        scorer,
        results_dir: cli.results,
    };

    match cli.command {
        Commands::Ga(args) => cmd::search::run(args, &ctx),
        Commands::Heuristic(args) => cmd::heuristic::run(args, &ctx),
        Commands::Tune(args) => cmd::tune::run(args, &ctx),
        Commands::Evaluate(args) => cmd::evaluate::run(args, &ctx),
    }
}
