use crate::cmd::Context;
use crate::reports;
use clap::Args;
use siteforge::config::Config;
use siteforge::error::{SfResult, SiteForgeError};
use siteforge::geometry::CandidateSet;
use siteforge::results::{load_result, persist_result, ResultRecord};
use siteforge::selection::Selection;
use std::path::PathBuf;
use tracing::warn;

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub config: Config,

    /// Sites to score (.json or .csv), e.g. the current deployment
    #[arg(long, conflicts_with = "result")]
    pub sites: Option<PathBuf>,

    /// A saved result to re-score
    #[arg(long)]
    pub result: Option<PathBuf>,

    /// Save the evaluation under this name
    #[arg(long)]
    pub save: Option<String>,

    /// Print the per-cell table (first N cells)
    #[arg(long, default_value_t = 0)]
    pub cells: usize,
}

pub fn run(args: EvaluateArgs, ctx: &Context) -> SfResult<()> {
    let service_level = ctx.config.scoring.service_level;

    let (title, record, report) = match (&args.sites, &args.result) {
        (Some(path), _) => {
            let sites = CandidateSet::load_from_file(path, 0.0)?;
            let outside = sites.iter().filter(|l| !ctx.scorer.region.contains(l.coord())).count();
            if outside > 0 {
                warn!("{} of {} sites lie outside the region", outside, sites.len());
            }
            let coords: Vec<[f64; 2]> = sites.iter().map(|l| [l.lon, l.lat]).collect();
            let indexed: Vec<_> = sites.iter().map(|l| (l.id, l.coord())).collect();
            let report = ctx.scorer.coverage_of_sites(&indexed);
            let record = ResultRecord::from_report(&coords, &report);
            (path.display().to_string(), record, report)
        }
        (None, Some(path)) => {
            let saved = load_result(path)?;
            let report = if saved.solution.len() == ctx.scorer.candidate_count() {
                let selection = Selection::try_from(saved.solution.clone())
                    .map_err(SiteForgeError::Validation)?;
                ctx.scorer.coverage(&selection)
            } else {
                let indexed: Vec<_> = saved
                    .solution_coords
                    .iter()
                    .enumerate()
                    .map(|(i, c)| (i, geo::Coord { x: c[0], y: c[1] }))
                    .collect();
                ctx.scorer.coverage_of_sites(&indexed)
            };
            let record = ResultRecord {
                fitness: report.fitness,
                voronoi_polygons: ResultRecord::from_report(&[], &report).voronoi_polygons,
                ..saved
            };
            (path.display().to_string(), record, report)
        }
        (None, None) => {
            return Err(SiteForgeError::Config(
                "evaluate needs --sites or --result".to_string(),
            ))
        }
    };

    reports::print_coverage_summary(
        &title,
        report.fitness,
        &report,
        service_level,
        record.solution_coords.len(),
    );
    if args.cells > 0 {
        reports::print_cell_table(&report, service_level, args.cells);
    }

    if let Some(name) = &args.save {
        persist_result(&ctx.results_dir, name, &record)?;
    }
    Ok(())
}
