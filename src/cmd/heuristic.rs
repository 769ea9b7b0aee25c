use crate::cmd::Context;
use crate::reports;
use clap::Args;
use siteforge::config::Config;
use siteforge::error::SfResult;
use siteforge::heuristics::{rank_candidates, run_heuristic, HeuristicKind};
use siteforge::reachability::build_provider;
use siteforge::results::{persist_result, ResultRecord};

#[derive(Args, Debug, Clone)]
pub struct HeuristicArgs {
    #[command(flatten)]
    pub config: Config,

    #[arg(long, value_enum, default_value_t = HeuristicKind::MinOverlap)]
    pub kind: HeuristicKind,

    /// Result file name; defaults to the heuristic's name
    #[arg(long)]
    pub name: Option<String>,

    #[arg(long, default_value_t = false)]
    pub no_save: bool,
}

pub fn run(args: HeuristicArgs, ctx: &Context) -> SfResult<()> {
    let config = &ctx.config;
    config.validate(ctx.scorer.candidate_count())?;

    let reach = build_provider(&config.heuristic)?;
    let ranking = rank_candidates(
        &ctx.scorer,
        reach.as_ref(),
        config.heuristic.isochrone_minutes,
    );
    let outcome = run_heuristic(
        args.kind,
        &ctx.scorer,
        &ranking,
        config.search.max_active,
        config.heuristic.overlap_threshold,
    )?;

    let report = ctx.scorer.coverage(&outcome.selection);
    reports::print_coverage_summary(
        &args.kind.to_string(),
        outcome.fitness,
        &report,
        config.scoring.service_level,
        outcome.accepted,
    );
    if outcome.skipped_candidates > 0 {
        println!(
            "{} candidates skipped (no isochrone)",
            outcome.skipped_candidates
        );
    }

    if !args.no_save {
        let name = args
            .name
            .unwrap_or_else(|| format!("{}_heuristic", args.kind).replace('-', "_"));
        let record = ResultRecord::from_selection(&outcome.selection, &ctx.scorer.candidates, &report);
        persist_result(&ctx.results_dir, &name, &record)?;
    }
    Ok(())
}
