use crate::cmd::Context;
use crate::reports;
use clap::{Args, ValueEnum};
use siteforge::config::Config;
use siteforge::error::SfResult;
use siteforge::heuristics::{heuristic_seed, HeuristicKind};
use siteforge::optimizer::initialization::InitStrategy;
use siteforge::optimizer::GaOptions;
use siteforge::reachability::build_provider;
use siteforge::tuning::{
    run_study, GaObjective, HeuristicObjective, MedianPruner, Study, TpeSampler, TrialStore,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TuneTarget {
    Ga,
    Heuristic,
}

#[derive(Args, Debug, Clone)]
pub struct TuneArgs {
    #[command(flatten)]
    pub config: Config,

    #[arg(long, value_enum, default_value_t = TuneTarget::Ga)]
    pub target: TuneTarget,

    /// Study name; defaults to one per target and initialization
    #[arg(long)]
    pub study: Option<String>,

    #[arg(long, default_value_t = 20)]
    pub trials: usize,

    /// Trials evaluated at the same time
    #[arg(long, default_value_t = 1)]
    pub concurrency: usize,

    /// JSON Lines trial log; defaults to <results>/trials.jsonl
    #[arg(long)]
    pub store: Option<PathBuf>,

    #[arg(short = 'S', long, default_value_t = 0)]
    pub seed: u64,

    #[arg(long, default_value_t = 10)]
    pub sampler_startup: usize,

    #[arg(long, default_value_t = false)]
    pub no_prune: bool,

    #[arg(long, default_value_t = 5)]
    pub pruner_startup: usize,

    #[arg(long, default_value_t = 10)]
    pub pruner_warmup: usize,

    #[arg(long, default_value_t = 10)]
    pub top: usize,
}

pub fn run(args: TuneArgs, ctx: &Context) -> SfResult<()> {
    let config = &ctx.config;
    config.validate(ctx.scorer.candidate_count())?;

    let store_path = args
        .store
        .clone()
        .unwrap_or_else(|| ctx.results_dir.join("trials.jsonl"));
    let sampler = TpeSampler {
        n_startup_trials: args.sampler_startup,
        ..TpeSampler::default()
    };
    let pruner = (!args.no_prune).then_some(MedianPruner {
        n_startup_trials: args.pruner_startup,
        n_warmup_steps: args.pruner_warmup,
    });
    let study_name = args.study.clone().unwrap_or_else(|| {
        match (args.target, config.search.init) {
            (TuneTarget::Ga, InitStrategy::Random) => "ga-random-init-optimization",
            (TuneTarget::Ga, InitStrategy::Heuristic) => "ga-heuristic-init-optimization",
            (TuneTarget::Heuristic, _) => "overlap-heuristic",
        }
        .to_string()
    });
    let study = Study::open(
        &study_name,
        TrialStore::at(&store_path),
        sampler,
        pruner,
        args.seed,
    )?;

    let summary = match args.target {
        TuneTarget::Ga => {
            let mut objective = GaObjective::new(ctx.scorer.clone(), GaOptions::from(config));
            if config.search.init == InitStrategy::Heuristic {
                let reach = build_provider(&config.heuristic)?;
                objective = objective.with_initial(heuristic_seed(
                    &ctx.scorer,
                    reach.as_ref(),
                    &config.heuristic,
                    config.search.max_active,
                )?);
            }
            run_study(&study, &objective, args.trials, args.concurrency)?
        }
        TuneTarget::Heuristic => {
            let reach = Arc::from(build_provider(&config.heuristic)?);
            let objective = HeuristicObjective::new(
                ctx.scorer.clone(),
                reach,
                HeuristicKind::MinOverlap,
                config.search.max_active,
            );
            run_study(&study, &objective, args.trials, args.concurrency)?
        }
    };

    reports::print_trial_leaderboard(&summary, args.top);
    println!("Trials logged to {}", store_path.display());
    Ok(())
}
