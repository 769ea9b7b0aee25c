use crate::cmd::Context;
use crate::reports;
use clap::Args;
use siteforge::config::Config;
use siteforge::error::SfResult;
use siteforge::heuristics::heuristic_seed;
use siteforge::optimizer::initialization::InitStrategy;
use siteforge::optimizer::{GaOptions, GenerationStats, Optimizer, ProgressCallback};
use siteforge::reachability::build_provider;
use siteforge::results::{persist_result, ResultRecord};
use siteforge::selection::Selection;
use std::time::Instant;
use tracing::info;

#[derive(Args, Debug, Clone)]
pub struct GaArgs {
    #[command(flatten)]
    pub config: Config,

    #[arg(short = 'S', long)]
    pub seed: Option<u64>,

    /// Result file name (without extension)
    #[arg(long, default_value = "genetic_algorithm")]
    pub name: String,

    #[arg(long, default_value_t = false)]
    pub no_save: bool,

    /// Log a progress line every N generations
    #[arg(long, default_value_t = 10)]
    pub log_every: usize,
}

struct LogProgress {
    every: usize,
    started: Instant,
}

impl ProgressCallback for LogProgress {
    fn on_generation(&self, stats: &GenerationStats, best: &Selection) -> bool {
        if self.every > 0 && stats.generation % self.every == 0 {
            info!(
                "gen {:>4} | best {:>12.1} | mean {:>12.1} | active {} | {:.1}s",
                stats.generation,
                best.fitness().unwrap_or(stats.min),
                stats.mean,
                best.active_count(),
                self.started.elapsed().as_secs_f32()
            );
        }
        true
    }
}

pub fn run(args: GaArgs, ctx: &Context) -> SfResult<()> {
    let config = &ctx.config;
    config.validate(ctx.scorer.candidate_count())?;

    let seed_selection = match config.search.init {
        InitStrategy::Random => None,
        InitStrategy::Heuristic => {
            let reach = build_provider(&config.heuristic)?;
            Some(heuristic_seed(
                &ctx.scorer,
                reach.as_ref(),
                &config.heuristic,
                config.search.max_active,
            )?)
        }
    };

    let optimizer = Optimizer::new(ctx.scorer.clone(), GaOptions::from(config))?;
    let progress = LogProgress {
        every: args.log_every,
        started: Instant::now(),
    };
    let result = optimizer.run(args.seed, seed_selection.as_ref(), &progress)?;

    reports::print_generation_log(&result.history, 15);
    let report = ctx.scorer.coverage(&result.best);
    reports::print_coverage_summary(
        "Genetic Algorithm",
        result.fitness,
        &report,
        config.scoring.service_level,
        result.best.active_count(),
    );

    if !args.no_save {
        let record = ResultRecord::from_selection(&result.best, &ctx.scorer.candidates, &report)
            .with_fitness(result.fitness);
        persist_result(&ctx.results_dir, &args.name, &record)?;
    }
    Ok(())
}
