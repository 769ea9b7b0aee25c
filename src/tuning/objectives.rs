use crate::error::SfResult;
use crate::heuristics::{rank_candidates, run_heuristic, CandidateRanking, HeuristicKind};
use crate::optimizer::{GaOptions, GenerationStats, Optimizer, ProgressCallback};
use crate::reachability::ReachabilityProvider;
use crate::scorer::Scorer;
use crate::selection::Selection;
use crate::tuning::{ParamSpec, Trial};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Black-box function minimized by a study.
pub trait Objective: Send + Sync {
    fn space(&self) -> Vec<ParamSpec>;
    fn evaluate(&self, trial: &Trial<'_>) -> SfResult<f64>;
}

/// Forwards the hall-of-fame fitness of every generation to the trial and
/// stops the run once the pruner says so.
struct TrialProgress<'a, 'b> {
    trial: &'a Trial<'b>,
}

impl ProgressCallback for TrialProgress<'_, '_> {
    fn on_generation(&self, stats: &GenerationStats, best: &Selection) -> bool {
        self.trial.report(best.fitness().unwrap_or(stats.min));
        !self.trial.should_prune()
    }
}

/// Tunes the GA's variation rates, population size and tournament size.
pub struct GaObjective {
    scorer: Arc<Scorer>,
    base: GaOptions,
    initial: Option<Selection>,
    space: Vec<ParamSpec>,
}

impl GaObjective {
    pub fn new(scorer: Arc<Scorer>, base: GaOptions) -> Self {
        Self {
            scorer,
            base,
            initial: None,
            space: Self::default_space(),
        }
    }

    pub fn default_space() -> Vec<ParamSpec> {
        vec![
            ParamSpec::float("mutation_prob", 0.01, 0.5, Some(0.01)),
            ParamSpec::float("indpb_mutate", 0.05, 0.3, Some(0.01)),
            ParamSpec::float("crossover_prob", 0.1, 1.0, Some(0.1)),
            ParamSpec::float("indpb_mate", 0.1, 0.5, Some(0.1)),
            ParamSpec::int("population_size", 100, 1000, 100),
            ParamSpec::int("tournament_size", 2, 8, 2),
        ]
    }

    pub fn with_space(mut self, space: Vec<ParamSpec>) -> Self {
        self.space = space;
        self
    }

    /// Seeds every trial's population from a heuristic solution.
    pub fn with_initial(mut self, initial: Selection) -> Self {
        self.initial = Some(initial);
        self
    }

    fn options_for(&self, trial: &Trial<'_>) -> GaOptions {
        let b = &self.base;
        let mut opts = b.clone();
        opts.mutation_prob = trial.param_or("mutation_prob", b.mutation_prob);
        opts.indpb_mutate = trial.param_or("indpb_mutate", b.indpb_mutate);
        opts.crossover_prob = trial.param_or("crossover_prob", b.crossover_prob);
        opts.indpb_mate = trial.param_or("indpb_mate", b.indpb_mate);
        opts.population_size = trial.param_usize_or("population_size", b.population_size);
        opts.tournament_size = trial.param_usize_or("tournament_size", b.tournament_size);
        opts
    }
}

impl Objective for GaObjective {
    fn space(&self) -> Vec<ParamSpec> {
        self.space.clone()
    }

    fn evaluate(&self, trial: &Trial<'_>) -> SfResult<f64> {
        let optimizer = Optimizer::new(self.scorer.clone(), self.options_for(trial))?;
        let progress = TrialProgress { trial };
        let result = optimizer.run(Some(trial.seed()), self.initial.as_ref(), &progress)?;
        Ok(result.fitness)
    }
}

/// Tunes the min-overlap threshold and the isochrone travel time.
/// Rankings are cached per travel time since they dominate the cost.
pub struct HeuristicObjective {
    scorer: Arc<Scorer>,
    reach: Arc<dyn ReachabilityProvider>,
    kind: HeuristicKind,
    max_active: usize,
    space: Vec<ParamSpec>,
    rankings: Mutex<HashMap<u32, Arc<CandidateRanking>>>,
}

impl HeuristicObjective {
    pub fn new(
        scorer: Arc<Scorer>,
        reach: Arc<dyn ReachabilityProvider>,
        kind: HeuristicKind,
        max_active: usize,
    ) -> Self {
        Self {
            scorer,
            reach,
            kind,
            max_active,
            space: Self::default_space(),
            rankings: Mutex::new(HashMap::new()),
        }
    }

    pub fn default_space() -> Vec<ParamSpec> {
        vec![
            ParamSpec::float("overlap_threshold", 0.0, 1.0, Some(0.01)),
            ParamSpec::int("isochrone_minutes", 5, 10, 1),
        ]
    }

    pub fn with_space(mut self, space: Vec<ParamSpec>) -> Self {
        self.space = space;
        self
    }

    fn ranking(&self, minutes: u32) -> Arc<CandidateRanking> {
        if let Some(hit) = self.rankings.lock().ok().and_then(|m| m.get(&minutes).cloned()) {
            return hit;
        }
        let ranking = Arc::new(rank_candidates(&self.scorer, self.reach.as_ref(), minutes));
        if let Ok(mut cache) = self.rankings.lock() {
            cache.entry(minutes).or_insert_with(|| ranking.clone());
        }
        ranking
    }

    pub fn cached_rankings(&self) -> usize {
        self.rankings.lock().map(|m| m.len()).unwrap_or(0)
    }
}

impl Objective for HeuristicObjective {
    fn space(&self) -> Vec<ParamSpec> {
        self.space.clone()
    }

    fn evaluate(&self, trial: &Trial<'_>) -> SfResult<f64> {
        let minutes = trial.param_usize_or("isochrone_minutes", 5).max(1) as u32;
        let threshold = trial.param_or("overlap_threshold", 0.56);
        let ranking = self.ranking(minutes);
        let outcome = run_heuristic(self.kind, &self.scorer, &ranking, self.max_active, threshold)?;
        trial.report(outcome.fitness);
        Ok(outcome.fitness)
    }
}
