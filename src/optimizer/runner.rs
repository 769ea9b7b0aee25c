use crate::config::{check_probability, Config};
use crate::error::{SfResult, SiteForgeError};
use crate::optimizer::crossover::CrossoverKind;
use crate::optimizer::initialization::initial_population;
use crate::optimizer::mutation::{mutate, MutationGuard};
use crate::optimizer::tournament::tournament_select;
use crate::scorer::Scorer;
use crate::selection::Selection;
use rayon::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Fitness added to individuals over the activation budget.
#[derive(Debug, Clone, Copy)]
pub struct PenaltyParams {
    pub penalty: f64,
    /// `penalty * distance` instead of `penalty + distance`.
    pub scales_with_distance: bool,
}

impl PenaltyParams {
    #[inline(always)]
    pub fn penalty(&self, distance: usize) -> f64 {
        if distance == 0 {
            0.0
        } else if self.scales_with_distance {
            self.penalty * distance as f64
        } else {
            self.penalty + distance as f64
        }
    }
}

#[derive(Debug, Clone)]
pub struct GaOptions {
    pub generations: usize,
    pub population_size: usize,
    pub parents_number: usize,
    pub max_active: usize,
    pub crossover: CrossoverKind,
    pub crossover_prob: f64,
    pub indpb_mate: f64,
    pub mutation_prob: f64,
    pub indpb_mutate: f64,
    pub mutation_guard: MutationGuard,
    pub tournament_size: usize,
    pub penalty: PenaltyParams,
    pub heuristic_share: f64,
    pub seed_perturbation: f64,
    pub workers: usize,
}

impl From<&Config> for GaOptions {
    fn from(cfg: &Config) -> Self {
        let s = &cfg.search;
        Self {
            generations: s.generations,
            population_size: s.population_size,
            parents_number: s.parents_number,
            max_active: s.max_active,
            crossover: s.crossover,
            crossover_prob: s.crossover_prob,
            indpb_mate: s.indpb_mate,
            mutation_prob: s.mutation_prob,
            indpb_mutate: s.indpb_mutate,
            mutation_guard: s.mutation_guard,
            tournament_size: s.tournament_size,
            penalty: PenaltyParams {
                penalty: s.infeasible_penalty,
                scales_with_distance: s.penalty_scales_with_distance,
            },
            heuristic_share: s.heuristic_share,
            seed_perturbation: s.seed_perturbation,
            workers: s.workers,
        }
    }
}

impl GaOptions {
    fn validate(&self, candidate_count: usize) -> SfResult<()> {
        if self.max_active > candidate_count {
            return Err(SiteForgeError::Config(format!(
                "max_active ({}) exceeds the number of candidate sites ({})",
                self.max_active, candidate_count
            )));
        }
        if self.population_size < 2 || self.parents_number < 2 {
            return Err(SiteForgeError::Config(
                "population_size and parents_number must be at least 2".to_string(),
            ));
        }
        if self.tournament_size == 0 {
            return Err(SiteForgeError::Config(
                "tournament_size must be at least 1".to_string(),
            ));
        }
        check_probability("crossover_prob", self.crossover_prob)?;
        check_probability("indpb_mate", self.indpb_mate)?;
        check_probability("mutation_prob", self.mutation_prob)?;
        check_probability("indpb_mutate", self.indpb_mutate)?;
        Ok(())
    }
}

/// Effective-fitness summary of one generation.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationStats {
    pub generation: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
    pub feasible: usize,
}

impl GenerationStats {
    fn collect(generation: usize, population: &[Selection], max_active: usize) -> Self {
        let values: Vec<f64> = population.iter().filter_map(|s| s.fitness()).collect();
        let n = values.len().max(1) as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Self {
            generation,
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            mean,
            std: var.sqrt(),
            feasible: population
                .iter()
                .filter(|s| s.is_feasible(max_active))
                .count(),
        }
    }
}

pub struct OptimizationResult {
    pub best: Selection,
    /// Effective fitness (raw + penalty) of `best`.
    pub fitness: f64,
    pub raw_fitness: f64,
    pub generations_run: usize,
    pub history: Vec<GenerationStats>,
    pub stopped_early: bool,
}

/// Receives generation updates.
/// Boolean return value indicates if the search should continue (true) or abort (false).
pub trait ProgressCallback: Send + Sync {
    fn on_generation(&self, stats: &GenerationStats, best: &Selection) -> bool;
}

pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_generation(&self, _stats: &GenerationStats, _best: &Selection) -> bool {
        true
    }
}

pub struct Optimizer {
    scorer: Arc<Scorer>,
    options: GaOptions,
    pool: Option<rayon::ThreadPool>,
}

impl Optimizer {
    pub fn new(scorer: Arc<Scorer>, options: GaOptions) -> SfResult<Self> {
        options.validate(scorer.candidate_count())?;
        let pool = if options.workers > 1 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(options.workers)
                    .build()?,
            )
        } else {
            None
        };
        Ok(Self {
            scorer,
            options,
            pool,
        })
    }

    pub fn options(&self) -> &GaOptions {
        &self.options
    }

    /// Raw fitness plus the infeasibility penalty.
    pub fn effective_fitness(&self, sel: &Selection) -> f64 {
        let distance = sel.distance_to_feasible(self.options.max_active);
        self.scorer.evaluate(sel) + self.options.penalty.penalty(distance)
    }

    fn evaluate_population(&self, population: &mut [Selection]) {
        let eval = |sel: &mut Selection| {
            if sel.fitness().is_none() {
                let f = self.effective_fitness(sel);
                sel.set_fitness(f);
            }
        };
        match &self.pool {
            Some(pool) => pool.install(|| population.par_iter_mut().for_each(eval)),
            None => population.iter_mut().for_each(eval),
        }
    }

    fn update_hall_of_fame(hof: &mut Option<Selection>, population: &[Selection]) {
        let candidate = population
            .iter()
            .filter(|s| s.fitness().is_some())
            .min_by(|a, b| fitness_of(a).total_cmp(&fitness_of(b)));
        if let Some(c) = candidate {
            let better = match hof {
                Some(h) => fitness_of(c) < fitness_of(h),
                None => true,
            };
            if better {
                *hof = Some(c.clone());
            }
        }
    }

    fn next_generation(&self, population: &[Selection], rng: &mut fastrand::Rng) -> Vec<Selection> {
        let opts = &self.options;
        let fitnesses: Vec<f64> = population.iter().map(fitness_of).collect();
        let parents: Vec<&Selection> =
            tournament_select(&fitnesses, opts.parents_number, opts.tournament_size, rng)
                .into_iter()
                .map(|i| &population[i])
                .collect();

        let mut offspring = Vec::with_capacity(opts.population_size + 1);
        while offspring.len() < opts.population_size {
            let i = rng.usize(..parents.len());
            let mut j = rng.usize(..parents.len() - 1);
            if j >= i {
                j += 1;
            }
            let (a, b) = (parents[i], parents[j]);
            if rng.f64() < opts.crossover_prob {
                let (c, d) = opts
                    .crossover
                    .apply(a, b, opts.indpb_mate, opts.max_active, rng);
                offspring.push(c);
                offspring.push(d);
            } else {
                offspring.push(a.clone());
                offspring.push(b.clone());
            }
        }
        offspring.truncate(opts.population_size);

        for child in offspring.iter_mut() {
            if rng.f64() < opts.mutation_prob {
                mutate(
                    child,
                    opts.indpb_mutate,
                    opts.max_active,
                    opts.mutation_guard,
                    rng,
                );
            }
        }
        offspring
    }

    /// Runs the generational loop. `initial` seeds the population when the
    /// heuristic init strategy is used.
    pub fn run<CB: ProgressCallback + ?Sized>(
        &self,
        seed: Option<u64>,
        initial: Option<&Selection>,
        callback: &CB,
    ) -> SfResult<OptimizationResult> {
        let opts = &self.options;
        let mut rng = match seed {
            Some(s) => fastrand::Rng::with_seed(s),
            None => fastrand::Rng::new(),
        };

        let mut population = initial_population(
            self.scorer.candidate_count(),
            opts.population_size,
            opts.max_active,
            initial,
            opts.heuristic_share,
            opts.seed_perturbation,
            &mut rng,
        )?;
        info!(
            "Starting GA: {} individuals, {} generations, budget {}",
            opts.population_size, opts.generations, opts.max_active
        );

        let mut hof: Option<Selection> = None;
        let mut history = Vec::with_capacity(opts.generations + 1);
        let mut generations_run = 0;
        let mut stopped_early = false;

        for generation in 0..=opts.generations {
            if generation > 0 {
                population = self.next_generation(&population, &mut rng);
            }
            self.evaluate_population(&mut population);
            Self::update_hall_of_fame(&mut hof, &population);

            let stats = GenerationStats::collect(generation, &population, opts.max_active);
            debug!(
                "gen {:>4} | min {:.1} | mean {:.1} | feasible {}/{}",
                generation,
                stats.min,
                stats.mean,
                stats.feasible,
                population.len()
            );
            generations_run = generation;

            let keep_going = match &hof {
                Some(best) => callback.on_generation(&stats, best),
                None => true,
            };
            history.push(stats);
            if !keep_going {
                stopped_early = true;
                break;
            }
        }

        let best = hof.ok_or_else(|| {
            SiteForgeError::Construction("GA produced no evaluated individual".to_string())
        })?;
        let fitness = fitness_of(&best);
        let raw_fitness = self.scorer.evaluate(&best);
        info!(
            "GA finished after {} generations: fitness {:.1} ({} active sites)",
            generations_run,
            fitness,
            best.active_count()
        );

        Ok(OptimizationResult {
            best,
            fitness,
            raw_fitness,
            generations_run,
            history,
            stopped_early,
        })
    }
}

#[inline(always)]
fn fitness_of(sel: &Selection) -> f64 {
    sel.fitness().unwrap_or(f64::INFINITY)
}
