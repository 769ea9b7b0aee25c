use crate::error::{SfResult, SiteForgeError};
use crate::optimizer::crossover::CrossoverKind;
use crate::optimizer::mutation::MutationGuard;
use crate::optimizer::initialization::InitStrategy;
use crate::reachability::ReachabilityKind;
use crate::scorer::ScoringMode;
use clap::{parser::ValueSource, ArgMatches, Args};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Args, Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    #[command(flatten)]
    pub search: SearchParams,
    #[command(flatten)]
    pub scoring: ScoringParams,
    #[command(flatten)]
    pub heuristic: HeuristicParams,
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    #[arg(long, default_value_t = 300)]
    pub generations: usize,
    #[arg(long, default_value_t = 100)]
    pub population_size: usize,
    #[arg(long, default_value_t = 50)]
    pub parents_number: usize,

    // Budget: maximum number of simultaneously active sites
    #[arg(long, default_value_t = 352)]
    pub max_active: usize,

    // === RECOMBINATION ===
    #[arg(long, value_enum, default_value_t = CrossoverKind::Uniform)]
    pub crossover: CrossoverKind,
    #[arg(long, default_value_t = 0.5)]
    pub crossover_prob: f64,
    #[arg(long, default_value_t = 0.5)]
    pub indpb_mate: f64,

    // === MUTATION ===
    #[arg(long, default_value_t = 0.2)]
    pub mutation_prob: f64,
    #[arg(long, default_value_t = 0.05)]
    pub indpb_mutate: f64,
    #[arg(long, value_enum, default_value_t = MutationGuard::GuardOnFlip)]
    pub mutation_guard: MutationGuard,

    #[arg(long, default_value_t = 4)]
    pub tournament_size: usize,

    // === PENALTY ===
    #[arg(long, default_value_t = 900_000.0)]
    pub infeasible_penalty: f64,
    #[arg(long, default_value_t = false)]
    pub penalty_scales_with_distance: bool,

    // === INITIALISATION ===
    #[arg(long, value_enum, default_value_t = InitStrategy::Random)]
    pub init: InitStrategy,
    // Fraction of the population built by perturbing the heuristic seed
    #[arg(long, default_value_t = 0.0)]
    pub heuristic_share: f64,
    #[arg(long, default_value_t = 0.01)]
    pub seed_perturbation: f64,

    #[arg(long, default_value_t = 1)]
    pub workers: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            generations: 300,
            population_size: 100,
            parents_number: 50,
            max_active: 352,
            crossover: CrossoverKind::Uniform,
            crossover_prob: 0.5,
            indpb_mate: 0.5,
            mutation_prob: 0.2,
            indpb_mutate: 0.05,
            mutation_guard: MutationGuard::GuardOnFlip,
            tournament_size: 4,
            infeasible_penalty: 900_000.0,
            penalty_scales_with_distance: false,
            init: InitStrategy::Random,
            heuristic_share: 0.0,
            seed_perturbation: 0.01,
            workers: 1,
        }
    }
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringParams {
    // Target inhabitants served by one active site
    #[arg(long, default_value_t = 1000)]
    pub service_level: u64,
    #[arg(long, value_enum, default_value_t = ScoringMode::Surplus)]
    pub scoring_mode: ScoringMode,
    #[arg(long, default_value_t = 1.0e15)]
    pub no_coverage_fitness: f64,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            service_level: 1000,
            scoring_mode: ScoringMode::Surplus,
            no_coverage_fitness: 1.0e15,
        }
    }
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicParams {
    #[arg(long, default_value_t = 5)]
    pub isochrone_minutes: u32,
    #[arg(long, default_value_t = 0.56)]
    pub overlap_threshold: f64,

    // === REACHABILITY ===
    #[arg(long, value_enum, default_value_t = ReachabilityKind::Radial)]
    pub reachability: ReachabilityKind,
    // Metres per minute, used by the radial approximation
    #[arg(long, default_value_t = 80.0)]
    pub walk_speed: f64,
    #[arg(long, default_value = "https://api.openrouteservice.org")]
    pub isochrone_url: String,
    #[arg(long, default_value = "foot-walking")]
    pub isochrone_profile: String,
    #[arg(long, default_value_t = 30)]
    pub isochrone_timeout_secs: u64,
    #[arg(long, default_value_t = 3)]
    pub isochrone_retries: u32,
}

impl Default for HeuristicParams {
    fn default() -> Self {
        Self {
            isochrone_minutes: 5,
            overlap_threshold: 0.56,
            reachability: ReachabilityKind::Radial,
            walk_speed: 80.0,
            isochrone_url: "https://api.openrouteservice.org".to_string(),
            isochrone_profile: "foot-walking".to_string(),
            isochrone_timeout_secs: 30,
            isochrone_retries: 3,
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> SfResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            SiteForgeError::Config(format!("Failed to read config '{}': {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Copies onto `self` only the flags the user actually typed, so a JSON
    /// config file acts as the base and the command line as overrides.
    pub fn merge_from_cli(&mut self, cli: &Config, matches: &ArgMatches) {
        macro_rules! update_if_present {
            ($section:ident . $field:ident) => {
                if matches.value_source(stringify!($field)) == Some(ValueSource::CommandLine) {
                    self.$section.$field = cli.$section.$field.clone();
                }
            };
        }

        update_if_present!(search.generations);
        update_if_present!(search.population_size);
        update_if_present!(search.parents_number);
        update_if_present!(search.max_active);
        update_if_present!(search.crossover);
        update_if_present!(search.crossover_prob);
        update_if_present!(search.indpb_mate);
        update_if_present!(search.mutation_prob);
        update_if_present!(search.indpb_mutate);
        update_if_present!(search.mutation_guard);
        update_if_present!(search.tournament_size);
        update_if_present!(search.infeasible_penalty);
        update_if_present!(search.penalty_scales_with_distance);
        update_if_present!(search.init);
        update_if_present!(search.heuristic_share);
        update_if_present!(search.seed_perturbation);
        update_if_present!(search.workers);

        update_if_present!(scoring.service_level);
        update_if_present!(scoring.scoring_mode);
        update_if_present!(scoring.no_coverage_fitness);

        update_if_present!(heuristic.isochrone_minutes);
        update_if_present!(heuristic.overlap_threshold);
        update_if_present!(heuristic.reachability);
        update_if_present!(heuristic.walk_speed);
        update_if_present!(heuristic.isochrone_url);
        update_if_present!(heuristic.isochrone_profile);
        update_if_present!(heuristic.isochrone_timeout_secs);
        update_if_present!(heuristic.isochrone_retries);
    }

    /// Rejects parameter sets that cannot start a run. Called before Init.
    pub fn validate(&self, candidate_count: usize) -> SfResult<()> {
        let s = &self.search;
        if s.max_active > candidate_count {
            return Err(SiteForgeError::Config(format!(
                "max_active ({}) exceeds the number of candidate sites ({})",
                s.max_active, candidate_count
            )));
        }
        if s.population_size < 2 {
            return Err(SiteForgeError::Config(
                "population_size must be at least 2".to_string(),
            ));
        }
        if s.parents_number < 2 {
            return Err(SiteForgeError::Config(
                "parents_number must be at least 2".to_string(),
            ));
        }
        if s.tournament_size == 0 {
            return Err(SiteForgeError::Config(
                "tournament_size must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("crossover_prob", s.crossover_prob),
            ("indpb_mate", s.indpb_mate),
            ("mutation_prob", s.mutation_prob),
            ("indpb_mutate", s.indpb_mutate),
            ("heuristic_share", s.heuristic_share),
            ("seed_perturbation", s.seed_perturbation),
            ("overlap_threshold", self.heuristic.overlap_threshold),
        ] {
            check_probability(name, value)?;
        }
        if self.heuristic.isochrone_minutes == 0 {
            return Err(SiteForgeError::Config(
                "isochrone_minutes must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

pub(crate) fn check_probability(name: &str, value: f64) -> SfResult<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(SiteForgeError::Config(format!(
            "--{} must lie in [0, 1], got {}",
            name, value
        )));
    }
    Ok(())
}
