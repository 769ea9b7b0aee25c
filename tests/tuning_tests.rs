mod common;

use common::*;
use siteforge::config::{Config, HeuristicParams};
use siteforge::error::{SfResult, SiteForgeError};
use siteforge::heuristics::{heuristic_seed, HeuristicKind};
use siteforge::optimizer::GaOptions;
use siteforge::reachability::RadialReachability;
use siteforge::scorer::ScoringMode;
use siteforge::tuning::{
    run_study, GaObjective, HeuristicObjective, MedianPruner, Objective, ParamSpec, Study,
    TpeSampler, Trial, TrialState, TrialStore,
};
use std::collections::HashSet;
use std::fs;
use std::sync::Arc;
use tempfile::tempdir;

/// (x - 0.3)^2 on a 0.01 grid.
struct Quadratic;

impl Objective for Quadratic {
    fn space(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::float("x", 0.0, 1.0, Some(0.01))]
    }

    fn evaluate(&self, trial: &Trial<'_>) -> SfResult<f64> {
        let x = trial.param("x").unwrap_or(0.0);
        Ok((x - 0.3).powi(2))
    }
}

/// Reports the same value for twenty steps, polling the pruner each time.
struct Plateau;

impl Objective for Plateau {
    fn space(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::float("x", 0.0, 1.0, None)]
    }

    fn evaluate(&self, trial: &Trial<'_>) -> SfResult<f64> {
        let value = trial.param_or("x", 1.0) * 100.0;
        for _ in 0..20 {
            trial.report(value);
            if trial.should_prune() {
                break;
            }
        }
        Ok(value)
    }
}

struct AlwaysFails;

impl Objective for AlwaysFails {
    fn space(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::int("n", 1, 3, 1)]
    }

    fn evaluate(&self, _trial: &Trial<'_>) -> SfResult<f64> {
        Err(SiteForgeError::Construction("nothing to build".to_string()))
    }
}

fn sampler(startup: usize) -> TpeSampler {
    TpeSampler {
        n_startup_trials: startup,
        ..TpeSampler::default()
    }
}

#[test]
fn test_study_finds_the_quadratic_minimum() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("trials.jsonl");
    let study = Study::open("quad", TrialStore::at(&path), sampler(5), None, 42).unwrap();

    let summary = run_study(&study, &Quadratic, 15, 1).unwrap();
    assert_eq!(summary.trials.len(), 15);
    assert_eq!(summary.count(TrialState::Complete), 15);

    let best = summary.best.unwrap();
    let x = best.params["x"];
    assert!((x - 0.3).abs() <= 0.15, "best x {}", x);
    assert!(summary.trials.iter().all(|t| t.value.unwrap() >= best.value.unwrap()));

    let lines = fs::read_to_string(&path).unwrap();
    assert_eq!(lines.lines().count(), 15);
}

#[test]
fn test_reopened_study_continues_numbering() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("trials.jsonl");
    {
        let study = Study::open("quad", TrialStore::at(&path), sampler(5), None, 1).unwrap();
        run_study(&study, &Quadratic, 15, 1).unwrap();
    }

    let study = Study::open("quad", TrialStore::at(&path), sampler(5), None, 1).unwrap();
    assert_eq!(study.trials().unwrap().len(), 15);
    let summary = run_study(&study, &Quadratic, 3, 1).unwrap();

    let numbers: Vec<usize> = summary.trials.iter().map(|t| t.number).collect();
    assert_eq!(numbers[15..], [15, 16, 17]);

    // Another study in the same file starts from zero
    let other = Study::open("other", TrialStore::at(&path), sampler(5), None, 1).unwrap();
    assert!(other.trials().unwrap().is_empty());
    assert_eq!(other.ask(&Quadratic.space()).unwrap().number, 0);
}

#[test]
fn test_trial_seeds_follow_the_base_seed() {
    let study = Study::open("s", TrialStore::in_memory(), sampler(5), None, 100).unwrap();
    let space = Quadratic.space();
    let first = study.ask(&space).unwrap();
    let second = study.ask(&space).unwrap();
    assert_eq!(first.seed(), 100);
    assert_eq!(second.seed(), 101);
    assert!(first.params()["x"] >= 0.0 && first.params()["x"] <= 1.0);
}

#[test]
fn test_pruned_trials_keep_their_last_value() {
    let pruner = MedianPruner {
        n_startup_trials: 3,
        n_warmup_steps: 2,
    };
    // Stay with uniform sampling so later trials are not all near the optimum
    let study = Study::open("plateau", TrialStore::in_memory(), sampler(1000), Some(pruner), 3).unwrap();
    let summary = run_study(&study, &Plateau, 25, 1).unwrap();

    assert_eq!(summary.trials.len(), 25);
    assert!(summary.count(TrialState::Pruned) > 0);
    for t in &summary.trials {
        if t.state == TrialState::Pruned {
            assert!(t.intermediate.len() >= 3 && t.intermediate.len() <= 20);
            assert_eq!(t.value, t.intermediate.last().copied());
        }
    }
    // The first trials always run to completion
    assert!(summary.trials[..3].iter().all(|t| t.state == TrialState::Complete));
    assert_eq!(summary.best.unwrap().state, TrialState::Complete);
}

#[test]
fn test_concurrent_trials_get_unique_numbers() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("trials.jsonl");
    let study = Study::open("par", TrialStore::at(&path), sampler(4), None, 9).unwrap();
    let summary = run_study(&study, &Quadratic, 12, 4).unwrap();

    let numbers: HashSet<usize> = summary.trials.iter().map(|t| t.number).collect();
    assert_eq!(numbers, (0..12).collect());
    assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 12);
}

#[test]
fn test_failing_objective_records_failed_trials() {
    let study = Study::open("fail", TrialStore::in_memory(), sampler(2), None, 0).unwrap();
    let summary = run_study(&study, &AlwaysFails, 4, 2).unwrap();

    assert_eq!(summary.count(TrialState::Failed), 4);
    assert!(summary.trials.iter().all(|t| t.value.is_none()));
    assert!(summary.best.is_none());
}

#[test]
fn test_ga_objective_runs_small_trials() {
    let scorer = density_scorer(grid_candidates(4), 250, ScoringMode::Surplus);
    let mut cfg = Config::default();
    cfg.search.generations = 3;
    cfg.search.population_size = 8;
    cfg.search.parents_number = 4;
    cfg.search.max_active = 4;
    let objective = GaObjective::new(scorer, GaOptions::from(&cfg)).with_space(vec![
        ParamSpec::float("mutation_prob", 0.1, 0.5, Some(0.1)),
        ParamSpec::int("population_size", 6, 10, 2),
        ParamSpec::int("tournament_size", 2, 4, 2),
    ]);

    let study = Study::open("ga", TrialStore::in_memory(), sampler(2), None, 5).unwrap();
    let summary = run_study(&study, &objective, 3, 1).unwrap();

    assert_eq!(summary.count(TrialState::Complete), 3);
    for t in &summary.trials {
        assert!(t.value.unwrap().is_finite());
        // One report per generation, including generation zero
        assert_eq!(t.intermediate.len(), 4);
        assert!([6.0, 8.0, 10.0].contains(&t.params["population_size"]));
    }
}

#[test]
fn test_ga_objective_starts_from_heuristic_seed() {
    let scorer = density_scorer(grid_candidates(4), 250, ScoringMode::Surplus);
    let mut cfg = Config::default();
    cfg.search.generations = 2;
    cfg.search.population_size = 8;
    cfg.search.parents_number = 4;
    cfg.search.max_active = 4;

    let heuristic = HeuristicParams {
        walk_speed: 0.2 * 111_320.0 / 5.0,
        ..HeuristicParams::default()
    };
    let reach = RadialReachability::new(heuristic.walk_speed);
    let seed = heuristic_seed(&scorer, &reach, &heuristic, 4).unwrap();
    let seed_fitness = seed.fitness().unwrap();
    assert!(seed.is_feasible(4));

    let objective = GaObjective::new(scorer, GaOptions::from(&cfg))
        .with_space(vec![ParamSpec::float("mutation_prob", 0.1, 0.5, Some(0.1))])
        .with_initial(seed);
    let study = Study::open("ga-seeded", TrialStore::in_memory(), sampler(2), None, 8).unwrap();
    let summary = run_study(&study, &objective, 3, 1).unwrap();

    assert_eq!(summary.count(TrialState::Complete), 3);
    for t in &summary.trials {
        // Generation zero already holds the seed
        assert!(t.intermediate[0] <= seed_fitness);
        assert!(t.value.unwrap() <= seed_fitness);
    }
}

#[test]
fn test_sampler_keeps_exploring_after_startup() {
    let study = Study::open("quad-long", TrialStore::in_memory(), sampler(5), None, 42).unwrap();
    let summary = run_study(&study, &Quadratic, 40, 1).unwrap();

    let distinct: HashSet<u64> = summary
        .trials
        .iter()
        .map(|t| (t.params["x"] * 100.0).round() as u64)
        .collect();
    assert!(distinct.len() > 8, "only {} distinct values", distinct.len());

    let best = summary.best.unwrap().params["x"];
    assert!((best - 0.3).abs() <= 0.1, "best x {}", best);
}

#[test]
fn test_heuristic_objective_caches_rankings_per_travel_time() {
    let scorer = density_scorer(grid_candidates(4), 100, ScoringMode::Surplus);
    let reach = Arc::new(RadialReachability::new(1500.0));
    let objective = HeuristicObjective::new(scorer, reach, HeuristicKind::MinOverlap, 4)
        .with_space(vec![
            ParamSpec::float("overlap_threshold", 0.0, 1.0, Some(0.01)),
            ParamSpec::int("isochrone_minutes", 5, 6, 1),
        ]);

    let study = Study::open("heur", TrialStore::in_memory(), sampler(3), None, 2).unwrap();
    let summary = run_study(&study, &objective, 8, 2).unwrap();

    assert_eq!(summary.count(TrialState::Complete), 8);
    assert!(objective.cached_rankings() >= 1 && objective.cached_rankings() <= 2);
}
