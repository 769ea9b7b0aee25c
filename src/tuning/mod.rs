//! Hyperparameter search over the GA and the heuristics.
//!
//! A [`Study`] hands out [`Trial`]s with sampled parameters, records their
//! outcome in a [`TrialStore`] and feeds finished trials back to the
//! sampler. Trials report intermediate values and poll
//! [`Trial::should_prune`] to stop early.

pub mod objectives;
pub mod pruner;
pub mod sampler;
pub mod store;

pub use self::objectives::{GaObjective, HeuristicObjective, Objective};
pub use self::pruner::MedianPruner;
pub use self::sampler::TpeSampler;
pub use self::store::{TrialRecord, TrialState, TrialStore};

use crate::error::{SfResult, SiteForgeError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::{info, warn};

pub type Params = BTreeMap<String, f64>;

/// One dimension of the search space. Integer parameters are stored as
/// `f64` and snapped to whole steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub low: f64,
    pub high: f64,
    pub step: Option<f64>,
    #[serde(default)]
    pub integer: bool,
}

impl ParamSpec {
    pub fn float(name: &str, low: f64, high: f64, step: Option<f64>) -> Self {
        Self {
            name: name.to_string(),
            low,
            high,
            step,
            integer: false,
        }
    }

    pub fn int(name: &str, low: i64, high: i64, step: i64) -> Self {
        Self {
            name: name.to_string(),
            low: low as f64,
            high: high as f64,
            step: Some(step.max(1) as f64),
            integer: true,
        }
    }

    /// Rounds onto the step grid and into `[low, high]`.
    pub fn snap(&self, x: f64) -> f64 {
        let mut v = x.clamp(self.low, self.high);
        if let Some(step) = self.step.filter(|s| *s > 0.0) {
            let k = ((v - self.low) / step).round();
            let max_k = ((self.high - self.low) / step + 1e-9).floor();
            v = self.low + k.min(max_k) * step;
            // Strip float noise such as 0.30000000000000004
            v = (v * 1e10).round() / 1e10;
        }
        if self.integer {
            v = v.round();
        }
        v
    }

    pub fn sample_uniform<R: Rng>(&self, rng: &mut R) -> f64 {
        self.snap(self.low + rng.gen::<f64>() * (self.high - self.low))
    }
}

struct StudyState {
    records: Vec<TrialRecord>,
    next_number: usize,
}

/// A named, resumable sequence of trials minimizing one objective.
pub struct Study {
    name: String,
    store: TrialStore,
    sampler: TpeSampler,
    pruner: Option<MedianPruner>,
    base_seed: u64,
    state: Mutex<StudyState>,
}

impl Study {
    /// Opens `name` in `store`, resuming numbering and sampler history from
    /// any trials already recorded there.
    pub fn open(
        name: &str,
        store: TrialStore,
        sampler: TpeSampler,
        pruner: Option<MedianPruner>,
        base_seed: u64,
    ) -> SfResult<Self> {
        let records = store.load(name)?;
        let next_number = records.iter().map(|r| r.number + 1).max().unwrap_or(0);
        if !records.is_empty() {
            info!(
                "Resuming study '{}' with {} recorded trials",
                name,
                records.len()
            );
        }
        Ok(Self {
            name: name.to_string(),
            store,
            sampler,
            pruner,
            base_seed,
            state: Mutex::new(StudyState {
                records,
                next_number,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> SfResult<std::sync::MutexGuard<'_, StudyState>> {
        self.state
            .lock()
            .map_err(|_| SiteForgeError::Validation("study state lock poisoned".to_string()))
    }

    pub fn trials(&self) -> SfResult<Vec<TrialRecord>> {
        Ok(self.lock()?.records.clone())
    }

    pub fn best_trial(&self) -> SfResult<Option<TrialRecord>> {
        Ok(self
            .lock()?
            .records
            .iter()
            .filter(|r| r.state == TrialState::Complete)
            .filter(|r| r.value.is_some())
            .min_by(|a, b| {
                a.value
                    .unwrap_or(f64::INFINITY)
                    .total_cmp(&b.value.unwrap_or(f64::INFINITY))
            })
            .cloned())
    }

    /// Starts a new trial with parameters drawn from the sampler.
    pub fn ask(&self, space: &[ParamSpec]) -> SfResult<Trial<'_>> {
        let (number, history) = {
            let mut state = self.lock()?;
            let number = state.next_number;
            state.next_number += 1;
            (number, state.records.clone())
        };
        let seed = self.base_seed.wrapping_add(number as u64);
        let mut rng = StdRng::seed_from_u64(seed ^ 0x5DEE_CE66_D);
        let params = self.sampler.sample(space, &history, &mut rng);

        Ok(Trial {
            study: self,
            number,
            seed,
            params,
            intermediate: Mutex::new(Vec::new()),
            pruned: AtomicBool::new(false),
        })
    }

    /// Records a finished trial. A pruned trial keeps its last reported value.
    pub fn tell(&self, trial: Trial<'_>, outcome: SfResult<f64>) -> SfResult<TrialRecord> {
        let intermediate = trial
            .intermediate
            .into_inner()
            .map_err(|_| SiteForgeError::Validation("trial lock poisoned".to_string()))?;
        let (state, value) = match outcome {
            Ok(_) if trial.pruned.load(Ordering::SeqCst) => {
                (TrialState::Pruned, intermediate.last().copied())
            }
            Ok(v) => (TrialState::Complete, Some(v)),
            Err(e) => {
                warn!("Trial {} failed: {}", trial.number, e);
                (TrialState::Failed, None)
            }
        };

        let record = TrialRecord {
            study: self.name.clone(),
            number: trial.number,
            seed: trial.seed,
            params: trial.params,
            state,
            value,
            intermediate,
        };

        let mut st = self.lock()?;
        self.store.append(&record)?;
        st.records.push(record.clone());
        info!(
            "Trial {} {}: value {:?}",
            record.number, record.state, record.value
        );
        Ok(record)
    }

    fn should_prune(&self, curve: &[f64]) -> bool {
        let Some(pruner) = &self.pruner else {
            return false;
        };
        let Ok(state) = self.state.lock() else {
            return false;
        };
        let others: Vec<&[f64]> = state
            .records
            .iter()
            .filter(|r| r.state == TrialState::Complete)
            .map(|r| r.intermediate.as_slice())
            .collect();
        pruner.should_prune(curve, &others)
    }
}

/// A running evaluation. Shared by reference with the objective, which
/// reports progress through it.
pub struct Trial<'a> {
    study: &'a Study,
    pub number: usize,
    seed: u64,
    params: Params,
    intermediate: Mutex<Vec<f64>>,
    pruned: AtomicBool,
}

impl Trial<'_> {
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<f64> {
        self.params.get(name).copied()
    }

    pub fn param_or(&self, name: &str, default: f64) -> f64 {
        self.param(name).unwrap_or(default)
    }

    pub fn param_usize_or(&self, name: &str, default: usize) -> usize {
        self.param(name)
            .map(|v| v.round().max(0.0) as usize)
            .unwrap_or(default)
    }

    /// Records the objective value reached at the next step.
    pub fn report(&self, value: f64) {
        if let Ok(mut curve) = self.intermediate.lock() {
            curve.push(value);
        }
    }

    /// Asks the pruner whether this trial should stop. Once true, stays true.
    pub fn should_prune(&self) -> bool {
        if self.pruned.load(Ordering::SeqCst) {
            return true;
        }
        let curve = match self.intermediate.lock() {
            Ok(c) => c.clone(),
            Err(_) => return false,
        };
        let prune = self.study.should_prune(&curve);
        if prune {
            self.pruned.store(true, Ordering::SeqCst);
        }
        prune
    }
}

#[derive(Debug, Clone)]
pub struct StudySummary {
    pub study: String,
    pub trials: Vec<TrialRecord>,
    pub best: Option<TrialRecord>,
}

impl StudySummary {
    pub fn count(&self, state: TrialState) -> usize {
        self.trials.iter().filter(|t| t.state == state).count()
    }
}

/// Runs `n_trials` new trials with at most `concurrency` in flight.
pub fn run_study<O: Objective + ?Sized>(
    study: &Study,
    objective: &O,
    n_trials: usize,
    concurrency: usize,
) -> SfResult<StudySummary> {
    let space = objective.space();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(concurrency.max(1))
        .build()?;
    info!(
        "Study '{}': {} trials, {} concurrent",
        study.name(),
        n_trials,
        concurrency.max(1)
    );

    pool.install(|| {
        (0..n_trials)
            .into_par_iter()
            .with_max_len(1)
            .try_for_each(|_| -> SfResult<()> {
                let trial = study.ask(&space)?;
                let outcome = objective.evaluate(&trial);
                study.tell(trial, outcome)?;
                Ok(())
            })
    })?;

    Ok(StudySummary {
        study: study.name().to_string(),
        trials: study.trials()?,
        best: study.best_trial()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snap_to_step_grid() {
        let spec = ParamSpec::float("p", 0.01, 0.5, Some(0.01));
        assert_eq!(spec.snap(0.123), 0.12);
        assert_eq!(spec.snap(0.9), 0.5);
        assert_eq!(spec.snap(-1.0), 0.01);

        let ints = ParamSpec::int("n", 100, 1000, 100);
        assert_eq!(ints.snap(449.0), 400.0);
        assert_eq!(ints.snap(451.0), 500.0);
    }

    fn finished(number: usize, state: TrialState, curve: Vec<f64>) -> TrialRecord {
        TrialRecord {
            study: "p".to_string(),
            number,
            seed: number as u64,
            params: Params::new(),
            state,
            value: curve.last().copied(),
            intermediate: curve,
        }
    }

    #[test]
    fn test_pruner_compares_against_completed_trials_only() {
        let pruner = MedianPruner {
            n_startup_trials: 1,
            n_warmup_steps: 0,
        };
        let study = Study::open("p", TrialStore::in_memory(), TpeSampler::default(), Some(pruner), 0)
            .unwrap();

        // A truncated curve from a pruned trial is not a reference
        study
            .lock()
            .unwrap()
            .records
            .push(finished(0, TrialState::Pruned, vec![0.0]));
        assert!(!study.should_prune(&[5.0]));

        study
            .lock()
            .unwrap()
            .records
            .push(finished(1, TrialState::Complete, vec![10.0, 9.0]));
        assert!(!study.should_prune(&[5.0]));
        assert!(study.should_prune(&[20.0]));
    }
}
