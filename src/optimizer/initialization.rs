use crate::error::{SfResult, SiteForgeError};
use crate::optimizer::mutation::{mutate, MutationGuard};
use crate::selection::Selection;
use clap::ValueEnum;
use fastrand::Rng;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum InitStrategy {
    #[default]
    Random,
    /// Seed the population from a constructive heuristic solution.
    Heuristic,
}

/// Copies `seed` and flips each gene with `probability` while respecting the
/// budget. A probability of 0 returns an exact copy.
pub fn create_heuristic_individual(
    seed: &Selection,
    probability: f64,
    max_active: usize,
    rng: &mut Rng,
) -> Selection {
    let mut sel = seed.clone();
    if probability > 0.0 {
        mutate(&mut sel, probability, max_active, MutationGuard::GuardOnFlip, rng);
    }
    sel
}

/// Builds generation zero.
///
/// Without a seed every individual is random. With one, the first
/// individual is the seed itself, the next `share * size` are perturbed
/// copies, and the rest are random.
pub fn initial_population(
    len: usize,
    size: usize,
    max_active: usize,
    seed: Option<&Selection>,
    share: f64,
    perturbation: f64,
    rng: &mut Rng,
) -> SfResult<Vec<Selection>> {
    let mut population = Vec::with_capacity(size);

    if let Some(seed) = seed {
        if seed.len() != len {
            return Err(SiteForgeError::Config(format!(
                "Seed selection has {} genes, expected {}",
                seed.len(),
                len
            )));
        }
        population.push(seed.clone());

        let perturbed = ((share * size as f64).round() as usize).min(size.saturating_sub(1));
        for _ in 0..perturbed {
            population.push(create_heuristic_individual(seed, perturbation, max_active, rng));
        }
    }

    while population.len() < size {
        population.push(Selection::create_random(rng, len, max_active)?);
    }
    population.truncate(size);
    Ok(population)
}
