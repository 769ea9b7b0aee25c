use crate::config::HeuristicParams;
use crate::error::{SfResult, SiteForgeError};
use crate::reachability::ReachabilityProvider;
use crate::scorer::Scorer;
use crate::selection::Selection;
use clap::ValueEnum;
use geo::{Area, BooleanOps, BoundingRect, MultiPolygon, Rect};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use tracing::{info, warn};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum HeuristicKind {
    MaxPopulation,
    #[default]
    MinOverlap,
}

#[derive(Debug, Clone)]
pub struct RankedCandidate {
    pub index: usize,
    pub population: u64,
    pub isochrone: MultiPolygon<f64>,
    pub area: f64,
    bbox: Option<Rect<f64>>,
}

impl RankedCandidate {
    fn new(index: usize, population: u64, isochrone: MultiPolygon<f64>) -> Self {
        let area = isochrone.unsigned_area();
        let bbox = isochrone.bounding_rect();
        Self {
            index,
            population,
            isochrone,
            area,
            bbox,
        }
    }

    /// Area shared with another candidate's isochrone.
    pub fn overlap_with(&self, other: &RankedCandidate) -> f64 {
        match (self.bbox, other.bbox) {
            (Some(a), Some(b)) if boxes_intersect(a, b) => {
                self.isochrone.intersection(&other.isochrone).unsigned_area()
            }
            _ => 0.0,
        }
    }
}

fn boxes_intersect(a: Rect<f64>, b: Rect<f64>) -> bool {
    a.min().x <= b.max().x && b.min().x <= a.max().x && a.min().y <= b.max().y && b.min().y <= a.max().y
}

/// Candidates sorted by reachable population, highest first.
#[derive(Debug, Clone, Default)]
pub struct CandidateRanking {
    pub ranked: Vec<RankedCandidate>,
    /// Candidates dropped because their isochrone could not be obtained.
    pub skipped: usize,
}

/// Builds the isochrone of every candidate and ranks them by the population
/// inside it. Failed isochrones are logged and skipped.
pub fn rank_candidates(
    scorer: &Scorer,
    reach: &dyn ReachabilityProvider,
    minutes: u32,
) -> CandidateRanking {
    let results: Vec<Option<RankedCandidate>> = scorer
        .candidates
        .as_slice()
        .par_iter()
        .map(|loc| match reach.isochrone(loc, minutes) {
            Ok(shape) => {
                let population = scorer.population.population_in(&shape).unwrap_or(0);
                Some(RankedCandidate::new(loc.id, population, shape))
            }
            Err(e) => {
                warn!("Skipping candidate {}: {}", loc.id, e);
                None
            }
        })
        .collect();

    let skipped = results.iter().filter(|r| r.is_none()).count();
    let mut ranked: Vec<RankedCandidate> = results.into_iter().flatten().collect();
    ranked.sort_by(|a, b| b.population.cmp(&a.population).then(a.index.cmp(&b.index)));

    info!(
        "Ranked {} candidates by {}-minute reachable population ({} skipped)",
        ranked.len(),
        minutes,
        skipped
    );
    CandidateRanking { ranked, skipped }
}

#[derive(Debug, Clone)]
pub struct HeuristicOutcome {
    pub selection: Selection,
    pub fitness: f64,
    pub accepted: usize,
    pub skipped_candidates: usize,
}

/// Activates the `max_active` best-ranked candidates.
pub fn max_population(
    scorer: &Scorer,
    ranking: &CandidateRanking,
    max_active: usize,
) -> SfResult<HeuristicOutcome> {
    if ranking.ranked.len() < max_active {
        return Err(SiteForgeError::Construction(format!(
            "only {} ranked candidates for a budget of {}",
            ranking.ranked.len(),
            max_active
        )));
    }
    let chosen: Vec<usize> = ranking.ranked[..max_active]
        .iter()
        .map(|c| c.index)
        .collect();
    let selection = Selection::from_indices(scorer.candidate_count(), &chosen)?;
    if selection.active_count() != max_active {
        return Err(SiteForgeError::Construction(format!(
            "max-population selected {} sites instead of {}",
            selection.active_count(),
            max_active
        )));
    }
    finish(scorer, selection, ranking)
}

/// Walks the ranking and accepts a candidate only when its overlap with
/// every accepted isochrone stays within `threshold` of its own area.
pub fn min_overlap(
    scorer: &Scorer,
    ranking: &CandidateRanking,
    max_active: usize,
    threshold: f64,
) -> SfResult<HeuristicOutcome> {
    let mut accepted: Vec<&RankedCandidate> = Vec::with_capacity(max_active);
    for cand in &ranking.ranked {
        if accepted.len() >= max_active {
            break;
        }
        let fits = threshold >= 1.0
            || accepted
                .iter()
                .all(|a| cand.overlap_with(a) <= threshold * cand.area);
        if fits {
            accepted.push(cand);
        }
    }

    let chosen: Vec<usize> = accepted.iter().map(|c| c.index).collect();
    let selection = Selection::from_indices(scorer.candidate_count(), &chosen)?;
    if !selection.is_feasible(max_active) {
        return Err(SiteForgeError::Construction(format!(
            "min-overlap selected {} sites over a budget of {}",
            selection.active_count(),
            max_active
        )));
    }
    finish(scorer, selection, ranking)
}

pub fn run_heuristic(
    kind: HeuristicKind,
    scorer: &Scorer,
    ranking: &CandidateRanking,
    max_active: usize,
    threshold: f64,
) -> SfResult<HeuristicOutcome> {
    match kind {
        HeuristicKind::MaxPopulation => max_population(scorer, ranking, max_active),
        HeuristicKind::MinOverlap => min_overlap(scorer, ranking, max_active, threshold),
    }
}

/// Min-overlap solution used to seed a GA population.
pub fn heuristic_seed(
    scorer: &Scorer,
    reach: &dyn ReachabilityProvider,
    params: &HeuristicParams,
    max_active: usize,
) -> SfResult<Selection> {
    info!("Building heuristic seed for the initial population");
    let ranking = rank_candidates(scorer, reach, params.isochrone_minutes);
    let outcome = min_overlap(scorer, &ranking, max_active, params.overlap_threshold)?;
    Ok(outcome.selection)
}

fn finish(
    scorer: &Scorer,
    mut selection: Selection,
    ranking: &CandidateRanking,
) -> SfResult<HeuristicOutcome> {
    let fitness = scorer.evaluate(&selection);
    selection.set_fitness(fitness);
    Ok(HeuristicOutcome {
        accepted: selection.active_count(),
        selection,
        fitness,
        skipped_candidates: ranking.skipped,
    })
}
