#![allow(dead_code)]

use geo::{Coord, LineString, MultiPolygon, Polygon};
use siteforge::config::ScoringParams;
use siteforge::geometry::{CandidateSet, Region};
use siteforge::population::{DensityPopulation, PopulationSource};
use siteforge::scorer::{Scorer, ScoringMode};
use std::sync::Arc;

pub fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
    MultiPolygon::new(vec![Polygon::new(
        LineString::from(vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)]),
        vec![],
    )])
}

/// The square [0,1] x [0,1].
pub fn unit_region() -> Arc<Region> {
    Arc::new(Region::new(rect(0.0, 0.0, 1.0, 1.0)).unwrap())
}

/// `side x side` points at cell centres of a regular grid over the unit square.
pub fn grid_candidates(side: usize) -> Arc<CandidateSet> {
    let step = 1.0 / side as f64;
    let mut coords = Vec::with_capacity(side * side);
    for row in 0..side {
        for col in 0..side {
            coords.push(((col as f64 + 0.5) * step, (row as f64 + 0.5) * step));
        }
    }
    Arc::new(CandidateSet::new(coords))
}

pub fn params(service_level: u64, mode: ScoringMode) -> ScoringParams {
    ScoringParams {
        service_level,
        scoring_mode: mode,
        ..ScoringParams::default()
    }
}

/// Unit square with 1000 inhabitants spread evenly.
pub fn density_scorer(
    candidates: Arc<CandidateSet>,
    service_level: u64,
    mode: ScoringMode,
) -> Arc<Scorer> {
    scorer_with(
        candidates,
        Arc::new(DensityPopulation::new(1000.0)),
        service_level,
        mode,
    )
}

pub fn scorer_with(
    candidates: Arc<CandidateSet>,
    population: Arc<dyn PopulationSource>,
    service_level: u64,
    mode: ScoringMode,
) -> Arc<Scorer> {
    Arc::new(Scorer::new(
        candidates,
        unit_region(),
        population,
        params(service_level, mode),
    ))
}

pub fn coord(x: f64, y: f64) -> Coord<f64> {
    Coord { x, y }
}
