pub mod types;

pub use self::types::{CoverageCell, CoverageReport, ScoringMode};

use crate::config::ScoringParams;
use crate::geometry::voronoi::voronoi_cells;
use crate::geometry::{CandidateSet, Region};
use crate::population::PopulationSource;
use crate::selection::Selection;
use geo::{Area, BooleanOps, Coord, MultiPolygon};
use std::sync::Arc;
use tracing::debug;

/// Turns a selection into a coverage fitness (lower is better).
///
/// Holds only shared read-only state, so one `Scorer` can be used from
/// every evaluation worker at once.
pub struct Scorer {
    pub candidates: Arc<CandidateSet>,
    pub region: Arc<Region>,
    pub population: Arc<dyn PopulationSource>,
    pub params: ScoringParams,
}

impl Scorer {
    pub fn new(
        candidates: Arc<CandidateSet>,
        region: Arc<Region>,
        population: Arc<dyn PopulationSource>,
        params: ScoringParams,
    ) -> Self {
        Self {
            candidates,
            region,
            population,
            params,
        }
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    /// Raw fitness of a selection, before any infeasibility penalty.
    pub fn evaluate(&self, selection: &Selection) -> f64 {
        self.coverage(selection).fitness
    }

    /// Full tessellation report for a selection.
    pub fn coverage(&self, selection: &Selection) -> CoverageReport {
        let sites: Vec<(usize, Coord<f64>)> = selection
            .active_indices()
            .filter_map(|i| self.candidates.get(i).map(|loc| (i, loc.coord())))
            .collect();
        self.coverage_of_sites(&sites)
    }

    /// Coverage of arbitrary sites given as `(id, coordinate)`. The result
    /// depends only on the set of coordinates, not on their order. Sites at
    /// the same coordinate share one cell, owned by the lowest id.
    pub fn coverage_of_sites(&self, sites: &[(usize, Coord<f64>)]) -> CoverageReport {
        let mut ordered = sites.to_vec();
        ordered.sort_by(|a, b| {
            a.1.x
                .total_cmp(&b.1.x)
                .then(a.1.y.total_cmp(&b.1.y))
                .then(a.0.cmp(&b.0))
        });
        ordered.dedup_by(|later, kept| later.1 == kept.1);
        let merged = sites.len() - ordered.len();

        if ordered.len() < 2 {
            return CoverageReport {
                fitness: self.params.no_coverage_fitness,
                dropped_cells: merged,
                ..Default::default()
            };
        }

        let seeds: Vec<Coord<f64>> = ordered.iter().map(|s| s.1).collect();

        let region = self.region.shape();
        let min_area = self.region.area() * 1e-12;
        let mode = self.params.scoring_mode;
        let service_level = self.params.service_level;

        let mut report = CoverageReport {
            dropped_cells: merged,
            ..Default::default()
        };
        for ((site, _), cell) in ordered.iter().zip(voronoi_cells(&seeds, self.region.bbox())) {
            let Some(cell) = cell else {
                report.dropped_cells += 1;
                continue;
            };

            let clipped = MultiPolygon::new(vec![cell]).intersection(region);
            if clipped.unsigned_area() <= min_area {
                report.dropped_cells += 1;
                continue;
            }

            let population = match self.population.population_in(&clipped) {
                Ok(p) => p,
                Err(e) => {
                    debug!("Population query failed for site {}: {}", site, e);
                    report.failed_queries += 1;
                    0
                }
            };

            let score = mode.cell_score(population, service_level);
            report.fitness += score;
            report.cells.push(CoverageCell {
                site: *site,
                shape: clipped,
                population,
                score,
            });
        }
        report
    }
}
