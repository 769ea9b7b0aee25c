use clap::ValueEnum;
use geo::MultiPolygon;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// How a cell's population is turned into a score (lower is better).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    ValueEnum,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ScoringMode {
    /// Only population above the service level counts.
    #[default]
    Surplus,
    /// Distance to the service level in either direction.
    SurplusAndShortfall,
    /// Signed population minus service level.
    NetPopulation,
}

impl ScoringMode {
    #[inline(always)]
    pub fn cell_score(self, population: u64, service_level: u64) -> f64 {
        let diff = population as f64 - service_level as f64;
        match self {
            ScoringMode::Surplus => diff.max(0.0),
            ScoringMode::SurplusAndShortfall => diff.abs(),
            ScoringMode::NetPopulation => diff,
        }
    }
}

/// One clipped tessellation cell and its contribution to fitness.
#[derive(Debug, Clone)]
pub struct CoverageCell {
    /// Candidate index of the seed site.
    pub site: usize,
    pub shape: MultiPolygon<f64>,
    pub population: u64,
    pub score: f64,
}

#[derive(Debug, Clone, Default)]
pub struct CoverageReport {
    pub fitness: f64,
    pub cells: Vec<CoverageCell>,
    /// Cells dropped as degenerate or empty after clipping.
    pub dropped_cells: usize,
    /// Cells whose population query failed and were counted as empty.
    pub failed_queries: usize,
}

impl CoverageReport {
    pub fn total_population(&self) -> u64 {
        self.cells.iter().map(|c| c.population).sum()
    }

    pub fn cells_over_target(&self, service_level: u64) -> usize {
        self.cells
            .iter()
            .filter(|c| c.population >= service_level)
            .count()
    }
}
