use crate::error::{SfResult, SiteForgeError};
use crate::geometry::geojson::to_geojson;
use crate::geometry::CandidateSet;
use crate::scorer::CoverageReport;
use crate::selection::Selection;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Persisted outcome of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRecord {
    pub fitness: f64,
    /// One `0`/`1` entry per candidate. Empty for coordinate-only evaluations.
    pub solution: Vec<u8>,
    pub solution_coords: Vec<[f64; 2]>,
    /// GeoJSON geometries of the clipped coverage cells.
    pub voronoi_polygons: Vec<Value>,
}

impl ResultRecord {
    pub fn from_selection(
        selection: &Selection,
        candidates: &CandidateSet,
        report: &CoverageReport,
    ) -> Self {
        let solution_coords = selection
            .active_indices()
            .filter_map(|i| candidates.get(i))
            .map(|loc| [loc.lon, loc.lat])
            .collect();
        Self {
            fitness: report.fitness,
            solution: selection.to_bits(),
            solution_coords,
            voronoi_polygons: report.cells.iter().map(|c| to_geojson(&c.shape)).collect(),
        }
    }

    pub fn from_report(coords: &[[f64; 2]], report: &CoverageReport) -> Self {
        Self {
            fitness: report.fitness,
            solution: Vec::new(),
            solution_coords: coords.to_vec(),
            voronoi_polygons: report.cells.iter().map(|c| to_geojson(&c.shape)).collect(),
        }
    }

    /// Overrides the stored fitness, e.g. with a penalized GA value.
    pub fn with_fitness(mut self, fitness: f64) -> Self {
        self.fitness = fitness;
        self
    }
}

/// Writes `<dir>/<name>.json`. Refuses to overwrite an existing result.
pub fn persist_result(dir: &Path, name: &str, record: &ResultRecord) -> SfResult<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.json", name));
    let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            return Err(SiteForgeError::Validation(format!(
                "Result '{}' already exists, refusing to overwrite",
                path.display()
            )));
        }
        Err(e) => return Err(e.into()),
    };
    file.write_all(serde_json::to_string_pretty(record)?.as_bytes())?;
    info!("Saved result to {}", path.display());
    Ok(path)
}

pub fn load_result(path: &Path) -> SfResult<ResultRecord> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
