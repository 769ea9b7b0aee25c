pub mod geojson;
pub mod voronoi;

use crate::error::{SfResult, SiteForgeError};
use geo::{Area, BooleanOps, BoundingRect, Contains, Coord, MultiPolygon, Point, Rect};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::Path;
use tracing::{debug, info};

/// A candidate site. `id` is its position in the owning `CandidateSet`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: usize,
    pub lon: f64,
    pub lat: f64,
}

impl Location {
    pub fn coord(&self) -> Coord<f64> {
        Coord {
            x: self.lon,
            y: self.lat,
        }
    }
}

/// Accepted shapes for one entry of a candidate JSON file.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawLocation {
    Pair([f64; 2]),
    Nested(Vec<[f64; 2]>),
    Object { lon: f64, lat: f64 },
}

/// Ordered, index-stable list of candidate sites. Its length is the
/// chromosome length for the whole run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateSet {
    locations: Vec<Location>,
}

impl CandidateSet {
    pub fn new(coords: Vec<(f64, f64)>) -> Self {
        let locations = coords
            .into_iter()
            .enumerate()
            .map(|(id, (lon, lat))| Location { id, lon, lat })
            .collect();
        Self { locations }
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Location> {
        self.locations.get(idx)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Location> {
        self.locations.iter()
    }

    pub fn as_slice(&self) -> &[Location] {
        &self.locations
    }

    /// Loads candidates from `.json` or `.csv`, dropping near-duplicates
    /// closer than `dedup_threshold` (same units as the coordinates).
    pub fn load_from_file<P: AsRef<Path>>(path: P, dedup_threshold: f64) -> SfResult<Self> {
        let path = path.as_ref();
        let coords = match path.extension().and_then(|e| e.to_str()) {
            Some("csv") => load_csv_coords(path)?,
            _ => load_json_coords(path)?,
        };

        if coords.is_empty() {
            return Err(SiteForgeError::Validation(format!(
                "No candidate locations found in '{}'",
                path.display()
            )));
        }

        let before = coords.len();
        let coords = dedup_within(coords, dedup_threshold);
        info!(
            "Loaded {} candidate sites from {} ({} near-duplicates removed)",
            coords.len(),
            path.display(),
            before - coords.len()
        );
        Ok(Self::new(coords))
    }
}

fn load_json_coords(path: &Path) -> SfResult<Vec<(f64, f64)>> {
    let content = fs::read_to_string(path)?;
    let raw: Vec<RawLocation> = serde_json::from_str(&content)?;

    raw.into_iter()
        .enumerate()
        .map(|(i, r)| match r {
            RawLocation::Pair([lon, lat]) => check_coord(i, lon, lat),
            RawLocation::Object { lon, lat } => check_coord(i, lon, lat),
            RawLocation::Nested(inner) => match inner.first() {
                Some(&[lon, lat]) => check_coord(i, lon, lat),
                None => Err(SiteForgeError::Validation(format!(
                    "Candidate #{} has an empty coordinate list",
                    i
                ))),
            },
        })
        .collect()
}

/// Reads a CSV whose header names the longitude/latitude columns with a
/// `lon`/`lat` suffix (e.g. `geo_point_2d.lon`).
fn load_csv_coords(path: &Path) -> SfResult<Vec<(f64, f64)>> {
    let file = File::open(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .from_reader(file);

    let headers = rdr.headers()?.clone();
    let find = |suffix: &str| {
        headers
            .iter()
            .position(|h| h.trim().to_ascii_lowercase().ends_with(suffix))
    };
    let (lon_col, lat_col) = match (find("lon"), find("lat")) {
        (Some(lo), Some(la)) => (lo, la),
        _ => {
            return Err(SiteForgeError::Validation(format!(
                "CSV '{}' needs columns ending in 'lon' and 'lat'",
                path.display()
            )))
        }
    };

    let mut coords = Vec::new();
    for (row_idx, result) in rdr.records().enumerate() {
        let rec = result?;
        let parse = |col: usize| -> SfResult<f64> {
            rec.get(col)
                .map(str::trim)
                .and_then(|s| s.parse::<f64>().ok())
                .ok_or_else(|| {
                    SiteForgeError::Validation(format!(
                        "Row {}: invalid coordinate in column {}",
                        row_idx + 1,
                        col
                    ))
                })
        };
        coords.push(check_coord(row_idx, parse(lon_col)?, parse(lat_col)?)?);
    }
    Ok(coords)
}

fn check_coord(idx: usize, lon: f64, lat: f64) -> SfResult<(f64, f64)> {
    if lon.is_finite() && lat.is_finite() {
        Ok((lon, lat))
    } else {
        Err(SiteForgeError::Validation(format!(
            "Candidate #{} has a non-finite coordinate",
            idx
        )))
    }
}

/// Keeps the first of every group of points closer than `threshold`.
pub fn dedup_within(coords: Vec<(f64, f64)>, threshold: f64) -> Vec<(f64, f64)> {
    if threshold <= 0.0 {
        return coords;
    }
    let limit_sq = threshold * threshold;
    let mut kept: Vec<(f64, f64)> = Vec::with_capacity(coords.len());
    for c in coords {
        let close = kept.iter().any(|k| {
            let dx = k.0 - c.0;
            let dy = k.1 - c.1;
            dx * dx + dy * dy < limit_sq
        });
        if !close {
            kept.push(c);
        }
    }
    kept
}

/// The bounded area of interest. Immutable for the run.
#[derive(Debug, Clone)]
pub struct Region {
    shape: MultiPolygon<f64>,
    bbox: Rect<f64>,
    area: f64,
}

impl Region {
    pub fn new(shape: MultiPolygon<f64>) -> SfResult<Self> {
        let bbox = shape
            .bounding_rect()
            .ok_or_else(|| SiteForgeError::Validation("Region polygon is empty".to_string()))?;
        let area = shape.unsigned_area();
        if !(area > 0.0) {
            return Err(SiteForgeError::Validation(
                "Region polygon has zero area".to_string(),
            ));
        }
        Ok(Self { shape, bbox, area })
    }

    /// Loads a GeoJSON region. All polygons found are dissolved into one shape.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> SfResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let region = Self::from_geojson_str(&content)?;
        info!(
            "Loaded region from {} ({} part(s), area {:.6})",
            path.display(),
            region.shape.0.len(),
            region.area
        );
        Ok(region)
    }

    pub fn from_geojson_str(content: &str) -> SfResult<Self> {
        let value: serde_json::Value = serde_json::from_str(content)?;
        let polygons = geojson::parse_polygons(&value)?;
        if polygons.is_empty() {
            return Err(SiteForgeError::Validation(
                "GeoJSON contains no polygons".to_string(),
            ));
        }

        let part_count = polygons.len();
        let mut iter = polygons.into_iter();
        let mut shape = MultiPolygon::new(iter.next().into_iter().collect());
        for poly in iter {
            shape = shape.union(&MultiPolygon::new(vec![poly]));
        }
        debug!(
            "Dissolved {} GeoJSON polygon(s) into {} part(s)",
            part_count,
            shape.0.len()
        );
        Self::new(shape)
    }

    pub fn shape(&self) -> &MultiPolygon<f64> {
        &self.shape
    }

    pub fn bbox(&self) -> Rect<f64> {
        self.bbox
    }

    pub fn area(&self) -> f64 {
        self.area
    }

    pub fn contains(&self, coord: Coord<f64>) -> bool {
        self.shape.contains(&Point::from(coord))
    }
}
