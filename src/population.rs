use crate::error::{GeometryError, SfResult, SiteForgeError};
use geo::{Area, BoundingRect, Contains, MultiPolygon, Point};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// Answers "how many people live inside this shape".
///
/// Implementations must be pure and thread-safe: the evaluator calls them
/// concurrently from the evaluation pool.
pub trait PopulationSource: Send + Sync {
    fn population_in(&self, shape: &MultiPolygon<f64>) -> Result<u64, GeometryError>;
}

/// A north-up population grid, summed over the pixels whose centre falls
/// inside the queried shape. Negative and nodata pixels are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RasterPopulation {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    /// Negative for north-up rasters.
    pub pixel_height: f64,
    pub width: usize,
    pub height: usize,
    #[serde(default)]
    pub nodata: Option<i64>,
    pub values: Vec<i64>,
}

impl RasterPopulation {
    pub fn new(
        origin: (f64, f64),
        pixel_size: (f64, f64),
        width: usize,
        height: usize,
        nodata: Option<i64>,
        values: Vec<i64>,
    ) -> SfResult<Self> {
        let raster = Self {
            origin_x: origin.0,
            origin_y: origin.1,
            pixel_width: pixel_size.0,
            pixel_height: pixel_size.1,
            width,
            height,
            nodata,
            values,
        };
        raster.check()?;
        Ok(raster)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> SfResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let raster: Self = serde_json::from_str(&content)?;
        raster.check()?;
        info!(
            "Loaded population raster {}x{} from {}",
            raster.width,
            raster.height,
            path.display()
        );
        Ok(raster)
    }

    fn check(&self) -> SfResult<()> {
        if self.values.len() != self.width * self.height {
            return Err(SiteForgeError::Validation(format!(
                "Raster declares {}x{} pixels but holds {} values",
                self.width,
                self.height,
                self.values.len()
            )));
        }
        if self.pixel_width == 0.0 || self.pixel_height == 0.0 {
            return Err(SiteForgeError::Validation(
                "Raster pixel size must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Inclusive pixel index range covering `[lo, hi]` along one axis,
    /// clamped to the raster. `None` when the span misses the raster.
    fn axis_range(lo: f64, hi: f64, origin: f64, step: f64, len: usize) -> Option<(usize, usize)> {
        let a = ((lo - origin) / step).floor();
        let b = ((hi - origin) / step).floor();
        let (start, end) = if a <= b { (a, b) } else { (b, a) };
        if end < 0.0 || start >= len as f64 || len == 0 {
            return None;
        }
        Some((start.max(0.0) as usize, (end as usize).min(len - 1)))
    }
}

impl PopulationSource for RasterPopulation {
    fn population_in(&self, shape: &MultiPolygon<f64>) -> Result<u64, GeometryError> {
        let bbox = shape
            .bounding_rect()
            .ok_or_else(|| GeometryError::Degenerate("empty shape".to_string()))?;

        let cols = Self::axis_range(
            bbox.min().x,
            bbox.max().x,
            self.origin_x,
            self.pixel_width,
            self.width,
        );
        let rows = Self::axis_range(
            bbox.min().y,
            bbox.max().y,
            self.origin_y,
            self.pixel_height,
            self.height,
        );
        let ((c0, c1), (r0, r1)) = match (cols, rows) {
            (Some(c), Some(r)) => (c, r),
            _ => return Err(GeometryError::OutsideRaster),
        };

        let mut total: i64 = 0;
        for row in r0..=r1 {
            let y = self.origin_y + (row as f64 + 0.5) * self.pixel_height;
            let line = &self.values[row * self.width..(row + 1) * self.width];
            for (col, &value) in line.iter().enumerate().take(c1 + 1).skip(c0) {
                if value < 0 || Some(value) == self.nodata {
                    continue;
                }
                let x = self.origin_x + (col as f64 + 0.5) * self.pixel_width;
                if shape.contains(&Point::new(x, y)) {
                    total += value;
                }
            }
        }
        Ok(total as u64)
    }
}

/// Uniform density per unit area. Used for synthetic studies and tests.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DensityPopulation {
    pub density: f64,
}

impl DensityPopulation {
    pub fn new(density: f64) -> Self {
        Self { density }
    }
}

impl PopulationSource for DensityPopulation {
    fn population_in(&self, shape: &MultiPolygon<f64>) -> Result<u64, GeometryError> {
        Ok((shape.unsigned_area() * self.density).round().max(0.0) as u64)
    }
}
