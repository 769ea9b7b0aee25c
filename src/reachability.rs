use crate::config::HeuristicParams;
use crate::error::{ReachabilityError, SfResult};
use crate::geometry::geojson::parse_polygons;
use crate::geometry::Location;
use clap::ValueEnum;
use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::f64::consts::PI;
use std::thread;
use std::time::Duration;
use strum_macros::{Display, EnumString};
use tracing::{info, warn};

pub const API_KEY_ENV: &str = "ORS_API_KEY";

const METRES_PER_DEGREE: f64 = 111_320.0;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ReachabilityKind {
    /// Offline circle from a walking speed.
    #[default]
    Radial,
    /// openrouteservice-compatible isochrone API.
    Ors,
}

/// Area reachable from a location within a travel time.
pub trait ReachabilityProvider: Send + Sync {
    fn isochrone(&self, location: &Location, minutes: u32)
        -> Result<MultiPolygon<f64>, ReachabilityError>;
}

/// Builds the provider selected in the config, wrapped with retries.
pub fn build_provider(params: &HeuristicParams) -> SfResult<Box<dyn ReachabilityProvider>> {
    match params.reachability {
        ReachabilityKind::Radial => Ok(Box::new(RadialReachability::new(params.walk_speed))),
        ReachabilityKind::Ors => {
            let api_key = std::env::var(API_KEY_ENV).ok();
            if api_key.is_none() {
                warn!("{} is not set, isochrone requests are unauthenticated", API_KEY_ENV);
            }
            let client = OrsClient::new(
                &params.isochrone_url,
                &params.isochrone_profile,
                api_key,
                Duration::from_secs(params.isochrone_timeout_secs),
            )?;
            info!(
                "Using isochrone service {} ({})",
                params.isochrone_url, params.isochrone_profile
            );
            Ok(Box::new(Retrying::new(
                client,
                params.isochrone_retries,
                Duration::from_millis(500),
            )))
        }
    }
}

/// Circle of radius `walk_speed * minutes` metres, in degrees.
#[derive(Debug, Clone, Copy)]
pub struct RadialReachability {
    /// Metres per minute.
    pub walk_speed: f64,
    pub segments: usize,
}

impl RadialReachability {
    pub fn new(walk_speed: f64) -> Self {
        Self {
            walk_speed,
            segments: 32,
        }
    }
}

impl ReachabilityProvider for RadialReachability {
    fn isochrone(
        &self,
        location: &Location,
        minutes: u32,
    ) -> Result<MultiPolygon<f64>, ReachabilityError> {
        let radius_m = self.walk_speed * minutes as f64;
        if radius_m <= 0.0 || self.segments < 3 {
            return Err(ReachabilityError::InvalidResponse(
                "radial isochrone needs a positive radius".to_string(),
            ));
        }
        let dlat = radius_m / METRES_PER_DEGREE;
        let dlon = dlat / location.lat.to_radians().cos().max(1e-6);

        let ring: Vec<Coord<f64>> = (0..self.segments)
            .map(|k| {
                let theta = 2.0 * PI * k as f64 / self.segments as f64;
                Coord {
                    x: location.lon + dlon * theta.cos(),
                    y: location.lat + dlat * theta.sin(),
                }
            })
            .collect();
        Ok(MultiPolygon::new(vec![Polygon::new(
            LineString::from(ring),
            vec![],
        )]))
    }
}

/// Blocking client for `POST {base}/v2/isochrones/{profile}`.
pub struct OrsClient {
    http: reqwest::blocking::Client,
    base_url: String,
    profile: String,
    api_key: Option<String>,
}

impl OrsClient {
    pub fn new(
        base_url: &str,
        profile: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ReachabilityError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            profile: profile.to_string(),
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v2/isochrones/{}", self.base_url, self.profile)
    }
}

impl ReachabilityProvider for OrsClient {
    fn isochrone(
        &self,
        location: &Location,
        minutes: u32,
    ) -> Result<MultiPolygon<f64>, ReachabilityError> {
        let body = json!({
            "locations": [[location.lon, location.lat]],
            "range": [minutes * 60],
        });

        let mut req = self.http.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", key);
        }
        let resp = req.send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ReachabilityError::Status(status.as_u16()));
        }
        let doc: Value = resp.json()?;
        parse_isochrone(&doc)
    }
}

/// Extracts the first feature's geometry of an isochrone response.
pub fn parse_isochrone(doc: &Value) -> Result<MultiPolygon<f64>, ReachabilityError> {
    let geometry = doc
        .get("features")
        .and_then(|f| f.get(0))
        .and_then(|f| f.get("geometry"))
        .ok_or_else(|| ReachabilityError::InvalidResponse("no features in response".to_string()))?;
    let polygons =
        parse_polygons(geometry).map_err(|e| ReachabilityError::InvalidResponse(e.to_string()))?;
    if polygons.is_empty() {
        return Err(ReachabilityError::InvalidResponse(
            "isochrone geometry is not areal".to_string(),
        ));
    }
    Ok(MultiPolygon::new(polygons))
}

/// Retries transient failures with exponential backoff.
pub struct Retrying<P> {
    inner: P,
    retries: u32,
    base_delay: Duration,
}

impl<P: ReachabilityProvider> Retrying<P> {
    pub fn new(inner: P, retries: u32, base_delay: Duration) -> Self {
        Self {
            inner,
            retries,
            base_delay,
        }
    }
}

impl<P: ReachabilityProvider> ReachabilityProvider for Retrying<P> {
    fn isochrone(
        &self,
        location: &Location,
        minutes: u32,
    ) -> Result<MultiPolygon<f64>, ReachabilityError> {
        let mut attempt = 0;
        loop {
            match self.inner.isochrone(location, minutes) {
                Ok(shape) => return Ok(shape),
                Err(e) if e.is_transient() && attempt < self.retries => {
                    let delay = self.base_delay * 2u32.saturating_pow(attempt);
                    warn!(
                        "Isochrone for site {} failed ({}), retrying in {:?}",
                        location.id, e, delay
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
