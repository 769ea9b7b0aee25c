use crate::error::{SfResult, SiteForgeError};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde_json::{json, Value};

/// Collects every polygon found in a GeoJSON value (geometry, Feature or
/// FeatureCollection). Non-areal geometries are ignored.
pub fn parse_polygons(value: &Value) -> SfResult<Vec<Polygon<f64>>> {
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("GeoJSON object has no 'type'"))?;

    match kind {
        "FeatureCollection" => {
            let features = value
                .get("features")
                .and_then(Value::as_array)
                .ok_or_else(|| invalid("FeatureCollection without 'features' array"))?;
            let mut out = Vec::new();
            for f in features {
                out.extend(parse_polygons(f)?);
            }
            Ok(out)
        }
        "Feature" => match value.get("geometry") {
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(geometry) => parse_polygons(geometry),
        },
        "GeometryCollection" => {
            let geometries = value
                .get("geometries")
                .and_then(Value::as_array)
                .ok_or_else(|| invalid("GeometryCollection without 'geometries'"))?;
            let mut out = Vec::new();
            for g in geometries {
                out.extend(parse_polygons(g)?);
            }
            Ok(out)
        }
        "Polygon" => Ok(vec![parse_polygon(coordinates(value)?)?]),
        "MultiPolygon" => coordinates(value)?
            .as_array()
            .ok_or_else(|| invalid("MultiPolygon coordinates must be an array"))?
            .iter()
            .map(parse_polygon)
            .collect(),
        _ => Ok(Vec::new()),
    }
}

fn coordinates(value: &Value) -> SfResult<&Value> {
    value
        .get("coordinates")
        .ok_or_else(|| invalid("geometry has no 'coordinates'"))
}

/// First ring is the exterior, the rest are holes.
fn parse_polygon(rings: &Value) -> SfResult<Polygon<f64>> {
    let rings = rings
        .as_array()
        .ok_or_else(|| invalid("polygon must be an array of rings"))?;
    let mut parsed = rings.iter().map(parse_ring);

    let exterior = parsed
        .next()
        .ok_or_else(|| invalid("polygon has no exterior ring"))??;
    let interiors = parsed.collect::<SfResult<Vec<_>>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn parse_ring(ring: &Value) -> SfResult<LineString<f64>> {
    let points = ring
        .as_array()
        .ok_or_else(|| invalid("ring must be an array of positions"))?;
    if points.len() < 3 {
        return Err(invalid("ring needs at least three positions"));
    }

    let coords = points
        .iter()
        .map(|p| {
            let x = p.get(0).and_then(Value::as_f64);
            let y = p.get(1).and_then(Value::as_f64);
            match (x, y) {
                (Some(x), Some(y)) => Ok(Coord { x, y }),
                _ => Err(invalid("position must hold two numbers")),
            }
        })
        .collect::<SfResult<Vec<_>>>()?;
    // LineString -> Polygon closes the ring if needed
    Ok(LineString::new(coords))
}

fn invalid(msg: &str) -> SiteForgeError {
    SiteForgeError::Validation(format!("Invalid GeoJSON: {}", msg))
}

/// Encodes a shape as a GeoJSON geometry (`Polygon` for a single part).
pub fn to_geojson(shape: &MultiPolygon<f64>) -> Value {
    if shape.0.len() == 1 {
        json!({
            "type": "Polygon",
            "coordinates": polygon_rings(&shape.0[0]),
        })
    } else {
        let parts: Vec<Value> = shape.iter().map(polygon_rings).collect();
        json!({
            "type": "MultiPolygon",
            "coordinates": parts,
        })
    }
}

fn polygon_rings(poly: &Polygon<f64>) -> Value {
    let rings: Vec<Value> = std::iter::once(poly.exterior())
        .chain(poly.interiors())
        .map(|ring| {
            let pts: Vec<Value> = ring.coords().map(|c| json!([c.x, c.y])).collect();
            Value::Array(pts)
        })
        .collect();
    Value::Array(rings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Area;

    #[test]
    fn test_feature_collection_with_hole() {
        let doc = json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [
                        [[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0], [0.0, 0.0]],
                        [[1.0, 1.0], [2.0, 1.0], [2.0, 2.0], [1.0, 2.0], [1.0, 1.0]]
                    ]
                }
            }]
        });
        let polys = parse_polygons(&doc).unwrap();
        assert_eq!(polys.len(), 1);
        assert!((polys[0].unsigned_area() - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_encode_then_parse_preserves_area() {
        let poly = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (3.0, 0.0), (3.0, 2.0), (0.0, 2.0)]),
            vec![],
        );
        let encoded = to_geojson(&MultiPolygon::new(vec![poly]));
        assert_eq!(encoded["type"], "Polygon");
        let back = parse_polygons(&encoded).unwrap();
        assert!((back[0].unsigned_area() - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_points_are_ignored() {
        let doc = json!({"type": "Point", "coordinates": [1.0, 2.0]});
        assert!(parse_polygons(&doc).unwrap().is_empty());
    }
}
