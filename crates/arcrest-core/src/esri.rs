//! Esri JSON geometry conversion.
//!
//! Map services return geometries as Esri JSON objects: `{x, y}` points,
//! `{points}` multipoints, `{paths}` polylines and `{rings}` polygons. They are
//! converted to `geo-types` geometries and then to ISO WKB. Only the first two
//! ordinates of every position are kept.
//!
//! Polylines always become `MultiLineString` and polygons `MultiPolygon`, so
//! every row of a table has the same geometry type.

use arcrest_core_common::GeometryKind;
use geo_types::{
    Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon,
};
use geozero::{CoordDimensions, ToWkb};
use serde_json::{Map, Value};

use crate::error::ConversionError;

/// Converts one Esri JSON geometry.
///
/// `kind` is the geometry kind of the layer; a known kind rejects geometries
/// of another shape, [`GeometryKind::Unknown`] accepts any shape. Null and
/// empty geometries convert to `None`.
///
/// # Errors
///
/// Returns [`ConversionError::InvalidGeometry`] for malformed geometries and
/// [`ConversionError::GeometryKindMismatch`] for geometries of the wrong
/// shape. `feature` is the index used in the error.
pub fn to_geometry(
    value: &Value,
    kind: GeometryKind,
    feature: usize,
) -> Result<Option<Geometry<f64>>, ConversionError> {
    let invalid = |message: String| ConversionError::InvalidGeometry { feature, message };

    let object = match value {
        Value::Null => return Ok(None),
        Value::Object(object) => object,
        other => return Err(invalid(format!("expected an object, found {other}"))),
    };

    let Some(shape) = shape_of(object) else {
        if object.keys().all(|key| key == "spatialReference") {
            return Ok(None);
        }
        let keys: Vec<&str> = object.keys().map(String::as_str).collect();
        return Err(invalid(format!(
            "unrecognised geometry with keys [{}]",
            keys.join(", ")
        )));
    };

    if kind.is_known() && shape != kind {
        return Err(ConversionError::GeometryKindMismatch {
            feature,
            expected: kind.to_string(),
        });
    }

    match shape {
        GeometryKind::Point => point(object).map_err(invalid),
        GeometryKind::Multipoint => multipoint(object).map_err(invalid),
        GeometryKind::Polyline => polyline(object).map_err(invalid),
        GeometryKind::Polygon => polygon(object).map_err(invalid),
        GeometryKind::Unknown => Ok(None),
    }
}

/// Encodes a geometry as ISO WKB (2D).
///
/// # Errors
///
/// Returns [`ConversionError::Encoding`] if the geometry cannot be encoded.
pub fn to_wkb(geometry: &Geometry<f64>) -> Result<Vec<u8>, ConversionError> {
    geometry
        .to_wkb(CoordDimensions::xy())
        .map_err(|e| ConversionError::Encoding {
            what: "geometry as WKB".to_string(),
            message: e.to_string(),
        })
}

fn shape_of(object: &Map<String, Value>) -> Option<GeometryKind> {
    if object.contains_key("x") {
        Some(GeometryKind::Point)
    } else if object.contains_key("points") {
        Some(GeometryKind::Multipoint)
    } else if object.contains_key("paths") {
        Some(GeometryKind::Polyline)
    } else if object.contains_key("rings") {
        Some(GeometryKind::Polygon)
    } else {
        None
    }
}

/// Reads an ordinate. `Ok(None)` marks an empty point (`null` or `"NaN"`).
fn ordinate(value: Option<&Value>, name: &str) -> Result<Option<f64>, String> {
    match value {
        None => Err(format!("missing '{name}'")),
        Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.eq_ignore_ascii_case("nan") => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| format!("'{name}' is not a finite number")),
        Some(other) => Err(format!("'{name}' is not a number: {other}")),
    }
}

fn point(object: &Map<String, Value>) -> Result<Option<Geometry<f64>>, String> {
    let x = ordinate(object.get("x"), "x")?;
    let Some(x) = x else {
        return Ok(None);
    };
    let y = ordinate(object.get("y"), "y")?.ok_or_else(|| "'y' is empty".to_string())?;
    Ok(Some(Geometry::Point(Point::new(x, y))))
}

fn position(value: &Value) -> Result<Coord<f64>, String> {
    let Some(ordinates) = value.as_array() else {
        return Err(format!("expected a position array, found {value}"));
    };
    let mut values = ordinates.iter().map(Value::as_f64);
    match (values.next().flatten(), values.next().flatten()) {
        (Some(x), Some(y)) => Ok(Coord { x, y }),
        _ => Err(format!("position needs two numeric ordinates, found {value}")),
    }
}

fn positions(value: &Value) -> Result<Vec<Coord<f64>>, String> {
    let Some(items) = value.as_array() else {
        return Err(format!("expected an array of positions, found {value}"));
    };
    items.iter().map(position).collect()
}

/// Reads an array member, `Ok(None)` when it is empty.
fn parts<'a>(object: &'a Map<String, Value>, key: &str) -> Result<Option<&'a Vec<Value>>, String> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) if items.is_empty() => Ok(None),
        Some(Value::Array(items)) => Ok(Some(items)),
        Some(other) => Err(format!("'{key}' is not an array: {other}")),
    }
}

fn multipoint(object: &Map<String, Value>) -> Result<Option<Geometry<f64>>, String> {
    let Some(items) = parts(object, "points")? else {
        return Ok(None);
    };
    let points = items
        .iter()
        .map(|item| position(item).map(Point::from))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(Geometry::MultiPoint(MultiPoint::new(points))))
}

fn polyline(object: &Map<String, Value>) -> Result<Option<Geometry<f64>>, String> {
    let Some(items) = parts(object, "paths")? else {
        return Ok(None);
    };
    let mut lines = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let coords = positions(item)?;
        if coords.len() < 2 {
            return Err(format!("path {index} has {} position(s), needs at least 2", coords.len()));
        }
        lines.push(LineString::new(coords));
    }
    Ok(Some(Geometry::MultiLineString(MultiLineString::new(lines))))
}

fn polygon(object: &Map<String, Value>) -> Result<Option<Geometry<f64>>, String> {
    let Some(items) = parts(object, "rings")? else {
        return Ok(None);
    };

    let mut polygons: Vec<(LineString<f64>, Vec<LineString<f64>>)> = Vec::new();
    for (index, item) in items.iter().enumerate() {
        let mut coords = positions(item)?;
        if let (Some(first), Some(last)) = (coords.first().copied(), coords.last().copied())
            && first != last
        {
            coords.push(first);
        }
        if coords.len() < 4 {
            return Err(format!("ring {index} has too few positions to enclose an area"));
        }

        let ring = LineString::new(coords);
        match polygons.last_mut() {
            Some((_, holes)) if !is_clockwise(&ring) => holes.push(ring),
            _ => polygons.push((ring, Vec::new())),
        }
    }

    let polygons = polygons
        .into_iter()
        .map(|(exterior, holes)| Polygon::new(exterior, holes))
        .collect();
    Ok(Some(Geometry::MultiPolygon(MultiPolygon::new(polygons))))
}

/// Esri outer rings run clockwise, holes counter-clockwise. Degenerate rings
/// with zero area count as outer rings.
fn is_clockwise(ring: &LineString<f64>) -> bool {
    signed_area(ring) <= 0.0
}

fn signed_area(ring: &LineString<f64>) -> f64 {
    ring.0
        .windows(2)
        .map(|pair| pair[0].x * pair[1].y - pair[1].x * pair[0].y)
        .sum::<f64>()
        / 2.0
}
