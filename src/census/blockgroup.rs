use std::path::Path;

use anyhow::{Context, Result, bail};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde_json::Value;
use shapefile::{PolygonRing, Shape, dbase::{FieldValue, Record}};

use crate::{census::{GeoId, GeoKey}, common};

/// One polygon record of the block-group geometry source, keyed by canonical GEOID.
#[derive(Debug, Clone)]
pub struct BlockGroupShape {
    pub geo_id: GeoId,
    pub geometry: MultiPolygon<f64>, // lon/lat
}

/// Coerce an attribute-table field to a key, whatever type the table stored it as.
fn field_to_key(value: &FieldValue) -> Option<GeoKey<'_>> {
    match value {
        FieldValue::Character(Some(s)) => Some(GeoKey::Text(s)),
        FieldValue::Memo(s) => Some(GeoKey::Text(s)),
        FieldValue::Numeric(Some(n)) => Some(GeoKey::Float(*n)),
        FieldValue::Double(n) => Some(GeoKey::Float(*n)),
        FieldValue::Integer(n) => Some(GeoKey::Integer(i64::from(*n))),
        _ => None,
    }
}

/// Convert shapefile::Polygon to geo::MultiPolygon<f64>.
/// Shapefile stores each exterior ring followed by its holes.
fn shp_to_geo(polygon: &shapefile::Polygon) -> MultiPolygon<f64> {
    /// Convert a ring's points to a closed LineString.
    fn ring_to_line_string(points: &[shapefile::Point]) -> LineString<f64> {
        let mut coords = points.iter().map(|pt| Coord { x: pt.x, y: pt.y }).collect::<Vec<_>>();
        if let (Some(&first), Some(&last)) = (coords.first(), coords.last()) {
            if first != last { coords.push(first) }
        }
        LineString(coords)
    }

    let mut polys: Vec<Polygon<f64>> = Vec::new();
    let mut current_exterior: Option<LineString<f64>> = None;
    let mut current_holes: Vec<LineString<f64>> = Vec::new();

    for ring in polygon.rings() {
        match ring {
            PolygonRing::Outer(points) => {
                // flush previous polygon
                if let Some(ext) = current_exterior.take() {
                    polys.push(Polygon::new(ext, std::mem::take(&mut current_holes)));
                }
                current_exterior = Some(ring_to_line_string(points));
            }
            PolygonRing::Inner(points) => current_holes.push(ring_to_line_string(points)),
        }
    }
    if let Some(ext) = current_exterior {
        polys.push(Polygon::new(ext, current_holes));
    }

    MultiPolygon(polys)
}

/// Reads block-group polygons from a TIGER/Line `.shp` file (with its `.dbf` alongside).
/// Records whose key field cannot be normalized, or whose shape is not a polygon, are dropped.
pub fn read_tiger_shapefile(path: &Path, key_field: &str) -> Result<Vec<BlockGroupShape>> {
    let mut reader = shapefile::Reader::from_path(path)
        .with_context(|| format!("[census::blockgroup] Failed to open shapefile: {}", path.display()))?;

    let mut shapes = Vec::new();
    let mut dropped = 0usize;
    for result in reader.iter_shapes_and_records() {
        let (shape, record): (Shape, Record) = result
            .with_context(|| format!("[census::blockgroup] Error reading shape+record in {}", path.display()))?;

        let geo_id = record.get(key_field).and_then(field_to_key).and_then(GeoId::from_key);
        match (geo_id, shape) {
            (Some(geo_id), Shape::Polygon(polygon)) => shapes.push(BlockGroupShape {
                geo_id,
                geometry: shp_to_geo(&polygon),
            }),
            _ => dropped += 1,
        }
    }

    if dropped > 0 {
        log::debug!("[census::blockgroup] dropped {dropped} records without a usable {key_field} or polygon");
    }

    Ok(shapes)
}

/// Reads block-group polygons from a zipped TIGER/Line archive held in memory.
pub fn read_tiger_zip(bytes: &[u8], key_field: &str) -> Result<Vec<BlockGroupShape>> {
    let dir = tempfile::tempdir().context("[census::blockgroup] Failed to create temp dir")?;
    common::extract_zip_bytes(bytes, dir.path())?;

    let Some(shp) = common::find_file_with_extension(dir.path(), "shp") else {
        bail!("[census::blockgroup] archive contains no .shp file");
    };

    read_tiger_shapefile(&shp, key_field)
}

/// Reads block-group polygons from a GeoJSON FeatureCollection.
/// The key property may be a string or a number; Polygon and MultiPolygon geometries are accepted.
pub fn read_geojson(bytes: &[u8], key_field: &str) -> Result<Vec<BlockGroupShape>> {
    let value: Value = serde_json::from_slice(bytes)
        .context("[census::blockgroup] Failed to parse GeoJSON")?;

    let features = value["features"].as_array()
        .context("[census::blockgroup] GeoJSON has no features array")?;

    let mut shapes = Vec::with_capacity(features.len());
    for feature in features {
        let key = match &feature["properties"][key_field] {
            Value::String(s) => Some(GeoKey::Text(s)),
            Value::Number(n) => n.as_i64().map(GeoKey::Integer).or_else(|| n.as_f64().map(GeoKey::Float)),
            _ => None,
        };
        let Some(geo_id) = key.and_then(GeoId::from_key) else { continue };

        let coords = &feature["geometry"]["coordinates"];
        let geometry = match feature["geometry"]["type"].as_str() {
            Some("Polygon") => MultiPolygon(vec![parse_polygon_coords(coords)?]),
            Some("MultiPolygon") => parse_multipolygon_coords(coords)?,
            _ => continue,
        };

        shapes.push(BlockGroupShape { geo_id, geometry });
    }

    Ok(shapes)
}

/// Parse GeoJSON MultiPolygon coordinates into a geo::MultiPolygon.
fn parse_multipolygon_coords(coords: &Value) -> Result<MultiPolygon<f64>> {
    let polygons = coords.as_array()
        .context("[census::blockgroup] MultiPolygon coordinates must be an array")?;
    Ok(MultiPolygon(polygons.iter().map(parse_polygon_coords).collect::<Result<_>>()?))
}

/// Parse GeoJSON Polygon coordinates (exterior ring followed by holes) into a geo::Polygon.
fn parse_polygon_coords(coords: &Value) -> Result<Polygon<f64>> {
    let rings = coords.as_array()
        .context("[census::blockgroup] Polygon coordinates must be an array")?
        .iter()
        .map(parse_ring_coords)
        .collect::<Result<Vec<_>>>()?;

    let mut rings = rings.into_iter();
    let exterior = rings.next()
        .context("[census::blockgroup] Polygon has no exterior ring")?;
    Ok(Polygon::new(exterior, rings.collect()))
}

fn parse_ring_coords(coords: &Value) -> Result<LineString<f64>> {
    coords.as_array()
        .context("[census::blockgroup] ring must be an array of positions")?
        .iter()
        .map(|position| match (position[0].as_f64(), position[1].as_f64()) {
            (Some(x), Some(y)) => Ok(Coord { x, y }),
            _ => bail!("[census::blockgroup] invalid position {position}"),
        })
        .collect::<Result<Vec<_>>>()
        .map(LineString)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GEOJSON: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"GEOID": "240010001001"},
             "geometry": {"type": "Polygon", "coordinates": [[[-76.6,39.3],[-76.59,39.3],[-76.59,39.31],[-76.6,39.31],[-76.6,39.3]]]}},
            {"type": "Feature", "properties": {"GEOID": 10030102003},
             "geometry": {"type": "MultiPolygon", "coordinates": [[[[-87.0,30.0],[-86.9,30.0],[-86.9,30.1],[-87.0,30.0]]]]}},
            {"type": "Feature", "properties": {"GEOID": null},
             "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]]}},
            {"type": "Feature", "properties": {"GEOID": "240010001002"},
             "geometry": {"type": "Point", "coordinates": [-76.6,39.3]}}
        ]
    }"#;

    #[test]
    fn reads_string_and_numeric_keys() {
        let shapes = read_geojson(GEOJSON.as_bytes(), "GEOID").unwrap();
        assert_eq!(shapes.len(), 2);
        assert_eq!(shapes[0].geo_id.as_str(), "240010001001");
        assert_eq!(shapes[1].geo_id.as_str(), "010030102003");
        assert_eq!(shapes[0].geometry.0[0].exterior().0.len(), 5);
    }

    #[test]
    fn rejects_malformed_positions() {
        let bad = r#"{"features": [{"properties": {"GEOID": "240010001001"},
            "geometry": {"type": "Polygon", "coordinates": [[["a", 1]]]}}]}"#;
        assert!(read_geojson(bad.as_bytes(), "GEOID").is_err());
    }

    #[test]
    fn shapefile_rings_group_holes_under_exteriors() {
        let pts = |c: &[(f64, f64)]| c.iter().map(|&(x, y)| shapefile::Point { x, y }).collect::<Vec<_>>();
        let polygon = shapefile::Polygon::with_rings(vec![
            PolygonRing::Outer(pts(&[(0.0, 0.0), (0.0, 4.0), (4.0, 4.0), (4.0, 0.0), (0.0, 0.0)])),
            PolygonRing::Inner(pts(&[(1.0, 1.0), (2.0, 1.0), (2.0, 2.0), (1.0, 2.0), (1.0, 1.0)])),
            PolygonRing::Outer(pts(&[(5.0, 5.0), (5.0, 6.0), (6.0, 6.0), (6.0, 5.0), (5.0, 5.0)])),
        ]);

        let mp = shp_to_geo(&polygon);
        assert_eq!(mp.0.len(), 2);
        assert_eq!(mp.0[0].interiors().len(), 1);
        assert!(mp.0[1].interiors().is_empty());
    }

    #[test]
    fn zip_without_shapefile_fails() {
        use std::io::{Cursor, Write};
        use zip::{ZipWriter, write::SimpleFileOptions};

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file("readme.txt", SimpleFileOptions::default()).unwrap();
        writer.write_all(b"no shapes here").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        assert!(read_tiger_zip(&bytes, "GEOID").is_err());
    }
}
