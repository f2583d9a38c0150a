use geo::{Coord, Geometry, LineString, Polygon};
use serde_json::{Value, json};

use crate::map::{Feature, Layer, Map};

fn position(coord: &Coord<f64>) -> Value { json!([coord.x, coord.y]) }

fn line_coords(line: &LineString<f64>) -> Value {
    Value::Array(line.0.iter().map(position).collect())
}

fn polygon_coords(polygon: &Polygon<f64>) -> Value {
    Value::Array(
        std::iter::once(polygon.exterior())
            .chain(polygon.interiors())
            .map(line_coords)
            .collect(),
    )
}

/// GeoJSON geometry object for the geometry types layers carry; others become null.
fn geometry_to_json(geometry: &Geometry<f64>) -> Value {
    match geometry {
        Geometry::Point(point) => json!({ "type": "Point", "coordinates": position(&point.0) }),
        Geometry::LineString(line) => json!({ "type": "LineString", "coordinates": line_coords(line) }),
        Geometry::MultiLineString(lines) => json!({
            "type": "MultiLineString",
            "coordinates": lines.0.iter().map(line_coords).collect::<Vec<_>>(),
        }),
        Geometry::Polygon(polygon) => json!({ "type": "Polygon", "coordinates": polygon_coords(polygon) }),
        Geometry::MultiPolygon(polygons) => json!({
            "type": "MultiPolygon",
            "coordinates": polygons.0.iter().map(polygon_coords).collect::<Vec<_>>(),
        }),
        _ => Value::Null,
    }
}

fn feature_to_json(feature: &Feature) -> Value {
    let mut properties = feature.properties.clone();
    if let Some(label) = &feature.label {
        properties.insert("label".into(), json!(label));
    }
    if let Some(fill) = feature.fill {
        properties.insert("fill".into(), json!(fill));
    }

    json!({
        "type": "Feature",
        "geometry": geometry_to_json(&feature.geometry),
        "properties": properties,
    })
}

impl Layer {
    /// Export the layer's features as a GeoJSON FeatureCollection.
    pub fn to_feature_collection(&self) -> Value {
        json!({
            "type": "FeatureCollection",
            "features": self.features.iter().map(feature_to_json).collect::<Vec<_>>(),
        })
    }

    fn to_json(&self) -> Value {
        let mut layer = json!({
            "name": self.name,
            "kind": self.kind,
            "visible": self.visible,
            "style": self.style,
            "features": self.to_feature_collection(),
        });
        if let Some(legend) = &self.legend {
            layer["legend"] = json!(legend);
        }
        layer
    }
}

impl Map {
    /// Layered map document: viewport plus each layer with its style, visibility, legend and features.
    pub fn to_geojson(&self) -> Value {
        let view = self.view();
        json!({
            "center": view.center,
            "zoom": view.zoom,
            "tiles": view.tiles,
            "layers": self.layers().iter().map(Layer::to_json).collect::<Vec<_>>(),
        })
    }
}
