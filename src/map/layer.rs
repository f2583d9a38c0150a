use geo::Geometry;
use serde::Serialize;
use serde_json::{Map as JsonMap, Value};

use crate::choropleth::Rgb;

/// Geometry family drawn by a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Polygons,
    Lines,
    Points,
}

impl LayerKind {
    /// Draw order: polygons underneath, then lines, then points.
    #[inline]
    pub(crate) fn stacking(self) -> u8 {
        match self {
            LayerKind::Polygons => 0,
            LayerKind::Lines => 1,
            LayerKind::Points => 2,
        }
    }
}

/// Stroke and fill parameters shared by every feature of a layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Style {
    /// CSS stroke color; polygon fills come from each feature instead.
    pub color: String,
    pub weight: f64,
    pub opacity: f64,
    pub fill_opacity: f64,
    /// Marker radius in pixels (point layers only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
}

impl Style {
    /// Choropleth polygons: thin translucent outline, fill per feature.
    pub fn choropleth() -> Self {
        Self { color: "#000000".into(), weight: 1.0, opacity: 0.2, fill_opacity: 0.7, radius: None }
    }

    /// Route lines in the mode color.
    pub fn route(color: &str) -> Self {
        Self { color: color.into(), weight: 2.0, opacity: 0.7, fill_opacity: 0.0, radius: None }
    }

    /// Filled stop markers in the mode color.
    pub fn stop(color: &str) -> Self {
        Self { color: color.into(), weight: 1.0, opacity: 1.0, fill_opacity: 0.6, radius: Some(2.0) }
    }
}

/// One rendered feature: lon/lat geometry plus its display attributes.
#[derive(Debug, Clone)]
pub struct Feature {
    pub geometry: Geometry<f64>,
    /// Tooltip (lines) or popup (points) text.
    pub label: Option<String>,
    /// Per-feature fill (choropleth polygons).
    pub fill: Option<Rgb>,
    pub properties: JsonMap<String, Value>,
}

impl Feature {
    pub fn new(geometry: impl Into<Geometry<f64>>) -> Self {
        Self { geometry: geometry.into(), label: None, fill: None, properties: JsonMap::new() }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_fill(mut self, fill: Rgb) -> Self {
        self.fill = Some(fill);
        self
    }

    pub fn with_property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendEntry {
    pub label: String,
    pub color: Rgb,
}

/// Legend box for a classified layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Legend {
    pub title: String,
    pub entries: Vec<LegendEntry>,
}

/// A named, independently toggleable collection of features.
#[derive(Debug, Clone)]
pub struct Layer {
    pub name: String,
    pub kind: LayerKind,
    pub visible: bool,
    pub style: Style,
    pub features: Vec<Feature>,
    pub legend: Option<Legend>,
}

impl Layer {
    pub fn new(name: impl Into<String>, kind: LayerKind, style: Style) -> Self {
        Self { name: name.into(), kind, visible: true, style, features: Vec::new(), legend: None }
    }

    pub fn with_visibility(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn with_legend(mut self, legend: Legend) -> Self {
        self.legend = Some(legend);
        self
    }

    pub fn push(&mut self, feature: Feature) { self.features.push(feature) }

    #[inline] pub fn len(&self) -> usize { self.features.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.features.is_empty() }
}
