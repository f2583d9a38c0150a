//! Transit layers: one deduplicated line per path and one marker per stop, per mode.

use std::collections::HashSet;

use geo::{Coord, LineString, Point};
use serde::Serialize;

use crate::{
    gtfs::{GtfsFeed, TransitMode},
    map::{Feature, Layer, LayerKind, Style},
};

/// One vehicle path, drawn once per mode however many trips run on it.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitPath {
    pub path_id: String,
    /// Vertices ordered by sequence, as lon/lat.
    pub line: LineString<f64>,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransitStop {
    /// lon/lat
    pub location: Point<f64>,
    pub name: String,
    pub mode: String,
}

/// Path and stop counts for one mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModeStats {
    pub mode: String,
    /// Distinct path ids referenced by the mode's trips.
    pub referenced_paths: usize,
    pub rendered_paths: usize,
    /// Referenced paths with fewer than two usable points.
    pub missing_geometry: usize,
    pub stops: usize,
}

/// Layers built for one mode. The stop layer is omitted when stops are hidden.
#[derive(Debug, Clone)]
pub struct ModeLayers {
    pub routes: Layer,
    pub stops: Option<Layer>,
    pub stats: ModeStats,
}

impl ModeLayers {
    /// Route layer first, then the stop layer (if any).
    pub fn into_layers(self) -> impl Iterator<Item = Layer> {
        std::iter::once(self.routes).chain(self.stops)
    }
}

/// Deduplicated, sequence-ordered paths for a mode, in first-referencing-trip order.
/// When several trips (or routes) share a path, the first trip's route name labels it.
/// Returns the paths and the number of referenced paths with missing geometry.
pub fn transit_paths(mode: &TransitMode, feed: &GtfsFeed) -> (Vec<TransitPath>, usize) {
    let mut seen = HashSet::new();
    let mut paths = Vec::new();
    let mut missing = 0usize;

    for trip in &feed.trips {
        let Some(path_id) = trip.shape_id.as_deref() else { continue };
        if !seen.insert(path_id) { continue }

        let mut points = feed.shapes.get(path_id).cloned().unwrap_or_default();
        if points.len() < 2 {
            log::debug!("[transit] {}: path {path_id} has {} points; skipped", mode.name, points.len());
            missing += 1;
            continue
        }
        points.sort_by_key(|point| point.sequence);

        let route_name = trip.route_id.as_deref()
            .map(|route_id| feed.routes.get(route_id).map_or(route_id, String::as_str))
            .unwrap_or("?");

        paths.push(TransitPath {
            path_id: path_id.to_string(),
            line: points.iter().map(|p| Coord { x: p.lon, y: p.lat }).collect(),
            label: format!("{} Route {route_name}", mode.name),
        });
    }

    (paths, missing)
}

pub fn transit_stops(mode: &TransitMode, feed: &GtfsFeed) -> Vec<TransitStop> {
    feed.stops.iter()
        .map(|stop| TransitStop {
            location: Point::new(stop.lon, stop.lat),
            name: stop.name.clone(),
            mode: mode.name.clone(),
        })
        .collect()
}

/// Build the `"<mode> Routes"` layer (visible) and, when `show_stops` is set, the `"<mode> Stops"` layer.
pub fn build_mode_layers(mode: &TransitMode, feed: &GtfsFeed, show_stops: bool) -> ModeLayers {
    let (paths, missing_geometry) = transit_paths(mode, feed);

    let mut routes = Layer::new(mode.routes_layer(), LayerKind::Lines, Style::route(&mode.color));
    for path in &paths {
        routes.push(
            Feature::new(path.line.clone())
                .with_label(path.label.clone())
                .with_property("path_id", path.path_id.as_str()),
        );
    }

    let stops = show_stops.then(|| {
        let mut layer = Layer::new(mode.stops_layer(), LayerKind::Points, Style::stop(&mode.color));
        for stop in transit_stops(mode, feed) {
            layer.push(
                Feature::new(stop.location)
                    .with_label(format!("{} Stop: {}", stop.mode, stop.name))
                    .with_property("name", stop.name),
            );
        }
        layer
    });

    let stats = ModeStats {
        mode: mode.name.clone(),
        referenced_paths: paths.len() + missing_geometry,
        rendered_paths: paths.len(),
        missing_geometry,
        stops: stops.as_ref().map_or(0, Layer::len),
    };

    log::info!(
        "[transit] {}: {} paths ({} without geometry), {} stops",
        mode.name, stats.rendered_paths, stats.missing_geometry, stats.stops,
    );

    ModeLayers { routes, stops, stats }
}
