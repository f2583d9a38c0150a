use std::{collections::HashMap, fs, io::Cursor, path::Path};

use anyhow::Result;
use zip::ZipArchive;

use crate::{common, error::DatasetError, io::csv};

pub const SHAPES: &str = "shapes.txt";
pub const TRIPS: &str = "trips.txt";
pub const ROUTES: &str = "routes.txt";
pub const STOPS: &str = "stops.txt";

/// One vertex of a path geometry, in file order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapePoint {
    pub sequence: i64,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trip {
    pub trip_id: Option<String>,
    pub route_id: Option<String>,
    pub shape_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stop {
    pub stop_id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

/// The four GTFS tables a mode needs, parsed into typed rows.
#[derive(Debug, Clone, Default)]
pub struct GtfsFeed {
    /// shape_id → points in file order (not yet sorted by sequence).
    pub shapes: HashMap<String, Vec<ShapePoint>>,
    /// Trips in file order.
    pub trips: Vec<Trip>,
    /// route_id → display name.
    pub routes: HashMap<String, String>,
    pub stops: Vec<Stop>,
}

impl GtfsFeed {
    /// Read a feed from an in-memory GTFS zip. Tables may sit at the archive root or in one sub-folder.
    pub fn from_zip_bytes(dataset: &str, bytes: &[u8]) -> Result<Self, DatasetError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| DatasetError::Malformed { dataset: dataset.to_string(), message: format!("not a zip archive: {e}") })?;

        Self::from_tables(dataset, |name| common::read_zip_entry(&mut archive, name))
    }

    /// Read a feed from an extracted directory.
    pub fn from_dir(dataset: &str, dir: &Path) -> Result<Self, DatasetError> {
        Self::from_tables(dataset, |name| {
            let path = dir.join(name);
            if !path.is_file() { return Ok(None) }
            Ok(Some(fs::read(&path)?))
        })
    }

    fn from_tables(dataset: &str, mut read: impl FnMut(&str) -> Result<Option<Vec<u8>>>) -> Result<Self, DatasetError> {
        let mut table = |name: &str| -> Result<Vec<u8>, DatasetError> {
            match read(name) {
                Ok(Some(bytes)) => Ok(bytes),
                Ok(None) => Err(DatasetError::MissingTable { dataset: dataset.to_string(), table: name.to_string() }),
                Err(e) => Err(DatasetError::malformed(dataset, &e.context(format!("reading {name}")))),
            }
        };

        let shapes = table(SHAPES)?;
        let trips = table(TRIPS)?;
        let routes = table(ROUTES)?;
        let stops = table(STOPS)?;

        let malformed = |e: anyhow::Error| DatasetError::malformed(dataset, &e);
        let feed = Self {
            shapes: parse_shapes(&shapes).map_err(malformed)?,
            trips: parse_trips(&trips).map_err(malformed)?,
            routes: parse_routes(&routes).map_err(malformed)?,
            stops: parse_stops(&stops).map_err(malformed)?,
        };

        log::debug!(
            "[gtfs] {dataset}: {} shapes, {} trips, {} routes, {} stops",
            feed.shapes.len(), feed.trips.len(), feed.routes.len(), feed.stops.len(),
        );

        Ok(feed)
    }
}

/// Parse `shapes.txt`. Rows with a missing id or unparseable sequence/coordinates are dropped.
fn parse_shapes(bytes: &[u8]) -> Result<HashMap<String, Vec<ShapePoint>>> {
    let df = csv::read_csv_bytes(bytes)?;
    let ids = csv::str_column(&df, "shape_id")?;
    let sequences = csv::str_column(&df, "shape_pt_sequence")?;
    let lats = csv::str_column(&df, "shape_pt_lat")?;
    let lons = csv::str_column(&df, "shape_pt_lon")?;

    let mut shapes: HashMap<String, Vec<ShapePoint>> = HashMap::new();
    let mut dropped = 0usize;
    for (((id, sequence), lat), lon) in ids.into_iter().zip(sequences).zip(lats).zip(lons) {
        match (csv::non_empty(id), shape_point(sequence, lat, lon)) {
            (Some(id), Some(point)) => shapes.entry(id.to_string()).or_default().push(point),
            _ => dropped += 1,
        }
    }

    if dropped > 0 {
        log::debug!("[gtfs] dropped {dropped} unusable {SHAPES} rows");
    }

    Ok(shapes)
}

fn shape_point(sequence: Option<&str>, lat: Option<&str>, lon: Option<&str>) -> Option<ShapePoint> {
    Some(ShapePoint { sequence: csv::parse_i64(sequence)?, lat: csv::parse_f64(lat)?, lon: csv::parse_f64(lon)? })
}

fn parse_trips(bytes: &[u8]) -> Result<Vec<Trip>> {
    let df = csv::read_csv_bytes(bytes)?;
    let routes = csv::str_column(&df, "route_id")?;
    let shapes = csv::str_column(&df, "shape_id")?;
    let owned = |cell: Option<&str>| csv::non_empty(cell).map(str::to_string);

    let trips = match csv::opt_str_column(&df, "trip_id") {
        Some(ids) => ids.into_iter().zip(routes).zip(shapes)
            .map(|((id, route), shape)| Trip { trip_id: owned(id), route_id: owned(route), shape_id: owned(shape) })
            .collect(),
        None => routes.into_iter().zip(shapes)
            .map(|(route, shape)| Trip { trip_id: None, route_id: owned(route), shape_id: owned(shape) })
            .collect(),
    };

    Ok(trips)
}

/// Parse `routes.txt` into route_id → display name.
/// The short name is preferred, then the long name, then the id itself.
fn parse_routes(bytes: &[u8]) -> Result<HashMap<String, String>> {
    let df = csv::read_csv_bytes(bytes)?;
    let ids = csv::str_column(&df, "route_id")?;
    let short = csv::opt_str_column(&df, "route_short_name");
    let long = csv::opt_str_column(&df, "route_long_name");

    let mut routes = HashMap::with_capacity(ids.len());
    for (idx, id) in ids.into_iter().enumerate() {
        let Some(id) = csv::non_empty(id) else { continue };
        let name = short.and_then(|col| csv::non_empty(col.get(idx)))
            .or_else(|| long.and_then(|col| csv::non_empty(col.get(idx))))
            .unwrap_or(id);
        routes.entry(id.to_string()).or_insert_with(|| name.to_string());
    }

    Ok(routes)
}

/// Parse `stops.txt`. Stops without coordinates (e.g. generic station nodes) are dropped.
fn parse_stops(bytes: &[u8]) -> Result<Vec<Stop>> {
    let df = csv::read_csv_bytes(bytes)?;
    let ids = csv::str_column(&df, "stop_id")?;
    let lats = csv::str_column(&df, "stop_lat")?;
    let lons = csv::str_column(&df, "stop_lon")?;
    let names = csv::opt_str_column(&df, "stop_name");

    let stops = ids.into_iter().zip(lats).zip(lons).enumerate()
        .filter_map(|(idx, ((id, lat), lon))| {
            let stop_id = csv::non_empty(id)?.to_string();
            let name = names.and_then(|col| csv::non_empty(col.get(idx))).unwrap_or(stop_id.as_str()).to_string();
            Some(Stop { name, lat: csv::parse_f64(lat)?, lon: csv::parse_f64(lon)?, stop_id })
        })
        .collect();

    Ok(stops)
}
