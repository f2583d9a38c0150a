//! One render cycle: join → density → classify → transit layers → compose.

use std::sync::{Arc, atomic::{AtomicBool, Ordering}};

use rayon::prelude::*;
use serde::Serialize;

use crate::{
    census::{BlockGroupShape, PopulationTable},
    choropleth::Classifier,
    config::AppConfig,
    density::{DensityCalculator, DensityStats},
    error::{DatasetError, DatasetOutcome, PipelineError},
    geom::EqualAreaProjection,
    gtfs::{GtfsFeed, TransitMode},
    map::{Layer, Map, MapView},
    transit::{ModeStats, build_mode_layers},
};

/// Shared flag checked between stages and per mode. Cancelling discards every built layer.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self { Self::default() }

    pub fn cancel(&self) { self.0.store(true, Ordering::SeqCst) }

    pub fn is_cancelled(&self) -> bool { self.0.load(Ordering::SeqCst) }

    fn check(&self) -> Result<(), PipelineError> {
        if self.is_cancelled() { Err(PipelineError::Cancelled) } else { Ok(()) }
    }
}

/// Display switches and numeric parameters of a render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub show_stops: bool,
    pub show_population: bool,
    pub clip_max: f64,
    pub bins: usize,
    /// Geographic CRS of the block-group polygons.
    pub source_epsg: u32,
    pub view: MapView,
}

impl RenderOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            show_stops: true,
            show_population: true,
            clip_max: config.density.clip_max,
            bins: config.density.bins,
            source_epsg: config.tiger.source_epsg,
            view: config.map.clone(),
        }
    }
}

impl Default for RenderOptions {
    fn default() -> Self { Self::from_config(&AppConfig::default()) }
}

/// Loaded datasets for one render. Population inputs are None when that layer is switched off.
#[derive(Debug)]
pub struct PipelineInputs {
    pub population: Option<DatasetOutcome<PopulationTable>>,
    pub block_groups: Option<DatasetOutcome<Vec<BlockGroupShape>>>,
    /// Selected modes in declaration order, each with its feed.
    pub feeds: Vec<(TransitMode, DatasetOutcome<GtfsFeed>)>,
}

/// A dataset- or mode-local failure that did not stop the render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub dataset: String,
    pub message: String,
}

impl From<&DatasetError> for Warning {
    fn from(err: &DatasetError) -> Self {
        Self { dataset: err.dataset().to_string(), message: err.to_string() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineReport {
    pub warnings: Vec<Warning>,
    /// Exclusion counts of the density layer, when it was built.
    pub density: Option<DensityStats>,
    /// Rounded maximum of the color scale, when the density layer was built.
    pub scale_max: Option<f64>,
    /// Path counts per rendered mode, in declaration order.
    pub modes: Vec<ModeStats>,
}

impl PipelineReport {
    fn warn(&mut self, dataset: &str, message: String) {
        log::warn!("[pipeline] {dataset}: {message}");
        self.warnings.push(Warning { dataset: dataset.to_string(), message });
    }

    fn record(&mut self, failures: Vec<DatasetError>) {
        for err in failures {
            log::warn!("[pipeline] {err}");
            self.warnings.push(Warning::from(&err));
        }
    }
}

#[derive(Debug)]
pub struct RenderResult {
    pub map: Map,
    pub report: PipelineReport,
}

/// Build the density layer, or None (with warnings) if its inputs are unusable.
fn population_layer(
    population: DatasetOutcome<PopulationTable>,
    block_groups: DatasetOutcome<Vec<BlockGroupShape>>,
    options: &RenderOptions,
    report: &mut PipelineReport,
) -> Option<Layer> {
    let (population, failures) = population.into_parts();
    report.record(failures);
    let (shapes, failures) = block_groups.into_parts();
    report.record(failures);

    let (population, shapes) = match (population, shapes) {
        (Some(population), Some(shapes)) => (population, shapes),
        _ => {
            report.warn("population density", "layer omitted: inputs unavailable".into());
            return None
        }
    };

    let projection = match EqualAreaProjection::conus(options.source_epsg) {
        Ok(projection) => projection,
        Err(e) => {
            report.warn("population density", format!("layer omitted: {e:#}"));
            return None
        }
    };

    let result = DensityCalculator::new(projection, options.clip_max).compute(shapes, &population);

    let classifier = Classifier::for_result(&result, options.bins);
    report.density = Some(result.stats);
    report.scale_max = Some(classifier.upper());

    Some(classifier.layer(&result))
}

/// Run one render cycle. Dataset and mode failures become warnings; the run fails only
/// when cancelled or when nothing at all can be drawn.
pub fn run(inputs: PipelineInputs, options: &RenderOptions, cancel: &CancelToken) -> Result<RenderResult, PipelineError> {
    run_with(inputs, options, cancel, |_| {})
}

/// `run` with a callback invoked as each mode task starts.
fn run_with(
    inputs: PipelineInputs,
    options: &RenderOptions,
    cancel: &CancelToken,
    on_mode: impl Fn(&TransitMode) + Sync,
) -> Result<RenderResult, PipelineError> {
    let PipelineInputs { population, block_groups, feeds } = inputs;
    let mut report = PipelineReport::default();
    let mut layers = Vec::new();

    cancel.check()?;
    if options.show_population {
        if let (Some(population), Some(block_groups)) = (population, block_groups) {
            layers.extend(population_layer(population, block_groups, options, &mut report));
        } else {
            report.warn("population density", "layer omitted: inputs not loaded".into());
        }
    }

    cancel.check()?;
    let built = feeds.into_par_iter()
        .map(|(mode, feed)| {
            on_mode(&mode);
            if cancel.is_cancelled() { return None }
            Some(match feed.into_parts() {
                (Some(feed), failures) => (Some(build_mode_layers(&mode, &feed, options.show_stops)), failures),
                (None, failures) => (None, failures),
            })
        })
        .collect::<Vec<_>>();

    cancel.check()?;
    for (mode_layers, failures) in built.into_iter().flatten() {
        report.record(failures);
        if let Some(mode_layers) = mode_layers {
            report.modes.push(mode_layers.stats.clone());
            layers.extend(mode_layers.into_layers());
        }
    }

    let map = Map::compose(options.view.clone(), layers)?;
    Ok(RenderResult { map, report })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use geo::{MultiPolygon, polygon};

    use super::*;
    use crate::{
        census::{GeoId, GeoKey},
        error::ComposeError,
        gtfs::{ShapePoint, Stop, Trip},
    };

    fn id(text: &str) -> GeoId { GeoId::from_key(GeoKey::Text(text)).unwrap() }

    fn feed() -> GtfsFeed {
        let pt = |sequence, lat, lon| ShapePoint { sequence, lat, lon };
        GtfsFeed {
            shapes: HashMap::from([("S".to_string(), vec![pt(1, 39.3, -76.6), pt(2, 39.4, -76.5)])]),
            trips: vec![Trip { trip_id: None, route_id: Some("R".into()), shape_id: Some("S".into()) }],
            routes: HashMap::from([("R".to_string(), "1".to_string())]),
            stops: vec![Stop { stop_id: "1".into(), name: "Stop".into(), lat: 39.3, lon: -76.6 }],
        }
    }

    fn mode(name: &str) -> TransitMode { TransitMode::new(name, &format!("https://example.invalid/{name}"), "blue") }

    fn population_inputs() -> (DatasetOutcome<PopulationTable>, DatasetOutcome<Vec<BlockGroupShape>>) {
        let shape = BlockGroupShape {
            geo_id: id("240010001001"),
            geometry: MultiPolygon(vec![polygon![
                (x: -76.6, y: 39.3), (x: -76.59, y: 39.3), (x: -76.59, y: 39.31), (x: -76.6, y: 39.31), (x: -76.6, y: 39.3),
            ]]),
        };
        (
            DatasetOutcome::Loaded(PopulationTable::from_records([(id("240010001001"), Some(500))])),
            DatasetOutcome::Loaded(vec![shape]),
        )
    }

    fn missing(mode: &str) -> DatasetOutcome<GtfsFeed> {
        DatasetOutcome::Failed(DatasetError::MissingTable { dataset: mode.into(), table: "shapes.txt".into() })
    }

    #[test]
    fn failed_mode_is_reported_and_others_render() {
        let (population, block_groups) = population_inputs();
        let inputs = PipelineInputs {
            population: Some(population),
            block_groups: Some(block_groups),
            feeds: vec![
                (mode("Local Bus"), DatasetOutcome::Loaded(feed())),
                (mode("Light Rail"), missing("Light Rail")),
                (mode("MARC Train"), DatasetOutcome::Loaded(feed())),
            ],
        };

        let result = run(inputs, &RenderOptions::default(), &CancelToken::new()).unwrap();
        let names = result.map.layers().iter().map(|l| l.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["Population Density", "Local Bus Routes", "MARC Train Routes", "Local Bus Stops", "MARC Train Stops"]);

        assert_eq!(result.report.warnings.len(), 1);
        assert_eq!(result.report.warnings[0].dataset, "Light Rail");
        assert_eq!(result.report.modes.len(), 2);
        assert_eq!(result.report.density.unwrap().retained, 1);
    }

    #[test]
    fn population_layer_can_be_switched_off() {
        let inputs = PipelineInputs { population: None, block_groups: None, feeds: vec![(mode("Metro Subway"), DatasetOutcome::Loaded(feed()))] };
        let options = RenderOptions { show_population: false, show_stops: false, ..RenderOptions::default() };

        let result = run(inputs, &options, &CancelToken::new()).unwrap();
        assert_eq!(result.map.layers().len(), 1);
        assert!(result.report.warnings.is_empty());
        assert!(result.report.density.is_none());
    }

    #[test]
    fn nothing_usable_is_fatal() {
        let inputs = PipelineInputs { population: None, block_groups: None, feeds: vec![(mode("Local Bus"), missing("Local Bus"))] };
        let options = RenderOptions { show_population: false, ..RenderOptions::default() };

        let err = run(inputs, &options, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, PipelineError::Compose(ComposeError::NothingToCompose)));
    }

    #[test]
    fn cancelled_run_returns_no_layers() {
        let (population, block_groups) = population_inputs();
        let inputs = PipelineInputs {
            population: Some(population),
            block_groups: Some(block_groups),
            feeds: vec![(mode("Local Bus"), DatasetOutcome::Loaded(feed()))],
        };
        let cancel = CancelToken::new();
        cancel.cancel();

        assert!(matches!(run(inputs, &RenderOptions::default(), &cancel), Err(PipelineError::Cancelled)));
    }

    #[test]
    fn cancelling_during_mode_builds_discards_the_run() {
        let (population, block_groups) = population_inputs();
        let inputs = PipelineInputs {
            population: Some(population),
            block_groups: Some(block_groups),
            feeds: vec![(mode("Local Bus"), DatasetOutcome::Loaded(feed())), (mode("Light Rail"), DatasetOutcome::Loaded(feed()))],
        };
        let cancel = CancelToken::new();
        let started = std::sync::atomic::AtomicUsize::new(0);

        let result = run_with(inputs, &RenderOptions::default(), &cancel, |_| {
            started.fetch_add(1, Ordering::SeqCst);
            cancel.cancel();
        });
        assert!(matches!(result, Err(PipelineError::Cancelled)));
        assert!(started.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn mode_order_is_deterministic() {
        let names = (0..16).map(|i| format!("Mode {i:02}")).collect::<Vec<_>>();
        let inputs = PipelineInputs {
            population: None,
            block_groups: None,
            feeds: names.iter().map(|name| (mode(name), DatasetOutcome::Loaded(feed()))).collect(),
        };
        let options = RenderOptions { show_population: false, show_stops: false, ..RenderOptions::default() };

        let result = run(inputs, &options, &CancelToken::new()).unwrap();
        let rendered = result.report.modes.iter().map(|m| m.mode.clone()).collect::<Vec<_>>();
        assert_eq!(rendered, names);
    }
}
