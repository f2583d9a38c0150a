#![doc = "Transit routes over a census population-density choropleth"]
mod cache;
mod census;
mod choropleth;
mod common;
mod config;
mod density;
mod error;
mod fetch;
mod geom;
mod gtfs;
mod io;
mod map;
mod pipeline;
mod sources;
mod transit;

pub mod cli;
pub mod commands;

#[doc(inline)]
pub use cache::{ArtifactStore, DatasetCache, DatasetKey, DiskStore, ManifestEntry, MemStore};

#[doc(inline)]
pub use census::{BlockGroupShape, GeoId, GeoKey, GeoLevel, PopulationTable, read_geojson, read_tiger_shapefile, read_tiger_zip};

#[doc(inline)]
pub use choropleth::{CHOROPLETH_LAYER, Classifier, DEFAULT_BINS, DensityBin, LEGEND_TITLE, Rgb, YL_OR_RD, ramp_color, rounded_max};

#[doc(inline)]
pub use config::{AppConfig, CacheConfig, CensusConfig, DensityConfig, TigerConfig, TransitConfig};

#[doc(inline)]
pub use density::{DEFAULT_CLIP_MAX, DensityCalculator, DensityResult, DensityStats, GeoUnit, MIN_AREA_KM2};

#[doc(inline)]
pub use error::{ComposeError, DatasetError, DatasetOutcome, FetchError, PipelineError};

#[doc(inline)]
pub use fetch::{Fetcher, MemFetcher, OfflineFetcher};

#[cfg(feature = "download")]
#[doc(inline)]
pub use fetch::HttpFetcher;

#[doc(inline)]
pub use geom::EqualAreaProjection;

#[doc(inline)]
pub use gtfs::{GtfsFeed, ShapePoint, Stop, TransitMode, Trip};

#[doc(inline)]
pub use map::{Feature, Layer, LayerControl, LayerKind, Legend, LegendEntry, Map, MapView, Style};

#[doc(inline)]
pub use pipeline::{CancelToken, PipelineInputs, PipelineReport, RenderOptions, RenderResult, Warning, run as run_pipeline};

#[doc(inline)]
pub use sources::{DatasetLoader, block_group_key, feed_key, population_key};

#[doc(inline)]
pub use transit::{ModeLayers, ModeStats, TransitPath, TransitStop, build_mode_layers, transit_paths, transit_stops};
