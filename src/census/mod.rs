//! Census block-group identifiers, population tables and polygon sources.

mod blockgroup;
mod geo_id;
mod population;

pub use blockgroup::{BlockGroupShape, read_geojson, read_tiger_shapefile, read_tiger_zip};
pub use geo_id::{GeoId, GeoKey, GeoLevel};
pub use population::{PopulationTable, census_county_url};
