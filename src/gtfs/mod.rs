//! GTFS feed tables and transit mode definitions.

mod feed;
mod mode;

pub use feed::{GtfsFeed, ROUTES, SHAPES, STOPS, ShapePoint, Stop, TRIPS, Trip};
pub use mode::TransitMode;
