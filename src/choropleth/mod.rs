//! Equal-width density classification and the choropleth color ramp.

mod classify;
mod color;

pub use classify::{CHOROPLETH_LAYER, Classifier, DEFAULT_BINS, DensityBin, LEGEND_TITLE, rounded_max};
pub use color::{Rgb, YL_OR_RD, ramp_color};
