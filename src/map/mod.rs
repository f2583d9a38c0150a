//! Layer descriptions and the map composer with its render targets.

mod io;
mod layer;
mod map;

pub use layer::{Feature, Layer, LayerKind, Legend, LegendEntry, Style};
pub use map::{LayerControl, Map, MapView};
