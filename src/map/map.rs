use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{error::ComposeError, map::{Layer, LayerKind}};

/// Initial viewport and display parameters of the rendered map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapView {
    /// [lat, lon]
    pub center: [f64; 2],
    pub zoom: u8,
    /// Basemap tile set name.
    pub tiles: String,
    pub width: u32,
    pub height: u32,
}

impl Default for MapView {
    fn default() -> Self {
        Self { center: [39.3, -76.6], zoom: 10, tiles: "cartodbpositron".into(), width: 1300, height: 700 }
    }
}

/// State of one entry in the layer control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerControl {
    pub name: String,
    pub visible: bool,
}

/// The composed map: a viewport plus an ordered stack of independently toggleable layers.
#[derive(Debug, Clone)]
pub struct Map {
    view: MapView,
    layers: Vec<Layer>,
}

impl Map {
    /// Stack the layers onto one map. Polygon layers are moved underneath the others;
    /// relative order is otherwise preserved. Fails if names collide or nothing has features.
    pub fn compose(view: MapView, layers: impl IntoIterator<Item = Layer>) -> Result<Self, ComposeError> {
        let mut layers = layers.into_iter().collect::<Vec<_>>();

        let mut names = HashSet::with_capacity(layers.len());
        for layer in &layers {
            if !names.insert(layer.name.as_str()) {
                return Err(ComposeError::DuplicateLayer(layer.name.clone()))
            }
        }

        if layers.iter().all(Layer::is_empty) {
            return Err(ComposeError::NothingToCompose)
        }

        layers.sort_by_key(|layer| layer.kind.stacking());

        log::info!(
            "[map] composed {} layers ({} features)",
            layers.len(),
            layers.iter().map(Layer::len).sum::<usize>(),
        );

        Ok(Self { view, layers })
    }

    #[inline] pub fn view(&self) -> &MapView { &self.view }

    #[inline] pub fn layers(&self) -> &[Layer] { &self.layers }

    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.name == name)
    }

    /// Set one layer's visibility flag. Returns false if no layer has that name.
    pub fn set_visible(&mut self, name: &str, visible: bool) -> bool {
        match self.layers.iter_mut().find(|layer| layer.name == name) {
            Some(layer) => {
                layer.visible = visible;
                true
            }
            None => false,
        }
    }

    /// Layer control entries in stacking order.
    pub fn controls(&self) -> Vec<LayerControl> {
        self.layers.iter()
            .map(|layer| LayerControl { name: layer.name.clone(), visible: layer.visible })
            .collect()
    }

    pub(crate) fn has_kind(&self, kind: LayerKind) -> bool {
        self.layers.iter().any(|layer| layer.kind == kind)
    }
}
