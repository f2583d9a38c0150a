use crate::map::Map;

const LEAFLET_CSS: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.css";
const LEAFLET_JS: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.js";

/// Tile URL template and attribution for a basemap name.
fn tile_source(name: &str) -> (&'static str, &'static str) {
    match name.to_ascii_lowercase().as_str() {
        "cartodbpositron" | "cartodb positron" => (
            "https://{s}.basemaps.cartocdn.com/light_all/{z}/{x}/{y}{r}.png",
            "&copy; OpenStreetMap contributors &copy; CARTO",
        ),
        "cartodbdark_matter" | "cartodb dark_matter" => (
            "https://{s}.basemaps.cartocdn.com/dark_all/{z}/{x}/{y}{r}.png",
            "&copy; OpenStreetMap contributors &copy; CARTO",
        ),
        _ => (
            "https://tile.openstreetmap.org/{z}/{x}/{y}.png",
            "&copy; OpenStreetMap contributors",
        ),
    }
}

/// Viewer script: one overlay per layer, added to the map when visible, in an expanded layer control.
const SCRIPT: &str = r#"
const map = L.map('map').setView(doc.center, doc.zoom);
L.tileLayer(tiles.url, { attribution: tiles.attribution, maxZoom: 19 }).addTo(map);

const overlays = {};
for (const layer of doc.layers) {
  const s = layer.style;
  const overlay = L.geoJSON(layer.features, {
    style: (f) => layer.kind === 'polygons'
      ? { color: s.color, weight: s.weight, opacity: s.opacity, fillColor: f.properties.fill, fillOpacity: s.fill_opacity }
      : { color: s.color, weight: s.weight, opacity: s.opacity },
    pointToLayer: (f, latlng) => L.circleMarker(latlng, {
      radius: s.radius, color: s.color, fill: true, fillColor: s.color, fillOpacity: s.fill_opacity,
    }),
    onEachFeature: (f, l) => {
      const label = f.properties.label;
      if (!label) return;
      if (layer.kind === 'points') l.bindPopup(label); else l.bindTooltip(label);
    },
  });
  if (layer.visible) overlay.addTo(map);
  overlays[layer.name] = overlay;

  if (layer.legend) {
    const legend = L.control({ position: 'bottomright' });
    legend.onAdd = () => {
      const div = L.DomUtil.create('div', 'legend');
      const title = document.createElement('b');
      title.textContent = layer.legend.title;
      div.appendChild(title);
      for (const entry of layer.legend.entries) {
        const row = document.createElement('div');
        const swatch = document.createElement('i');
        swatch.style.background = entry.color;
        row.appendChild(swatch);
        row.appendChild(document.createTextNode(entry.label));
        div.appendChild(row);
      }
      return div;
    };
    legend.addTo(map);
  }
}
L.control.layers(null, overlays, { collapsed: false }).addTo(map);
"#;

/// Embed JSON in a <script> element without letting it close the element early.
fn script_safe_json(value: &serde_json::Value) -> String {
    value.to_string().replace("</", "<\\/")
}

impl Map {
    /// Standalone Leaflet page with the layered document embedded.
    pub fn to_html(&self) -> String {
        let view = self.view();
        let (tile_url, attribution) = tile_source(&view.tiles);
        let tiles = serde_json::json!({ "url": tile_url, "attribution": attribution });

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8"/>
<title>Transit &amp; Population Density</title>
<link rel="stylesheet" href="{LEAFLET_CSS}"/>
<script src="{LEAFLET_JS}"></script>
<style>
  #map {{ width: {width}px; height: {height}px; }}
  .legend {{ background: rgba(255,255,255,0.85); padding: 6px 8px; font: 11px sans-serif; line-height: 16px; }}
  .legend i {{ display: inline-block; width: 14px; height: 12px; margin-right: 6px; }}
</style>
</head>
<body>
<div id="map"></div>
<script>
const doc = {doc};
const tiles = {tiles};
{SCRIPT}
</script>
</body>
</html>
"#,
            width = view.width,
            height = view.height,
            doc = script_safe_json(&self.to_geojson()),
            tiles = script_safe_json(&tiles),
        )
    }
}
