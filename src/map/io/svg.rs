use std::io::Write;

use anyhow::{Context, Result, anyhow};
use geo::{BoundingRect, Coord, CoordsIter, Geometry, LineString, Rect};

use crate::map::{Feature, Layer, LayerKind, Legend, Map};

/// Padding around the drawing, in pixels.
const MARGIN: f64 = 10.0;

/// Smallest extent (degrees) of the drawn area, so a lone stop still gets a viewport.
const MIN_EXTENT: f64 = 1e-3;

/// Projection function: lon/lat -> SVG coords (x,y)
type Projection = dyn Fn(&Coord<f64>) -> (f64, f64);

/// SVG document writer over any byte sink.
struct SvgWriter<W: Write> {
    writer: W,
}

impl<W: Write> SvgWriter<W> {
    fn new(writer: W) -> Self { Self { writer } }

    /// Write the XML declaration, the opening <svg> tag and a white background.
    fn write_header(&mut self, width: f64, height: f64, bounds: &Rect<f64>) -> Result<()> {
        writeln!(self.writer, r##"<?xml version="1.0" encoding="UTF-8" standalone="no"?>"##)?;
        writeln!(self.writer, r##"<svg xmlns="http://www.w3.org/2000/svg"
    width="{width:.0}" height="{height:.0}"
    viewBox="0 0 {width:.0} {height:.0}"
    data-lon-min="{lon_min}" data-lon-max="{lon_max}"
    data-lat-min="{lat_min}" data-lat-max="{lat_max}">"##,
            lon_min = bounds.min().x,
            lon_max = bounds.max().x,
            lat_min = bounds.min().y,
            lat_max = bounds.max().y,
        )?;
        writeln!(self.writer, r##"<rect width="100%" height="100%" fill="#ffffff"/>"##)?;
        Ok(())
    }

    fn write_layer(&mut self, layer: &Layer, project: &Projection) -> Result<()> {
        let style = &layer.style;
        let hidden = if layer.visible { "" } else { r#" visibility="hidden""# };
        writeln!(
            self.writer,
            r#"<g id="{id}" data-name="{name}" stroke="{stroke}" stroke-width="{weight}" stroke-opacity="{opacity}" fill-opacity="{fill_opacity}"{hidden}>"#,
            id = layer_id(&layer.name),
            name = escape(&layer.name),
            stroke = escape(&style.color),
            weight = style.weight,
            opacity = style.opacity,
            fill_opacity = style.fill_opacity,
        )?;

        for feature in &layer.features {
            match layer.kind {
                LayerKind::Polygons => self.write_polygon(feature, project)?,
                LayerKind::Lines => self.write_line(feature, project)?,
                LayerKind::Points => self.write_point(feature, style.radius.unwrap_or(2.0), &style.color, project)?,
            }
        }

        writeln!(self.writer, "</g>")?;
        Ok(())
    }

    fn write_polygon(&mut self, feature: &Feature, project: &Projection) -> Result<()> {
        let Geometry::MultiPolygon(shape) = &feature.geometry else { return Ok(()) };
        let fill = feature.fill.map_or_else(|| "none".to_string(), |c| c.to_string());

        let mut d = String::new();
        for polygon in &shape.0 {
            d.push_str(&ring_to_path(polygon.exterior(), project));
            for interior in polygon.interiors() {
                d.push_str(&ring_to_path(interior, project));
            }
        }

        write!(self.writer, r#"<path d="{d}" fill="{fill}" fill-rule="evenodd">"#)?;
        self.write_title(feature)?;
        writeln!(self.writer, "</path>")?;
        Ok(())
    }

    fn write_line(&mut self, feature: &Feature, project: &Projection) -> Result<()> {
        let Geometry::LineString(line) = &feature.geometry else { return Ok(()) };

        write!(self.writer, r#"<polyline points="{}" fill="none">"#, line_to_points(line, project))?;
        self.write_title(feature)?;
        writeln!(self.writer, "</polyline>")?;
        Ok(())
    }

    fn write_point(&mut self, feature: &Feature, radius: f64, color: &str, project: &Projection) -> Result<()> {
        let Geometry::Point(point) = &feature.geometry else { return Ok(()) };
        let (cx, cy) = project(&point.0);

        write!(self.writer, r#"<circle cx="{cx:.3}" cy="{cy:.3}" r="{radius}" fill="{}">"#, escape(color))?;
        self.write_title(feature)?;
        writeln!(self.writer, "</circle>")?;
        Ok(())
    }

    fn write_title(&mut self, feature: &Feature) -> Result<()> {
        if let Some(label) = &feature.label {
            write!(self.writer, "<title>{}</title>", escape(label))?;
        }
        Ok(())
    }

    /// Legend box in the top-right corner: one swatch per bin.
    fn write_legend(&mut self, legend: &Legend, width: f64) -> Result<()> {
        const ROW: f64 = 16.0;
        const BOX_WIDTH: f64 = 210.0;
        let x = width - MARGIN - BOX_WIDTH;
        let height = ROW * (legend.entries.len() as f64 + 1.5);

        writeln!(self.writer, r##"<g class="legend" font-family="sans-serif" font-size="11">"##)?;
        writeln!(self.writer, r##"<rect x="{x}" y="{MARGIN}" width="{BOX_WIDTH}" height="{height}" fill="#ffffff" fill-opacity="0.85" stroke="#999999"/>"##)?;
        writeln!(self.writer, r##"<text x="{}" y="{}" font-weight="bold">{}</text>"##, x + 6.0, MARGIN + ROW, escape(&legend.title))?;
        for (i, entry) in legend.entries.iter().enumerate() {
            let y = MARGIN + ROW * (i as f64 + 1.3);
            writeln!(self.writer, r##"<rect x="{}" y="{y}" width="14" height="12" fill="{}"/>"##, x + 6.0, entry.color)?;
            writeln!(self.writer, r##"<text x="{}" y="{}">{}</text>"##, x + 26.0, y + 10.0, escape(&entry.label))?;
        }
        writeln!(self.writer, "</g>")?;
        Ok(())
    }

    fn write_footer(&mut self) -> Result<()> {
        writeln!(self.writer, "</svg>")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Build a compact SVG path string for a LineString (ring).
fn ring_to_path(ring: &LineString<f64>, project: &Projection) -> String {
    let mut out = String::new();

    let mut coords = ring.coords_iter().map(|coord| project(&coord));
    if let Some((x, y)) = coords.next() {
        out.push_str(&format!(" M{x:.3},{y:.3}"));
        for (x, y) in coords {
            out.push_str(&format!(" L{x:.3},{y:.3}"));
        }
        out.push('Z');
    }

    out
}

/// Build an SVG points string for a LineString.
fn line_to_points(line: &LineString<f64>, project: &Projection) -> String {
    line.coords_iter()
        .map(|coord| {
            let (x, y) = project(&coord);
            format!("{x:.3},{y:.3}")
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Escape text for use in XML content and attribute values.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// XML id for a layer: lowercase alphanumerics joined by dashes.
fn layer_id(name: &str) -> String {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// Bounding box of every feature on the map, widened to a minimum extent.
fn map_bounds(map: &Map) -> Option<Rect<f64>> {
    let rect = map.layers().iter()
        .flat_map(|layer| &layer.features)
        .filter_map(|feature| feature.geometry.bounding_rect())
        .reduce(|a, b| Rect::new(
            Coord { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
            Coord { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
        ))?;

    let pad_x = (MIN_EXTENT - rect.width()).max(0.0) / 2.0;
    let pad_y = (MIN_EXTENT - rect.height()).max(0.0) / 2.0;
    Some(Rect::new(
        Coord { x: rect.min().x - pad_x, y: rect.min().y - pad_y },
        Coord { x: rect.max().x + pad_x, y: rect.max().y + pad_y },
    ))
}

impl Map {
    /// Render the map as an SVG string.
    pub fn to_svg_string(&self) -> Result<String> {
        let mut buffer = Vec::new();
        self.render_svg(&mut buffer)?;
        String::from_utf8(buffer).context("[map::svg] SVG output is not valid UTF-8")
    }

    /// One <g> per layer in stacking order; hidden layers carry visibility="hidden".
    fn render_svg(&self, sink: impl Write) -> Result<()> {
        let bounds = map_bounds(self)
            .ok_or_else(|| anyhow!("[map::svg] Could not determine bounds; nothing to draw."))?;

        let width = self.view().width as f64;
        let scale = (width - 2.0 * MARGIN) / bounds.width();
        let height = bounds.height() * scale + 2.0 * MARGIN;

        // --- Map lon/lat -> SVG coords (preserve aspect, Y down) ---
        let project = move |coord: &Coord<f64>| -> (f64, f64) {
            let x = MARGIN + (coord.x - bounds.min().x) * scale;
            let y = MARGIN + (bounds.max().y - coord.y) * scale; // invert vertically
            (x, y)
        };

        let mut writer = SvgWriter::new(sink);
        writer.write_header(width, height, &bounds)?;
        for layer in self.layers() {
            writer.write_layer(layer, &project)?;
        }
        if self.has_kind(LayerKind::Polygons) {
            for legend in self.layers().iter().filter_map(|layer| layer.legend.as_ref()) {
                writer.write_legend(legend, width)?;
            }
        }
        writer.write_footer()
    }
}

#[cfg(test)]
mod tests {
    use geo::{MultiPolygon, Point, polygon};

    use super::*;
    use crate::{choropleth::Classifier, map::{MapView, Style}};

    fn sample_map() -> Map {
        let classifier = Classifier::from_max(100.0, 10);
        let mut density = Layer::new("Population Density", LayerKind::Polygons, Style::choropleth())
            .with_legend(classifier.legend());
        density.push(
            Feature::new(MultiPolygon(vec![polygon![(x: -76.7, y: 39.2), (x: -76.6, y: 39.2), (x: -76.6, y: 39.3), (x: -76.7, y: 39.2)]]))
                .with_fill(classifier.color_for(50.0)),
        );

        let mut routes = Layer::new("Light Rail Routes", LayerKind::Lines, Style::route("purple"));
        routes.push(Feature::new(LineString::from(vec![(-76.7, 39.2), (-76.6, 39.3)])).with_label("Light Rail Route <LR>"));

        let mut stops = Layer::new("Light Rail Stops", LayerKind::Points, Style::stop("purple")).with_visibility(false);
        stops.push(Feature::new(Point::new(-76.65, 39.25)));

        Map::compose(MapView::default(), [density, routes, stops]).unwrap()
    }

    #[test]
    fn renders_one_group_per_layer() {
        let svg = sample_map().to_svg_string().unwrap();
        assert!(svg.starts_with("<?xml"));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert!(svg.contains(r#"<g id="population-density""#));
        assert!(svg.contains(r#"<g id="light-rail-routes""#));
        assert!(svg.contains(r##"fill="#ffffcc""##));
        assert!(svg.contains("<polyline"));
        assert!(svg.contains("<circle"));
        assert!(svg.contains("Population Density (people/km²)"));
    }

    #[test]
    fn hidden_layers_are_marked_hidden() {
        let svg = sample_map().to_svg_string().unwrap();
        let stops = svg.lines().find(|line| line.starts_with(r#"<g id="light-rail-stops""#)).unwrap();
        assert!(stops.contains(r#"visibility="hidden""#));
        let routes = svg.lines().find(|line| line.starts_with(r#"<g id="light-rail-routes""#)).unwrap();
        assert!(!routes.contains("visibility"));
    }

    #[test]
    fn labels_are_escaped() {
        let svg = sample_map().to_svg_string().unwrap();
        assert!(svg.contains("<title>Light Rail Route &lt;LR&gt;</title>"));
    }
}
