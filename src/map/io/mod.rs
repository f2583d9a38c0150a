mod geojson;
mod html;
mod svg;
