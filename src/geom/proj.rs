use anyhow::{Context, Result, anyhow};
use geo::{Area, Coord, MapCoords, MultiPolygon};
use proj4rs::{proj::Proj as Proj4, transform::transform};

/// CONUS Albers Equal Area (EPSG:5070): areas are preserved everywhere in the contiguous US.
const CONUS_ALBERS: &str = "+proj=aea +lat_0=23 +lon_0=-96 +lat_1=29.5 +lat_2=45.5 +x_0=0 +y_0=0 +datum=NAD83 +units=m +no_defs +type=crs";

/// Square meters per square kilometer.
const M2_PER_KM2: f64 = 1e6;

/// Reprojects lon/lat geometry into an equal-area plane so that areas can be measured in km².
pub struct EqualAreaProjection {
    from: Proj4,
    to: Proj4,
}

impl EqualAreaProjection {
    /// PROJ.4 string for a supported source geographic CRS (degrees → radians handled in code).
    fn source_geog_proj4(epsg: u32) -> Option<&'static str> {
        match epsg {
            4269 | 4937 => Some("+proj=longlat +datum=NAD83 +no_defs +type=crs"),
            4326        => Some("+proj=longlat +datum=WGS84 +no_defs +type=crs"),
            _           => None,
        }
    }

    /// Whether `conus` accepts this source EPSG code.
    pub fn supports(epsg: u32) -> bool { Self::source_geog_proj4(epsg).is_some() }

    /// Projection from the given geographic CRS (EPSG 4269/4937 NAD83 or 4326 WGS84) to CONUS Albers.
    pub fn conus(source_epsg: u32) -> Result<Self> {
        let source = Self::source_geog_proj4(source_epsg)
            .ok_or_else(|| anyhow!("unsupported source CRS EPSG:{source_epsg}; expected 4269, 4937 or 4326"))?;
        Self::from_proj_strings(source, CONUS_ALBERS)
    }

    /// Projection between two arbitrary PROJ.4 definitions. The source must be geographic.
    pub fn from_proj_strings(source: &str, target: &str) -> Result<Self> {
        let from = Proj4::from_proj_string(source)
            .with_context(|| anyhow!("failed to build source PROJ.4: {source}"))?;
        let to = Proj4::from_proj_string(target)
            .with_context(|| anyhow!("failed to build target PROJ.4: {target}"))?;
        Ok(Self { from, to })
    }

    /// Reproject a lon/lat shape into projected meters.
    pub fn project(&self, shape: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>> {
        shape.try_map_coords(|coord: Coord<f64>| -> Result<Coord<f64>> {
            let mut point = (coord.x.to_radians(), coord.y.to_radians(), 0.0);
            transform(&self.from, &self.to, &mut point)
                .map_err(|e| anyhow!("CRS transform failed at ({}, {}): {e}", coord.x, coord.y))?;
            Ok(Coord { x: point.0, y: point.1 })
        })
    }

    /// Area of a lon/lat shape in square kilometers, measured in the equal-area plane.
    pub fn area_km2(&self, shape: &MultiPolygon<f64>) -> Result<f64> {
        Ok(self.project(shape)?.unsigned_area() / M2_PER_KM2)
    }
}
