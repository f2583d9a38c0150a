//! Population density: joins population counts onto block-group polygons and
//! computes clipped, area-normalized density.

use std::collections::HashSet;

use geo::MultiPolygon;
use serde::Serialize;

use crate::{census::{BlockGroupShape, GeoId, PopulationTable}, geom::EqualAreaProjection};

/// Default upper bound on density, in people/km².
pub const DEFAULT_CLIP_MAX: f64 = 14_000.0;

/// Smallest projected area (1 m²) treated as real; anything below is projection noise.
pub const MIN_AREA_KM2: f64 = 1e-6;

/// One census block group after the population join.
#[derive(Debug, Clone)]
pub struct GeoUnit {
    pub geo_id: GeoId,
    pub geometry: MultiPolygon<f64>,
    pub population: Option<i64>,
    pub area_km2: Option<f64>,
    /// Set only for units that are rendered in the density layer.
    pub density: Option<f64>,
}

impl GeoUnit {
    #[inline] pub fn is_retained(&self) -> bool { self.density.is_some() }
}

/// Counts of units excluded from (or adjusted in) the density layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DensityStats {
    /// Units whose population was joined and retained.
    pub retained: usize,
    /// Polygons with no population record.
    pub unmatched: usize,
    /// Polygons whose population was null, zero or negative.
    pub non_positive: usize,
    /// Polygons with negligible (below `MIN_AREA_KM2`) or non-finite area.
    pub degenerate: usize,
    /// Retained units whose density hit the clip bound.
    pub clipped: usize,
    /// Repeated polygon GEOIDs (the first polygon wins).
    pub duplicates: usize,
}

/// All joined units (retained or not) plus exclusion counts.
#[derive(Debug, Clone, Default)]
pub struct DensityResult {
    pub units: Vec<GeoUnit>,
    pub stats: DensityStats,
}

impl DensityResult {
    /// Units rendered in the density layer.
    pub fn retained(&self) -> impl Iterator<Item = &GeoUnit> {
        self.units.iter().filter(|unit| unit.is_retained())
    }

    /// Maximum clipped density over the retained units.
    pub fn max_density(&self) -> Option<f64> {
        self.retained().filter_map(|unit| unit.density).reduce(f64::max)
    }
}

pub struct DensityCalculator {
    projection: EqualAreaProjection,
    clip_max: f64,
}

impl DensityCalculator {
    pub fn new(projection: EqualAreaProjection, clip_max: f64) -> Self {
        Self { projection, clip_max }
    }

    #[inline] pub fn clip_max(&self) -> f64 { self.clip_max }

    /// Left-join population onto the polygons and compute density for each usable unit.
    /// Units with absent/non-positive population or degenerate area keep their geometry but get no density.
    pub fn compute(&self, shapes: Vec<BlockGroupShape>, population: &PopulationTable) -> DensityResult {
        let mut stats = DensityStats::default();
        let mut seen = HashSet::with_capacity(shapes.len());
        let mut units = Vec::with_capacity(shapes.len());

        for BlockGroupShape { geo_id, geometry } in shapes {
            if !seen.insert(geo_id.clone()) {
                stats.duplicates += 1;
                continue
            }

            let population_count = population.population(&geo_id);
            let mut unit = GeoUnit { geo_id, geometry, population: population_count, area_km2: None, density: None };

            match population_count {
                None if !population.contains(&unit.geo_id) => stats.unmatched += 1,
                None => stats.non_positive += 1,
                Some(count) if count <= 0 => stats.non_positive += 1,
                Some(count) => match self.projection.area_km2(&unit.geometry) {
                    Ok(area) if area.is_finite() && area >= MIN_AREA_KM2 => {
                        let density = count as f64 / area;
                        if density > self.clip_max { stats.clipped += 1 }
                        unit.area_km2 = Some(area);
                        unit.density = Some(density.min(self.clip_max));
                        stats.retained += 1;
                    }
                    Ok(area) => {
                        unit.area_km2 = Some(area);
                        stats.degenerate += 1;
                    }
                    Err(e) => {
                        log::debug!("[density] {}: area not computable: {e:#}", unit.geo_id);
                        stats.degenerate += 1;
                    }
                },
            }

            units.push(unit);
        }

        log::info!(
            "[density] {} units retained ({} unmatched, {} without population, {} degenerate, {} clipped at {})",
            stats.retained, stats.unmatched, stats.non_positive, stats.degenerate, stats.clipped, self.clip_max,
        );

        DensityResult { units, stats }
    }
}
