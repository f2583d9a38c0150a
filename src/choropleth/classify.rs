use geo::Geometry;

use crate::{
    choropleth::{Rgb, ramp_color},
    density::DensityResult,
    map::{Feature, Layer, LayerKind, Legend, LegendEntry, Style},
};

/// Default number of equal-width bins.
pub const DEFAULT_BINS: usize = 10;

/// Bin boundaries are multiples of this step.
const ROUNDING_STEP: f64 = 1_000.0;

pub const LEGEND_TITLE: &str = "Population Density (people/km²)";

pub const CHOROPLETH_LAYER: &str = "Population Density";

/// One density range [lower, upper) and its fill color. The last bin includes its upper bound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DensityBin {
    pub lower: f64,
    pub upper: f64,
    pub color: Rgb,
}

impl DensityBin {
    #[inline] pub fn width(&self) -> f64 { self.upper - self.lower }
}

/// Rounds the maximum up to the next multiple of 1000 (strictly above it, so 1000 → 2000).
pub fn rounded_max(max: f64) -> f64 {
    ((max / ROUNDING_STEP).floor() + 1.0) * ROUNDING_STEP
}

/// Equal-width classification of [0, rounded_max] onto the YlOrRd ramp.
#[derive(Debug, Clone)]
pub struct Classifier {
    bins: Vec<DensityBin>,
}

impl Classifier {
    /// Build `count` equal-width bins spanning [0, rounded_max(max)].
    /// A non-positive or non-finite maximum falls back to a single bin.
    pub fn from_max(max: f64, count: usize) -> Self {
        if !max.is_finite() || max <= 0.0 || count <= 1 {
            let upper = if max.is_finite() && max > 0.0 { rounded_max(max) } else { ROUNDING_STEP };
            return Self { bins: vec![DensityBin { lower: 0.0, upper, color: ramp_color(0.0) }] }
        }

        let upper = rounded_max(max);
        let width = upper / count as f64;
        let bins = (0..count)
            .map(|i| DensityBin {
                lower: width * i as f64,
                upper: if i + 1 == count { upper } else { width * (i + 1) as f64 },
                color: ramp_color(i as f64 / (count - 1) as f64),
            })
            .collect();

        Self { bins }
    }

    /// Classifier for the retained units of a density result.
    pub fn for_result(result: &DensityResult, count: usize) -> Self {
        Self::from_max(result.max_density().unwrap_or(0.0), count)
    }

    #[inline] pub fn bins(&self) -> &[DensityBin] { &self.bins }

    /// Upper bound of the last bin.
    pub fn upper(&self) -> f64 {
        self.bins.last().map_or(ROUNDING_STEP, |bin| bin.upper)
    }

    /// Index of the bin containing `density`; out-of-range values go to the nearest end bin.
    pub fn classify(&self, density: f64) -> usize {
        let Some(first) = self.bins.first() else { return 0 };
        if !density.is_finite() || density <= 0.0 { return 0 }

        let index = (density / first.width()).floor();
        (index as usize).min(self.bins.len() - 1)
    }

    #[inline]
    pub fn color_for(&self, density: f64) -> Rgb {
        self.bins[self.classify(density)].color
    }

    pub fn legend(&self) -> Legend {
        Legend {
            title: LEGEND_TITLE.to_string(),
            entries: self.bins.iter()
                .map(|bin| LegendEntry { label: format!("{:.0} - {:.0}", bin.lower, bin.upper), color: bin.color })
                .collect(),
        }
    }

    /// Pair each retained unit's geometry with its bin color.
    pub fn layer(&self, result: &DensityResult) -> Layer {
        let mut layer = Layer::new(CHOROPLETH_LAYER, LayerKind::Polygons, Style::choropleth())
            .with_legend(self.legend());

        for unit in result.retained() {
            let Some(density) = unit.density else { continue };
            layer.push(
                Feature::new(Geometry::MultiPolygon(unit.geometry.clone()))
                    .with_fill(self.color_for(density))
                    .with_label(format!("{}: {density:.0} people/km²", unit.geo_id))
                    .with_property("geo_id", unit.geo_id.as_str())
                    .with_property("population", unit.population)
                    .with_property("area_km2", unit.area_km2)
                    .with_property("density", density),
            );
        }

        layer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::choropleth::YL_OR_RD;

    #[test]
    fn max_of_one_hundred_gives_ten_bins_of_one_hundred() {
        let classifier = Classifier::from_max(100.0, 10);
        assert_eq!(classifier.upper(), 1000.0);
        assert_eq!(classifier.bins().len(), 10);
        for (i, bin) in classifier.bins().iter().enumerate() {
            assert!((bin.width() - 100.0).abs() < 1e-9);
            assert!((bin.lower - 100.0 * i as f64).abs() < 1e-9);
        }
        assert_eq!(classifier.classify(100.0), 1);
        assert_eq!(classifier.classify(99.9), 0);
    }

    #[test]
    fn rounding_is_strictly_above_the_maximum() {
        assert_eq!(rounded_max(0.5), 1000.0);
        assert_eq!(rounded_max(999.0), 1000.0);
        assert_eq!(rounded_max(1000.0), 2000.0);
        assert_eq!(rounded_max(14_000.0), 15_000.0);
    }

    #[test]
    fn degenerate_maximum_falls_back_to_one_bin() {
        for max in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            let classifier = Classifier::from_max(max, 10);
            assert_eq!(classifier.bins().len(), 1, "{max}");
            assert_eq!(classifier.classify(0.0), 0);
            assert_eq!(classifier.color_for(0.0), YL_OR_RD[0]);
        }
    }

    #[test]
    fn colors_run_from_light_to_dark() {
        let classifier = Classifier::from_max(14_000.0, 10);
        assert_eq!(classifier.bins()[0].color, YL_OR_RD[0]);
        assert_eq!(classifier.bins()[9].color, YL_OR_RD[8]);
        assert_eq!(classifier.classify(14_000.0), 9);
        assert_eq!(classifier.classify(15_000.0), 9);
        assert_eq!(classifier.classify(1e9), 9);
    }

    #[test]
    fn legend_lists_every_bin() {
        let legend = Classifier::from_max(100.0, 10).legend();
        assert_eq!(legend.title, LEGEND_TITLE);
        assert_eq!(legend.entries.len(), 10);
        assert_eq!(legend.entries[0].label, "0 - 100");
        assert_eq!(legend.entries[9].label, "900 - 1000");
    }
}
