//! Sequential color ramp for the density choropleth.

use std::fmt;

use serde::{Serialize, Serializer};

/// Simple RGB color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self { Self { r, g, b } }

    /// Linear interpolation between two colors, t in [0.0, 1.0].
    pub fn lerp(self, other: Rgb, t: f64) -> Rgb {
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round().clamp(0.0, 255.0) as u8;
        Rgb { r: mix(self.r, other.r), g: mix(self.g, other.g), b: mix(self.b, other.b) }
    }
}

impl fmt::Display for Rgb {
    /// Format as CSS hex: #rrggbb
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// ColorBrewer YlOrRd, 9 classes (yellow → orange → red).
pub const YL_OR_RD: [Rgb; 9] = [
    Rgb::new(0xff, 0xff, 0xcc),
    Rgb::new(0xff, 0xed, 0xa0),
    Rgb::new(0xfe, 0xd9, 0x76),
    Rgb::new(0xfe, 0xb2, 0x4c),
    Rgb::new(0xfd, 0x8d, 0x3c),
    Rgb::new(0xfc, 0x4e, 0x2a),
    Rgb::new(0xe3, 0x1a, 0x1c),
    Rgb::new(0xbd, 0x00, 0x26),
    Rgb::new(0x80, 0x00, 0x26),
];

/// Sample the YlOrRd ramp at t in [0.0, 1.0] (0 = lightest, 1 = darkest).
pub fn ramp_color(t: f64) -> Rgb {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let pos = t * (YL_OR_RD.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = (lo + 1).min(YL_OR_RD.len() - 1);
    YL_OR_RD[lo].lerp(YL_OR_RD[hi], pos - lo as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_endpoints_match_palette() {
        assert_eq!(ramp_color(0.0), YL_OR_RD[0]);
        assert_eq!(ramp_color(1.0), YL_OR_RD[8]);
        assert_eq!(ramp_color(0.5), YL_OR_RD[4]);
        assert_eq!(ramp_color(f64::NAN), YL_OR_RD[0]);
    }

    #[test]
    fn hex_formatting() {
        assert_eq!(YL_OR_RD[0].to_string(), "#ffffcc");
        assert_eq!(serde_json::to_string(&YL_OR_RD[8]).unwrap(), "\"#800026\"");
    }

    #[test]
    fn ramp_is_monotonically_darker() {
        let luminance = |c: Rgb| 0.299 * c.r as f64 + 0.587 * c.g as f64 + 0.114 * c.b as f64;
        let samples = (0..=10).map(|i| luminance(ramp_color(i as f64 / 10.0))).collect::<Vec<_>>();
        assert!(samples.windows(2).all(|w| w[1] <= w[0]), "{samples:?}");
    }
}
