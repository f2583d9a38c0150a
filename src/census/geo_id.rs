use std::{fmt, sync::Arc};

/// Census summary levels that make up a block-group GEOID, outermost first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeoLevel {
    State,      // 2 digits
    County,     // State -> County, 3 digits
    Tract,      // County -> Tract, 6 digits
    Group,      // Tract -> Block group, 1 digit
}

impl GeoLevel {
    pub const ALL: [GeoLevel; 4] = [GeoLevel::State, GeoLevel::County, GeoLevel::Tract, GeoLevel::Group];

    /// Length of a full GEOID at this level.
    pub fn id_len(&self) -> usize {
        match self {
            GeoLevel::State  => 2,
            GeoLevel::County => 5,
            GeoLevel::Tract  => 11,
            GeoLevel::Group  => 12,
        }
    }

    /// Width of the component this level appends to its parent's GEOID.
    pub fn width(&self) -> usize {
        match self {
            GeoLevel::State  => 2,
            GeoLevel::County => 3,
            GeoLevel::Tract  => 6,
            GeoLevel::Group  => 1,
        }
    }
}

/// A raw key value as found in a polygon source, before normalization.
/// Attribute tables store GEOID as text, but re-exported sources often coerce it to a number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeoKey<'a> {
    Text(&'a str),
    Integer(i64),
    Float(f64),
}

/// Canonical block-group key: state + county + tract + block group, zero-padded (12 digits).
/// Keeps the text with leading zeros but avoids repeated owned Strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeoId(Arc<str>);

impl GeoId {
    /// Build a key from separate tabular components, in fixed state/county/tract/group order.
    /// Returns None if any component is absent or not a number that fits its width.
    pub fn from_parts(state: Option<&str>, county: Option<&str>, tract: Option<&str>, group: Option<&str>) -> Option<Self> {
        let parts = [state?, county?, tract?, group?];

        let mut id = String::with_capacity(GeoLevel::Group.id_len());
        for (part, level) in parts.iter().zip(GeoLevel::ALL) {
            id.push_str(&pad_digits(part, level.width())?);
        }

        Some(Self(Arc::from(id)))
    }

    /// Build a key from a polygon record's key field, whatever primitive type it was stored as.
    pub fn from_key(key: GeoKey<'_>) -> Option<Self> {
        let width = GeoLevel::Group.id_len();
        let digits = match key {
            GeoKey::Text(text) => {
                let text = text.trim();
                // Full census GEO_IDs carry a summary-level prefix, e.g. "1500000US240010001001".
                let text = text.rsplit_once("US").map_or(text, |(_, suffix)| suffix);
                pad_digits(text, width)?
            }
            GeoKey::Integer(n) => pad_digits(&n.to_string(), width)?,
            GeoKey::Float(x) => {
                if !x.is_finite() || x < 0.0 || x.fract() != 0.0 || x >= 1e12 { return None }
                format!("{:0width$}", x as i64)
            }
        };

        Some(Self(Arc::from(digits)))
    }

    #[inline] pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for GeoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// Left-pad a decimal string with zeros to `width`; reject non-digits and overflow.
fn pad_digits(raw: &str, width: usize) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.len() > width || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None
    }
    Some(format!("{raw:0>width$}"))
}
