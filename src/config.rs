//! Application configuration, loaded from TOML with every field optional.

use std::{fs, path::{Path, PathBuf}};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::{choropleth::DEFAULT_BINS, density::DEFAULT_CLIP_MAX, geom::EqualAreaProjection, gtfs::TransitMode, map::MapView};

/// Census Data API settings for the population table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CensusConfig {
    pub year: u16,
    /// State FIPS code.
    pub state: String,
    /// County FIPS codes, one API request each.
    pub counties: Vec<String>,
    /// Endpoint; `{year}` is substituted.
    pub api_base: String,
    /// Total population variable.
    pub population_field: String,
    /// Environment variable holding an API key, if any.
    pub api_key_env: Option<String>,
}

impl Default for CensusConfig {
    fn default() -> Self {
        Self {
            year: 2023,
            state: "24".into(),
            counties: [
                "001", "003", "005", "009", "011", "013", "015", "017", "019", "021", "023", "025",
                "027", "029", "031", "033", "035", "037", "039", "041", "043", "045", "047", "510",
            ].map(String::from).to_vec(),
            api_base: "https://api.census.gov/data/{year}/acs/acs5".into(),
            population_field: "B01003_001E".into(),
            api_key_env: None,
        }
    }
}

impl CensusConfig {
    pub fn api_url(&self) -> String {
        self.api_base.replace("{year}", &self.year.to_string())
    }

    /// The API key from the configured environment variable, if set and non-empty.
    pub fn api_key(&self) -> Option<String> {
        let var = self.api_key_env.as_deref()?;
        std::env::var(var).ok().filter(|key| !key.is_empty())
    }
}

/// TIGER/Line block-group polygons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TigerConfig {
    pub url: String,
    /// Attribute holding the block-group GEOID.
    pub key_field: String,
    /// Geographic CRS of the archive (4269 = NAD83).
    pub source_epsg: u32,
}

impl Default for TigerConfig {
    fn default() -> Self {
        Self {
            url: "https://www2.census.gov/geo/tiger/TIGER2024/BG/tl_2024_24_bg.zip".into(),
            key_field: "GEOID".into(),
            source_epsg: 4269,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitConfig {
    /// Modes in declaration (and drawing) order.
    pub modes: Vec<TransitMode>,
}

impl Default for TransitConfig {
    fn default() -> Self { Self { modes: TransitMode::maryland_defaults() } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DensityConfig {
    /// Upper bound on density, people/km².
    pub clip_max: f64,
    pub bins: usize,
}

impl Default for DensityConfig {
    fn default() -> Self { Self { clip_max: DEFAULT_CLIP_MAX, bins: DEFAULT_BINS } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self { Self { dir: PathBuf::from(".transitmap-cache") } }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub census: CensusConfig,
    pub tiger: TigerConfig,
    pub transit: TransitConfig,
    pub density: DensityConfig,
    pub map: MapView,
    pub cache: CacheConfig,
}

impl AppConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(text).context("[config] Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("[config] Failed to read {}", path.display()))?;
        Self::from_toml_str(&text)
            .with_context(|| format!("[config] Invalid configuration in {}", path.display()))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("[config] Failed to serialize TOML")
    }

    fn validate(&self) -> Result<()> {
        if !(self.density.clip_max.is_finite() && self.density.clip_max > 0.0) {
            bail!("[config] density.clip_max must be a positive number, got {}", self.density.clip_max);
        }
        if self.density.bins == 0 {
            bail!("[config] density.bins must be at least 1");
        }
        if !EqualAreaProjection::supports(self.tiger.source_epsg) {
            bail!("[config] tiger.source_epsg {} is not supported; use 4269, 4937 or 4326", self.tiger.source_epsg);
        }

        let mut names = std::collections::HashSet::new();
        for mode in &self.transit.modes {
            if !names.insert(mode.name.as_str()) {
                bail!("[config] transit mode {:?} is declared twice", mode.name);
            }
        }
        Ok(())
    }

    /// Configured modes restricted to `selected` (all when empty), in declaration order.
    /// Unknown names are an error.
    pub fn select_modes(&self, selected: &[String]) -> Result<Vec<TransitMode>> {
        for name in selected {
            if !self.transit.modes.iter().any(|mode| mode.name.eq_ignore_ascii_case(name)) {
                let known = self.transit.modes.iter().map(|m| m.name.as_str()).collect::<Vec<_>>();
                bail!("[config] unknown transit mode {name:?}; known modes: {}", known.join(", "));
            }
        }

        Ok(self.transit.modes.iter()
            .filter(|mode| selected.is_empty() || selected.iter().any(|name| mode.name.eq_ignore_ascii_case(name)))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_maryland() {
        let config = AppConfig::default();
        assert_eq!(config.census.counties.len(), 24);
        assert_eq!(config.census.api_url(), "https://api.census.gov/data/2023/acs/acs5");
        assert_eq!(config.transit.modes.len(), 5);
        assert_eq!(config.transit.modes[3].name, "MARC Train");
        assert_eq!(config.density.clip_max, 14_000.0);
        assert_eq!(config.map.center, [39.3, -76.6]);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = AppConfig::from_toml_str(r#"
            [census]
            year = 2022
            counties = ["510"]

            [density]
            bins = 5

            [[transit.modes]]
            name = "Light Rail"
            url = "https://example.invalid/lr.zip"
            color = "purple"
        "#).unwrap();

        assert_eq!(config.census.api_url(), "https://api.census.gov/data/2022/acs/acs5");
        assert_eq!(config.census.state, "24");
        assert_eq!(config.density.bins, 5);
        assert_eq!(config.density.clip_max, 14_000.0);
        assert_eq!(config.transit.modes.len(), 1);
        assert_eq!(config.map.zoom, 10);
    }

    #[test]
    fn serialized_defaults_read_back() {
        let text = AppConfig::default().to_toml_string().unwrap();
        assert_eq!(AppConfig::from_toml_str(&text).unwrap(), AppConfig::default());
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(AppConfig::from_toml_str("[density]\nclip_max = 0.0\n").is_err());
        assert!(AppConfig::from_toml_str("[density]\nbins = 0\n").is_err());
        assert!(AppConfig::from_toml_str("[census]\nyear = \"soon\"\n").is_err());
        assert!(AppConfig::from_toml_str("[tiger]\nsource_epsg = 3857\n").is_err());
        assert!(AppConfig::from_toml_str("[tiger]\nsource_epsg = 4326\n").is_ok());
    }

    #[test]
    fn mode_selection_keeps_declaration_order() {
        let config = AppConfig::default();
        let modes = config.select_modes(&["marc train".into(), "Local Bus".into()]).unwrap();
        let names = modes.iter().map(|m| m.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["Local Bus", "MARC Train"]);

        assert_eq!(config.select_modes(&[]).unwrap().len(), 5);
        assert!(config.select_modes(&["Ferry".into()]).is_err());
    }
}
