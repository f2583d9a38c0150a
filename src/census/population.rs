use std::collections::HashMap;

use anyhow::{Context, Result, bail};
use polars::prelude::{Column, DataFrame};
use serde_json::Value;

use crate::{census::{GeoId, GeoKey}, io::csv};

/// Block-group population counts keyed by canonical GEOID.
/// A count is None when the source cell was null or non-numeric.
#[derive(Debug, Clone, Default)]
pub struct PopulationTable {
    counts: HashMap<GeoId, Option<i64>>,
}

impl PopulationTable {
    pub fn new() -> Self { Self::default() }

    /// Build a table from (key, count) pairs. The first record for a GEOID wins.
    pub fn from_records(records: impl IntoIterator<Item = (GeoId, Option<i64>)>) -> Self {
        let mut table = Self::new();
        for (geo_id, population) in records {
            table.insert(geo_id, population);
        }
        table
    }

    fn insert(&mut self, geo_id: GeoId, population: Option<i64>) {
        if self.counts.contains_key(&geo_id) {
            log::debug!("[census::population] duplicate record for {geo_id}; keeping first");
            return
        }
        self.counts.insert(geo_id, population);
    }

    /// Merge another table into this one (existing keys win).
    pub fn extend(&mut self, other: PopulationTable) {
        for (geo_id, population) in other.counts {
            self.insert(geo_id, population);
        }
    }

    #[inline] pub fn len(&self) -> usize { self.counts.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.counts.is_empty() }

    /// True when the table holds a record (possibly with an absent count) for this GEOID.
    #[inline] pub fn contains(&self, geo_id: &GeoId) -> bool { self.counts.contains_key(geo_id) }

    /// Population for a GEOID; None if the GEOID is unknown or its count is absent.
    #[inline]
    pub fn population(&self, geo_id: &GeoId) -> Option<i64> {
        self.counts.get(geo_id).copied().flatten()
    }

    /// Parse a Census Data API response: a JSON array of rows whose first row is the header.
    /// Rows whose identifier components are incomplete are dropped.
    pub fn from_census_json(bytes: &[u8], population_field: &str) -> Result<Self> {
        let rows: Vec<Vec<Value>> = serde_json::from_slice(bytes)
            .context("[census::population] response is not a JSON array of rows")?;

        let Some((header, rows)) = rows.split_first() else {
            bail!("[census::population] response has no header row");
        };

        let position = |name: &str| {
            header.iter().position(|cell| cell.as_str() == Some(name))
                .with_context(|| format!("[census::population] response has no {name:?} column"))
        };

        let population_idx = position(population_field)?;
        let [state, county, tract, group] = ["state", "county", "tract", "block group"].map(position);
        let (state, county, tract, group) = (state?, county?, tract?, group?);

        let mut dropped = 0usize;
        let mut table = Self::new();
        for row in rows {
            let cell = |idx: usize| row.get(idx).and_then(cell_text);
            let geo_id = GeoId::from_parts(
                cell(state).as_deref(),
                cell(county).as_deref(),
                cell(tract).as_deref(),
                cell(group).as_deref(),
            );

            match geo_id {
                Some(geo_id) => table.insert(geo_id, csv::parse_i64(cell(population_idx).as_deref())),
                None => dropped += 1,
            }
        }

        if dropped > 0 {
            log::debug!("[census::population] dropped {dropped} rows with incomplete identifiers");
        }

        Ok(table)
    }

    /// Parse a population CSV. Either a `GEOID`/`geo_id` column, or the separate
    /// `state`, `county`, `tract`, `block group` (or `block_group`) columns, plus `population`.
    pub fn from_csv_bytes(bytes: &[u8]) -> Result<Self> {
        let df = csv::read_csv_bytes(bytes)?;
        let population = csv::str_column(&df, "population")?;

        let keys: Vec<Option<GeoId>> = if let Some(ids) = csv::opt_str_column(&df, "geo_id")
            .or_else(|| csv::opt_str_column(&df, "GEOID"))
        {
            ids.into_iter()
                .map(|id| GeoId::from_key(GeoKey::Text(id?)))
                .collect()
        } else {
            let group = csv::opt_str_column(&df, "block group")
                .or_else(|| csv::opt_str_column(&df, "block_group"))
                .context("[census::population] CSV has neither a GEOID nor a block group column")?;
            let state = csv::str_column(&df, "state")?;
            let county = csv::str_column(&df, "county")?;
            let tract = csv::str_column(&df, "tract")?;

            state.into_iter()
                .zip(county)
                .zip(tract)
                .zip(group)
                .map(|(((state, county), tract), group)| GeoId::from_parts(state, county, tract, group))
                .collect()
        };

        Ok(Self::from_records(
            keys.into_iter()
                .zip(population)
                .filter_map(|(geo_id, count)| Some((geo_id?, csv::parse_i64(count)))),
        ))
    }

    /// Convert to a two-column DataFrame (`geo_id`, `population`), sorted by GEOID.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut rows = self.counts.iter().collect::<Vec<_>>();
        rows.sort_by(|a, b| a.0.cmp(b.0));

        Ok(DataFrame::new(vec![
            Column::new("geo_id".into(), rows.iter().map(|(id, _)| id.as_str()).collect::<Vec<_>>()),
            Column::new("population".into(), rows.iter().map(|&(_, &count)| count).collect::<Vec<Option<i64>>>()),
        ])?)
    }

    /// Serialize the normalized table as CSV bytes (the cached form).
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        csv::write_csv_bytes(&self.to_dataframe()?)
    }
}

/// Census API cells are normally strings, but tolerate bare numbers.
fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Build the Census Data API URL for all block groups of one county.
pub fn census_county_url(api_base: &str, population_field: &str, state: &str, county: &str, api_key: Option<&str>) -> String {
    let mut url = format!(
        "{api_base}?get=NAME,{population_field}&for=block%20group:*&in=state:{state}%20county:{county}"
    );
    if let Some(key) = api_key {
        url.push_str(&format!("&key={key}"));
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = r#"[
        ["NAME","B01003_001E","state","county","tract","block group"],
        ["Block Group 1; Census Tract 1; Allegany County; Maryland","1203","24","001","000100","1"],
        ["Block Group 2; Census Tract 1; Allegany County; Maryland",null,"24","001","000100","2"],
        ["Block Group 3; Census Tract 1; Allegany County; Maryland","-666666666","24","001","000100","3"],
        ["Broken row","10","24",null,"000100","4"]
    ]"#;

    fn id(text: &str) -> GeoId { GeoId::from_key(GeoKey::Text(text)).unwrap() }

    #[test]
    fn parses_census_api_rows() {
        let table = PopulationTable::from_census_json(RESPONSE.as_bytes(), "B01003_001E").unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.population(&id("240010001001")), Some(1203));
        assert_eq!(table.population(&id("240010001002")), None);
        assert_eq!(table.population(&id("240010001003")), Some(-666666666));
    }

    #[test]
    fn census_response_without_population_column_fails() {
        assert!(PopulationTable::from_census_json(RESPONSE.as_bytes(), "B01001_001E").is_err());
        assert!(PopulationTable::from_census_json(b"[]", "B01003_001E").is_err());
    }

    #[test]
    fn parses_csv_with_separate_parts() {
        let csv = "state,county,tract,block_group,population\n24,1,100,1,50\n24,510,280500,2,\n";
        let table = PopulationTable::from_csv_bytes(csv.as_bytes()).unwrap();
        assert_eq!(table.population(&id("240010001001")), Some(50));
        assert_eq!(table.population(&id("245102805002")), None);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn normalized_csv_reads_back() {
        let table = PopulationTable::from_records([
            (id("240010001001"), Some(12)),
            (id("240010001002"), None),
        ]);
        let restored = PopulationTable::from_csv_bytes(&table.to_csv_bytes().unwrap()).unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.population(&id("240010001001")), Some(12));
        assert_eq!(restored.population(&id("240010001002")), None);
    }

    #[test]
    fn county_url_encodes_geography_clause() {
        let url = census_county_url("https://api.census.gov/data/2023/acs/acs5", "B01003_001E", "24", "510", None);
        assert_eq!(url, "https://api.census.gov/data/2023/acs/acs5?get=NAME,B01003_001E&for=block%20group:*&in=state:24%20county:510");
    }
}
