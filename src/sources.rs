//! Dataset loading: cache first, then the fetcher, with one typed outcome per dataset.

use std::sync::Arc;

use crate::{
    cache::{DatasetCache, DatasetKey},
    census::{BlockGroupShape, PopulationTable, census_county_url, read_tiger_zip},
    config::AppConfig,
    error::{DatasetError, DatasetOutcome},
    fetch::Fetcher,
    gtfs::{GtfsFeed, TransitMode},
};

pub fn population_key(config: &AppConfig, county: &str) -> DatasetKey {
    let census = &config.census;
    DatasetKey::new(
        format!("census/population/{}{county}", census.state),
        format!("{}/{}", census.year, census.population_field),
    )
}

pub fn block_group_key(config: &AppConfig) -> DatasetKey {
    DatasetKey::new(format!("tiger/bg/{}", config.census.state), config.tiger.url.clone())
}

/// Id prefix shared by every cached transit feed.
pub const FEED_PREFIX: &str = "gtfs/";

pub fn feed_key(mode: &TransitMode) -> DatasetKey {
    DatasetKey::new(format!("{FEED_PREFIX}{}", mode.name), mode.url.clone())
}

/// Loads every dataset a render needs through the cache.
pub struct DatasetLoader<'a> {
    config: &'a AppConfig,
    cache: &'a mut DatasetCache,
    fetcher: &'a dyn Fetcher,
    /// Re-fetch even when a cached copy exists.
    force: bool,
}

impl<'a> DatasetLoader<'a> {
    pub fn new(config: &'a AppConfig, cache: &'a mut DatasetCache, fetcher: &'a dyn Fetcher) -> Self {
        Self { config, cache, fetcher, force: false }
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Raw bytes for a key, from the cache unless forced.
    fn bytes(&mut self, dataset: &str, key: &DatasetKey, url: &str) -> Result<Arc<[u8]>, DatasetError> {
        let fetcher = self.fetcher;
        let fetch = || fetcher.fetch(url);
        let result = if self.force { self.cache.refresh(key, fetch) } else { self.cache.get_or_fetch(key, fetch) };
        result.map_err(|source| DatasetError::Retrieval { dataset: dataset.to_string(), source })
    }

    /// A cached artifact that cannot be parsed is dropped so the next run fetches it again.
    fn discard(&mut self, key: &DatasetKey) {
        if let Err(e) = self.cache.invalidate(key) {
            log::warn!("[sources] failed to invalidate {key}: {e:#}");
        }
    }

    /// Population for every configured county. Failed counties are reported; the rest are kept.
    pub fn population(&mut self) -> DatasetOutcome<PopulationTable> {
        let config = self.config;
        let census = &config.census;
        let api_url = census.api_url();
        let api_key = census.api_key();

        let mut table = PopulationTable::new();
        let mut failures = Vec::new();
        for county in &census.counties {
            match self.county_population(county, &api_url, api_key.as_deref()) {
                Ok(county_table) => table.extend(county_table),
                Err(e) => {
                    log::warn!("[sources] {e}");
                    failures.push(e);
                }
            }
        }

        log::info!(
            "[sources] population: {} block groups from {} of {} counties",
            table.len(),
            census.counties.len() - failures.len(),
            census.counties.len(),
        );

        DatasetOutcome::from_parts(table, failures)
    }

    /// One county's table. The cache holds the normalized CSV, not the raw API response.
    fn county_population(&mut self, county: &str, api_url: &str, api_key: Option<&str>) -> Result<PopulationTable, DatasetError> {
        let config = self.config;
        let census = &config.census;
        let dataset = format!("county {}{county}", census.state);
        let key = population_key(config, county);

        if !self.force {
            if let Some(bytes) = self.cache.get(&key) {
                match PopulationTable::from_csv_bytes(&bytes) {
                    Ok(table) => return Ok(table),
                    Err(e) => {
                        log::warn!("[sources] {dataset}: cached table unreadable ({e:#}); fetching again");
                        self.discard(&key);
                    }
                }
            }
        }

        let url = census_county_url(api_url, &census.population_field, &census.state, county, api_key);
        let response = self.fetcher.fetch(&url)
            .map_err(|source| DatasetError::Retrieval { dataset: dataset.clone(), source })?;
        let table = PopulationTable::from_census_json(&response, &census.population_field)
            .map_err(|e| DatasetError::malformed(&dataset, &e))?;

        match table.to_csv_bytes().and_then(|bytes| self.cache.put(&key, &bytes)) {
            Ok(()) => {}
            Err(e) => log::warn!("[sources] {dataset}: failed to cache table: {e:#}"),
        }

        Ok(table)
    }

    /// Block-group polygons from the TIGER/Line archive.
    pub fn block_groups(&mut self) -> DatasetOutcome<Vec<BlockGroupShape>> {
        let dataset = "block-group geometry";
        let key = block_group_key(self.config);
        let url = self.config.tiger.url.clone();

        let result = self.bytes(dataset, &key, &url).and_then(|bytes| {
            read_tiger_zip(&bytes, &self.config.tiger.key_field).map_err(|e| DatasetError::malformed(dataset, &e))
        });

        if let Err(DatasetError::Malformed { .. }) = &result {
            self.discard(&key);
        }
        if let Ok(shapes) = &result {
            log::info!("[sources] {dataset}: {} polygons", shapes.len());
        }

        result.into()
    }

    /// One mode's feed. A missing table or retrieval failure fails only this mode.
    pub fn feed(&mut self, mode: &TransitMode) -> DatasetOutcome<GtfsFeed> {
        let key = feed_key(mode);
        let result = self.bytes(&mode.name, &key, &mode.url)
            .and_then(|bytes| GtfsFeed::from_zip_bytes(&mode.name, &bytes));

        if matches!(result, Err(DatasetError::Malformed { .. } | DatasetError::MissingTable { .. })) {
            self.discard(&key);
        }

        result.into()
    }

    /// Re-download every given feed, replacing cached copies. Returns the failures.
    pub fn refresh_feeds(&mut self, modes: &[TransitMode]) -> Vec<DatasetError> {
        let fetcher = self.fetcher;
        modes.iter()
            .filter_map(|mode| {
                let key = feed_key(mode);
                match self.cache.refresh(&key, || fetcher.fetch(&mode.url)) {
                    Ok(bytes) => {
                        log::info!("[sources] {}: refreshed ({} bytes)", mode.name, bytes.len());
                        None
                    }
                    Err(source) => {
                        let err = DatasetError::Retrieval { dataset: mode.name.clone(), source };
                        log::warn!("[sources] {err}");
                        Some(err)
                    }
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::MemFetcher;

    fn config(counties: &[&str]) -> AppConfig {
        let mut config = AppConfig::default();
        config.census.counties = counties.iter().map(|c| c.to_string()).collect();
        config
    }

    fn county_url(config: &AppConfig, county: &str) -> String {
        census_county_url(&config.census.api_url(), "B01003_001E", "24", county, None)
    }

    fn response(county: &str, population: &str) -> String {
        format!(r#"[["NAME","B01003_001E","state","county","tract","block group"],
                    ["BG 1","{population}","24","{county}","000100","1"]]"#)
    }

    #[test]
    fn failed_county_makes_population_partial() {
        let config = config(&["001", "003"]);
        let fetcher = MemFetcher::new().with(&county_url(&config, "001"), response("001", "120"));
        let mut cache = DatasetCache::in_memory();

        let outcome = DatasetLoader::new(&config, &mut cache, &fetcher).population();
        let (table, failures) = outcome.into_parts();

        assert_eq!(table.unwrap().len(), 1);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].dataset(), "county 24003");
        assert!(matches!(failures[0], DatasetError::Retrieval { .. }));
    }

    #[test]
    fn population_is_served_from_cache_on_second_load() {
        let config = config(&["510"]);
        let fetcher = MemFetcher::new().with(&county_url(&config, "510"), response("510", "42"));
        let mut cache = DatasetCache::in_memory();

        for _ in 0..2 {
            let outcome = DatasetLoader::new(&config, &mut cache, &fetcher).population();
            assert!(matches!(outcome, DatasetOutcome::Loaded(ref table) if table.len() == 1));
        }
        assert_eq!(fetcher.requests().len(), 1);

        DatasetLoader::new(&config, &mut cache, &fetcher).force(true).population();
        assert_eq!(fetcher.requests().len(), 2);
    }

    #[test]
    fn malformed_feed_fails_only_that_mode_and_is_not_kept() {
        let mode = TransitMode::new("Light Rail", "https://example.invalid/lr.zip", "purple");
        let fetcher = MemFetcher::new().with(&mode.url, b"not a zip".to_vec());
        let config = AppConfig::default();
        let mut cache = DatasetCache::in_memory();

        let outcome = DatasetLoader::new(&config, &mut cache, &fetcher).feed(&mode);
        assert!(outcome.is_failed());
        assert!(!cache.contains(&feed_key(&mode)));
    }

    #[test]
    fn refresh_reports_unreachable_feeds() {
        let modes = TransitMode::maryland_defaults();
        let fetcher = MemFetcher::new().with(&modes[0].url, b"zip bytes".to_vec());
        let config = AppConfig::default();
        let mut cache = DatasetCache::in_memory();

        let failures = DatasetLoader::new(&config, &mut cache, &fetcher).refresh_feeds(&modes);
        assert_eq!(failures.len(), 4);
        assert!(cache.contains(&feed_key(&modes[0])));
    }
}
