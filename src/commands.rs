use anyhow::Result;

use crate::{cli::Cli, config::AppConfig, fetch::{Fetcher, OfflineFetcher}};

pub mod refresh;
pub mod render;

/// The configuration named by --config, or the built-in defaults.
fn load_config(cli: &Cli) -> Result<AppConfig> {
    match &cli.config {
        Some(path) => {
            log::info!("[config] loading {}", path.display());
            AppConfig::load(path)
        }
        None => Ok(AppConfig::default()),
    }
}

/// Network fetcher, or one that refuses every request when offline.
fn fetcher(offline: bool) -> Result<Box<dyn Fetcher>> {
    if offline {
        return Ok(Box::new(OfflineFetcher))
    }
    network_fetcher()
}

#[cfg(feature = "download")]
fn network_fetcher() -> Result<Box<dyn Fetcher>> {
    Ok(Box::new(crate::fetch::HttpFetcher::new()?))
}

#[cfg(not(feature = "download"))]
fn network_fetcher() -> Result<Box<dyn Fetcher>> {
    log::warn!("[fetch] built without the `download` feature; using cached datasets only");
    Ok(Box::new(OfflineFetcher))
}
