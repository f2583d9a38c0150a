use anyhow::{Result, bail};

use crate::{
    cache::DatasetCache,
    cli::{Cli, RefreshArgs},
    sources::{DatasetLoader, FEED_PREFIX},
};

pub fn run(cli: &Cli, args: &RefreshArgs) -> Result<()> {
    let config = super::load_config(cli)?;
    let fetcher = super::fetcher(false)?;
    let mut cache = DatasetCache::on_disk(&config.cache.dir);

    if args.all {
        let dropped = cache.invalidate_where(|entry| !entry.id.starts_with(FEED_PREFIX))?;
        log::info!("[refresh] dropped {dropped} census and geometry entries");
    }

    let modes = &config.transit.modes;
    let failures = DatasetLoader::new(&config, &mut cache, fetcher.as_ref()).refresh_feeds(modes);

    for err in &failures {
        eprintln!("  {err}");
    }
    if !modes.is_empty() && failures.len() == modes.len() {
        bail!("[refresh] no transit feed could be downloaded");
    }

    println!("Refreshed {} of {} transit feeds in {}", modes.len() - failures.len(), modes.len(), config.cache.dir.display());
    Ok(())
}
