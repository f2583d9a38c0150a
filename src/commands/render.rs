use anyhow::{Context, Result, bail};

use crate::{
    cache::DatasetCache,
    cli::{Cli, OutputFormat, RenderArgs},
    common,
    pipeline::{self, CancelToken, PipelineInputs, PipelineReport, RenderOptions},
    sources::DatasetLoader,
};

pub fn run(cli: &Cli, args: &RenderArgs) -> Result<()> {
    let config = super::load_config(cli)?;
    let modes = config.select_modes(&args.modes)?;

    let out_path = args.output_path();
    common::assert_not_stdout(&out_path)?;
    if !args.force && out_path.exists() {
        bail!("Refusing to overwrite existing file: {} (use --force)", out_path.display());
    }

    let fetcher = super::fetcher(args.offline)?;
    let mut cache = DatasetCache::on_disk(&config.cache.dir);
    let mut loader = DatasetLoader::new(&config, &mut cache, fetcher.as_ref())
        .force(args.force && !args.offline);

    log::info!("[render] modes={} stops={} population={}", modes.len(), !args.no_stops, !args.no_population);

    let (population, block_groups) = if args.no_population {
        (None, None)
    } else {
        (Some(loader.population()), Some(loader.block_groups()))
    };
    let feeds = modes.into_iter()
        .map(|mode| {
            let feed = loader.feed(&mode);
            (mode, feed)
        })
        .collect();

    let options = RenderOptions {
        show_stops: !args.no_stops,
        show_population: !args.no_population,
        ..RenderOptions::from_config(&config)
    };
    let inputs = PipelineInputs { population, block_groups, feeds };
    let result = pipeline::run(inputs, &options, &CancelToken::new())?;

    let bytes = match args.format {
        OutputFormat::Html => result.map.to_html().into_bytes(),
        OutputFormat::Svg => result.map.to_svg_string()?.into_bytes(),
        OutputFormat::Json => serde_json::to_vec_pretty(&result.map.to_geojson())
            .context("[render] Failed to serialize map document")?,
    };
    common::write_atomic(&out_path, &bytes, args.force)?;

    summarize(&result.report);
    println!("Rendered {} layers -> {}", result.map.layers().len(), out_path.display());
    Ok(())
}

fn summarize(report: &PipelineReport) {
    if let Some(stats) = &report.density {
        log::info!(
            "[render] density: {} retained, {} unmatched, {} non-positive, {} degenerate, {} clipped; scale max {}",
            stats.retained, stats.unmatched, stats.non_positive, stats.degenerate, stats.clipped,
            report.scale_max.unwrap_or_default(),
        );
    }
    for mode in &report.modes {
        log::info!(
            "[render] {}: {} of {} paths drawn, {} missing geometry, {} stops",
            mode.mode, mode.rendered_paths, mode.referenced_paths, mode.missing_geometry, mode.stops,
        );
    }
    if !report.warnings.is_empty() {
        eprintln!("{} dataset(s) could not be used:", report.warnings.len());
        for warning in &report.warnings {
            eprintln!("  {}: {}", warning.dataset, warning.message);
        }
    }
}
