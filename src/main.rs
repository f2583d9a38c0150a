use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

use transitmap::cli::{Cli, Commands};
use transitmap::commands::{refresh, render};

/// -v selects info, -vv debug, -vvv trace; RUST_LOG overrides.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    pretty_env_logger::formatted_builder()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match &cli.command {
        Commands::Render(args) => render::run(&cli, args),
        Commands::Refresh(args) => refresh::run(&cli, args),
    }
}
