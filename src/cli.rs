use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint};
use std::path::PathBuf;

/// Transit routes over a census population-density map
#[derive(Parser, Debug)]
#[command(name = "transitmap", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// TOML configuration file (defaults describe Maryland)
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render the layered map (forbids stdout)
    Render(RenderArgs),

    /// Re-download every transit feed, replacing cached copies
    Refresh(RefreshArgs),
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, ValueEnum)]
pub enum OutputFormat { Html, Svg, Json }

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Html => "html",
            OutputFormat::Svg => "svg",
            OutputFormat::Json => "json",
        }
    }
}

#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Transit modes to draw, e.g. --modes "Light Rail" "MARC Train" (all when omitted)
    #[arg(long, num_args = 1..)]
    pub modes: Vec<String>,

    /// Leave out the stop layers
    #[arg(long)]
    pub no_stops: bool,

    /// Leave out the population-density layer
    #[arg(long)]
    pub no_population: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Html)]
    pub format: OutputFormat,

    /// Output file (defaults to maryland_transit_map.<format>)
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,

    /// Overwrite the output file and re-fetch every dataset
    #[arg(long)]
    pub force: bool,

    /// Render only from cached datasets
    #[arg(long)]
    pub offline: bool,
}

impl RenderArgs {
    pub fn output_path(&self) -> PathBuf {
        self.output.clone()
            .unwrap_or_else(|| PathBuf::from(format!("maryland_transit_map.{}", self.format.extension())))
    }
}

#[derive(Args, Debug)]
pub struct RefreshArgs {
    /// Also drop cached census tables and block-group geometry
    #[arg(long)]
    pub all: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_arguments_parse() {
        let cli = Cli::try_parse_from([
            "transitmap", "-vv", "render", "--modes", "Light Rail", "MARC Train", "--no-stops", "--format", "svg",
        ]).unwrap();

        assert_eq!(cli.verbose, 2);
        let Commands::Render(args) = cli.command else { panic!("expected render") };
        assert_eq!(args.modes, ["Light Rail", "MARC Train"]);
        assert!(args.no_stops && !args.no_population);
        assert_eq!(args.output_path(), PathBuf::from("maryland_transit_map.svg"));
    }

    #[test]
    fn global_config_after_subcommand() {
        let cli = Cli::try_parse_from(["transitmap", "refresh", "--all", "--config", "md.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("md.toml")));
        assert!(matches!(cli.command, Commands::Refresh(RefreshArgs { all: true })));
    }
}
