use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "frag3d CLI - Builds 3D models of fragment-based molecular graphs and closes their rings.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Assemble a building-block graph into 3D coordinates and close its rings.
    Build(BuildArgs),
}

/// Arguments for the `build` subcommand.
#[derive(Args, Debug)]
pub struct BuildArgs {
    // --- Core Arguments ---
    /// Path to the building-block graph in JSON format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub graph: PathBuf,

    /// Path to the building-block library in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub library: PathBuf,

    /// Path for the output SD file.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Path to an optional job configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    // --- Builder Overrides ---
    /// Seed for the placement of atom-less vertices.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Replace ring-closing placeholder pairs by direct bonds during assembly.
    #[arg(long)]
    pub remove_ring_placeholders: bool,

    // --- Ring-Closure Overrides ---
    /// Skip ring closure and cap every ring-closing attractor.
    #[arg(long)]
    pub no_ring_closure: bool,

    /// Override the Tinker work directory.
    #[arg(long, value_name = "PATH")]
    pub work_dir: Option<PathBuf>,

    /// Number of ranked candidates to write.
    #[arg(short = 'n', long, default_value_t = 1, value_name = "INT")]
    pub num_candidates: usize,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S ring-closure.distance-tolerance=0.8
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}
