//! Command-line arguments for the bronze loader.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "bronze",
    version,
    about = "Load survivoR datasets into the bronze warehouse layer",
    long_about = "Load survivoR datasets into the bronze warehouse layer.\n\n\
                  Each dataset is remediated, validated against its target table and the\n\
                  datasets loaded before it, and upserted in its own transaction."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for humans, json for machine parsing).
    #[arg(long = "log-format", value_enum, default_value = "pretty", global = true)]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Load dataset files from a directory into the warehouse.
    Load(LoadArgs),

    /// List the configured datasets in load order.
    Datasets(ConfigArgs),
}

#[derive(Args)]
pub struct ConfigArgs {
    /// TOML load configuration (default: built-in survivoR catalog).
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Args)]
pub struct LoadArgs {
    /// Directory holding one JSON or CSV file per dataset.
    #[arg(value_name = "DATA_DIR")]
    pub data_dir: PathBuf,

    #[command(flatten)]
    pub config: ConfigArgs,

    /// PostgreSQL connection string.
    #[arg(long = "database-url", env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: String,

    /// Load only these datasets (comma separated, configuration order kept).
    #[arg(long = "datasets", value_delimiter = ',', value_name = "NAMES")]
    pub datasets: Vec<String>,

    /// Directory for per-dataset JSON validation summaries.
    #[arg(long = "report-dir", value_name = "DIR")]
    pub report_dir: Option<PathBuf>,

    /// Run identifier (default: a random UUID).
    #[arg(long = "run-id")]
    pub run_id: Option<String>,

    /// Environment name stored with the run record.
    #[arg(long = "environment", env = "BRONZE_ENVIRONMENT")]
    pub environment: Option<String>,

    /// Source location stored with the run record.
    #[arg(long = "source-url", value_name = "URL")]
    pub source_url: Option<String>,

    /// Keep loading later datasets after one fails.
    #[arg(long = "continue-on-error")]
    pub continue_on_error: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
