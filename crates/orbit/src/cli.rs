//! Clap derive structures for the `orbit` CLI.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// orbit -- onboard SD-WAN controllers, validators and edges
#[derive(Debug, Parser)]
#[command(
    name = "orbit",
    version,
    about = "Onboard SD-WAN devices into a Manager",
    long_about = "Registers controllers and validators, installs edge certificates,\n\
        waits for control connections and attaches templates or\n\
        configuration groups, for a whole inventory in one batch.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Settings file (defaults to orbit.toml in the config directory)
    #[arg(long, env = "ORBIT_SETTINGS", global = true)]
    pub settings: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'o', default_value = "table", global = true)]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// YAML
    Yaml,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Onboard every device in an inventory file
    Onboard(OnboardArgs),

    /// Validate an inventory file without contacting the Manager
    Check(CheckArgs),

    /// Inspect or initialise the settings file
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct OnboardArgs {
    /// Inventory file (.yaml, .yml or .json)
    pub inventory: PathBuf,

    /// Devices onboarded concurrently
    #[arg(long, short = 'w')]
    pub workers: Option<usize>,

    /// Cancel the whole batch on the first device failure
    #[arg(long)]
    pub fail_fast: bool,

    /// Re-run devices that are already onboarded
    #[arg(long)]
    pub no_skip_existing: bool,

    /// Start edges without waiting for controllers and validators
    #[arg(long)]
    pub no_wait_for_control_plane: bool,

    /// Batch deadline, in seconds or as a duration such as 15m
    #[arg(long, value_parser = parse_deadline)]
    pub deadline: Option<Duration>,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Inventory file (.yaml, .yml or .json)
    pub inventory: PathBuf,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the settings file path
    Path,

    /// Print the effective settings (file and environment)
    Show,

    /// Write the default settings to the settings file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn parse_deadline(raw: &str) -> Result<Duration, String> {
    if let Ok(secs) = raw.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(raw).map_err(|e| format!("invalid duration '{raw}': {e}"))
}
