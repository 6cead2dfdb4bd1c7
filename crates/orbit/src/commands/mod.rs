//! Command handlers.

pub mod check;
pub mod config_cmd;
pub mod onboard;

use std::path::PathBuf;

use orbit_config::Settings;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// `--settings` if given, else the platform default.
pub fn settings_path(global: &GlobalOpts) -> PathBuf {
    global
        .settings
        .clone()
        .unwrap_or_else(orbit_config::settings_path)
}

/// Effective settings: defaults, then the settings file, then `ORBIT_*`.
pub fn load_settings(global: &GlobalOpts) -> Result<Settings, CliError> {
    Ok(orbit_config::load_settings_from(&settings_path(global))?)
}
