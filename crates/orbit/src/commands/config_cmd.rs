//! Config subcommand handlers.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = super::settings_path(global);
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let settings = super::load_settings(global)?;
            output::print_output(&toml::to_string_pretty(&settings)?, global.quiet);
            Ok(())
        }

        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                return Err(CliError::SettingsExist {
                    path: path.display().to_string(),
                });
            }
            orbit_config::save_settings(&path, &orbit_config::Settings::default())?;
            if !global.quiet {
                eprintln!("Wrote default settings to {}", path.display());
            }
            Ok(())
        }
    }
}
