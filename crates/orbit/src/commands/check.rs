//! `orbit check`: load and validate an inventory offline.

use crate::cli::{CheckArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

pub fn handle(args: &CheckArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let settings = super::load_settings(global)?;
    let inventory = orbit_config::load_inventory(&args.inventory, settings.request_timeout())?;
    orbit_core::validate_batch(&inventory.devices)?;

    output::print_output(
        &output::render_devices(global.output, &inventory.devices)?,
        global.quiet,
    );
    if !global.quiet {
        eprintln!(
            "{} devices for {}",
            inventory.devices.len(),
            inventory.endpoint.url()
        );
    }
    Ok(())
}
