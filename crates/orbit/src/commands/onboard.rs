//! `orbit onboard`: run one batch against the inventory's Manager.

use orbit_config::ConfigError;
use orbit_core::{CancellationToken, OnboardingConfig, OnboardingCoordinator};
use tracing::{debug, warn};

use crate::cli::{GlobalOpts, OnboardArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(args: OnboardArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let settings = super::load_settings(global)?;
    let mut config = settings.to_onboarding_config()?;
    apply_flags(&mut config, &args)?;

    let inventory = orbit_config::load_inventory(&args.inventory, settings.request_timeout())?;
    let manager_url = inventory.endpoint.url().to_string();
    debug!(
        manager = %manager_url,
        devices = inventory.devices.len(),
        workers = config.workers,
        "inventory loaded"
    );

    let coordinator = OnboardingCoordinator::from_endpoint(inventory.endpoint, config)?;

    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn(cancel_on_ctrl_c(cancel.clone()));
    let report = coordinator.run(inventory.devices, &cancel).await;
    interrupt.abort();
    let report = report?;

    let color = output::should_color(global.color);
    output::print_output(
        &output::render_report(global.output, &report, color)?,
        global.quiet,
    );

    CliError::from_report(&report, &manager_url).map_or(Ok(()), Err)
}

/// Command-line flags override the settings file.
fn apply_flags(config: &mut OnboardingConfig, args: &OnboardArgs) -> Result<(), CliError> {
    if let Some(workers) = args.workers {
        if workers == 0 {
            return Err(ConfigError::Validation {
                field: "--workers".into(),
                reason: "must be at least 1".into(),
            }
            .into());
        }
        config.workers = workers;
    }
    if args.fail_fast {
        config.fail_fast = true;
    }
    if args.no_skip_existing {
        config.skip_existing = false;
    }
    if args.no_wait_for_control_plane {
        config.wait_for_control_plane = false;
    }
    if args.deadline.is_some() {
        config.deadline = args.deadline;
    }
    Ok(())
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        warn!("interrupted, cancelling batch");
        cancel.cancel();
    }
}
