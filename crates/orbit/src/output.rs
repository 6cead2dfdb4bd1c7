//! Output formatting: table, JSON, YAML.
//!
//! Table uses `tabled`, structured formats serialize the report as-is.

use std::io::{self, IsTerminal, Write};
use std::time::Duration;

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use orbit_core::{BatchReport, BatchStatus, Device, DeviceState, OnboardingOutcome};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color ────────────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

fn paint_state(state: DeviceState, color: bool) -> String {
    let text = state.to_string();
    if !color {
        return text;
    }
    match state {
        DeviceState::Ready => text.green().to_string(),
        DeviceState::Skipped => text.cyan().to_string(),
        DeviceState::Failed(_) => text.red().to_string(),
        _ => text.yellow().to_string(),
    }
}

fn paint_status(status: BatchStatus, color: bool) -> String {
    let text = status.to_string();
    if !color {
        return text;
    }
    match status {
        BatchStatus::AllReady => text.green().bold().to_string(),
        BatchStatus::PartialFailure => text.yellow().bold().to_string(),
        BatchStatus::Failed | BatchStatus::Cancelled => text.red().bold().to_string(),
    }
}

// ── Rows ─────────────────────────────────────────────────────────────

#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "Device")]
    identifier: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "UUID")]
    uuid: String,
    #[tabled(rename = "Elapsed")]
    elapsed: String,
    #[tabled(rename = "Error")]
    error: String,
}

impl OutcomeRow {
    fn new(outcome: &OnboardingOutcome, color: bool) -> Self {
        Self {
            identifier: outcome.identifier.clone(),
            kind: outcome.kind.to_string(),
            state: paint_state(outcome.state, color),
            uuid: outcome.uuid.clone().unwrap_or_else(|| "-".into()),
            elapsed: human_elapsed(outcome.elapsed),
            error: outcome.error.clone().unwrap_or_default(),
        }
    }
}

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Device")]
    identifier: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "System IP")]
    system_ip: String,
    #[tabled(rename = "Site")]
    site_id: String,
    #[tabled(rename = "Attachment")]
    attachment: String,
}

impl DeviceRow {
    fn new(device: &Device) -> Self {
        let (system_ip, site_id, attachment) = match device {
            Device::Controller(d) | Device::Validator(d) => (
                d.system_ip.map(|ip| ip.to_string()),
                d.site_id.map(|id| id.to_string()),
                None,
            ),
            Device::Edge(e) => (
                Some(e.system_ip.to_string()),
                Some(e.site_id.to_string()),
                e.attachment.as_ref().map(|a| match a {
                    orbit_core::AttachmentSpec::Template { name } => format!("template {name}"),
                    orbit_core::AttachmentSpec::ConfigGroup { name } => {
                        format!("config-group {name}")
                    }
                }),
            ),
        };
        Self {
            identifier: device.identifier(),
            kind: device.kind().to_string(),
            system_ip: system_ip.unwrap_or_else(|| "-".into()),
            site_id: site_id.unwrap_or_else(|| "-".into()),
            attachment: attachment.unwrap_or_else(|| "-".into()),
        }
    }
}

/// Whole seconds, or milliseconds under one second.
fn human_elapsed(elapsed: Duration) -> String {
    let rounded = if elapsed >= Duration::from_secs(1) {
        Duration::from_secs(elapsed.as_secs())
    } else {
        Duration::from_millis(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
    };
    humantime::format_duration(rounded).to_string()
}

// ── Renderers ────────────────────────────────────────────────────────

pub fn render_report(
    format: OutputFormat,
    report: &BatchReport,
    color: bool,
) -> Result<String, CliError> {
    match format {
        OutputFormat::Table => {
            let rows: Vec<OutcomeRow> = report
                .outcomes
                .values()
                .map(|o| OutcomeRow::new(o, color))
                .collect();
            let counts = report
                .counts()
                .iter()
                .map(|(state, n)| format!("{n} {state}"))
                .collect::<Vec<_>>()
                .join(", ");
            let mut text = String::new();
            if !rows.is_empty() {
                text.push_str(&render_table(&rows));
                text.push('\n');
            }
            text.push_str(&format!(
                "{} in {} ({})",
                paint_status(report.status, color),
                human_elapsed(report.elapsed),
                if counts.is_empty() { "no devices".into() } else { counts },
            ));
            if let Some(error) = &report.error {
                text.push_str(&format!("\nbatch error: {}", error.message));
            }
            Ok(text)
        }
        OutputFormat::Json => render_json(report),
        OutputFormat::Yaml => render_yaml(report),
    }
}

/// Devices an inventory would submit. Structured formats list identifiers
/// and kinds only; credentials never leave the loader.
pub fn render_devices(format: OutputFormat, devices: &[Device]) -> Result<String, CliError> {
    #[derive(serde::Serialize)]
    struct Entry {
        identifier: String,
        kind: orbit_core::DeviceKind,
    }

    match format {
        OutputFormat::Table => {
            let rows: Vec<DeviceRow> = devices.iter().map(DeviceRow::new).collect();
            Ok(render_table(&rows))
        }
        OutputFormat::Json | OutputFormat::Yaml => {
            let entries: Vec<Entry> = devices
                .iter()
                .map(|d| Entry {
                    identifier: d.identifier(),
                    kind: d.kind(),
                })
                .collect();
            if matches!(format, OutputFormat::Json) {
                render_json(&entries)
            } else {
                render_yaml(&entries)
            }
        }
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_json<T: serde::Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    Ok(serde_json::to_string_pretty(data)?)
}

fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    Ok(serde_yaml::to_string(data)?)
}
