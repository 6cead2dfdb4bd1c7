//! CLI error types with miette diagnostics.
//!
//! Maps `ConfigError`, `CoreError` and non-successful batch reports into
//! user-facing errors with help text and a process exit code.

use miette::Diagnostic;
use thiserror::Error;

use orbit_config::ConfigError;
use orbit_core::{BatchReport, BatchStatus, CoreError};

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const SESSION: i32 = 3;
    pub const CANCELLED: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Batch results ────────────────────────────────────────────────

    #[error("Could not establish a Manager session at {url}: {message}")]
    #[diagnostic(
        code(orbit::session_failed),
        help(
            "Check the manager URL and credentials in the inventory.\n\
             Lab Managers with self-signed certificates need `verify: false`."
        )
    )]
    SessionFailed { url: String, message: String },

    #[error("{failed} of {total} devices failed to onboard")]
    #[diagnostic(
        code(orbit::devices_failed),
        help("Re-run with -v for per-device transitions; onboarded devices are skipped next time.")
    )]
    DevicesFailed { failed: usize, total: usize },

    #[error("Batch stopped after {first} failed: {message}")]
    #[diagnostic(
        code(orbit::fail_fast),
        help("Devices cancelled by fail-fast were left as they were; fix {first} and re-run.")
    )]
    FailFast { first: String, message: String },

    #[error("Batch cancelled before every device finished ({unfinished} unfinished)")]
    #[diagnostic(
        code(orbit::cancelled),
        help("Raise --deadline or deadline_secs if the Manager is slow to converge.")
    )]
    Cancelled { unfinished: usize },

    // ── Input ────────────────────────────────────────────────────────

    #[error(transparent)]
    #[diagnostic(
        code(orbit::config),
        help("Check the inventory and settings files; run `orbit config show` for effective settings.")
    )]
    Config(#[from] ConfigError),

    #[error("Invalid batch: {message}")]
    #[diagnostic(code(orbit::invalid_batch), help("Every device must appear once in the inventory."))]
    InvalidBatch { message: String },

    #[error("Settings file already exists: {path}")]
    #[diagnostic(code(orbit::settings_exist), help("Use --force to overwrite it."))]
    SettingsExist { path: String },

    // ── Engine ───────────────────────────────────────────────────────

    #[error(transparent)]
    #[diagnostic(code(orbit::engine))]
    Engine(CoreError),

    // ── IO / Serialization ───────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to render YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to render TOML: {0}")]
    Toml(#[from] toml::ser::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::SessionFailed { .. } => exit_code::SESSION,
            Self::Cancelled { .. } => exit_code::CANCELLED,
            Self::Config(_) | Self::InvalidBatch { .. } | Self::SettingsExist { .. } => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }

    /// The error a finished batch maps to, if it did not fully succeed.
    pub fn from_report(report: &BatchReport, manager_url: &str) -> Option<Self> {
        let total = report.outcomes.len();
        let failed = report.outcomes.values().filter(|o| !o.is_success()).count();

        if let Some(error) = &report.error {
            return Some(match &error.device {
                None => Self::SessionFailed {
                    url: manager_url.to_owned(),
                    message: error.message.clone(),
                },
                Some(device) => Self::FailFast {
                    first: device.clone(),
                    message: error.message.clone(),
                },
            });
        }

        match report.status {
            BatchStatus::AllReady => None,
            BatchStatus::Cancelled => Some(Self::Cancelled { unfinished: failed }),
            BatchStatus::PartialFailure | BatchStatus::Failed => {
                Some(Self::DevicesFailed { failed, total })
            }
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidBatch { message } => Self::InvalidBatch { message },
            other => Self::Engine(other),
        }
    }
}
