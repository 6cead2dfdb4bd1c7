// ── Settings file ───────────────────────────────────────────────────
//
// Flat TOML table so every key maps to one ORBIT_<KEY> variable.
// Precedence: built-in defaults < orbit.toml < environment. The CLI
// applies its flags on top of the resulting OnboardingConfig.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use orbit_core::retry::default_retryable;
use orbit_core::{ManagerVersion, OnboardingConfig, PollSettings, RetryPolicy};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    /// Concurrent device runs.
    pub workers: usize,
    pub fail_fast: bool,
    pub skip_existing: bool,
    /// Finish controllers and validators before any edge starts.
    pub wait_for_control_plane: bool,
    /// Whole-batch deadline; none when absent.
    pub deadline_secs: Option<u64>,

    pub device_username: String,
    /// Tried before a device's own password when registering it.
    pub default_device_password: String,
    pub config_group_min_version: String,

    pub session_lifetime_secs: u64,
    pub request_timeout_secs: u64,

    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_jitter_ms: u64,
    pub retry_max_delay_ms: u64,

    pub cert_poll_interval_secs: u64,
    pub cert_poll_timeout_secs: u64,
    pub reachability_poll_interval_secs: u64,
    pub reachability_poll_timeout_secs: u64,
    pub attachment_poll_interval_secs: u64,
    pub attachment_poll_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            workers: 4,
            fail_fast: false,
            skip_existing: true,
            wait_for_control_plane: true,
            deadline_secs: None,
            device_username: "admin".into(),
            default_device_password: "admin".into(),
            config_group_min_version: "20.12.0".into(),
            session_lifetime_secs: 25 * 60,
            request_timeout_secs: 30,
            retry_max_attempts: 5,
            retry_base_delay_ms: 2_000,
            retry_jitter_ms: 500,
            retry_max_delay_ms: 60_000,
            cert_poll_interval_secs: 10,
            cert_poll_timeout_secs: 300,
            reachability_poll_interval_secs: 10,
            reachability_poll_timeout_secs: 600,
            attachment_poll_interval_secs: 10,
            attachment_poll_timeout_secs: 600,
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate and convert into the engine's batch configuration.
    pub fn to_onboarding_config(&self) -> Result<OnboardingConfig, ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::invalid("workers", "must be at least 1"));
        }
        if self.retry_max_attempts == 0 {
            return Err(ConfigError::invalid("retry_max_attempts", "must be at least 1"));
        }
        let config_group_min_version: ManagerVersion = self
            .config_group_min_version
            .parse()
            .map_err(|e| ConfigError::invalid("config_group_min_version", format!("{e}")))?;

        Ok(OnboardingConfig {
            workers: self.workers,
            fail_fast: self.fail_fast,
            skip_existing: self.skip_existing,
            wait_for_control_plane: self.wait_for_control_plane,
            deadline: self.deadline_secs.map(Duration::from_secs),
            device_username: self.device_username.clone(),
            default_device_password: SecretString::from(self.default_device_password.clone()),
            config_group_min_version,
            session_lifetime: Duration::from_secs(self.session_lifetime_secs),
            retry: RetryPolicy {
                max_attempts: self.retry_max_attempts,
                base_delay: Duration::from_millis(self.retry_base_delay_ms),
                jitter: Duration::from_millis(self.retry_jitter_ms),
                max_delay: Duration::from_millis(self.retry_max_delay_ms),
                retryable: default_retryable(),
            },
            cert_poll: poll(
                "cert_poll",
                self.cert_poll_interval_secs,
                self.cert_poll_timeout_secs,
            )?,
            reachability_poll: poll(
                "reachability_poll",
                self.reachability_poll_interval_secs,
                self.reachability_poll_timeout_secs,
            )?,
            attachment_poll: poll(
                "attachment_poll",
                self.attachment_poll_interval_secs,
                self.attachment_poll_timeout_secs,
            )?,
        })
    }
}

/// Longest accepted poll timeout: 30 days.
const MAX_POLL_TIMEOUT_SECS: u64 = 30 * 24 * 3600;

fn poll(name: &str, interval: u64, timeout: u64) -> Result<PollSettings, ConfigError> {
    if interval == 0 {
        return Err(ConfigError::invalid(
            format!("{name}_interval_secs"),
            "must be at least 1",
        ));
    }
    if !(1..=MAX_POLL_TIMEOUT_SECS).contains(&timeout) {
        return Err(ConfigError::invalid(
            format!("{name}_timeout_secs"),
            format!("must be between 1 and {MAX_POLL_TIMEOUT_SECS}"),
        ));
    }
    Ok(PollSettings::new(
        Duration::from_secs(interval),
        Duration::from_secs(timeout),
    ))
}

// ── Settings file path ──────────────────────────────────────────────

/// `orbit.toml` in the platform config directory.
pub fn settings_path() -> PathBuf {
    ProjectDirs::from("io", "orbit", "orbit").map_or_else(
        || PathBuf::from(".orbit").join("orbit.toml"),
        |dirs| dirs.config_dir().join("orbit.toml"),
    )
}

// ── Loading and saving ──────────────────────────────────────────────

/// Load settings from the default path and the environment.
pub fn load_settings() -> Result<Settings, ConfigError> {
    load_settings_from(&settings_path())
}

/// Load settings from `path` (a missing file is fine) and the environment.
pub fn load_settings_from(path: &Path) -> Result<Settings, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Settings::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("ORBIT_"));

    Ok(figment.extract()?)
}

/// Write `settings` as TOML to `path`, creating parent directories.
pub fn save_settings(path: &Path, settings: &Settings) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(settings)?)?;
    Ok(())
}
