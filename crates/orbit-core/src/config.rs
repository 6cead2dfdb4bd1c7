// ── Runtime onboarding configuration ──
//
// These types describe *how* to reach the Manager and how a batch behaves.
// They carry credential data and tuning, but never touch disk: orbit-config
// builds them from files and hands them in.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::model::ManagerVersion;
use crate::retry::RetryPolicy;

/// Position of a credential in the fallback order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display, serde::Serialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CredentialRank {
    Primary,
    Fallback,
}

/// A username/secret pair. `Debug` never shows the secret.
#[derive(Debug, Clone)]
pub struct Credential {
    pub username: String,
    pub password: SecretString,
    pub rank: CredentialRank,
}

/// Where and how to reach the Manager.
///
/// Immutable once built; owned by the `ManagerSession`.
#[derive(Debug, Clone)]
pub struct ManagerEndpoint {
    url: Url,
    credentials: Vec<Credential>,
    verify_tls: bool,
    timeout: Duration,
}

impl ManagerEndpoint {
    /// An endpoint with a single primary credential, TLS verification off
    /// (lab Managers use self-signed certificates) and a 30s timeout.
    pub fn new(url: Url, username: impl Into<String>, password: SecretString) -> Self {
        Self {
            url,
            credentials: vec![Credential {
                username: username.into(),
                password,
                rank: CredentialRank::Primary,
            }],
            verify_tls: false,
            timeout: Duration::from_secs(30),
        }
    }

    /// Add the fallback credential tried after the primary one.
    pub fn with_fallback(mut self, username: impl Into<String>, password: SecretString) -> Self {
        self.credentials.retain(|c| c.rank != CredentialRank::Fallback);
        self.credentials.push(Credential {
            username: username.into(),
            password,
            rank: CredentialRank::Fallback,
        });
        self
    }

    pub fn with_tls_verify(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Credentials in rank order.
    pub fn credentials(&self) -> &[Credential] {
        &self.credentials
    }

    pub fn verify_tls(&self) -> bool {
        self.verify_tls
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Interval and overall timeout of one polled condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollSettings {
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// Batch-wide behaviour.
#[derive(Debug, Clone)]
pub struct OnboardingConfig {
    /// Concurrent device runs.
    pub workers: usize,
    /// Cancel the whole batch on the first failed device.
    pub fail_fast: bool,
    /// Report devices already onboarded as `Skipped`.
    pub skip_existing: bool,
    /// Onboard controllers and validators first and start edges only once
    /// every control device has finished.
    pub wait_for_control_plane: bool,
    /// Overall deadline for the batch.
    pub deadline: Option<Duration>,
    /// Account the Manager uses to log into controllers and validators.
    pub device_username: String,
    /// Tried before the device's own password when registering it.
    pub default_device_password: SecretString,
    /// Lowest Manager version with configuration groups.
    pub config_group_min_version: ManagerVersion,
    /// Re-login proactively once the session is this old.
    pub session_lifetime: Duration,
    pub retry: RetryPolicy,
    pub cert_poll: PollSettings,
    pub reachability_poll: PollSettings,
    pub attachment_poll: PollSettings,
}

impl Default for OnboardingConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            fail_fast: false,
            skip_existing: true,
            wait_for_control_plane: true,
            deadline: None,
            device_username: "admin".into(),
            default_device_password: SecretString::from("admin".to_string()),
            config_group_min_version: ManagerVersion::new(20, 12, 0),
            session_lifetime: Duration::from_secs(25 * 60),
            retry: RetryPolicy::default(),
            cert_poll: PollSettings::new(Duration::from_secs(10), Duration::from_secs(300)),
            reachability_poll: PollSettings::new(Duration::from_secs(10), Duration::from_secs(600)),
            attachment_poll: PollSettings::new(Duration::from_secs(10), Duration::from_secs(600)),
        }
    }
}
