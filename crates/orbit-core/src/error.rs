// ── Core error types ──
//
// Domain errors from orbit-core. Every per-device failure ends up as a
// `FailureKind` inside an `OnboardingOutcome`; the batch only returns a
// `CoreError` for problems that stop the whole run. The `From<orbit_api::Error>`
// impl keeps a fatal API error intact so the caller sees it unchanged.

use serde::Serialize;
use thiserror::Error;

use crate::config::CredentialRank;
use crate::retry::RetryFailure;

/// Closed set of reasons a device can end in `Failed`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::IntoStaticStr,
)]
pub enum FailureKind {
    CredentialError,
    DeviceNotFound,
    OnboardingTimeout,
    TemplateNotFound,
    ConfigGroupNotFound,
    TemplateVariableError,
    UnsupportedFeature,
    RetryExhausted,
    Cancelled,
    AttachmentFailed,
    Remote,
    Internal,
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Authentication ───────────────────────────────────────────────
    /// None of the credentials authenticated. Secrets are never included.
    #[error("No credential authenticated (tried: {}): {message}", join_ranks(.tried))]
    Credential {
        tried: Vec<CredentialRank>,
        message: String,
    },

    #[error("Session is closed")]
    SessionClosed,

    // ── Inventory ────────────────────────────────────────────────────
    #[error("Device not found in Manager inventory: {identifier}")]
    DeviceNotFound { identifier: String },

    // ── Polling ──────────────────────────────────────────────────────
    #[error("Timed out after {timeout_secs}s waiting for {stage}")]
    OnboardingTimeout { stage: &'static str, timeout_secs: u64 },

    // ── Attachment ───────────────────────────────────────────────────
    #[error("Device template not found: {name}")]
    TemplateNotFound { name: String },

    #[error("Configuration group not found: {name}")]
    ConfigGroupNotFound { name: String },

    #[error("Missing required template variables: {}", .missing.join(", "))]
    TemplateVariable { missing: Vec<String> },

    #[error("{feature} requires Manager {required} or newer (found {found})")]
    UnsupportedFeature {
        feature: &'static str,
        required: String,
        found: String,
    },

    #[error("Manager task {task_id} failed: {message}")]
    AttachmentFailed { task_id: String, message: String },

    // ── Remote calls ─────────────────────────────────────────────────
    #[error("{operation} failed after {attempts} attempts: {source}")]
    RetryExhausted {
        operation: &'static str,
        attempts: u32,
        #[source]
        source: orbit_api::Error,
    },

    #[error(transparent)]
    Remote(orbit_api::Error),

    // ── Control ──────────────────────────────────────────────────────
    #[error("Cancelled before completion")]
    Cancelled,

    #[error("Invalid batch: {message}")]
    InvalidBatch { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// The structured failure kind recorded in an outcome.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Credential { .. } => FailureKind::CredentialError,
            Self::DeviceNotFound { .. } => FailureKind::DeviceNotFound,
            Self::OnboardingTimeout { .. } => FailureKind::OnboardingTimeout,
            Self::TemplateNotFound { .. } => FailureKind::TemplateNotFound,
            Self::ConfigGroupNotFound { .. } => FailureKind::ConfigGroupNotFound,
            Self::TemplateVariable { .. } => FailureKind::TemplateVariableError,
            Self::UnsupportedFeature { .. } => FailureKind::UnsupportedFeature,
            Self::AttachmentFailed { .. } => FailureKind::AttachmentFailed,
            Self::RetryExhausted { .. } => FailureKind::RetryExhausted,
            Self::Remote(err) if err.class() == orbit_api::ErrorClass::Decode => {
                FailureKind::Internal
            }
            Self::Remote(_) => FailureKind::Remote,
            Self::Cancelled => FailureKind::Cancelled,
            Self::SessionClosed | Self::InvalidBatch { .. } | Self::Internal(_) => {
                FailureKind::Internal
            }
        }
    }

    /// Whether the Manager refused the request itself (bad input,
    /// rejected credentials), as opposed to a transport or server fault.
    pub fn is_rejection(&self) -> bool {
        match self {
            Self::Remote(err) => matches!(
                err.class(),
                orbit_api::ErrorClass::BadRequest
                    | orbit_api::ErrorClass::Authentication
                    | orbit_api::ErrorClass::Conflict
            ),
            _ => false,
        }
    }
}

impl From<orbit_api::Error> for CoreError {
    fn from(err: orbit_api::Error) -> Self {
        Self::Remote(err)
    }
}

impl From<RetryFailure<orbit_api::Error>> for CoreError {
    fn from(failure: RetryFailure<orbit_api::Error>) -> Self {
        match failure {
            RetryFailure::Fatal(err) => Self::Remote(err),
            RetryFailure::Exhausted {
                operation,
                attempts,
                last,
            } => Self::RetryExhausted {
                operation,
                attempts,
                source: last,
            },
        }
    }
}

fn join_ranks(ranks: &[CredentialRank]) -> String {
    ranks
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
