//! Onboarding engine between `orbit-api` and the `orbit` binary.
//!
//! - **[`OnboardingCoordinator`]** runs a batch: one [`ManagerSession`],
//!   a bounded pool of [`DeviceStateMachine`] runs, one cancellation token,
//!   and a [`BatchReport`] with an outcome for every submitted device.
//!
//! - **[`ManagerSession`]** is the shared, self-refreshing login. Credentials
//!   are tried in rank order and an expired session is renewed by a single
//!   caller while the rest wait.
//!
//! - **[`RetryExecutor`]** retries transient remote failures with capped
//!   exponential backoff; fatal ones surface unchanged.
//!
//! - **[`AttachmentWorkflow`]** attaches a device template or, on Managers
//!   that support it, a configuration group to a reachable edge.
//!
//! The crate never reads files; `orbit-config` builds the
//! [`ManagerEndpoint`] and [`OnboardingConfig`] it consumes.

pub mod api;
pub mod attachment;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod machine;
pub mod model;
pub mod poll;
pub mod retry;
pub mod session;

// ── Primary re-exports ──────────────────────────────────────────────
pub use api::ManagerApi;
pub use attachment::AttachmentWorkflow;
pub use config::{Credential, CredentialRank, ManagerEndpoint, OnboardingConfig, PollSettings};
pub use coordinator::{OnboardingCoordinator, validate_batch};
pub use error::{CoreError, FailureKind};
pub use machine::{DeviceStateMachine, InventorySnapshot, RunContext};
pub use retry::{Classify, RetryExecutor, RetryFailure, RetryPolicy};
pub use session::ManagerSession;

// ── Model re-exports ────────────────────────────────────────────────
pub use model::{
    AttachmentSpec, BatchError, BatchReport, BatchStatus, ControlDevice, Device, DeviceKind,
    DeviceState, EdgeDevice, ManagerVersion, OnboardingOutcome,
};

// ── API re-exports needed by callers ────────────────────────────────
pub use orbit_api::ErrorClass;
pub use tokio_util::sync::CancellationToken;
