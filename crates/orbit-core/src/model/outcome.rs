// ── Per-device and per-batch results ──

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Serialize, Serializer};

use super::device::{Device, DeviceKind};
use super::state::DeviceState;
use crate::error::{CoreError, FailureKind};

/// Final record for one device. Produced once, never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct OnboardingOutcome {
    pub identifier: String,
    pub kind: DeviceKind,
    pub state: DeviceState,
    /// Controller-assigned identity, once learned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "elapsed_secs", serialize_with = "as_secs")]
    pub elapsed: Duration,
    /// Every state the device passed through, in order.
    pub visited: Vec<DeviceState>,
}

impl OnboardingOutcome {
    /// Outcome for a device that never ran.
    pub fn not_started(device: &Device, error: &CoreError) -> Self {
        let state = DeviceState::Failed(error.kind());
        Self {
            identifier: device.identifier(),
            kind: device.kind(),
            state,
            uuid: None,
            error: Some(error.to_string()),
            elapsed: Duration::ZERO,
            visited: vec![DeviceState::Pending, state],
        }
    }

    pub fn is_success(&self) -> bool {
        self.state.is_success()
    }

    pub fn failure(&self) -> Option<FailureKind> {
        self.state.failure()
    }
}

fn as_secs<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(elapsed.as_secs_f64())
}

/// Aggregate status of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum BatchStatus {
    /// Every device is `Ready` or `Skipped`.
    AllReady,
    PartialFailure,
    /// No device succeeded.
    Failed,
    /// The deadline or an external cancel stopped the batch.
    Cancelled,
}

/// Batch-level failure: session never established (or its first inventory
/// read failed), or the first fatal failure in fail-fast mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchError {
    pub kind: FailureKind,
    pub message: String,
    /// Device whose failure stopped the batch; `None` when the session
    /// itself failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

impl BatchError {
    pub fn is_session_failure(&self) -> bool {
        self.device.is_none()
    }
}

impl From<&CoreError> for BatchError {
    fn from(err: &CoreError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            device: None,
        }
    }
}

/// Everything a batch run returns: one outcome per submitted device.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub status: BatchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<BatchError>,
    pub outcomes: BTreeMap<String, OnboardingOutcome>,
    #[serde(rename = "elapsed_secs", serialize_with = "as_secs")]
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn new(
        outcomes: BTreeMap<String, OnboardingOutcome>,
        error: Option<BatchError>,
        cancelled: bool,
        elapsed: Duration,
    ) -> Self {
        let succeeded = outcomes.values().filter(|o| o.is_success()).count();
        let status = if error.is_none() && succeeded == outcomes.len() {
            BatchStatus::AllReady
        } else if cancelled {
            BatchStatus::Cancelled
        } else if succeeded == 0 {
            BatchStatus::Failed
        } else {
            BatchStatus::PartialFailure
        };
        Self {
            status,
            error,
            outcomes,
            elapsed,
        }
    }

    pub fn outcome(&self, identifier: &str) -> Option<&OnboardingOutcome> {
        self.outcomes.get(identifier)
    }

    /// Number of outcomes in each final state, for summaries.
    pub fn counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for outcome in self.outcomes.values() {
            let key = match outcome.state {
                DeviceState::Failed(_) => "Failed".to_owned(),
                other => other.to_string(),
            };
            *counts.entry(key).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::model::device::EdgeDevice;

    fn outcome(id: &str, state: DeviceState) -> (String, OnboardingOutcome) {
        (
            id.to_owned(),
            OnboardingOutcome {
                identifier: id.to_owned(),
                kind: DeviceKind::Edge,
                state,
                uuid: None,
                error: None,
                elapsed: Duration::from_secs(1),
                visited: vec![DeviceState::Pending, state],
            },
        )
    }

    #[test]
    fn status_reflects_mix_of_outcomes() {
        let all = BatchReport::new(
            [outcome("a", DeviceState::Ready), outcome("b", DeviceState::Skipped)].into(),
            None,
            false,
            Duration::ZERO,
        );
        assert_eq!(all.status, BatchStatus::AllReady);

        let partial = BatchReport::new(
            [
                outcome("a", DeviceState::Ready),
                outcome("b", DeviceState::Failed(FailureKind::DeviceNotFound)),
            ]
            .into(),
            None,
            false,
            Duration::ZERO,
        );
        assert_eq!(partial.status, BatchStatus::PartialFailure);
        assert_eq!(partial.counts().get("Failed"), Some(&1));

        let cancelled = BatchReport::new(
            [outcome("a", DeviceState::Failed(FailureKind::Cancelled))].into(),
            None,
            true,
            Duration::ZERO,
        );
        assert_eq!(cancelled.status, BatchStatus::Cancelled);

        let failed = BatchReport::new(
            [outcome("a", DeviceState::Failed(FailureKind::Remote))].into(),
            None,
            false,
            Duration::ZERO,
        );
        assert_eq!(failed.status, BatchStatus::Failed);
    }

    #[test]
    fn not_started_outcome_carries_kind() {
        let device = Device::Edge(EdgeDevice::new("SN1", Ipv4Addr::new(1, 1, 1, 1), 1));
        let out = OnboardingOutcome::not_started(&device, &CoreError::Cancelled);
        assert_eq!(out.state, DeviceState::Failed(FailureKind::Cancelled));
        assert_eq!(out.identifier, "SN1");
        assert!(out.uuid.is_none());
        assert_eq!(BatchStatus::PartialFailure.to_string(), "partial-failure");
    }
}
