// ── Per-device onboarding state ──

use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::FailureKind;

/// Where a device is in its onboarding run.
///
/// Stages only move forward; `Skipped` and `Failed` are terminal
/// alternates reachable from the stages noted on each variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceState {
    Pending,
    Authenticating,
    Accepted,
    CertPending,
    CertInstalled,
    Reachable,
    Attaching,
    Ready,
    /// Already onboarded; reachable only from `Pending`.
    Skipped,
    /// Reachable from any non-terminal state.
    Failed(FailureKind),
}

impl DeviceState {
    fn stage_rank(self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Authenticating => Some(1),
            Self::Accepted => Some(2),
            Self::CertPending => Some(3),
            Self::CertInstalled => Some(4),
            Self::Reachable => Some(5),
            Self::Attaching => Some(6),
            Self::Ready => Some(7),
            Self::Skipped | Self::Failed(_) => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ready | Self::Skipped | Self::Failed(_))
    }

    /// `Ready` or `Skipped`.
    pub fn is_success(self) -> bool {
        matches!(self, Self::Ready | Self::Skipped)
    }

    pub fn failure(self) -> Option<FailureKind> {
        match self {
            Self::Failed(kind) => Some(kind),
            _ => None,
        }
    }

    /// Whether moving from `self` to `next` keeps the run moving forward.
    pub fn can_advance_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            Self::Failed(_) => true,
            Self::Skipped => self == Self::Pending,
            _ => match (self.stage_rank(), next.stage_rank()) {
                (Some(from), Some(to)) => to > from,
                _ => false,
            },
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("Pending"),
            Self::Authenticating => f.write_str("Authenticating"),
            Self::Accepted => f.write_str("Accepted"),
            Self::CertPending => f.write_str("CertPending"),
            Self::CertInstalled => f.write_str("CertInstalled"),
            Self::Reachable => f.write_str("Reachable"),
            Self::Attaching => f.write_str("Attaching"),
            Self::Ready => f.write_str("Ready"),
            Self::Skipped => f.write_str("Skipped"),
            Self::Failed(kind) => write!(f, "Failed({kind})"),
        }
    }
}

impl Serialize for DeviceState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
