// ── Onboarding domain model ──
//
// Devices as submitted, the states they move through, and the records a
// batch hands back.

pub mod device;
pub mod outcome;
pub mod state;
pub mod version;

pub use device::{AttachmentSpec, ControlDevice, Device, DeviceKind, EdgeDevice};
pub use outcome::{BatchError, BatchReport, BatchStatus, OnboardingOutcome};
pub use state::DeviceState;
pub use version::{ManagerVersion, VersionParseError};
