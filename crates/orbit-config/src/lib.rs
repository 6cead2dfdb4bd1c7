//! Configuration for the orbit onboarding tool.
//!
//! Two inputs, both translated into `orbit_core` types:
//!
//! - **Settings** (`orbit.toml` + `ORBIT_*` environment): how a batch
//!   behaves. Becomes an [`orbit_core::OnboardingConfig`].
//! - **Inventory** (YAML or JSON): which Manager to talk to and which
//!   devices to onboard. Becomes a [`orbit_core::ManagerEndpoint`] and a
//!   list of [`orbit_core::Device`].

mod inventory;
mod settings;

use thiserror::Error;

pub use inventory::{
    ControlEntry, EdgeEntry, Inventory, InventoryFile, InventoryFormat, ManagerSection, Scalar,
    load_inventory, parse_inventory,
};
pub use settings::{Settings, load_settings, load_settings_from, save_settings, settings_path};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML inventory: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid JSON inventory: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to serialize settings: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("settings loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl ConfigError {
    fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
