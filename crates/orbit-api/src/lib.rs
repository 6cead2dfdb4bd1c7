// orbit-api: Async Rust client for the SD-WAN Manager REST API

pub mod auth;
pub mod client;
pub mod config_groups;
pub mod error;
pub mod inventory;
pub mod models;
pub mod request;
pub mod system;
pub mod templates;
pub mod transport;

pub use client::ManagerClient;
pub use error::{Error, ErrorClass};
pub use models::{
    AboutInfo, ActionStatus, ConfigGroup, ConfigGroupVariable, DeviceCategory,
    DeviceRegistration, DeviceStatus, DeviceTemplate, EdgeValidity, InventoryDevice, Personality,
    TaskProgress, TemplateAttachment, TemplateInput,
};
pub use request::{ManagerRequest, ManagerResponse};
pub use transport::{TlsMode, TransportConfig};
