// Wire types for the Manager REST API.
//
// Field names follow the Manager's JSON exactly (it mixes camelCase,
// kebab-case, and the historical `chasisNumber` spelling). Everything the
// onboarding flow does not read is left out; unknown fields are ignored.

use std::collections::HashMap;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ── Inventory ───────────────────────────────────────────────────────

/// Which inventory list to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceCategory {
    /// Control components: controllers, validators, managers.
    Controllers,
    /// WAN edge devices.
    Vedges,
}

impl DeviceCategory {
    pub fn path_segment(self) -> &'static str {
        match self {
            Self::Controllers => "controllers",
            Self::Vedges => "vedges",
        }
    }
}

/// A row from `/dataservice/system/device/{category}`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InventoryDevice {
    pub uuid: String,
    #[serde(rename = "deviceIP", default)]
    pub device_ip: Option<String>,
    #[serde(rename = "serialNumber", default)]
    pub serial_number: Option<String>,
    #[serde(rename = "chasisNumber", default)]
    pub chassis_number: Option<String>,
    #[serde(rename = "host-name", default)]
    pub host_name: Option<String>,
    #[serde(rename = "system-ip", default)]
    pub system_ip: Option<String>,
    #[serde(rename = "certInstallStatus", default)]
    pub cert_install_status: Option<String>,
    #[serde(default)]
    pub validity: Option<String>,
    #[serde(default)]
    pub personality: Option<String>,
}

impl InventoryDevice {
    /// `certInstallStatus` is `"Installed"` once the device holds its certificate.
    pub fn has_certificate_installed(&self) -> bool {
        self.cert_install_status
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("installed"))
    }

    /// Edges match on serial number, or on the chassis number that some
    /// platforms report in its place.
    pub fn matches_serial(&self, serial: &str) -> bool {
        self.serial_number.as_deref() == Some(serial)
            || self.chassis_number.as_deref() == Some(serial)
            || self.uuid == serial
    }
}

/// Control-component personality sent when registering a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Personality {
    Vsmart,
    Vbond,
}

/// Body for `POST /dataservice/system/device`.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceRegistration {
    #[serde(rename = "deviceIP")]
    pub device_ip: String,
    pub username: String,
    #[serde(serialize_with = "expose")]
    pub password: SecretString,
    pub personality: Personality,
    #[serde(rename = "generateCSR")]
    pub generate_csr: bool,
    pub protocol: &'static str,
}

impl DeviceRegistration {
    pub fn new(
        device_ip: impl Into<String>,
        username: impl Into<String>,
        password: SecretString,
        personality: Personality,
    ) -> Self {
        Self {
            device_ip: device_ip.into(),
            username: username.into(),
            password,
            personality,
            generate_csr: false,
            protocol: "DTLS",
        }
    }
}

fn expose<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

/// One entry of the edge allow-list body.
#[derive(Debug, Clone, Serialize)]
pub struct EdgeValidity {
    #[serde(rename = "chasisNumber")]
    pub chassis_number: String,
    #[serde(rename = "serialNumber")]
    pub serial_number: String,
    pub validity: &'static str,
}

impl EdgeValidity {
    pub fn valid(chassis_number: impl Into<String>, serial_number: impl Into<String>) -> Self {
        Self {
            chassis_number: chassis_number.into(),
            serial_number: serial_number.into(),
            validity: "valid",
        }
    }
}

// ── Monitoring ──────────────────────────────────────────────────────

/// A row from `/dataservice/device` (live device state).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DeviceStatus {
    #[serde(default)]
    pub uuid: String,
    /// The system IP.
    #[serde(rename = "deviceId", default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub reachability: Option<String>,
    /// Active control-plane sessions. The Manager reports this as a string.
    #[serde(rename = "controlConnections", default, deserialize_with = "lenient_count")]
    pub control_connections: u32,
}

impl DeviceStatus {
    pub fn is_reachable(&self) -> bool {
        self.control_connections > 0
    }
}

fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Num(u32),
        Text(String),
    }

    Ok(match Option::<Count>::deserialize(deserializer)? {
        Some(Count::Num(n)) => n,
        Some(Count::Text(s)) => s.trim().parse().unwrap_or(0),
        None => 0,
    })
}

/// `GET /dataservice/client/about`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AboutInfo {
    pub version: String,
    #[serde(rename = "applicationVersion", default)]
    pub application_version: Option<String>,
}

// ── Tasks ───────────────────────────────────────────────────────────

/// `GET /dataservice/device/action/status/{id}`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ActionStatus {
    #[serde(default)]
    pub summary: ActionSummary,
    #[serde(default)]
    pub data: Vec<ActionDevice>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ActionSummary {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub count: HashMap<String, u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ActionDevice {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub activity: Vec<String>,
}

/// Reduced view of a task's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskProgress {
    InProgress,
    Complete,
    Failed { message: String },
}

impl ActionStatus {
    /// Collapse the summary and per-device rows into a single verdict.
    ///
    /// A task is failed as soon as any status mentions failure; it is
    /// complete once the summary says `done` (or a row says `Success`).
    pub fn progress(&self) -> TaskProgress {
        let failed_count = self
            .summary
            .count
            .iter()
            .filter(|(k, _)| k.to_ascii_lowercase().contains("fail"))
            .map(|(_, v)| *v)
            .sum::<u64>();

        let statuses = self
            .summary
            .status
            .iter()
            .chain(self.data.iter().filter_map(|d| d.status.as_ref()))
            .map(|s| s.to_ascii_lowercase());

        let mut done = false;
        let mut failed = failed_count > 0;
        for status in statuses {
            if status.contains("fail") {
                failed = true;
            } else if status == "done" || status == "success" {
                done = true;
            }
        }

        if failed {
            let message = self
                .data
                .iter()
                .filter_map(|d| d.activity.last())
                .cloned()
                .next()
                .unwrap_or_else(|| "task reported failure".into());
            TaskProgress::Failed { message }
        } else if done {
            TaskProgress::Complete
        } else {
            TaskProgress::InProgress
        }
    }
}

/// `{"id": "..."}` returned by template attach and allow-list operations.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TaskHandle {
    pub id: String,
}

/// `{"parentTaskId": "..."}` returned by config-group deploy.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ParentTaskHandle {
    #[serde(rename = "parentTaskId")]
    pub parent_task_id: String,
}

// ── Templates ───────────────────────────────────────────────────────

/// A row from `/dataservice/template/device`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceTemplate {
    #[serde(rename = "templateId")]
    pub template_id: String,
    #[serde(rename = "templateName")]
    pub template_name: String,
    #[serde(rename = "deviceType", default)]
    pub device_type: Option<String>,
}

/// `POST /dataservice/template/device/config/input` response.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TemplateInput {
    #[serde(default)]
    pub header: TemplateInputHeader,
    #[serde(default)]
    pub data: Vec<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TemplateInputHeader {
    #[serde(default)]
    pub columns: Vec<TemplateColumn>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TemplateColumn {
    pub property: String,
    #[serde(default)]
    pub title: Option<String>,
}

impl TemplateInput {
    /// Every variable column the template declares, in header order.
    pub fn properties(&self) -> impl Iterator<Item = &str> {
        self.header.columns.iter().map(|c| c.property.as_str())
    }
}

/// One device row of a template attach request.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateAttachment {
    pub template_id: String,
    /// Column property → value, including the `csv-*` system columns.
    pub values: serde_json::Map<String, serde_json::Value>,
}

// ── Configuration groups ────────────────────────────────────────────

/// An entry of `/dataservice/v1/config-group` (a bare JSON array).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConfigGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub solution: Option<String>,
}

/// A `{name, value}` pair pushed to a config group for one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigGroupVariable {
    pub name: String,
    pub value: serde_json::Value,
}
