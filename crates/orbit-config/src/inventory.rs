// ── Device inventory ────────────────────────────────────────────────
//
// Plain serde structs mirroring the inventory file, plus the cross-field
// checks the engine relies on. Format follows the file extension.

use std::collections::BTreeMap;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::time::Duration;

use orbit_core::{ControlDevice, Device, EdgeDevice, ManagerEndpoint};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::ConfigError;

// ── File structs ────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InventoryFile {
    pub manager: ManagerSection,
    #[serde(default)]
    pub controllers: Vec<ControlEntry>,
    #[serde(default)]
    pub validators: Vec<ControlEntry>,
    #[serde(default)]
    pub edges: Vec<EdgeEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ManagerSection {
    /// Base URL, e.g. `https://10.0.0.10`.
    pub url: String,
    pub username: String,
    pub password: String,
    /// Defaults to `username` when only a fallback password is given.
    pub fallback_username: Option<String>,
    pub fallback_password: Option<String>,
    /// Applied when the URL carries no port of its own.
    pub port: Option<u16>,
    #[serde(default)]
    pub verify: bool,
}

/// A controller or validator.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControlEntry {
    pub ip: IpAddr,
    pub password: Option<String>,
    pub hostname: Option<String>,
    pub system_ip: Option<Ipv4Addr>,
    pub site_id: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EdgeEntry {
    pub serial: String,
    pub system_ip: Ipv4Addr,
    pub site_id: u32,
    pub hostname: Option<String>,
    pub template_name: Option<String>,
    pub config_group: Option<String>,
    #[serde(default)]
    pub values: BTreeMap<String, Scalar>,
}

/// A variable value as written in the file. Numbers and booleans are
/// passed to the Manager as their text form.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

// ── Parsing ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryFormat {
    Yaml,
    Json,
}

impl InventoryFormat {
    /// Pick the format from a file extension (`.yaml`, `.yml`, `.json`).
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("yaml" | "yml") => Ok(Self::Yaml),
            Some("json") => Ok(Self::Json),
            _ => Err(ConfigError::invalid(
                "inventory",
                format!("{} must end in .yaml, .yml or .json", path.display()),
            )),
        }
    }
}

pub fn parse_inventory(text: &str, format: InventoryFormat) -> Result<InventoryFile, ConfigError> {
    Ok(match format {
        InventoryFormat::Yaml => serde_yaml::from_str(text)?,
        InventoryFormat::Json => serde_json::from_str(text)?,
    })
}

/// Read, parse and validate the inventory at `path`.
pub fn load_inventory(path: &Path, request_timeout: Duration) -> Result<Inventory, ConfigError> {
    let format = InventoryFormat::from_path(path)?;
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_inventory(&text, format)?.into_inventory(request_timeout)
}

// ── Translation ─────────────────────────────────────────────────────

/// A validated inventory, ready for the coordinator.
#[derive(Debug, Clone)]
pub struct Inventory {
    pub endpoint: ManagerEndpoint,
    /// Validators first, then controllers, then edges.
    pub devices: Vec<Device>,
}

impl InventoryFile {
    pub fn into_inventory(self, request_timeout: Duration) -> Result<Inventory, ConfigError> {
        let endpoint = self.manager.into_endpoint(request_timeout)?;

        let mut devices = Vec::with_capacity(
            self.validators.len() + self.controllers.len() + self.edges.len(),
        );
        devices.extend(
            self.validators
                .into_iter()
                .map(|v| Device::Validator(v.into_device())),
        );
        devices.extend(
            self.controllers
                .into_iter()
                .map(|c| Device::Controller(c.into_device())),
        );
        for edge in self.edges {
            devices.push(Device::Edge(edge.into_device()?));
        }

        Ok(Inventory { endpoint, devices })
    }
}

impl ManagerSection {
    fn into_endpoint(self, request_timeout: Duration) -> Result<ManagerEndpoint, ConfigError> {
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(ConfigError::invalid(
                "manager.url",
                format!("{} must start with http:// or https://", self.url),
            ));
        }
        let mut url: Url = self
            .url
            .parse()
            .map_err(|e| ConfigError::invalid("manager.url", format!("{e}")))?;
        if let Some(port) = self.port.filter(|_| url.port().is_none()) {
            url.set_port(Some(port))
                .map_err(|()| ConfigError::invalid("manager.port", "URL cannot carry a port"))?;
        }

        let mut endpoint = ManagerEndpoint::new(
            url,
            self.username.clone(),
            SecretString::from(self.password),
        )
        .with_tls_verify(self.verify)
        .with_timeout(request_timeout);

        match (self.fallback_username, self.fallback_password) {
            (username, Some(password)) => {
                endpoint = endpoint.with_fallback(
                    username.unwrap_or(self.username),
                    SecretString::from(password),
                );
            }
            (Some(_), None) => {
                return Err(ConfigError::invalid(
                    "manager.fallback_password",
                    "required when fallback_username is set",
                ));
            }
            (None, None) => {}
        }
        Ok(endpoint)
    }
}

impl ControlEntry {
    fn into_device(self) -> ControlDevice {
        ControlDevice {
            ip: self.ip,
            password: self.password.map(SecretString::from),
            hostname: self.hostname,
            system_ip: self.system_ip,
            site_id: self.site_id,
        }
    }
}

impl EdgeEntry {
    fn into_device(self) -> Result<EdgeDevice, ConfigError> {
        let mut edge = EdgeDevice::new(self.serial, self.system_ip, self.site_id);
        edge.hostname = self.hostname;
        edge = match (self.template_name, self.config_group) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::invalid(
                    format!("edge {}", edge.serial),
                    "template_name and config_group are mutually exclusive",
                ));
            }
            (Some(template), None) => edge.with_template(template),
            (None, Some(group)) => edge.with_config_group(group),
            (None, None) => edge,
        };
        for (key, value) in self.values {
            edge = edge.with_value(key, value.to_string());
        }
        Ok(edge)
    }
}
