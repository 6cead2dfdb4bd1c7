// ── Device domain types ──

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};

use orbit_api::Personality;
use secrecy::SecretString;
use serde::Serialize;

/// Role of a device in the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeviceKind {
    /// vSmart: control-plane policy and route distribution.
    Controller,
    /// vBond: orchestrator the other devices discover first.
    Validator,
    /// WAN edge router.
    Edge,
}

impl DeviceKind {
    /// Registration personality for control components.
    pub fn personality(self) -> Option<Personality> {
        match self {
            Self::Controller => Some(Personality::Vsmart),
            Self::Validator => Some(Personality::Vbond),
            Self::Edge => None,
        }
    }
}

/// A controller or validator, identified by its management IP.
#[derive(Debug, Clone)]
pub struct ControlDevice {
    pub ip: IpAddr,
    /// Device admin password, tried after the default one.
    pub password: Option<SecretString>,
    pub hostname: Option<String>,
    pub system_ip: Option<Ipv4Addr>,
    pub site_id: Option<u32>,
}

impl ControlDevice {
    pub fn new(ip: IpAddr) -> Self {
        Self {
            ip,
            password: None,
            hostname: None,
            system_ip: None,
            site_id: None,
        }
    }

    pub fn with_password(mut self, password: SecretString) -> Self {
        self.password = Some(password);
        self
    }
}

/// Configuration pushed to an edge once it is reachable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentSpec {
    /// Device template by name; variables come from the edge's values.
    Template { name: String },
    /// Configuration group by name (Manager 20.12+).
    ConfigGroup { name: String },
}

/// A WAN edge, identified by its serial number.
#[derive(Debug, Clone)]
pub struct EdgeDevice {
    pub serial: String,
    pub system_ip: Ipv4Addr,
    pub site_id: u32,
    pub hostname: Option<String>,
    pub attachment: Option<AttachmentSpec>,
    /// User-supplied variable values, keyed by template/group variable name.
    pub values: BTreeMap<String, String>,
}

impl EdgeDevice {
    pub fn new(serial: impl Into<String>, system_ip: Ipv4Addr, site_id: u32) -> Self {
        Self {
            serial: serial.into(),
            system_ip,
            site_id,
            hostname: None,
            attachment: None,
            values: BTreeMap::new(),
        }
    }

    pub fn with_template(mut self, name: impl Into<String>) -> Self {
        self.attachment = Some(AttachmentSpec::Template { name: name.into() });
        self
    }

    pub fn with_config_group(mut self, name: impl Into<String>) -> Self {
        self.attachment = Some(AttachmentSpec::ConfigGroup { name: name.into() });
        self
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

/// One device submitted to a batch.
#[derive(Debug, Clone)]
pub enum Device {
    Controller(ControlDevice),
    Validator(ControlDevice),
    Edge(EdgeDevice),
}

impl Device {
    pub fn kind(&self) -> DeviceKind {
        match self {
            Self::Controller(_) => DeviceKind::Controller,
            Self::Validator(_) => DeviceKind::Validator,
            Self::Edge(_) => DeviceKind::Edge,
        }
    }

    /// Batch-unique identifier: management IP or serial number.
    pub fn identifier(&self) -> String {
        match self {
            Self::Controller(d) | Self::Validator(d) => d.ip.to_string(),
            Self::Edge(e) => e.serial.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_follow_kind() {
        let controller = Device::Controller(ControlDevice::new("10.0.0.12".parse().expect("ip")));
        assert_eq!(controller.identifier(), "10.0.0.12");
        assert_eq!(controller.kind().personality(), Some(Personality::Vsmart));

        let edge = Device::Edge(EdgeDevice::new("C8K-1", Ipv4Addr::new(1, 1, 1, 1), 100));
        assert_eq!(edge.identifier(), "C8K-1");
        assert_eq!(edge.kind().to_string(), "edge");
        assert_eq!(edge.kind().personality(), None);
    }

    #[test]
    fn attachment_builders_are_exclusive() {
        let edge = EdgeDevice::new("C8K-1", Ipv4Addr::new(1, 1, 1, 1), 100)
            .with_template("edge-tpl")
            .with_config_group("branch-cg");
        assert_eq!(
            edge.attachment,
            Some(AttachmentSpec::ConfigGroup {
                name: "branch-cg".into()
            })
        );
    }
}
