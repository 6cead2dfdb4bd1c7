// Scripted in-memory Manager shared by the orbit-core integration tests.
//
// Behaves like a small Manager: logins are checked against an account
// list, registered controllers appear in the inventory, pushing the edge
// list can install certificates. Every request is recorded so tests can
// assert on what was (and was not) sent.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use orbit_api::{
    AboutInfo, ConfigGroup, DeviceCategory, DeviceStatus, DeviceTemplate, Error, InventoryDevice,
    ManagerRequest, ManagerResponse, TemplateAttachment,
};
use orbit_core::{ManagerApi, ManagerEndpoint, OnboardingConfig, PollSettings, RetryPolicy};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;

#[derive(Debug, Default)]
pub struct FakeState {
    // ── Manager login ──
    pub accounts: Vec<(String, String)>,
    pub login_attempts: Vec<String>,
    pub logins: usize,
    pub logouts: usize,
    /// Logins that fail with a connection error before any succeeds.
    pub login_outages: usize,
    /// Every call answers `SessionExpired` until the next login.
    pub expired: bool,

    // ── Inventory ──
    pub controllers: Vec<InventoryDevice>,
    pub vedges: Vec<InventoryDevice>,
    pub status: Vec<DeviceStatus>,
    /// Device admin password per IP; anything not listed accepts "admin".
    pub device_passwords: HashMap<String, String>,
    /// IPs whose registration is accepted but never shows up in inventory.
    pub phantom: HashSet<String>,
    /// Registered controllers come up with control connections.
    pub reachable_on_register: bool,
    /// Pushing the edge list installs every edge certificate.
    pub install_on_push: bool,

    // ── Attachment ──
    pub version: String,
    pub templates: Vec<DeviceTemplate>,
    pub template_columns: Vec<String>,
    pub config_groups: Vec<ConfigGroup>,
    pub task_failure: Option<String>,

    // ── Recording ──
    pub calls: Vec<String>,
    pub mutations: usize,
    pub registrations: Vec<(String, String)>,
    pub attachments: Vec<TemplateAttachment>,
    pub call_delay: Duration,
    /// Requests with this name panic the calling task.
    pub panic_on: Option<&'static str>,
}

pub struct FakeManager {
    state: Mutex<FakeState>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeManager {
    /// A Manager accepting `admin`/`secret`, version 20.12.1, where
    /// registered controllers come up immediately.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeState {
                accounts: vec![("admin".into(), "secret".into())],
                reachable_on_register: true,
                install_on_push: true,
                version: "20.12.1".into(),
                ..FakeState::default()
            }),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    pub fn edit(&self, f: impl FnOnce(&mut FakeState)) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn read<T>(&self, f: impl FnOnce(&FakeState) -> T) -> T {
        f(&self.state.lock().unwrap())
    }

    pub fn calls(&self) -> Vec<String> {
        self.read(|s| s.calls.clone())
    }

    pub fn count(&self, name: &str) -> usize {
        self.read(|s| s.calls.iter().filter(|c| *c == name).count())
    }

    /// Highest number of requests seen in flight at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Position of the first recorded call named `name`.
    pub fn first(&self, name: &str) -> Option<usize> {
        self.read(|s| s.calls.iter().position(|c| c == name))
    }

    /// Record a marker in the call log, for ordering assertions.
    pub fn mark(&self, name: &str) {
        self.edit(|s| s.calls.push(name.to_owned()));
    }

    fn respond(&self, request: &ManagerRequest) -> Result<ManagerResponse, Error> {
        let mut s = self.state.lock().unwrap();
        s.calls.push(request.name().to_owned());
        if request.is_mutation() {
            s.mutations += 1;
        }
        if s.expired {
            return Err(Error::SessionExpired);
        }

        Ok(match request {
            ManagerRequest::About => ManagerResponse::About(AboutInfo {
                version: s.version.clone(),
                application_version: None,
            }),
            ManagerRequest::ActionStatus { .. } => {
                let status = match &s.task_failure {
                    Some(message) => json!({
                        "summary": {"status": "done", "count": {"Failure": 1}},
                        "data": [{"status": "Failure", "activity": [message]}]
                    }),
                    None => json!({
                        "summary": {"status": "done", "count": {"Success": 1}},
                        "data": [{"status": "Success", "activity": ["Done"]}]
                    }),
                };
                ManagerResponse::ActionStatus(serde_json::from_value(status).unwrap())
            }
            ManagerRequest::ListDevices(DeviceCategory::Controllers) => {
                ManagerResponse::Devices(s.controllers.clone())
            }
            ManagerRequest::ListDevices(DeviceCategory::Vedges) => {
                ManagerResponse::Devices(s.vedges.clone())
            }
            ManagerRequest::RegisterDevice(registration) => {
                let ip = registration.device_ip.clone();
                let offered = registration.password.expose_secret().to_owned();
                s.registrations.push((ip.clone(), offered.clone()));
                let expected = s
                    .device_passwords
                    .get(&ip)
                    .cloned()
                    .unwrap_or_else(|| "admin".into());
                if offered != expected {
                    return Err(Error::Api {
                        status: 400,
                        message: format!("Failed to add device: Authentication failed for {ip}"),
                    });
                }
                if !s.phantom.contains(&ip) {
                    let row = controller_row(&ip);
                    if s.reachable_on_register {
                        s.status.push(reachable(&row.uuid, None));
                    }
                    s.controllers.push(row);
                }
                ManagerResponse::Done
            }
            ManagerRequest::SetEdgeValidity(_) => ManagerResponse::Task("validity-1".into()),
            ManagerRequest::PushEdgeList => {
                if s.install_on_push {
                    for edge in &mut s.vedges {
                        edge.cert_install_status = Some("Installed".into());
                    }
                }
                ManagerResponse::Task("push-1".into())
            }
            ManagerRequest::ListDeviceStatus => ManagerResponse::DeviceStatus(s.status.clone()),
            ManagerRequest::ListTemplates => ManagerResponse::Templates(s.templates.clone()),
            ManagerRequest::TemplateInput { .. } => {
                let columns: Vec<_> = s
                    .template_columns
                    .iter()
                    .map(|c| json!({"property": c, "title": c}))
                    .collect();
                let input = json!({"header": {"columns": columns}, "data": []});
                ManagerResponse::TemplateInput(serde_json::from_value(input).unwrap())
            }
            ManagerRequest::AttachTemplate(attachment) => {
                s.attachments.push(attachment.clone());
                ManagerResponse::Task("attach-1".into())
            }
            ManagerRequest::ListConfigGroups => ManagerResponse::ConfigGroups(s.config_groups.clone()),
            ManagerRequest::AssociateConfigGroup { .. }
            | ManagerRequest::SetConfigGroupVariables { .. } => ManagerResponse::Done,
            ManagerRequest::DeployConfigGroup { .. } => ManagerResponse::Task("deploy-1".into()),
        })
    }
}

#[async_trait]
impl ManagerApi for FakeManager {
    async fn login(&self, username: &str, password: &SecretString) -> Result<(), Error> {
        let mut s = self.state.lock().unwrap();
        s.login_attempts.push(username.to_owned());
        if s.login_outages > 0 {
            s.login_outages -= 1;
            return Err(Error::Connection("connection refused".into()));
        }
        let accepted = s
            .accounts
            .iter()
            .any(|(u, p)| u == username && p == password.expose_secret());
        if accepted {
            s.logins += 1;
            s.expired = false;
            Ok(())
        } else {
            Err(Error::Authentication {
                message: format!("credentials for user '{username}' rejected"),
            })
        }
    }

    async fn logout(&self) -> Result<(), Error> {
        self.state.lock().unwrap().logouts += 1;
        Ok(())
    }

    async fn send(&self, request: &ManagerRequest) -> Result<ManagerResponse, Error> {
        if self.read(|s| s.panic_on) == Some(request.name()) {
            panic!("scripted panic on {}", request.name());
        }
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let delay = self.read(|s| s.call_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let result = self.respond(request);

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

// ── Fixtures ────────────────────────────────────────────────────────

pub fn endpoint() -> ManagerEndpoint {
    ManagerEndpoint::new(
        "https://10.0.0.10".parse().unwrap(),
        "admin",
        SecretString::from("secret".to_string()),
    )
}

/// Defaults with short retry delays so paused-clock tests stay readable.
pub fn config() -> OnboardingConfig {
    OnboardingConfig {
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            jitter: Duration::ZERO,
            max_delay: Duration::from_secs(5),
            ..RetryPolicy::default()
        },
        cert_poll: PollSettings::new(Duration::from_secs(2), Duration::from_secs(10)),
        reachability_poll: PollSettings::new(Duration::from_secs(2), Duration::from_secs(20)),
        attachment_poll: PollSettings::new(Duration::from_secs(2), Duration::from_secs(20)),
        ..OnboardingConfig::default()
    }
}

pub fn controller_row(ip: &str) -> InventoryDevice {
    InventoryDevice {
        uuid: format!("{ip}-uuid"),
        device_ip: Some(ip.to_owned()),
        personality: Some("vsmart".into()),
        ..InventoryDevice::default()
    }
}

pub fn edge_row(serial: &str, installed: bool) -> InventoryDevice {
    InventoryDevice {
        uuid: format!("{serial}-uuid"),
        serial_number: Some(serial.to_owned()),
        chassis_number: Some(serial.to_owned()),
        cert_install_status: Some(if installed { "Installed" } else { "NotInstalled" }.into()),
        validity: Some("valid".into()),
        ..InventoryDevice::default()
    }
}

pub fn reachable(uuid: &str, system_ip: Option<&str>) -> DeviceStatus {
    DeviceStatus {
        uuid: uuid.to_owned(),
        device_id: system_ip.map(str::to_owned),
        reachability: Some("reachable".into()),
        control_connections: 1,
    }
}

pub fn template(name: &str) -> DeviceTemplate {
    DeviceTemplate {
        template_id: format!("{name}-id"),
        template_name: name.to_owned(),
        device_type: Some("vedge-C8000V".into()),
    }
}

pub fn config_group(name: &str) -> ConfigGroup {
    ConfigGroup {
        id: format!("{name}-id"),
        name: name.to_owned(),
        solution: Some("sdwan".into()),
    }
}
