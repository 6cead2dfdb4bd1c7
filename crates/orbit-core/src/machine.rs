// ── Per-device onboarding state machine ──
//
// One instance per submitted device. Controllers and validators are
// registered with the Manager, then watched until their control
// connections come up. Edges are validated on the allow-list, pushed to
// the controllers, watched through certificate install and reachability,
// then handed to the AttachmentWorkflow.
//
// State is owned by the run and never shared. Every remote call and every
// poll wait observes the batch cancellation token.

use std::net::Ipv4Addr;
use std::sync::Arc;

use orbit_api::{DeviceCategory, DeviceRegistration, EdgeValidity, InventoryDevice};
use secrecy::{ExposeSecret, SecretString};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::attachment::AttachmentWorkflow;
use crate::config::{CredentialRank, OnboardingConfig};
use crate::error::CoreError;
use crate::model::{ControlDevice, Device, DeviceKind, DeviceState, EdgeDevice, OnboardingOutcome};
use crate::poll::{cancellable, poll_until};
use crate::session::ManagerSession;

/// Batch-scoped dependencies handed to every device run.
#[derive(Clone)]
pub struct RunContext {
    pub session: Arc<ManagerSession>,
    pub attachment: Arc<AttachmentWorkflow>,
    pub config: Arc<OnboardingConfig>,
    pub snapshot: Arc<InventorySnapshot>,
}

// ── Inventory snapshot ───────────────────────────────────────────────

/// Manager inventory as it stood before any device in the batch ran.
///
/// The skip check at `Pending` reads this instead of a live query: pushing
/// the edge list installs every pending certificate, including those of
/// edges that have not started yet.
#[derive(Debug, Clone, Default)]
pub struct InventorySnapshot {
    controllers: Vec<InventoryDevice>,
    vedges: Vec<InventoryDevice>,
}

impl InventorySnapshot {
    /// One inventory query per device category present in `devices`.
    pub async fn capture(
        session: &ManagerSession,
        devices: &[Device],
        cancel: &CancellationToken,
    ) -> Result<Self, CoreError> {
        let mut snapshot = Self::default();
        if devices.iter().any(|d| !matches!(d, Device::Edge(_))) {
            snapshot.controllers =
                cancellable(cancel, session.list_devices(DeviceCategory::Controllers)).await?;
        }
        if devices.iter().any(|d| matches!(d, Device::Edge(_))) {
            snapshot.vedges =
                cancellable(cancel, session.list_devices(DeviceCategory::Vedges)).await?;
        }
        debug!(
            controllers = snapshot.controllers.len(),
            vedges = snapshot.vedges.len(),
            "inventory snapshot taken"
        );
        Ok(snapshot)
    }

    pub fn from_rows(controllers: Vec<InventoryDevice>, vedges: Vec<InventoryDevice>) -> Self {
        Self { controllers, vedges }
    }

    /// Controller or validator row by management IP.
    pub fn control(&self, ip: &str) -> Option<&InventoryDevice> {
        self.controllers
            .iter()
            .find(|r| r.device_ip.as_deref() == Some(ip))
    }

    /// Edge row by serial or chassis number.
    pub fn edge(&self, serial: &str) -> Option<&InventoryDevice> {
        self.vedges.iter().find(|r| r.matches_serial(serial))
    }
}

/// Drives one device from `Pending` to a terminal state.
pub struct DeviceStateMachine {
    device: Device,
    ctx: RunContext,
    state: DeviceState,
    visited: Vec<DeviceState>,
    uuid: Option<String>,
    started: Instant,
}

impl DeviceStateMachine {
    pub fn new(device: Device, ctx: RunContext) -> Self {
        Self {
            device,
            ctx,
            state: DeviceState::Pending,
            visited: vec![DeviceState::Pending],
            uuid: None,
            started: Instant::now(),
        }
    }

    /// Run to completion. Never fails: every error becomes a `Failed`
    /// outcome carrying its kind and message.
    pub async fn run(mut self, cancel: &CancellationToken) -> OnboardingOutcome {
        let span = info_span!(
            "device",
            kind = %self.device.kind(),
            id = %self.device.identifier(),
        );

        async move {
            self.started = Instant::now();
            let device = self.device.clone();
            let result = match &device {
                Device::Controller(d) => self.run_control(d, DeviceKind::Controller, cancel).await,
                Device::Validator(d) => self.run_control(d, DeviceKind::Validator, cancel).await,
                Device::Edge(e) => self.run_edge(e, cancel).await,
            };

            match result {
                Ok(()) => self.into_outcome(None),
                Err(err) => {
                    self.fail(&err);
                    self.into_outcome(Some(err.to_string()))
                }
            }
        }
        .instrument(span)
        .await
    }

    // ── Transitions ──────────────────────────────────────────────────

    fn advance(&mut self, next: DeviceState) -> Result<(), CoreError> {
        if !self.state.can_advance_to(next) {
            return Err(CoreError::Internal(format!(
                "illegal transition {} -> {next}",
                self.state
            )));
        }
        info!(from = %self.state, to = %next, "state transition");
        self.state = next;
        self.visited.push(next);
        Ok(())
    }

    fn fail(&mut self, err: &CoreError) {
        let next = DeviceState::Failed(err.kind());
        if self.state.can_advance_to(next) {
            warn!(from = %self.state, error = %err, "onboarding failed");
            self.state = next;
            self.visited.push(next);
        }
    }

    fn into_outcome(self, error: Option<String>) -> OnboardingOutcome {
        OnboardingOutcome {
            identifier: self.device.identifier(),
            kind: self.device.kind(),
            state: self.state,
            uuid: self.uuid,
            error,
            elapsed: self.started.elapsed(),
            visited: self.visited,
        }
    }

    // ── Controllers and validators ───────────────────────────────────

    async fn run_control(
        &mut self,
        device: &ControlDevice,
        kind: DeviceKind,
        cancel: &CancellationToken,
    ) -> Result<(), CoreError> {
        let session = Arc::clone(&self.ctx.session);
        let ip = device.ip.to_string();

        let existing = self.ctx.snapshot.control(&ip).cloned();
        if let Some(row) = &existing {
            debug!(uuid = %row.uuid, "already in Manager inventory");
            self.uuid = Some(row.uuid.clone());
            if self.ctx.config.skip_existing {
                return self.advance(DeviceState::Skipped);
            }
        }

        self.advance(DeviceState::Authenticating)?;
        if existing.is_none() {
            self.register(device, kind, cancel).await?;
            let row = find_control(&session, &ip, cancel)
                .await?
                .ok_or(CoreError::DeviceNotFound { identifier: ip })?;
            self.uuid = Some(row.uuid);
        }
        self.advance(DeviceState::Accepted)?;

        self.wait_reachable(device.system_ip, cancel).await?;
        self.advance(DeviceState::Reachable)?;
        self.advance(DeviceState::Ready)
    }

    /// Add the device to the Manager, trying the default device password
    /// before the device's own. A rejected password moves on to the next;
    /// any other failure ends the attempt.
    async fn register(
        &self,
        device: &ControlDevice,
        kind: DeviceKind,
        cancel: &CancellationToken,
    ) -> Result<(), CoreError> {
        let Some(personality) = kind.personality() else {
            return Err(CoreError::Internal(format!("{kind} devices are not registered")));
        };
        let config = &self.ctx.config;

        let mut candidates: Vec<(CredentialRank, &SecretString)> =
            vec![(CredentialRank::Primary, &config.default_device_password)];
        if let Some(own) = device
            .password
            .as_ref()
            .filter(|own| own.expose_secret() != config.default_device_password.expose_secret())
        {
            candidates.push((CredentialRank::Fallback, own));
        }

        let mut tried = Vec::with_capacity(candidates.len());
        let mut last_message = String::new();
        for (rank, password) in candidates {
            tried.push(rank);
            let registration = DeviceRegistration::new(
                device.ip.to_string(),
                config.device_username.clone(),
                password.clone(),
                personality,
            );
            match cancellable(cancel, self.ctx.session.register_device(registration)).await {
                Ok(()) => {
                    info!(%rank, ?personality, "device registered");
                    return Ok(());
                }
                Err(err) if err.is_rejection() => {
                    warn!(%rank, error = %err, "device rejected password");
                    last_message = err.to_string();
                }
                Err(err) => return Err(err),
            }
        }

        Err(CoreError::Credential {
            tried,
            message: last_message,
        })
    }

    // ── Edges ────────────────────────────────────────────────────────

    async fn run_edge(&mut self, edge: &EdgeDevice, cancel: &CancellationToken) -> Result<(), CoreError> {
        let session = Arc::clone(&self.ctx.session);

        let row = self
            .ctx
            .snapshot
            .edge(&edge.serial)
            .cloned()
            .ok_or_else(|| CoreError::DeviceNotFound {
                identifier: edge.serial.clone(),
            })?;
        self.uuid = Some(row.uuid.clone());

        if row.has_certificate_installed() && self.ctx.config.skip_existing {
            debug!(uuid = %row.uuid, "certificate already installed");
            return self.advance(DeviceState::Skipped);
        }

        self.advance(DeviceState::Authenticating)?;
        let chassis = row.chassis_number.clone().unwrap_or_else(|| row.uuid.clone());
        let serial = row.serial_number.clone().unwrap_or_else(|| edge.serial.clone());
        let task = cancellable(
            cancel,
            session.set_edge_validity(vec![EdgeValidity::valid(chassis, serial)]),
        )
        .await?;
        debug!(%task, "edge marked valid");
        self.advance(DeviceState::Accepted)?;

        let row = if row.has_certificate_installed() {
            row
        } else {
            let task = cancellable(cancel, session.push_edge_list()).await?;
            debug!(%task, "edge list pushed to controllers");
            self.advance(DeviceState::CertPending)?;
            self.wait_certificate(&session, &edge.serial, cancel).await?
        };
        self.advance(DeviceState::CertInstalled)?;

        self.wait_reachable(Some(edge.system_ip), cancel).await?;
        self.advance(DeviceState::Reachable)?;

        if edge.attachment.is_some() {
            self.advance(DeviceState::Attaching)?;
            self.ctx.attachment.attach(edge, &row, cancel).await?;
        }
        self.advance(DeviceState::Ready)
    }

    async fn wait_certificate(
        &self,
        session: &ManagerSession,
        serial: &str,
        cancel: &CancellationToken,
    ) -> Result<InventoryDevice, CoreError> {
        poll_until(
            self.ctx.config.cert_poll,
            "certificate installation",
            cancel,
            || async move {
                let rows = session.list_devices(DeviceCategory::Vedges).await?;
                Ok(rows
                    .into_iter()
                    .find(|r| r.matches_serial(serial) && r.has_certificate_installed()))
            },
        )
        .await
    }

    // ── Shared stages ────────────────────────────────────────────────

    /// Wait for at least one control connection on the device, matched by
    /// UUID or by system IP.
    async fn wait_reachable(
        &self,
        system_ip: Option<Ipv4Addr>,
        cancel: &CancellationToken,
    ) -> Result<(), CoreError> {
        let session = &*self.ctx.session;
        let uuid = self.uuid.as_deref().unwrap_or_default();
        let system_ip = system_ip.map(|ip| ip.to_string());
        let system_ip = system_ip.as_deref();

        poll_until(
            self.ctx.config.reachability_poll,
            "control connections",
            cancel,
            || async move {
                let rows = session.list_device_status().await?;
                let reachable = rows.iter().any(|r| {
                    let same = (!uuid.is_empty() && r.uuid == uuid)
                        || (system_ip.is_some() && r.device_id.as_deref() == system_ip);
                    same && r.is_reachable()
                });
                Ok(reachable.then_some(()))
            },
        )
        .await
    }
}

async fn find_control(
    session: &ManagerSession,
    ip: &str,
    cancel: &CancellationToken,
) -> Result<Option<InventoryDevice>, CoreError> {
    let rows = cancellable(cancel, session.list_devices(DeviceCategory::Controllers)).await?;
    Ok(rows.into_iter().find(|r| r.device_ip.as_deref() == Some(ip)))
}
