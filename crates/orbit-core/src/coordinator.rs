// ── Batch coordinator ──
//
// Fans a batch out to `workers` tasks pulling from one queue. Each batch
// gets its own ManagerSession and one inventory snapshot, both taken before
// dispatch; the session is closed once every outcome is in, whatever
// happened in between.
//
// With `wait_for_control_plane` the batch runs in two phases: controllers
// and validators, then edges. Both phases share the worker bound, the
// deadline and the cancellation token.
//
// One CancellationToken covers the batch: the caller's token, the deadline
// timer, and fail-fast all cancel it. Devices still queued when it fires
// are reported `Failed(Cancelled)` without any remote call.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, OnceLock};

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::api::ManagerApi;
use crate::attachment::AttachmentWorkflow;
use crate::config::{ManagerEndpoint, OnboardingConfig};
use crate::error::{CoreError, FailureKind};
use crate::machine::{DeviceStateMachine, InventorySnapshot, RunContext};
use crate::model::{BatchError, BatchReport, Device, OnboardingOutcome};
use crate::poll::cancellable;
use crate::session::{ManagerSession, http_client};

type Outcomes = BTreeMap<String, OnboardingOutcome>;

/// Runs onboarding batches against one Manager.
pub struct OnboardingCoordinator {
    api: Arc<dyn ManagerApi>,
    endpoint: ManagerEndpoint,
    config: Arc<OnboardingConfig>,
}

impl OnboardingCoordinator {
    pub fn new(api: Arc<dyn ManagerApi>, endpoint: ManagerEndpoint, config: OnboardingConfig) -> Self {
        Self {
            api,
            endpoint,
            config: Arc::new(config),
        }
    }

    /// Coordinator backed by a real HTTP client for `endpoint`.
    pub fn from_endpoint(endpoint: ManagerEndpoint, config: OnboardingConfig) -> Result<Self, CoreError> {
        let client = http_client(&endpoint)?;
        Ok(Self::new(Arc::new(client), endpoint, config))
    }

    pub fn config(&self) -> &OnboardingConfig {
        &self.config
    }

    /// Onboard `devices` and report one outcome per device.
    ///
    /// Only a malformed batch (duplicate identifiers) is an `Err`; it is
    /// rejected before the Manager is contacted. Everything else, including
    /// a session that cannot be established, is carried in the report.
    pub async fn run(
        &self,
        devices: Vec<Device>,
        cancel: &CancellationToken,
    ) -> Result<BatchReport, CoreError> {
        let started = Instant::now();
        validate_batch(&devices)?;

        if devices.is_empty() {
            return Ok(BatchReport::new(BTreeMap::new(), None, false, started.elapsed()));
        }

        let width = self.config.workers.clamp(1, devices.len());
        info!(devices = devices.len(), workers = width, "starting onboarding batch");

        let batch = cancel.child_token();
        let deadline = self.config.deadline.map(|limit| {
            let token = batch.clone();
            tokio::spawn(async move {
                tokio::select! {
                    biased;
                    () = token.cancelled() => {}
                    () = tokio::time::sleep(limit) => {
                        warn!(deadline_secs = limit.as_secs(), "batch deadline reached, cancelling");
                        token.cancel();
                    }
                }
            })
        });

        let session = Arc::new(ManagerSession::new(
            Arc::clone(&self.api),
            self.endpoint.clone(),
            self.config.retry.clone(),
            self.config.session_lifetime,
        ));

        let (outcomes, batch_error) = match open(&session, &devices, &batch).await {
            Ok(snapshot) => self.dispatch(&session, snapshot, &devices, width, &batch).await,
            Err(err) => {
                let outcomes = devices
                    .iter()
                    .map(|d| (d.identifier(), OnboardingOutcome::not_started(d, &err)))
                    .collect();
                let batch_error = if matches!(err, CoreError::Cancelled) {
                    None
                } else {
                    error!(error = %err, "could not open the batch against the Manager");
                    Some(BatchError::from(&err))
                };
                (outcomes, batch_error)
            }
        };

        session.close().await;
        if let Some(timer) = deadline {
            timer.abort();
        }

        let fail_fast_triggered = batch_error
            .as_ref()
            .is_some_and(|e| e.kind != FailureKind::Cancelled);
        let cancelled = batch.is_cancelled() && !fail_fast_triggered;
        let report = BatchReport::new(outcomes, batch_error, cancelled, started.elapsed());
        info!(
            status = %report.status,
            elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
            "onboarding batch finished"
        );
        Ok(report)
    }

    async fn dispatch(
        &self,
        session: &Arc<ManagerSession>,
        snapshot: InventorySnapshot,
        devices: &[Device],
        width: usize,
        cancel: &CancellationToken,
    ) -> (Outcomes, Option<BatchError>) {
        let ctx = RunContext {
            session: Arc::clone(session),
            attachment: Arc::new(AttachmentWorkflow::new(
                Arc::clone(session),
                self.config.config_group_min_version,
                self.config.attachment_poll,
            )),
            config: Arc::clone(&self.config),
            snapshot: Arc::new(snapshot),
        };
        let first_failure: Arc<OnceLock<BatchError>> = Arc::new(OnceLock::new());
        let mut outcomes = BTreeMap::new();

        for (phase, members) in phases(devices, self.config.wait_for_control_plane) {
            if members.is_empty() {
                continue;
            }
            info!(phase, devices = members.len(), "starting phase");
            self.run_phase(&ctx, &members, width, cancel, &first_failure, &mut outcomes)
                .await;
        }

        (outcomes, first_failure.get().cloned())
    }

    async fn run_phase(
        &self,
        ctx: &RunContext,
        devices: &[Device],
        width: usize,
        cancel: &CancellationToken,
        first_failure: &Arc<OnceLock<BatchError>>,
        outcomes: &mut Outcomes,
    ) {
        let (tx, rx) = mpsc::channel(devices.len());
        for device in devices {
            if tx.try_send(device.clone()).is_err() {
                error!(id = %device.identifier(), "work queue rejected device");
            }
        }
        drop(tx);
        let queue = Arc::new(Mutex::new(rx));
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();

        let mut workers = JoinSet::new();
        for _ in 0..width.min(devices.len()) {
            workers.spawn(worker(
                ctx.clone(),
                Arc::clone(&queue),
                cancel.clone(),
                self.config.fail_fast.then(|| Arc::clone(first_failure)),
                done_tx.clone(),
            ));
        }
        drop(done_tx);

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "onboarding worker stopped abnormally");
            }
        }
        while let Some(outcome) = done_rx.recv().await {
            outcomes.insert(outcome.identifier.clone(), outcome);
        }

        // Whatever is still queued was never started.
        let unstarted = if cancel.is_cancelled() {
            CoreError::Cancelled
        } else {
            CoreError::Internal("no onboarding worker left to run the device".into())
        };
        let mut rx = queue.lock().await;
        while let Ok(device) = rx.try_recv() {
            let outcome = OnboardingOutcome::not_started(&device, &unstarted);
            outcomes.insert(outcome.identifier.clone(), outcome);
        }

        for device in devices {
            let id = device.identifier();
            if !outcomes.contains_key(&id) {
                let lost = CoreError::Internal("device run did not report an outcome".into());
                outcomes.insert(id, OnboardingOutcome::not_started(device, &lost));
            }
        }
    }
}

/// Establish the session, then read the inventory the skip checks use.
async fn open(
    session: &ManagerSession,
    devices: &[Device],
    cancel: &CancellationToken,
) -> Result<InventorySnapshot, CoreError> {
    cancellable(cancel, session.connect()).await?;
    InventorySnapshot::capture(session, devices, cancel).await
}

/// Split a batch into the phases it runs in, in order.
fn phases(devices: &[Device], wait_for_control_plane: bool) -> Vec<(&'static str, Vec<Device>)> {
    if !wait_for_control_plane {
        return vec![("all", devices.to_vec())];
    }
    let (edges, control): (Vec<Device>, Vec<Device>) = devices
        .iter()
        .cloned()
        .partition(|d| matches!(d, Device::Edge(_)));
    vec![("control plane", control), ("edges", edges)]
}

/// Pull devices until the queue is empty or the batch is cancelled,
/// handing each outcome to the collector as soon as it is known.
async fn worker(
    ctx: RunContext,
    queue: Arc<Mutex<mpsc::Receiver<Device>>>,
    cancel: CancellationToken,
    fail_fast: Option<Arc<OnceLock<BatchError>>>,
    done: mpsc::UnboundedSender<OnboardingOutcome>,
) {
    loop {
        if cancel.is_cancelled() {
            break;
        }
        let next = queue.lock().await.recv().await;
        let Some(device) = next else { break };

        let outcome = DeviceStateMachine::new(device, ctx.clone()).run(&cancel).await;

        let fatal = outcome.failure().filter(|k| *k != FailureKind::Cancelled);
        if let (Some(first), Some(kind)) = (&fail_fast, fatal) {
            let failure = BatchError {
                kind,
                message: outcome.error.clone().unwrap_or_default(),
                device: Some(outcome.identifier.clone()),
            };
            if first.set(failure).is_ok() {
                warn!(id = %outcome.identifier, %kind, "fail-fast: cancelling batch");
                cancel.cancel();
            }
        }
        if done.send(outcome).is_err() {
            break;
        }
    }
}

/// Identifiers must be unique within a batch.
pub fn validate_batch(devices: &[Device]) -> Result<(), CoreError> {
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for device in devices {
        let id = device.identifier();
        if !seen.insert(id.clone()) && !duplicates.contains(&id) {
            duplicates.push(id);
        }
    }
    if duplicates.is_empty() {
        Ok(())
    } else {
        Err(CoreError::InvalidBatch {
            message: format!("duplicate device identifiers: {}", duplicates.join(", ")),
        })
    }
}
