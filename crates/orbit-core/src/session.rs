// ── Manager session ──
//
// One authenticated connection shared by every device run in a batch.
// Login walks the credential list in rank order; an expired session is
// refreshed by exactly one caller while the others wait on the same lock
// and reuse the result. Every remote call goes through the RetryExecutor.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use orbit_api::{
    AboutInfo, ActionStatus, ConfigGroup, ConfigGroupVariable, DeviceCategory,
    DeviceRegistration, DeviceStatus, DeviceTemplate, EdgeValidity, ErrorClass, InventoryDevice,
    ManagerClient, ManagerRequest, ManagerResponse, TemplateAttachment, TemplateInput, TlsMode,
    TransportConfig,
};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::api::ManagerApi;
use crate::config::{CredentialRank, ManagerEndpoint};
use crate::error::CoreError;
use crate::retry::{RetryExecutor, RetryFailure, RetryPolicy};

#[derive(Debug, Default)]
struct AuthState {
    /// Bumped on every successful login.
    generation: u64,
    established_at: Option<Instant>,
    rank: Option<CredentialRank>,
}

impl AuthState {
    fn is_fresh(&self, lifetime: Duration) -> bool {
        self.established_at
            .is_some_and(|at| at.elapsed() < lifetime)
    }
}

/// Shared, self-refreshing Manager session.
pub struct ManagerSession {
    api: Arc<dyn ManagerApi>,
    endpoint: ManagerEndpoint,
    retry: RetryExecutor,
    lifetime: Duration,
    auth: Mutex<AuthState>,
    closed: AtomicBool,
}

impl ManagerSession {
    /// Create a session over any [`ManagerApi`]. Does NOT log in --
    /// call [`connect()`](Self::connect).
    pub fn new(
        api: Arc<dyn ManagerApi>,
        endpoint: ManagerEndpoint,
        retry: RetryPolicy,
        lifetime: Duration,
    ) -> Self {
        Self {
            api,
            endpoint,
            retry: RetryExecutor::new(retry),
            lifetime,
            auth: Mutex::new(AuthState::default()),
            closed: AtomicBool::new(false),
        }
    }

    /// Create a session backed by a real HTTP client for `endpoint`.
    pub fn from_endpoint(
        endpoint: ManagerEndpoint,
        retry: RetryPolicy,
        lifetime: Duration,
    ) -> Result<Self, CoreError> {
        let client = http_client(&endpoint)?;
        Ok(Self::new(Arc::new(client), endpoint, retry, lifetime))
    }

    pub fn endpoint(&self) -> &ManagerEndpoint {
        &self.endpoint
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// The credential rank the current login used, if logged in.
    pub async fn authenticated_rank(&self) -> Option<CredentialRank> {
        self.auth.lock().await.rank
    }

    /// How many logins have succeeded so far.
    pub async fn login_count(&self) -> u64 {
        self.auth.lock().await.generation
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Log in, trying each credential in rank order.
    pub async fn connect(&self) -> Result<(), CoreError> {
        self.check_open()?;
        let mut auth = self.auth.lock().await;
        self.login_locked(&mut auth).await
    }

    /// Make sure a usable session exists, logging in if it never did or
    /// has outlived its lifetime. Returns the login generation observed.
    pub async fn ensure_authenticated(&self) -> Result<u64, CoreError> {
        self.check_open()?;
        let mut auth = self.auth.lock().await;
        if !auth.is_fresh(self.lifetime) {
            if auth.established_at.is_some() {
                debug!("session lifetime elapsed, re-authenticating");
            }
            self.login_locked(&mut auth).await?;
        }
        Ok(auth.generation)
    }

    /// Re-login after a call saw generation `stale` rejected. A caller that
    /// queued behind another refresh finds the generation moved on and
    /// returns without logging in again.
    async fn refresh(&self, stale: u64) -> Result<u64, CoreError> {
        self.check_open()?;
        let mut auth = self.auth.lock().await;
        if auth.generation != stale && auth.established_at.is_some() {
            return Ok(auth.generation);
        }
        auth.established_at = None;
        self.login_locked(&mut auth).await?;
        Ok(auth.generation)
    }

    async fn login_locked(&self, auth: &mut AuthState) -> Result<(), CoreError> {
        let mut tried = Vec::new();
        let mut last_message = String::from("no credentials configured");
        let mut exhausted = None;

        for credential in self.endpoint.credentials() {
            tried.push(credential.rank);
            let outcome = self
                .retry
                .run("login", || {
                    self.api.login(&credential.username, &credential.password)
                })
                .await;

            match outcome {
                Ok(()) => {
                    auth.generation += 1;
                    auth.established_at = Some(Instant::now());
                    auth.rank = Some(credential.rank);
                    info!(
                        rank = %credential.rank,
                        username = %credential.username,
                        "authenticated with Manager"
                    );
                    return Ok(());
                }
                Err(failure) => {
                    warn!(
                        rank = %credential.rank,
                        username = %credential.username,
                        error = %failure.error(),
                        "login failed"
                    );
                    last_message = failure.error().to_string();
                    exhausted = match failure {
                        RetryFailure::Exhausted { .. } => Some(CoreError::from(failure)),
                        RetryFailure::Fatal(_) => None,
                    };
                }
            }
        }

        auth.established_at = None;
        auth.rank = None;
        Err(exhausted.unwrap_or(CoreError::Credential {
            tried,
            message: last_message,
        }))
    }

    /// Log out and mark the session closed. Safe to call more than once;
    /// a logout failure is logged, never returned.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut auth = self.auth.lock().await;
        if auth.established_at.take().is_some() {
            match self.api.logout().await {
                Ok(()) => info!("logged out of Manager"),
                Err(e) => warn!(error = %e, "logout failed"),
            }
        }
        auth.rank = None;
    }

    fn check_open(&self) -> Result<(), CoreError> {
        if self.is_closed() {
            Err(CoreError::SessionClosed)
        } else {
            Ok(())
        }
    }

    // ── Request execution ────────────────────────────────────────────

    /// Perform one request, re-authenticating first if needed and once
    /// more if the Manager reports the session expired mid-call.
    pub async fn execute(&self, request: &ManagerRequest) -> Result<ManagerResponse, CoreError> {
        let generation = self.ensure_authenticated().await?;

        match self.send_with_retry(request).await {
            Err(RetryFailure::Fatal(err)) if is_session_lost(&err) => {
                debug!(operation = request.name(), "session expired during call");
                self.refresh(generation).await?;
                self.send_with_retry(request).await.map_err(CoreError::from)
            }
            result => result.map_err(CoreError::from),
        }
    }

    async fn send_with_retry(
        &self,
        request: &ManagerRequest,
    ) -> Result<ManagerResponse, RetryFailure<orbit_api::Error>> {
        self.retry
            .run(request.name(), || self.api.send(request))
            .await
    }

    async fn execute_task(&self, request: &ManagerRequest) -> Result<String, CoreError> {
        match self.execute(request).await? {
            ManagerResponse::Task(id) => Ok(id),
            other => Err(unexpected(request, &other)),
        }
    }

    async fn execute_done(&self, request: &ManagerRequest) -> Result<(), CoreError> {
        match self.execute(request).await? {
            ManagerResponse::Done => Ok(()),
            other => Err(unexpected(request, &other)),
        }
    }

    // ── Typed wrappers ───────────────────────────────────────────────

    pub async fn about(&self) -> Result<AboutInfo, CoreError> {
        let request = ManagerRequest::About;
        match self.execute(&request).await? {
            ManagerResponse::About(about) => Ok(about),
            other => Err(unexpected(&request, &other)),
        }
    }

    pub async fn action_status(&self, task_id: &str) -> Result<ActionStatus, CoreError> {
        let request = ManagerRequest::ActionStatus {
            task_id: task_id.to_owned(),
        };
        match self.execute(&request).await? {
            ManagerResponse::ActionStatus(status) => Ok(status),
            other => Err(unexpected(&request, &other)),
        }
    }

    pub async fn list_devices(
        &self,
        category: DeviceCategory,
    ) -> Result<Vec<InventoryDevice>, CoreError> {
        let request = ManagerRequest::ListDevices(category);
        match self.execute(&request).await? {
            ManagerResponse::Devices(devices) => Ok(devices),
            other => Err(unexpected(&request, &other)),
        }
    }

    pub async fn register_device(&self, registration: DeviceRegistration) -> Result<(), CoreError> {
        self.execute_done(&ManagerRequest::RegisterDevice(registration))
            .await
    }

    pub async fn set_edge_validity(&self, entries: Vec<EdgeValidity>) -> Result<String, CoreError> {
        self.execute_task(&ManagerRequest::SetEdgeValidity(entries))
            .await
    }

    pub async fn push_edge_list(&self) -> Result<String, CoreError> {
        self.execute_task(&ManagerRequest::PushEdgeList).await
    }

    pub async fn list_device_status(&self) -> Result<Vec<DeviceStatus>, CoreError> {
        let request = ManagerRequest::ListDeviceStatus;
        match self.execute(&request).await? {
            ManagerResponse::DeviceStatus(status) => Ok(status),
            other => Err(unexpected(&request, &other)),
        }
    }

    pub async fn list_templates(&self) -> Result<Vec<DeviceTemplate>, CoreError> {
        let request = ManagerRequest::ListTemplates;
        match self.execute(&request).await? {
            ManagerResponse::Templates(templates) => Ok(templates),
            other => Err(unexpected(&request, &other)),
        }
    }

    /// Look up a device template by exact name.
    pub async fn find_template(&self, name: &str) -> Result<Option<DeviceTemplate>, CoreError> {
        Ok(self
            .list_templates()
            .await?
            .into_iter()
            .find(|t| t.template_name == name))
    }

    pub async fn template_input(
        &self,
        template_id: &str,
        device_uuid: &str,
    ) -> Result<TemplateInput, CoreError> {
        let request = ManagerRequest::TemplateInput {
            template_id: template_id.to_owned(),
            device_uuid: device_uuid.to_owned(),
        };
        match self.execute(&request).await? {
            ManagerResponse::TemplateInput(input) => Ok(input),
            other => Err(unexpected(&request, &other)),
        }
    }

    pub async fn attach_template(&self, attachment: TemplateAttachment) -> Result<String, CoreError> {
        self.execute_task(&ManagerRequest::AttachTemplate(attachment))
            .await
    }

    pub async fn list_config_groups(&self) -> Result<Vec<ConfigGroup>, CoreError> {
        let request = ManagerRequest::ListConfigGroups;
        match self.execute(&request).await? {
            ManagerResponse::ConfigGroups(groups) => Ok(groups),
            other => Err(unexpected(&request, &other)),
        }
    }

    /// Look up a configuration group by exact name.
    pub async fn find_config_group(&self, name: &str) -> Result<Option<ConfigGroup>, CoreError> {
        Ok(self
            .list_config_groups()
            .await?
            .into_iter()
            .find(|g| g.name == name))
    }

    pub async fn associate_config_group(
        &self,
        group_id: &str,
        device_uuid: &str,
    ) -> Result<(), CoreError> {
        self.execute_done(&ManagerRequest::AssociateConfigGroup {
            group_id: group_id.to_owned(),
            device_uuid: device_uuid.to_owned(),
        })
        .await
    }

    pub async fn set_config_group_variables(
        &self,
        group_id: &str,
        device_uuid: &str,
        variables: Vec<ConfigGroupVariable>,
    ) -> Result<(), CoreError> {
        self.execute_done(&ManagerRequest::SetConfigGroupVariables {
            group_id: group_id.to_owned(),
            device_uuid: device_uuid.to_owned(),
            variables,
        })
        .await
    }

    pub async fn deploy_config_group(
        &self,
        group_id: &str,
        device_uuid: &str,
    ) -> Result<String, CoreError> {
        self.execute_task(&ManagerRequest::DeployConfigGroup {
            group_id: group_id.to_owned(),
            device_uuid: device_uuid.to_owned(),
        })
        .await
    }
}

/// A cookie-keeping HTTP client configured from `endpoint`.
pub fn http_client(endpoint: &ManagerEndpoint) -> Result<ManagerClient, CoreError> {
    let transport = TransportConfig {
        tls: TlsMode::from_verify(endpoint.verify_tls()),
        timeout: endpoint.timeout(),
        cookie_jar: None,
    }
    .with_cookie_jar();
    Ok(ManagerClient::new(endpoint.url().clone(), &transport)?)
}

fn is_session_lost(err: &orbit_api::Error) -> bool {
    err.is_auth_expired() || err.class() == ErrorClass::Authentication
}

fn unexpected(request: &ManagerRequest, response: &ManagerResponse) -> CoreError {
    CoreError::Internal(format!(
        "unexpected {} response to {}",
        response.kind(),
        request.name()
    ))
}
