// ── Edge configuration attachment ──
//
// Template path: resolve the template, check every variable column it
// declares against what the edge supplies, attach, poll the task.
// Configuration-group path (Manager 20.12+): resolve the group, associate
// the device, push its variables, deploy, poll the task.
//
// The Manager version is fetched once per batch and cached here.

use std::sync::Arc;

use orbit_api::{ConfigGroupVariable, InventoryDevice, TaskProgress, TemplateAttachment};
use serde_json::{Map, Value, json};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::PollSettings;
use crate::error::CoreError;
use crate::model::{AttachmentSpec, EdgeDevice, ManagerVersion};
use crate::poll::{cancellable, poll_until};
use crate::session::ManagerSession;

/// Template columns filled from the device itself rather than from the
/// user's variable values.
pub const SYSTEM_COLUMNS: &[&str] = &[
    "csv-status",
    "csv-deviceId",
    "csv-deviceIP",
    "csv-host-name",
    "//system/host-name",
    "//system/system-ip",
    "//system/site-id",
];

/// Batch-scoped attachment runner, shared by every edge run.
pub struct AttachmentWorkflow {
    session: Arc<ManagerSession>,
    version: OnceCell<ManagerVersion>,
    config_group_min_version: ManagerVersion,
    poll: PollSettings,
}

impl AttachmentWorkflow {
    pub fn new(
        session: Arc<ManagerSession>,
        config_group_min_version: ManagerVersion,
        poll: PollSettings,
    ) -> Self {
        Self {
            session,
            version: OnceCell::new(),
            config_group_min_version,
            poll,
        }
    }

    /// The Manager version, queried on first use. Concurrent first callers
    /// share a single query.
    pub async fn manager_version(&self) -> Result<ManagerVersion, CoreError> {
        self.version
            .get_or_try_init(|| async {
                let about = self.session.about().await?;
                let version: ManagerVersion = about
                    .version
                    .parse()
                    .map_err(|e| CoreError::Internal(format!("{e}")))?;
                info!(%version, "detected Manager version");
                Ok(version)
            })
            .await
            .copied()
    }

    /// Attach the edge's template or configuration group and wait for the
    /// Manager to finish applying it. `row` is the edge's inventory entry.
    pub async fn attach(
        &self,
        edge: &EdgeDevice,
        row: &InventoryDevice,
        cancel: &CancellationToken,
    ) -> Result<(), CoreError> {
        let Some(spec) = &edge.attachment else {
            return Ok(());
        };

        let version = cancellable(cancel, self.manager_version()).await?;

        match spec {
            AttachmentSpec::ConfigGroup { name } => {
                if version < self.config_group_min_version {
                    return Err(CoreError::UnsupportedFeature {
                        feature: "configuration groups",
                        required: self.config_group_min_version.to_string(),
                        found: version.to_string(),
                    });
                }
                self.attach_config_group(name, edge, &row.uuid, cancel).await
            }
            AttachmentSpec::Template { name } => self.attach_template(name, edge, row, cancel).await,
        }
    }

    async fn attach_template(
        &self,
        name: &str,
        edge: &EdgeDevice,
        row: &InventoryDevice,
        cancel: &CancellationToken,
    ) -> Result<(), CoreError> {
        let template = cancellable(cancel, self.session.find_template(name))
            .await?
            .ok_or_else(|| CoreError::TemplateNotFound {
                name: name.to_owned(),
            })?;
        debug!(template = name, id = %template.template_id, "resolved device template");

        let input = cancellable(
            cancel,
            self.session.template_input(&template.template_id, &row.uuid),
        )
        .await?;

        let missing = missing_variables(input.properties(), edge);
        if !missing.is_empty() {
            return Err(CoreError::TemplateVariable { missing });
        }

        let mut values = system_values(edge, row);
        values.insert("csv-templateId".into(), json!(template.template_id));
        for (key, value) in &edge.values {
            values.insert(key.clone(), json!(value));
        }

        let task_id = cancellable(
            cancel,
            self.session.attach_template(TemplateAttachment {
                template_id: template.template_id.clone(),
                values,
            }),
        )
        .await?;
        info!(template = name, task = %task_id, "template attach started");

        self.wait_for_task(&task_id, cancel).await?;
        info!(template = name, "template attached");
        Ok(())
    }

    async fn attach_config_group(
        &self,
        name: &str,
        edge: &EdgeDevice,
        device_uuid: &str,
        cancel: &CancellationToken,
    ) -> Result<(), CoreError> {
        let group = cancellable(cancel, self.session.find_config_group(name))
            .await?
            .ok_or_else(|| CoreError::ConfigGroupNotFound {
                name: name.to_owned(),
            })?;
        debug!(group = name, id = %group.id, "resolved configuration group");

        cancellable(
            cancel,
            self.session.associate_config_group(&group.id, device_uuid),
        )
        .await?;

        cancellable(
            cancel,
            self.session
                .set_config_group_variables(&group.id, device_uuid, group_variables(edge)),
        )
        .await?;

        let task_id = cancellable(cancel, self.session.deploy_config_group(&group.id, device_uuid))
            .await?;
        info!(group = name, task = %task_id, "configuration group deploy started");

        self.wait_for_task(&task_id, cancel).await?;
        info!(group = name, "configuration group deployed");
        Ok(())
    }

    async fn wait_for_task(&self, task_id: &str, cancel: &CancellationToken) -> Result<(), CoreError> {
        let session = &*self.session;
        poll_until(self.poll, "attachment task", cancel, || async move {
            match session.action_status(task_id).await?.progress() {
                TaskProgress::Complete => Ok(Some(())),
                TaskProgress::InProgress => Ok(None),
                TaskProgress::Failed { message } => Err(CoreError::AttachmentFailed {
                    task_id: task_id.to_owned(),
                    message,
                }),
            }
        })
        .await
    }
}

/// Columns the template declares that neither the device nor the user
/// supplies, in header order.
fn missing_variables<'a>(
    properties: impl Iterator<Item = &'a str>,
    edge: &EdgeDevice,
) -> Vec<String> {
    let mut missing: Vec<String> = Vec::new();
    for property in properties {
        if SYSTEM_COLUMNS.contains(&property) || edge.values.contains_key(property) {
            continue;
        }
        if !missing.iter().any(|m| m == property) {
            missing.push(property.to_owned());
        }
    }
    missing
}

fn system_values(edge: &EdgeDevice, row: &InventoryDevice) -> Map<String, Value> {
    let host_name = edge
        .hostname
        .clone()
        .or_else(|| row.host_name.clone())
        .unwrap_or_else(|| format!("Edge{}", edge.site_id));
    let device_ip = row
        .device_ip
        .clone()
        .unwrap_or_else(|| edge.system_ip.to_string());

    let mut values = Map::new();
    values.insert("csv-status".into(), json!("complete"));
    values.insert("csv-deviceId".into(), json!(row.uuid));
    values.insert("csv-deviceIP".into(), json!(device_ip));
    values.insert("csv-host-name".into(), json!(host_name));
    values.insert("//system/host-name".into(), json!(host_name));
    values.insert("//system/system-ip".into(), json!(edge.system_ip.to_string()));
    values.insert("//system/site-id".into(), json!(edge.site_id.to_string()));
    values
}

fn group_variables(edge: &EdgeDevice) -> Vec<ConfigGroupVariable> {
    let mut variables = vec![
        ConfigGroupVariable {
            name: "system_ip".into(),
            value: json!(edge.system_ip.to_string()),
        },
        ConfigGroupVariable {
            name: "site_id".into(),
            value: json!(edge.site_id),
        },
    ];
    if let Some(host_name) = &edge.hostname {
        variables.push(ConfigGroupVariable {
            name: "host_name".into(),
            value: json!(host_name),
        });
    }
    variables.extend(edge.values.iter().map(|(name, value)| ConfigGroupVariable {
        name: name.clone(),
        value: json!(value),
    }));
    variables
}
