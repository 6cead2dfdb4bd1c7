// ── Typed request routing ──
//
// Every call the onboarding flow makes flows through one `ManagerRequest`
// enum. `ManagerClient::send` routes each variant to its endpoint method
// and wraps the result in the matching `ManagerResponse` variant, so
// callers can replay a request after re-authentication.

use crate::client::ManagerClient;
use crate::error::Error;
use crate::models::{
    AboutInfo, ActionStatus, ConfigGroup, ConfigGroupVariable, DeviceCategory,
    DeviceRegistration, DeviceStatus, DeviceTemplate, EdgeValidity, InventoryDevice,
    TemplateAttachment, TemplateInput,
};

/// All Manager operations used during onboarding.
#[derive(Debug, Clone)]
pub enum ManagerRequest {
    // ── System ───────────────────────────────────────────────────────
    About,
    ActionStatus {
        task_id: String,
    },

    // ── Inventory ────────────────────────────────────────────────────
    ListDevices(DeviceCategory),
    RegisterDevice(DeviceRegistration),
    SetEdgeValidity(Vec<EdgeValidity>),
    PushEdgeList,
    ListDeviceStatus,

    // ── Templates ────────────────────────────────────────────────────
    ListTemplates,
    TemplateInput {
        template_id: String,
        device_uuid: String,
    },
    AttachTemplate(TemplateAttachment),

    // ── Configuration groups ─────────────────────────────────────────
    ListConfigGroups,
    AssociateConfigGroup {
        group_id: String,
        device_uuid: String,
    },
    SetConfigGroupVariables {
        group_id: String,
        device_uuid: String,
        variables: Vec<ConfigGroupVariable>,
    },
    DeployConfigGroup {
        group_id: String,
        device_uuid: String,
    },
}

impl ManagerRequest {
    /// Short operation name for logs and retry messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::About => "about",
            Self::ActionStatus { .. } => "action-status",
            Self::ListDevices(DeviceCategory::Controllers) => "list-controllers",
            Self::ListDevices(DeviceCategory::Vedges) => "list-vedges",
            Self::RegisterDevice(_) => "register-device",
            Self::SetEdgeValidity(_) => "set-edge-validity",
            Self::PushEdgeList => "push-edge-list",
            Self::ListDeviceStatus => "list-device-status",
            Self::ListTemplates => "list-templates",
            Self::TemplateInput { .. } => "template-input",
            Self::AttachTemplate(_) => "attach-template",
            Self::ListConfigGroups => "list-config-groups",
            Self::AssociateConfigGroup { .. } => "associate-config-group",
            Self::SetConfigGroupVariables { .. } => "set-config-group-variables",
            Self::DeployConfigGroup { .. } => "deploy-config-group",
        }
    }

    /// Whether the request changes state on the Manager.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::RegisterDevice(_)
                | Self::SetEdgeValidity(_)
                | Self::PushEdgeList
                | Self::AttachTemplate(_)
                | Self::AssociateConfigGroup { .. }
                | Self::SetConfigGroupVariables { .. }
                | Self::DeployConfigGroup { .. }
        )
    }
}

/// Result payload of a [`ManagerRequest`].
#[derive(Debug, Clone)]
pub enum ManagerResponse {
    About(AboutInfo),
    ActionStatus(ActionStatus),
    Devices(Vec<InventoryDevice>),
    DeviceStatus(Vec<DeviceStatus>),
    Templates(Vec<DeviceTemplate>),
    TemplateInput(TemplateInput),
    ConfigGroups(Vec<ConfigGroup>),
    /// An asynchronous task was started; carries its id.
    Task(String),
    /// The call succeeded with nothing to return.
    Done,
}

impl ManagerResponse {
    /// Variant name, used in mismatch errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::About(_) => "about",
            Self::ActionStatus(_) => "action-status",
            Self::Devices(_) => "devices",
            Self::DeviceStatus(_) => "device-status",
            Self::Templates(_) => "templates",
            Self::TemplateInput(_) => "template-input",
            Self::ConfigGroups(_) => "config-groups",
            Self::Task(_) => "task",
            Self::Done => "done",
        }
    }
}

impl ManagerClient {
    /// Execute one typed request against the Manager.
    pub async fn send(&self, request: &ManagerRequest) -> Result<ManagerResponse, Error> {
        match request {
            ManagerRequest::About => self.about().await.map(ManagerResponse::About),
            ManagerRequest::ActionStatus { task_id } => self
                .action_status(task_id)
                .await
                .map(ManagerResponse::ActionStatus),
            ManagerRequest::ListDevices(category) => self
                .list_devices(*category)
                .await
                .map(ManagerResponse::Devices),
            ManagerRequest::RegisterDevice(registration) => self
                .register_device(registration)
                .await
                .map(|()| ManagerResponse::Done),
            ManagerRequest::SetEdgeValidity(entries) => self
                .set_edge_validity(entries)
                .await
                .map(ManagerResponse::Task),
            ManagerRequest::PushEdgeList => self.push_edge_list().await.map(ManagerResponse::Task),
            ManagerRequest::ListDeviceStatus => self
                .list_device_status()
                .await
                .map(ManagerResponse::DeviceStatus),
            ManagerRequest::ListTemplates => {
                self.list_templates().await.map(ManagerResponse::Templates)
            }
            ManagerRequest::TemplateInput {
                template_id,
                device_uuid,
            } => self
                .template_input(template_id, device_uuid)
                .await
                .map(ManagerResponse::TemplateInput),
            ManagerRequest::AttachTemplate(attachment) => self
                .attach_template(attachment)
                .await
                .map(ManagerResponse::Task),
            ManagerRequest::ListConfigGroups => self
                .list_config_groups()
                .await
                .map(ManagerResponse::ConfigGroups),
            ManagerRequest::AssociateConfigGroup {
                group_id,
                device_uuid,
            } => self
                .associate_config_group(group_id, device_uuid)
                .await
                .map(|()| ManagerResponse::Done),
            ManagerRequest::SetConfigGroupVariables {
                group_id,
                device_uuid,
                variables,
            } => self
                .set_config_group_variables(group_id, device_uuid, variables)
                .await
                .map(|()| ManagerResponse::Done),
            ManagerRequest::DeployConfigGroup {
                group_id,
                device_uuid,
            } => self
                .deploy_config_group(group_id, device_uuid)
                .await
                .map(ManagerResponse::Task),
        }
    }
}
