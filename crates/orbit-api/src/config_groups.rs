// Configuration group endpoints (Manager 20.12+)

use serde_json::json;

use crate::client::ManagerClient;
use crate::error::Error;
use crate::models::{ConfigGroup, ConfigGroupVariable, ParentTaskHandle};

impl ManagerClient {
    /// List configuration groups. This endpoint returns a bare array.
    ///
    /// `GET /dataservice/v1/config-group`
    pub async fn list_config_groups(&self) -> Result<Vec<ConfigGroup>, Error> {
        let url = self.api_url("v1/config-group")?;
        self.get(url).await
    }

    /// Associate a device with a configuration group.
    ///
    /// `POST /dataservice/v1/config-group/{id}/device/associate`
    pub async fn associate_config_group(&self, group_id: &str, device_uuid: &str) -> Result<(), Error> {
        let url = self.api_url(&format!("v1/config-group/{group_id}/device/associate"))?;
        let body = json!({ "devices": [{ "id": device_uuid }] });
        self.post_unit(url, &body).await
    }

    /// Set the per-device variable values of a configuration group.
    ///
    /// `PUT /dataservice/v1/config-group/{id}/device/variables`
    pub async fn set_config_group_variables(
        &self,
        group_id: &str,
        device_uuid: &str,
        variables: &[ConfigGroupVariable],
    ) -> Result<(), Error> {
        let url = self.api_url(&format!("v1/config-group/{group_id}/device/variables"))?;
        let body = json!({
            "solution": "sdwan",
            "devices": [{ "device-id": device_uuid, "variables": variables }],
        });
        self.put_unit(url, &body).await
    }

    /// Deploy a configuration group to a device and return the task id.
    ///
    /// `POST /dataservice/v1/config-group/{id}/device/deploy`
    pub async fn deploy_config_group(&self, group_id: &str, device_uuid: &str) -> Result<String, Error> {
        let url = self.api_url(&format!("v1/config-group/{group_id}/device/deploy"))?;
        let body = json!({ "devices": [{ "id": device_uuid }] });
        let handle: ParentTaskHandle = self.post(url, &body).await?;
        Ok(handle.parent_task_id)
    }
}
