// Device template endpoints

use serde_json::json;

use crate::client::ManagerClient;
use crate::error::Error;
use crate::models::{DeviceTemplate, TaskHandle, TemplateAttachment, TemplateInput};

impl ManagerClient {
    /// List device templates.
    ///
    /// `GET /dataservice/template/device`
    pub async fn list_templates(&self) -> Result<Vec<DeviceTemplate>, Error> {
        let url = self.api_url("template/device")?;
        self.get_data(url).await
    }

    /// Fetch the variable columns a template needs for one device.
    ///
    /// `POST /dataservice/template/device/config/input`
    pub async fn template_input(
        &self,
        template_id: &str,
        device_uuid: &str,
    ) -> Result<TemplateInput, Error> {
        let url = self.api_url("template/device/config/input")?;
        let body = json!({
            "templateId": template_id,
            "deviceIds": [device_uuid],
            "isEdited": false,
            "isMasterEdited": false,
        });
        self.post(url, &body).await
    }

    /// Attach a device template and return the task id.
    ///
    /// `POST /dataservice/template/device/config/attachfeature`
    pub async fn attach_template(&self, attachment: &TemplateAttachment) -> Result<String, Error> {
        let url = self.api_url("template/device/config/attachfeature")?;
        let body = json!({
            "deviceTemplateList": [{
                "templateId": attachment.template_id,
                "device": [attachment.values],
                "isEdited": false,
                "isMasterEdited": false,
            }]
        });
        let handle: TaskHandle = self.post(url, &body).await?;
        Ok(handle.id)
    }
}
