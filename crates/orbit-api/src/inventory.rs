// Device inventory endpoints
//
// Listing registered devices, registering control components, and the
// edge allow-list (validity + push to controllers).

use serde_json::json;

use crate::client::ManagerClient;
use crate::error::Error;
use crate::models::{
    DeviceCategory, DeviceRegistration, DeviceStatus, EdgeValidity, InventoryDevice, TaskHandle,
};

impl ManagerClient {
    /// List registered devices of one category.
    ///
    /// `GET /dataservice/system/device/{controllers|vedges}`
    pub async fn list_devices(&self, category: DeviceCategory) -> Result<Vec<InventoryDevice>, Error> {
        let url = self.api_url(&format!("system/device/{}", category.path_segment()))?;
        self.get_data(url).await
    }

    /// Register a controller or validator with the Manager.
    ///
    /// `POST /dataservice/system/device`. The Manager logs into the device
    /// with the given credentials, so a wrong device password comes back as
    /// an HTTP 400/500 with an explanatory body.
    pub async fn register_device(&self, registration: &DeviceRegistration) -> Result<(), Error> {
        let url = self.api_url("system/device")?;
        self.post_unit(url, registration).await
    }

    /// Mark an edge certificate as valid on the allow-list.
    ///
    /// `POST /dataservice/certificate/save/vedge/list`
    pub async fn set_edge_validity(&self, entries: &[EdgeValidity]) -> Result<String, Error> {
        let url = self.api_url("certificate/save/vedge/list")?;
        let handle: TaskHandle = self.post(url, &entries).await?;
        Ok(handle.id)
    }

    /// Push the edge allow-list to the controllers, which lets the edges
    /// complete certificate installation.
    ///
    /// `POST /dataservice/certificate/vedge/list?action=push`
    pub async fn push_edge_list(&self) -> Result<String, Error> {
        let mut url = self.api_url("certificate/vedge/list")?;
        url.query_pairs_mut().append_pair("action", "push");
        let handle: TaskHandle = self.post(url, &json!({})).await?;
        Ok(handle.id)
    }

    /// Live device state, including control-connection counts.
    ///
    /// `GET /dataservice/device`
    pub async fn list_device_status(&self) -> Result<Vec<DeviceStatus>, Error> {
        let url = self.api_url("device")?;
        self.get_data(url).await
    }
}
