// System and task-status endpoints

use crate::client::ManagerClient;
use crate::error::Error;
use crate::models::{AboutInfo, ActionStatus};

impl ManagerClient {
    /// Manager version information.
    ///
    /// `GET /dataservice/client/about`
    pub async fn about(&self) -> Result<AboutInfo, Error> {
        let url = self.api_url("client/about")?;
        self.get_data(url).await
    }

    /// Status of an asynchronous Manager task.
    ///
    /// `GET /dataservice/device/action/status/{id}`
    pub async fn action_status(&self, task_id: &str) -> Result<ActionStatus, Error> {
        let url = self.api_url(&format!("device/action/status/{task_id}"))?;
        self.get(url).await
    }
}
