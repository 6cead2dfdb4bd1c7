// ── Manager API seam ──
//
// The session talks to the Manager only through this trait. `ManagerClient`
// is the real implementation; tests substitute a scripted fake.

use async_trait::async_trait;
use orbit_api::{ManagerClient, ManagerRequest, ManagerResponse};
use secrecy::SecretString;

#[async_trait]
pub trait ManagerApi: Send + Sync {
    async fn login(&self, username: &str, password: &SecretString) -> Result<(), orbit_api::Error>;

    async fn logout(&self) -> Result<(), orbit_api::Error>;

    async fn send(&self, request: &ManagerRequest) -> Result<ManagerResponse, orbit_api::Error>;
}

#[async_trait]
impl ManagerApi for ManagerClient {
    async fn login(&self, username: &str, password: &SecretString) -> Result<(), orbit_api::Error> {
        ManagerClient::login(self, username, password).await
    }

    async fn logout(&self) -> Result<(), orbit_api::Error> {
        ManagerClient::logout(self).await
    }

    async fn send(&self, request: &ManagerRequest) -> Result<ManagerResponse, orbit_api::Error> {
        ManagerClient::send(self, request).await
    }
}
