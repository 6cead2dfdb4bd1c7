// Manager session authentication
//
// Form login against `j_security_check`, then XSRF token retrieval.
// The login endpoint sets `JSESSIONID` in the client's cookie jar;
// every later request rides on that cookie.

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::client::{ManagerClient, is_login_page};
use crate::error::Error;

impl ManagerClient {
    /// Authenticate with username/password.
    ///
    /// The Manager answers a rejected login with HTTP 200 and its HTML
    /// login page, so the body is inspected as well as the status. On
    /// success the XSRF token is fetched and stored; Managers older than
    /// 19.2 have no token endpoint and a 404 there is tolerated.
    pub async fn login(&self, username: &str, password: &SecretString) -> Result<(), Error> {
        let url = self.root_url("j_security_check")?;
        debug!("logging in at {}", url);

        let form = [
            ("j_username", username),
            ("j_password", password.expose_secret()),
        ];

        let resp = self
            .http()
            .post(url)
            .form(&form)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        if status.is_server_error() {
            return Err(Error::Api {
                status: status.as_u16(),
                message: "Manager not ready for login".into(),
            });
        }
        if !status.is_success() {
            return Err(Error::Authentication {
                message: format!("login failed (HTTP {status})"),
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;
        if is_login_page(&body) {
            return Err(Error::Authentication {
                message: format!("credentials for user '{username}' rejected"),
            });
        }

        let token_url = self.api_url("client/token")?;
        let resp = self
            .http()
            .get(token_url)
            .send()
            .await
            .map_err(Error::Transport)?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            debug!("no XSRF token endpoint (pre-19.2 Manager)");
            self.set_xsrf_token(None);
        } else if resp.status().is_success() {
            let token = resp.text().await.map_err(Error::Transport)?;
            if is_login_page(&token) {
                return Err(Error::Authentication {
                    message: "session not established after login".into(),
                });
            }
            self.set_xsrf_token(Some(token.trim().to_owned()));
        } else {
            return Err(Error::Api {
                status: resp.status().as_u16(),
                message: "failed to fetch XSRF token".into(),
            });
        }

        debug!("login successful");
        Ok(())
    }

    /// End the current session.
    pub async fn logout(&self) -> Result<(), Error> {
        let url = self.root_url("logout")?;
        debug!("logging out at {}", url);

        let _resp = self
            .http()
            .get(url)
            .query(&[("nocache", "1")])
            .send()
            .await
            .map_err(Error::Transport)?;

        self.set_xsrf_token(None);
        debug!("logout complete");
        Ok(())
    }
}
