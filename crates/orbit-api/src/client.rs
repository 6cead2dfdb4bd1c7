// Manager API HTTP client
//
// Wraps `reqwest::Client` with Manager-specific URL construction, XSRF
// token handling, `{ data: ... }` envelope unwrapping, and status mapping.
// Endpoint groups (inventory, templates, config groups, system) are
// implemented as inherent methods in separate files.

use std::sync::{PoisonError, RwLock};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

const XSRF_HEADER: &str = "X-XSRF-TOKEN";
const BODY_PREVIEW: usize = 200;

/// Most `dataservice` endpoints wrap their payload as `{"data": ...}`.
#[derive(serde::Deserialize)]
pub(crate) struct DataEnvelope<T> {
    pub data: T,
}

/// Raw HTTP client for the SD-WAN Manager REST API.
///
/// Holds the session cookie jar and the XSRF token captured at login.
/// Does not retry or re-authenticate on its own; that is the job of the
/// session layer in `orbit-core`.
pub struct ManagerClient {
    http: reqwest::Client,
    base_url: Url,
    timeout_secs: u64,
    /// Sent on every mutating request; fetched from `/dataservice/client/token`.
    xsrf_token: RwLock<Option<String>>,
}

impl ManagerClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// A cookie jar is added when the config lacks one, since the Manager
    /// keeps its session in `JSESSIONID`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let config = if transport.cookie_jar.is_some() {
            transport.clone()
        } else {
            transport.clone().with_cookie_jar()
        };
        let http = config.build_client()?;
        Ok(Self {
            http,
            base_url,
            timeout_secs: transport.timeout.as_secs(),
            xsrf_token: RwLock::new(None),
        })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            timeout_secs: 0,
            xsrf_token: RwLock::new(None),
        }
    }

    /// The underlying HTTP client (for the login flow).
    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// The Manager base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── XSRF token management ─────────────────────────────────────────

    pub(crate) fn set_xsrf_token(&self, token: Option<String>) {
        *self
            .xsrf_token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = token;
    }

    /// Whether a token was captured at login.
    pub fn has_xsrf_token(&self) -> bool {
        self.xsrf_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn apply_xsrf(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let guard = self
            .xsrf_token
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        match guard.as_deref() {
            Some(token) => builder.header(XSRF_HEADER, token),
            None => builder,
        }
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build a URL relative to the Manager root: `{base}/{path}`.
    pub(crate) fn root_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Url::parse(&format!("{base}/{path}")).map_err(Error::InvalidUrl)
    }

    /// Build a REST URL: `{base}/dataservice/{path}`.
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        self.root_url(&format!("dataservice/{}", path.trim_start_matches('/')))
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a GET request and decode the JSON body.
    pub(crate) async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);
        let resp = self.http.get(url).send().await.map_err(|e| self.map_transport(e))?;
        self.parse_json(resp).await
    }

    /// Send a GET request and unwrap the `data` envelope.
    pub(crate) async fn get_data<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        let envelope: DataEnvelope<T> = self.get(url).await?;
        Ok(envelope.data)
    }

    /// Send a POST request with JSON body and decode the JSON response.
    pub(crate) async fn post<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &(impl Serialize + Sync),
    ) -> Result<T, Error> {
        debug!("POST {}", url);
        let builder = self.apply_xsrf(self.http.post(url).json(body));
        let resp = builder.send().await.map_err(|e| self.map_transport(e))?;
        self.parse_json(resp).await
    }

    /// Send a POST request whose response body carries nothing of interest.
    pub(crate) async fn post_unit(
        &self,
        url: Url,
        body: &(impl Serialize + Sync),
    ) -> Result<(), Error> {
        debug!("POST {}", url);
        let builder = self.apply_xsrf(self.http.post(url).json(body));
        let resp = builder.send().await.map_err(|e| self.map_transport(e))?;
        self.read_body(resp).await.map(|_| ())
    }

    /// Send a PUT request whose response body carries nothing of interest.
    pub(crate) async fn put_unit(
        &self,
        url: Url,
        body: &(impl Serialize + Sync),
    ) -> Result<(), Error> {
        debug!("PUT {}", url);
        let builder = self.apply_xsrf(self.http.put(url).json(body));
        let resp = builder.send().await.map_err(|e| self.map_transport(e))?;
        self.read_body(resp).await.map(|_| ())
    }

    fn map_transport(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() && self.timeout_secs > 0 {
            Error::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else {
            Error::Transport(err)
        }
    }

    async fn parse_json<T: DeserializeOwned>(&self, resp: reqwest::Response) -> Result<T, Error> {
        let body = self.read_body(resp).await?;
        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(&body)),
            body,
        })
    }

    /// Map the HTTP status to an error or return the body text.
    ///
    /// An expired session is answered either with 401/403 or with the HTML
    /// login page and HTTP 200; both surface as [`Error::SessionExpired`].
    async fn read_body(&self, resp: reqwest::Response) -> Result<String, Error> {
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(Error::SessionExpired);
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(1);
            return Err(Error::RateLimited { retry_after_secs });
        }

        let body = resp.text().await.map_err(|e| self.map_transport(e))?;

        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }

        if is_login_page(&body) {
            trace!("received login page instead of API payload");
            return Err(Error::SessionExpired);
        }

        Ok(body)
    }
}

/// The Manager returns its HTML login form when a session is not valid.
pub(crate) fn is_login_page(body: &str) -> bool {
    let head = body.trim_start();
    head.starts_with("<html") || head.starts_with("<!DOCTYPE html") || head.contains("j_security_check")
}

/// Error bodies look like `{"error":{"message":"...","details":"..."}}`.
fn api_error_message(body: &str) -> String {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        error: ErrorInner,
    }
    #[derive(serde::Deserialize)]
    struct ErrorInner {
        message: Option<String>,
        details: Option<String>,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody { error }) => match (error.message, error.details) {
            (Some(m), Some(d)) => format!("{m}: {d}"),
            (Some(m), None) => m,
            (None, Some(d)) => d,
            (None, None) => preview(body).to_owned(),
        },
        Err(_) => preview(body).to_owned(),
    }
}

fn preview(body: &str) -> &str {
    let mut end = body.len().min(BODY_PREVIEW);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}
