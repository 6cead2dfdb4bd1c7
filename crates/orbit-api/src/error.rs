use thiserror::Error;

/// Top-level error type for the `orbit-api` crate.
///
/// Covers every failure mode of the Manager REST surface: login, transport,
/// HTTP status errors, and payload decoding. `orbit-core` decides what to
/// retry by asking each error for its [`ErrorClass`].
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login rejected (wrong credentials, account locked, etc.)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The session cookie is no longer accepted. The Manager signals this
    /// with 401/403 or by answering an API call with its HTML login page.
    #[error("Session expired -- re-authentication required")]
    SessionExpired,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Connection could not be established.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// TLS handshake or client construction error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// HTTP 429 from the Manager.
    #[error("Rate limited -- retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    // ── Manager API ─────────────────────────────────────────────────
    /// Non-success HTTP status with the (truncated) response body.
    #[error("Manager API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

/// Coarse classification used by retry policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Connection refused / reset / DNS.
    Connection,
    Timeout,
    RateLimited,
    /// 5xx from the Manager.
    Server,
    /// Credentials rejected.
    Authentication,
    SessionExpired,
    NotFound,
    /// Malformed request (400, 405, 415, 422).
    BadRequest,
    Conflict,
    Decode,
    Other,
}

impl ErrorClass {
    /// Map an HTTP status code to its class.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Authentication,
            404 => Self::NotFound,
            408 => Self::Timeout,
            409 => Self::Conflict,
            429 => Self::RateLimited,
            400..=499 => Self::BadRequest,
            500..=599 => Self::Server,
            _ => Self::Other,
        }
    }

    /// The classes a default retry policy treats as transient.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            Self::Connection | Self::Timeout | Self::RateLimited | Self::Server
        )
    }
}

impl Error {
    /// Classify this error for retry decisions.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Transport(e) => {
                if e.is_timeout() {
                    ErrorClass::Timeout
                } else if e.is_connect() {
                    ErrorClass::Connection
                } else if let Some(status) = e.status() {
                    ErrorClass::from_status(status.as_u16())
                } else if e.is_decode() {
                    ErrorClass::Decode
                } else {
                    ErrorClass::Other
                }
            }
            Self::Timeout { .. } => ErrorClass::Timeout,
            Self::Connection(_) => ErrorClass::Connection,
            Self::RateLimited { .. } => ErrorClass::RateLimited,
            Self::Authentication { .. } => ErrorClass::Authentication,
            Self::SessionExpired => ErrorClass::SessionExpired,
            Self::Api { status, .. } => ErrorClass::from_status(*status),
            Self::Deserialization { .. } => ErrorClass::Decode,
            Self::InvalidUrl(_) | Self::Tls(_) => ErrorClass::Other,
        }
    }

    /// Returns `true` if this error indicates the session has lapsed
    /// and a fresh login might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        self.class().is_transient()
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        self.class() == ErrorClass::NotFound
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            Self::RateLimited { .. } => Some(429),
            _ => None,
        }
    }
}
