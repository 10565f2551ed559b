//! Remote HTTP/HTTPS backend.

use super::{Backend, Entry, QueryResponse};
use crate::error::{BackendError, Code, Result, VarError};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, header};
use std::fmt;
use super::versions::VersionTable;
use parking_lot::Mutex;
use std::time::Duration;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Credentials sent with every query.
#[derive(Clone, Default)]
pub enum HttpAuth {
    /// Anonymous requests.
    #[default]
    None,
    /// `Authorization: Bearer <token>`.
    Bearer(String),
    /// HTTP basic auth as (username, password).
    Basic(String, String),
}

impl HttpAuth {
    fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            HttpAuth::None => request,
            HttpAuth::Bearer(token) => request.bearer_auth(token),
            HttpAuth::Basic(user, password) => request.basic_auth(user, Some(password)),
        }
    }
}

impl fmt::Debug for HttpAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print secrets
        match self {
            HttpAuth::None => f.write_str("None"),
            HttpAuth::Bearer(_) => f.write_str("Bearer(..)"),
            HttpAuth::Basic(user, _) => write!(f, "Basic({}, ..)", user),
        }
    }
}

/// Raw response attached to snapshots produced by [`HttpBackend`].
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// URL that was fetched.
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// `ETag` header, if the server sent one.
    pub etag: Option<String>,
}

/// HTTP-based backend.
///
/// Fetches `GET {base_url}/{name}` and treats the response body as the raw
/// value. A `404` means the variable does not exist. A new version is assigned
/// whenever the `ETag` header changes, or the body when the server sends no
/// `ETag`. Tokens are compared exactly, never hashed.
///
/// Plain HTTP has no change notifications, so watchers over this backend poll.
///
/// # Examples
///
/// ```rust,no_run
/// use runtimevar::backends::HttpBackend;
/// use std::time::Duration;
///
/// # fn example() -> runtimevar::error::Result<()> {
/// let backend = HttpBackend::builder()
///     .with_url("https://config.example.com/vars")
///     .with_auth_token("secret-token")
///     .with_timeout(Duration::from_secs(10))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct HttpBackend {
    base_url: String,
    client: Client,
    auth: HttpAuth,
    versions: Mutex<VersionTable>,
}

impl HttpBackend {
    /// Create a new builder for constructing an HTTP backend.
    pub fn builder() -> HttpBackendBuilder {
        HttpBackendBuilder::new()
    }

    fn url_for(&self, name: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            name.trim_start_matches('/')
        )
    }
}

fn request_error(url: &str, err: reqwest::Error) -> BackendError {
    let code = if err.is_timeout() {
        Code::DeadlineExceeded
    } else if err.is_connect() {
        Code::Unavailable
    } else if let Some(status) = err.status() {
        Code::from_http_status(status.as_u16())
    } else {
        Code::Unknown
    };
    BackendError::new(code, format!("HTTP request to {} failed: {}", url, err)).with_source(err)
}

#[async_trait]
impl Backend for HttpBackend {
    async fn query(&self, name: &str) -> std::result::Result<QueryResponse, BackendError> {
        let url = self.url_for(name);
        let request = self.auth.apply(self.client.get(&url));

        let response = request.send().await.map_err(|e| request_error(&url, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            self.versions.lock().forget(name);
            return Ok(QueryResponse::new(Vec::new()));
        }
        if !status.is_success() {
            let code = Code::from_http_status(status.as_u16());
            return Err(BackendError::new(code, format!("GET {} returned {}", url, status)));
        }

        let etag = response
            .headers()
            .get(header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.bytes().await.map_err(|e| request_error(&url, e))?;

        let version = {
            let mut versions = self.versions.lock();
            match &etag {
                Some(etag) => versions.resolve(name, etag.as_bytes()),
                None => versions.resolve(name, &body),
            }
        };
        let raw = HttpResponse {
            url,
            status: status.as_u16(),
            etag,
        };
        Ok(QueryResponse::new(vec![Entry::new(body.to_vec(), version)]).with_raw(raw))
    }

    fn name(&self) -> String {
        format!("http:{}", self.base_url)
    }
}

/// Fluent configuration for [`HttpBackend`].
#[derive(Debug, Default)]
pub struct HttpBackendBuilder {
    base_url: Option<String>,
    auth: HttpAuth,
    request_timeout: Option<Duration>,
}

impl HttpBackendBuilder {
    /// Start with no URL, no credentials and the default request timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Base URL that variable names are appended to.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Send `token` as a bearer token.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth = HttpAuth::Bearer(token.into());
        self
    }

    /// Send HTTP basic credentials.
    pub fn with_basic_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = HttpAuth::Basic(user.into(), password.into());
        self
    }

    /// Cap each HTTP request at `timeout` (default 10 seconds).
    ///
    /// The watch loop applies its own per-call timeout on top of this one.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Create the backend.
    ///
    /// # Errors
    ///
    /// Returns [`VarError::Config`] without a base URL or when the HTTP client
    /// fails to initialise.
    pub fn build(self) -> Result<HttpBackend> {
        let base_url = self
            .base_url
            .ok_or_else(|| VarError::Config("HttpBackend needs a base URL".to_string()))?;

        let client = Client::builder()
            .timeout(self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT))
            .build()
            .map_err(|e| VarError::Config(format!("Cannot initialise HTTP client: {}", e)))?;

        Ok(HttpBackend {
            base_url,
            client,
            auth: self.auth,
            versions: Mutex::new(VersionTable::default()),
        })
    }
}
