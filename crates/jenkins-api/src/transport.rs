//! HTTP transport seam
//!
//! The rest of the crate talks to Jenkins through the [`Transport`] trait so
//! that status handling, crumbs and authentication live in one place
//! ([`crate::context::ClientContext`]) regardless of the underlying client.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use thiserror::Error;

use crate::error::{
    JenkinsError,
    JenkinsResult,
};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// `application/x-www-form-urlencoded` pairs
    Form(Vec<(String, String)>),
    /// Raw payload with an explicit content type (XML configuration)
    Raw {
        content_type: String,
        bytes: Vec<u8>,
    },
}

impl RequestBody {
    pub fn xml(xml: impl Into<String>) -> Self {
        RequestBody::Raw {
            content_type: "text/xml".to_string(),
            bytes: xml.into().into_bytes(),
        }
    }
}

/// A fully resolved request: the URL already carries the query string.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

impl ApiRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    /// Header names are stored lower-cased
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// The request never produced an HTTP response
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ConnectError {
    pub message: String,
    pub timed_out: bool,
}

impl ConnectError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: false,
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs exactly one HTTP exchange. Any status code is a successful
    /// exchange here; interpreting it is up to the caller.
    async fn execute(&self, request: ApiRequest) -> Result<RawResponse, ConnectError>;
}

#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub accept_invalid_certs: bool,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            accept_invalid_certs: false,
        }
    }
}

/// [`Transport`] backed by a pooled reqwest client
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(options: &HttpOptions) -> JenkinsResult<Self> {
        // Another component may already have installed a provider.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let client = Client::builder()
            .use_rustls_tls()
            .danger_accept_invalid_certs(options.accept_invalid_certs)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .timeout(options.timeout)
            .connect_timeout(options.connect_timeout)
            .build()
            .map_err(|e| {
                JenkinsError::InvalidConfig(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: ApiRequest) -> Result<RawResponse, ConnectError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = match request.body {
            Some(RequestBody::Form(pairs)) => builder.form(&pairs),
            Some(RequestBody::Raw {
                content_type,
                bytes,
            }) => builder.header(CONTENT_TYPE, content_type).body(bytes),
            None if request.method == Method::Post => builder.body(Vec::new()),
            None => builder,
        };

        let response = builder.send().await.map_err(|e| ConnectError {
            message: e.to_string(),
            timed_out: e.is_timeout(),
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_ascii_lowercase(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| ConnectError {
                message: format!("Failed to read response body: {e}"),
                timed_out: e.is_timeout(),
            })?
            .to_vec();

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}
