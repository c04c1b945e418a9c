use std::time::Duration;

use secrecy::SecretString;
use serde::{
    Deserialize,
    Deserializer,
};

use crate::context::Credentials;
use crate::transport::HttpOptions;

pub(super) const DEFAULT_SERVER_URL: &str = "http://localhost:8080";

pub(super) const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub(super) const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Default, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub http: HttpConfig,
}

impl ClientConfig {
    pub fn credentials(&self) -> Option<Credentials> {
        self.server.credentials()
    }

    pub fn http_options(&self) -> HttpOptions {
        self.http.options()
    }
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_url")]
    pub url: String,

    #[serde(default)]
    pub username: Option<String>,

    /// Password or API token
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub password: Option<SecretString>,

    /// Fetch a CSRF crumb right after connecting
    #[serde(default)]
    pub crumbs: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_server_url(),
            username: None,
            password: None,
            crumbs: false,
        }
    }
}

impl ServerConfig {
    pub fn credentials(&self) -> Option<Credentials> {
        let username = self.username.as_deref().filter(|u| !u.is_empty())?;
        let password = self
            .password
            .as_ref()
            .map(|p| secrecy::ExposeSecret::expose_secret(p).to_string())
            .unwrap_or_default();
        Some(Credentials::new(username, password))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            accept_invalid_certs: false,
        }
    }
}

impl HttpConfig {
    pub fn options(&self) -> HttpOptions {
        HttpOptions {
            timeout: Duration::from_secs(self.timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            accept_invalid_certs: self.accept_invalid_certs,
        }
    }
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}
