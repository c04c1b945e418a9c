use std::path::{
    Path,
    PathBuf,
};

use secrecy::SecretString;
use thiserror::Error;

use super::interpolation::{
    interpolate_toml,
    InterpolationError,
};
use super::schema::{
    ClientConfig,
    HttpConfig,
    ServerConfig,
};
use crate::error::JenkinsError;

pub const ENV_URL: &str = "JENKINS_URL";
pub const ENV_USER: &str = "JENKINS_USER";
pub const ENV_PASSWORD: &str = "JENKINS_PASSWORD";
pub const ENV_TOKEN: &str = "JENKINS_TOKEN";
pub const ENV_CRUMBS: &str = "JENKINS_CRUMBS";

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Environment variable interpolation failed: {0}")]
    InterpolationError(#[from] InterpolationError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type ConfigLoadResult<T> = Result<T, ConfigLoadError>;

impl From<ConfigLoadError> for JenkinsError {
    fn from(err: ConfigLoadError) -> Self {
        match err {
            ConfigLoadError::InvalidConfig(message) => JenkinsError::InvalidConfig(message),
            other => JenkinsError::InvalidConfig(other.to_string()),
        }
    }
}

impl ClientConfig {
    pub fn load(path: &Path) -> ConfigLoadResult<Self> {
        if !path.exists() {
            return Err(ConfigLoadError::FileNotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parses TOML, expanding `${VAR}` references before deserializing
    pub fn parse(content: &str) -> ConfigLoadResult<Self> {
        let mut value: toml::Value = toml::from_str(content)?;

        interpolate_toml(&mut value)?;

        let config: ClientConfig = value.try_into().map_err(|e| {
            ConfigLoadError::InvalidConfig(format!("Failed to deserialize config: {}", e))
        })?;
        config.validate()?;

        tracing::debug!(
            url = %config.server.url,
            authenticated = config.server.username.is_some(),
            "Loaded Jenkins client config"
        );

        Ok(config)
    }

    /// Reads `JENKINS_URL`, `JENKINS_USER`, `JENKINS_PASSWORD` (or
    /// `JENKINS_TOKEN`) and `JENKINS_CRUMBS`
    pub fn from_env() -> ConfigLoadResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigLoadResult<Self> {
        let url = lookup(ENV_URL)
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ConfigLoadError::InvalidConfig(format!("{ENV_URL} is not set")))?;

        let password = lookup(ENV_PASSWORD)
            .or_else(|| lookup(ENV_TOKEN))
            .map(SecretString::from);

        let crumbs = lookup(ENV_CRUMBS)
            .map(|raw| matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false);

        let config = ClientConfig {
            server: ServerConfig {
                url,
                username: lookup(ENV_USER).filter(|u| !u.is_empty()),
                password,
                crumbs,
            },
            http: HttpConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigLoadResult<()> {
        let url = self.server.url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigLoadError::InvalidConfig(format!(
                "server.url must start with http:// or https://, got '{url}'"
            )));
        }

        if self.server.password.is_some() && self.server.username.is_none() {
            return Err(ConfigLoadError::InvalidConfig(
                "server.password is set but server.username is missing".to_string(),
            ));
        }

        if self.http.timeout_secs == 0 || self.http.connect_timeout_secs == 0 {
            return Err(ConfigLoadError::InvalidConfig(
                "http timeouts must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}
