//! Shared client state: base URL, credentials, crumb and transport

use std::fmt;
use std::sync::Arc;

use base64::Engine;
use secrecy::{
    ExposeSecret,
    SecretString,
};
use tokio::sync::RwLock;

use crate::crumb::{
    Crumb,
    CrumbState,
    CRUMB_ISSUER_PATH,
};
use crate::document::RemoteDocument;
use crate::error::{
    JenkinsError,
    JenkinsResult,
};
use crate::transport::{
    ApiRequest,
    Method,
    RawResponse,
    RequestBody,
    Transport,
};

/// HTTP basic-auth credentials (password or API token)
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    pub(crate) fn authorization(&self) -> String {
        let raw = format!("{}:{}", self.username, self.password.expose_secret());
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(raw)
        )
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// State shared by the root client and every resource handle it creates
///
/// Handles only read from the context; the crumb is the one piece that
/// changes after construction.
pub struct ClientContext {
    base_url: String,
    credentials: Option<Credentials>,
    transport: Arc<dyn Transport>,
    crumb: RwLock<CrumbState>,
}

impl ClientContext {
    pub fn new(
        base_url: &str, credentials: Option<Credentials>, transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
            credentials,
            transport,
            crumb: RwLock::new(CrumbState::Disabled),
        }
    }

    /// Base URL, always ending with `/`
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn username(&self) -> Option<&str> {
        self.credentials.as_ref().map(|c| c.username.as_str())
    }

    pub fn url_for(&self, path: &str, query: &[(String, String)]) -> String {
        let mut url = format!("{}{}", self.base_url, path.trim_start_matches('/'));
        if !query.is_empty() {
            let encoded = query
                .iter()
                .map(|(key, value)| {
                    format!(
                        "{}={}",
                        urlencoding::encode(key),
                        urlencoding::encode(value)
                    )
                })
                .collect::<Vec<_>>()
                .join("&");
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(&encoded);
        }
        url
    }

    /// Performs one exchange without interpreting the status code
    pub async fn send(
        &self, method: Method, path: &str, query: &[(String, String)], body: Option<RequestBody>,
        resource: &str,
    ) -> JenkinsResult<RawResponse> {
        let url = self.url_for(path, query);

        let mut headers = Vec::new();
        if let Some(credentials) = &self.credentials {
            headers.push(("Authorization".to_string(), credentials.authorization()));
        }
        if method == Method::Post {
            if let Some(crumb) = self.crumb.read().await.crumb() {
                headers.push(crumb.header());
            }
        }

        let request = ApiRequest {
            method,
            url: url.clone(),
            headers,
            body,
        };

        let response = self.transport.execute(request).await.map_err(|e| {
            tracing::debug!(%method, %url, error = %e, "Jenkins request failed");
            JenkinsError::Transport {
                resource: resource.to_string(),
                url: url.clone(),
                message: e.message,
            }
        })?;

        tracing::debug!(%method, %url, status = response.status, "Jenkins request");
        Ok(response)
    }

    /// GET that must answer exactly 200
    pub async fn get(
        &self, path: &str, query: &[(String, String)], resource: &str,
    ) -> JenkinsResult<RawResponse> {
        let response = self.send(Method::Get, path, query, None, resource).await?;
        check_status(&response, &self.url_for(path, query), resource, |s| s == 200)?;
        Ok(response)
    }

    /// POST that must answer with a 2xx status
    pub async fn post(
        &self, path: &str, body: Option<RequestBody>, resource: &str,
    ) -> JenkinsResult<RawResponse> {
        let response = self.send(Method::Post, path, &[], body, resource).await?;
        check_status(&response, &self.url_for(path, &[]), resource, |s| {
            (200..300).contains(&s)
        })?;
        Ok(response)
    }

    pub async fn get_document(
        &self, path: &str, query: &[(String, String)], resource: &str,
    ) -> JenkinsResult<RemoteDocument> {
        let response = self.get(path, query, resource).await?;
        RemoteDocument::decode(&response.body, resource, &self.url_for(path, query))
    }

    pub async fn get_text(&self, path: &str, resource: &str) -> JenkinsResult<String> {
        let response = self.get(path, &[], resource).await?;
        Ok(response.text())
    }

    /// Fetches a crumb and attaches it to every later POST. Failures leave
    /// crumbs disabled and are only logged.
    pub async fn enable_crumbs(&self) -> bool {
        let state = match self
            .get_document(CRUMB_ISSUER_PATH, &[], "csrf crumb")
            .await
        {
            Ok(document) => match Crumb::from_document(&document) {
                Some(crumb) => CrumbState::Enabled(crumb),
                None => {
                    tracing::warn!("Crumb issuer returned a malformed document, crumbs disabled");
                    CrumbState::Disabled
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch csrf crumb, crumbs disabled");
                CrumbState::Disabled
            }
        };

        let enabled = state.is_enabled();
        *self.crumb.write().await = state;
        enabled
    }

    pub async fn disable_crumbs(&self) {
        *self.crumb.write().await = CrumbState::Disabled;
    }

    pub async fn crumbs_enabled(&self) -> bool {
        self.crumb.read().await.is_enabled()
    }

    pub async fn crumb(&self) -> Option<Crumb> {
        self.crumb.read().await.crumb().cloned()
    }
}

impl fmt::Debug for ClientContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientContext")
            .field("base_url", &self.base_url)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

fn normalize_base_url(base_url: &str) -> String {
    let trimmed = base_url.trim();
    if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    }
}

fn check_status(
    response: &RawResponse, url: &str, resource: &str, accept: impl Fn(u16) -> bool,
) -> JenkinsResult<()> {
    match response.status {
        403 => Err(JenkinsError::AccessDenied {
            url: url.to_string(),
        }),
        status if accept(status) => Ok(()),
        status => Err(JenkinsError::HttpStatus {
            resource: resource.to_string(),
            url: url.to_string(),
            status,
        }),
    }
}

/// Percent-encodes one path segment
pub(crate) fn encode_segment(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

/// Maps a (possibly foldered) job name such as `team/app` to `team/job/app`,
/// encoding each segment
pub(crate) fn encode_job_path(name: &str) -> String {
    name.split('/')
        .filter(|segment| !segment.is_empty())
        .map(encode_segment)
        .collect::<Vec<_>>()
        .join("/job/")
}
