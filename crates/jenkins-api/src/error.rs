use std::fmt;

use thiserror::Error;

/// Kind of remote resource an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Jenkins,
    Job,
    Build,
    Node,
    Executor,
    Queue,
    QueueItem,
    View,
    TestReport,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Jenkins => "jenkins",
            ResourceKind::Job => "job",
            ResourceKind::Build => "build",
            ResourceKind::Node => "node",
            ResourceKind::Executor => "executor",
            ResourceKind::Queue => "queue",
            ResourceKind::QueueItem => "queue item",
            ResourceKind::View => "view",
            ResourceKind::TestReport => "test report",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Connection failure, timeout or unexpected HTTP status
    Transport,
    /// HTTP 403
    AccessDenied,
    /// Body was not the expected JSON document
    Decode,
    /// The server reported the resource as absent
    NotFound,
    /// Caller supplied an argument the server rejected
    InvalidArgument,
    /// Client configuration could not be loaded or is inconsistent
    Config,
}

/// Jenkins client error types
#[derive(Error, Debug)]
pub enum JenkinsError {
    #[error("Transport error during {resource} ({url}): {message}")]
    Transport {
        resource: String,
        url: String,
        message: String,
    },

    #[error("Unexpected HTTP status {status} during {resource} ({url})")]
    HttpStatus {
        resource: String,
        url: String,
        status: u16,
    },

    #[error("Access Denied [HTTP status code 403] to {url}")]
    AccessDenied { url: String },

    #[error("Failed to decode {resource} from {url}: {message}")]
    Decode {
        resource: String,
        url: String,
        message: String,
    },

    #[error("{kind} not found: {name}")]
    NotFound { kind: ResourceKind, name: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type JenkinsResult<T> = Result<T, JenkinsError>;

impl JenkinsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            JenkinsError::Transport { .. } | JenkinsError::HttpStatus { .. } => {
                ErrorKind::Transport
            }
            JenkinsError::AccessDenied { .. } => ErrorKind::AccessDenied,
            JenkinsError::Decode { .. } => ErrorKind::Decode,
            JenkinsError::NotFound { .. } => ErrorKind::NotFound,
            JenkinsError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            JenkinsError::InvalidConfig(_) => ErrorKind::Config,
        }
    }

    /// HTTP status carried by the error, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            JenkinsError::HttpStatus { status, .. } => Some(*status),
            JenkinsError::AccessDenied { .. } => Some(403),
            _ => None,
        }
    }

    pub(crate) fn decode(
        resource: impl Into<String>, url: impl Into<String>, message: impl fmt::Display,
    ) -> Self {
        JenkinsError::Decode {
            resource: resource.into(),
            url: url.into(),
            message: message.to_string(),
        }
    }
}
