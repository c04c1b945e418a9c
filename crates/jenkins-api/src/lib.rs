//! Async client for the Jenkins REST/JSON API
//!
//! [`Jenkins`] is the root client. It hands out resource handles ([`Job`],
//! [`Build`], [`Node`], [`Executor`], [`Queue`], [`QueueItem`], [`View`],
//! [`TestReport`]) that share one [`ClientContext`] holding the base URL,
//! credentials and the optional CSRF crumb. Each handle caches the last
//! document it fetched; accessors read that snapshot and only
//! [`Resource::refresh`] talks to the server again.
//!
//! ```no_run
//! # async fn run() -> jenkins_api::JenkinsResult<()> {
//! use jenkins_api::{Jenkins, Resource};
//!
//! let jenkins = Jenkins::builder("https://ci.example.com")
//!     .credentials("bot", "api-token")
//!     .crumbs(true)
//!     .connect()
//!     .await?;
//!
//! let job = jenkins.job("core").await?;
//! if let Some(build) = job.last_build().await? {
//!     println!("#{:?} {}", build.number(), build.result());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod crumb;
pub mod document;
pub mod error;
pub mod items;
pub mod jenkins;
pub mod logging;
pub mod resource;
pub mod transport;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use config::{
    ClientConfig,
    ConfigLoadError,
};
pub use context::{
    ClientContext,
    Credentials,
};
pub use crumb::Crumb;
pub use document::RemoteDocument;
pub use error::{
    ErrorKind,
    JenkinsError,
    JenkinsResult,
    ResourceKind,
};
pub use items::{
    Build,
    BuildResult,
    BuildSelector,
    Executor,
    Job,
    LaunchOutcome,
    Node,
    ParameterDefinition,
    ParameterValue,
    Queue,
    QueueItem,
    SuiteStatus,
    TestReport,
    View,
};
pub use jenkins::{
    Jenkins,
    JenkinsBuilder,
};
pub use resource::Resource;
pub use transport::{
    HttpOptions,
    HttpTransport,
    Transport,
};
