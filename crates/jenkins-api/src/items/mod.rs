//! Resource handles for the objects a Jenkins server exposes

mod build;
mod executor;
mod job;
mod node;
mod queue;
mod test_report;
mod view;

use std::sync::Arc;

use serde_json::Value;

pub use build::{
    Build,
    BuildResult,
    BuildSelector,
    ParameterValue,
    DEFAULT_BUILD_TREE,
};
pub use executor::Executor;
pub use job::{
    DefaultValue,
    Job,
    LaunchOutcome,
    ParameterDefinition,
    DEFAULT_LAUNCH_TIMEOUT,
    DEFAULT_POLL_INTERVAL,
};
pub use node::Node;
pub use queue::{
    Queue,
    QueueItem,
};
pub use test_report::{
    SuiteStatus,
    TestReport,
};
pub use view::View;

use crate::context::ClientContext;
use crate::error::JenkinsResult;

pub(crate) const COMPUTERS_PATH: &str = "computer/api/json";

/// Display names of every node listed by `computer/api/json`
pub(crate) async fn node_names(context: &ClientContext) -> JenkinsResult<Vec<String>> {
    let document = context
        .get_document(COMPUTERS_PATH, &[], "node list")
        .await?;

    Ok(document
        .array("computer")
        .into_iter()
        .flatten()
        .filter_map(|computer| computer.get("displayName").and_then(Value::as_str))
        .map(str::to_string)
        .collect())
}

/// Linear scan over every executor of every node for the one running
/// `build`. A build that is not building never has an executor and costs no
/// request; any failed fetch aborts the scan.
pub async fn find_executor_for_build(
    context: &Arc<ClientContext>, build: &Build,
) -> JenkinsResult<Option<Executor>> {
    if !build.is_building() {
        return Ok(None);
    }
    let Some(url) = build.url() else {
        return Ok(None);
    };

    for name in node_names(context).await? {
        let node = Node::fetch(Arc::clone(context), &name).await?;
        for executor in node.executors().await? {
            if executor.build_url() == Some(url) {
                tracing::debug!(node = %name, executor = executor.number(), "Found executor for build");
                return Ok(Some(executor));
            }
        }
    }

    Ok(None)
}
