use std::sync::Arc;

use crate::context::{
    encode_segment,
    ClientContext,
};
use crate::document::nested_str;
use crate::error::{
    JenkinsResult,
    ResourceKind,
};
use crate::items::Node;
use crate::resource::{
    fetched,
    Resource,
    ResourceState,
};

/// A single build slot on a node
#[derive(Debug, Clone)]
pub struct Executor {
    state: ResourceState,
    node_name: String,
    index: u32,
}

impl Executor {
    pub fn unloaded(context: Arc<ClientContext>, node_name: &str, index: u32) -> Self {
        Self {
            state: ResourceState::new(context),
            node_name: node_name.to_string(),
            index,
        }
    }

    pub async fn fetch(context: Arc<ClientContext>, node_name: &str, index: u32) -> JenkinsResult<Self> {
        fetched(Self::unloaded(context, node_name, index)).await
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// Executor number reported by the server, falling back to the slot index
    pub fn number(&self) -> u32 {
        self.document()
            .and_then(|d| d.u64("number"))
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(self.index)
    }

    /// Progress of the current build in percent, `-1` when idle
    pub fn progress(&self) -> Option<i64> {
        self.document().and_then(|d| d.i64("progress"))
    }

    pub fn is_idle(&self) -> bool {
        self.document()
            .and_then(|d| d.bool("idle"))
            .unwrap_or_else(|| self.build_url().is_none())
    }

    pub fn build_number(&self) -> Option<u64> {
        self.get("currentExecutable")?.get("number")?.as_u64()
    }

    pub fn build_url(&self) -> Option<&str> {
        nested_str(self.get("currentExecutable"), "url")
    }

    pub async fn node(&self) -> JenkinsResult<Node> {
        Node::fetch(Arc::clone(self.context()), &self.node_name).await
    }

    /// Stops the slot this handle was fetched from
    pub async fn stop(&self) -> JenkinsResult<()> {
        let path = format!(
            "computer/{}/executors/{}/stop",
            encode_segment(&self.node_name),
            self.index
        );
        self.context()
            .post(&path, None, &format!("executor {}", self.identity()))
            .await?;
        Ok(())
    }
}

impl Resource for Executor {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Executor
    }

    fn identity(&self) -> String {
        format!("{}@{}", self.index, self.node_name)
    }

    fn api_path(&self) -> String {
        format!(
            "computer/{}/executors/{}/api/json",
            encode_segment(&self.node_name),
            self.index
        )
    }

    fn state(&self) -> &ResourceState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ResourceState {
        &mut self.state
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::mock::{
        MockReply,
        MockTransport,
    };
    use crate::transport::Method;

    #[tokio::test]
    async fn test_busy_executor_accessors() {
        let mock = Arc::new(MockTransport::new());
        mock.on_get(
            "computer/(master)/executors/1/api/json",
            MockReply::json(json!({
                "number": 1,
                "idle": false,
                "progress": 40,
                "currentExecutable": { "number": 7, "url": "http://ci.local/job/core/7/" }
            })),
        );
        mock.on_post("computer/(master)/executors/1/stop", MockReply::status(200));
        let context = Arc::new(ClientContext::new("http://ci.local", None, mock.clone()));

        let executor = Executor::fetch(context, "(master)", 1).await.unwrap();
        assert_eq!(executor.progress(), Some(40));
        assert_eq!(executor.build_number(), Some(7));
        assert_eq!(executor.build_url(), Some("http://ci.local/job/core/7/"));
        assert!(!executor.is_idle());

        executor.stop().await.unwrap();
        assert_eq!(
            mock.requests_to(Method::Post, "computer/(master)/executors/1/stop").len(),
            1
        );
    }

    #[tokio::test]
    async fn test_idle_executor() {
        let mock = Arc::new(MockTransport::new());
        mock.on_get(
            "computer/agent-1/executors/0/api/json",
            MockReply::json(json!({ "number": 0, "progress": -1, "currentExecutable": null })),
        );
        let context = Arc::new(ClientContext::new("http://ci.local", None, mock.clone()));

        let executor = Executor::fetch(context, "agent-1", 0).await.unwrap();
        assert!(executor.is_idle());
        assert_eq!(executor.build_url(), None);
        assert_eq!(executor.build_number(), None);
    }

    #[tokio::test]
    async fn test_stop_targets_fetched_slot() {
        let mock = Arc::new(MockTransport::new());
        mock.on_get(
            "computer/agent-1/executors/2/api/json",
            MockReply::json(json!({ "number": 5, "idle": false, "progress": 10 })),
        );
        mock.on_post("computer/agent-1/executors/2/stop", MockReply::status(200));
        let context = Arc::new(ClientContext::new("http://ci.local", None, mock.clone()));

        let executor = Executor::fetch(context, "agent-1", 2).await.unwrap();
        assert_eq!(executor.number(), 5);

        executor.stop().await.unwrap();
        assert_eq!(mock.requests_to(Method::Post, "computer/agent-1/executors/2/stop").len(), 1);
        assert!(mock.requests_to(Method::Post, "computer/agent-1/executors/5/stop").is_empty());
    }
}
