use std::sync::Arc;

use serde_json::Value;

use crate::context::{
    encode_segment,
    ClientContext,
};
use crate::error::{
    JenkinsResult,
    ResourceKind,
};
use crate::items::Executor;
use crate::resource::{
    fetched,
    Resource,
    ResourceState,
};

/// Legacy name of the controller node
const LEGACY_CONTROLLER_NAME: &str = "master";
const CONTROLLER_COMPUTER_NAME: &str = "(master)";

/// A node (computer) offering executors
#[derive(Debug, Clone)]
pub struct Node {
    state: ResourceState,
    name: String,
}

impl Node {
    pub fn unloaded(context: Arc<ClientContext>, name: &str) -> Self {
        let name = if name == LEGACY_CONTROLLER_NAME {
            CONTROLLER_COMPUTER_NAME
        } else {
            name
        };

        Self {
            state: ResourceState::new(context),
            name: name.to_string(),
        }
    }

    pub async fn fetch(context: Arc<ClientContext>, name: &str) -> JenkinsResult<Self> {
        fetched(Self::unloaded(context, name)).await
    }

    /// Name used to address the node in URLs
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_name(&self) -> Option<&str> {
        self.document().and_then(|d| d.str("displayName"))
    }

    pub fn is_offline(&self) -> bool {
        self.document()
            .and_then(|d| d.bool("offline"))
            .unwrap_or(false)
    }

    /// `None` while the node is launching, the cause object once it has been
    /// taken offline
    pub fn offline_cause(&self) -> Option<&Value> {
        self.get("offlineCause").filter(|cause| !cause.is_null())
    }

    pub fn offline_cause_reason(&self) -> Option<&str> {
        self.document().and_then(|d| d.str("offlineCauseReason"))
    }

    pub fn num_executors(&self) -> u32 {
        self.document()
            .and_then(|d| d.u64("numExecutors"))
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0)
    }

    /// Fetches every executor slot, one request per slot
    pub async fn executors(&self) -> JenkinsResult<Vec<Executor>> {
        let mut executors = Vec::with_capacity(self.num_executors() as usize);
        for index in 0..self.num_executors() {
            executors.push(Executor::fetch(Arc::clone(self.context()), &self.name, index).await?);
        }
        Ok(executors)
    }

    pub async fn toggle_offline(&self) -> JenkinsResult<()> {
        self.context()
            .post(
                &format!("computer/{}/toggleOffline", encode_segment(&self.name)),
                None,
                &format!("toggling {} offline", self.name),
            )
            .await?;
        Ok(())
    }

    pub async fn delete(&self) -> JenkinsResult<()> {
        self.context()
            .post(
                &format!("computer/{}/doDelete", encode_segment(&self.name)),
                None,
                &format!("deleting node {}", self.name),
            )
            .await?;
        Ok(())
    }

    /// Raw `config.xml` of the node
    pub async fn configuration(&self) -> JenkinsResult<String> {
        self.context()
            .get_text(
                &format!("computer/{}/config.xml", encode_segment(&self.name)),
                &format!("configuration of node {}", self.name),
            )
            .await
    }
}

impl Resource for Node {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Node
    }

    fn identity(&self) -> String {
        self.name.clone()
    }

    fn api_path(&self) -> String {
        format!("computer/{}/api/json", encode_segment(&self.name))
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
    use crate::error::JenkinsError;
    use crate::mock::{
        MockReply,
        MockTransport,
    };
    use crate::transport::Method;

    fn context(mock: &Arc<MockTransport>) -> Arc<ClientContext> {
        Arc::new(ClientContext::new("http://ci.local", None, mock.clone()))
    }

    #[test]
    fn test_master_is_rewritten() {
        let mock = Arc::new(MockTransport::new());
        let node = Node::unloaded(context(&mock), "master");
        assert_eq!(node.name(), "(master)");
        assert_eq!(node.api_path(), "computer/%28master%29/api/json");
    }

    #[tokio::test]
    async fn test_offline_node() {
        let mock = Arc::new(MockTransport::new());
        mock.on_get(
            "computer/agent-1/api/json",
            MockReply::json(json!({
                "displayName": "agent-1",
                "offline": true,
                "numExecutors": 2,
                "offlineCause": { "_class": "hudson.slaves.OfflineCause$UserCause" },
                "offlineCauseReason": "maintenance"
            })),
        );
        mock.on_get(
            "computer/agent-1/executors/0/api/json",
            MockReply::json(json!({ "number": 0 })),
        );
        mock.on_get(
            "computer/agent-1/executors/1/api/json",
            MockReply::json(json!({ "number": 1 })),
        );

        let node = Node::fetch(context(&mock), "agent-1").await.unwrap();
        assert_eq!(node.display_name(), Some("agent-1"));
        assert!(node.is_offline());
        assert!(node.offline_cause().is_some());
        assert_eq!(node.offline_cause_reason(), Some("maintenance"));

        let executors = node.executors().await.unwrap();
        assert_eq!(executors.len(), 2);
        assert_eq!(executors[1].number(), 1);
    }

    #[tokio::test]
    async fn test_launching_node_has_no_offline_cause() {
        let mock = Arc::new(MockTransport::new());
        mock.on_get(
            "computer/agent-2/api/json",
            MockReply::json(json!({ "offline": true, "offlineCause": null })),
        );

        let node = Node::fetch(context(&mock), "agent-2").await.unwrap();
        assert!(node.offline_cause().is_none());
        assert_eq!(node.num_executors(), 0);
    }

    #[tokio::test]
    async fn test_missing_node_is_not_found() {
        let mock = Arc::new(MockTransport::new());
        let err = Node::fetch(context(&mock), "ghost").await.unwrap_err();
        assert!(matches!(
            err,
            JenkinsError::NotFound {
                kind: ResourceKind::Node,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_node_mutations() {
        let mock = Arc::new(MockTransport::new());
        mock.on_get(
            "computer/agent-1/api/json",
            MockReply::json(json!({ "displayName": "agent-1" })),
        );
        mock.on_post("computer/agent-1/toggleOffline", MockReply::status(200));
        mock.on_post("computer/agent-1/doDelete", MockReply::status(200));
        mock.on_get("computer/agent-1/config.xml", MockReply::text(200, "<slave/>"));

        let node = Node::fetch(context(&mock), "agent-1").await.unwrap();
        node.toggle_offline().await.unwrap();
        node.delete().await.unwrap();
        assert_eq!(node.configuration().await.unwrap(), "<slave/>");

        assert_eq!(mock.requests_to(Method::Post, "computer/agent-1/toggleOffline").len(), 1);
        assert_eq!(mock.requests_to(Method::Post, "computer/agent-1/doDelete").len(), 1);
    }
}
