use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::context::ClientContext;
use crate::document::{
    nested_str,
    RemoteDocument,
};
use crate::error::{
    JenkinsResult,
    ResourceKind,
};
use crate::resource::{
    fetched,
    Resource,
    ResourceState,
};

/// The build queue
#[derive(Debug, Clone)]
pub struct Queue {
    state: ResourceState,
}

impl Queue {
    pub fn unloaded(context: Arc<ClientContext>) -> Self {
        Self {
            state: ResourceState::new(context),
        }
    }

    pub async fn fetch(context: Arc<ClientContext>) -> JenkinsResult<Self> {
        fetched(Self::unloaded(context)).await
    }

    /// Items built from the cached queue document, without further requests
    pub fn items(&self) -> Vec<QueueItem> {
        let Some(items) = self.document().and_then(|d| d.array("items")) else {
            return Vec::new();
        };

        items
            .iter()
            .filter_map(|item| {
                let id = item.get("id").and_then(Value::as_u64)?;
                let document = RemoteDocument::from_value(item.clone())?;
                Some(QueueItem {
                    state: ResourceState::with_document(Arc::clone(self.context()), document),
                    id,
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.document()
            .and_then(|d| d.array("items"))
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Resource for Queue {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Queue
    }

    fn identity(&self) -> String {
        "queue".to_string()
    }

    fn api_path(&self) -> String {
        "queue/api/json".to_string()
    }

    fn state(&self) -> &ResourceState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ResourceState {
        &mut self.state
    }
}

/// A pending build request
#[derive(Debug, Clone)]
pub struct QueueItem {
    state: ResourceState,
    id: u64,
}

impl QueueItem {
    pub fn unloaded(context: Arc<ClientContext>, id: u64) -> Self {
        Self {
            state: ResourceState::new(context),
            id,
        }
    }

    pub async fn fetch(context: Arc<ClientContext>, id: u64) -> JenkinsResult<Self> {
        fetched(Self::unloaded(context, id)).await
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Name of the queued job (`task.name`)
    pub fn job_name(&self) -> Option<&str> {
        nested_str(self.get("task"), "name")
    }

    /// Human readable reason the item is still waiting
    pub fn why(&self) -> Option<&str> {
        self.document().and_then(|d| d.str("why"))
    }

    pub fn is_blocked(&self) -> bool {
        self.document()
            .and_then(|d| d.bool("blocked"))
            .unwrap_or(false)
    }

    /// Seconds since the epoch at which the item entered the queue
    pub fn in_queue_since(&self) -> Option<i64> {
        self.document().and_then(|d| d.millis_as_secs("inQueueSince"))
    }

    /// Parameters of the first action, when it carries any
    pub fn input_parameters(&self) -> BTreeMap<String, Value> {
        self.document()
            .and_then(|d| d.array("actions"))
            .and_then(|actions| actions.first())
            .and_then(|action| action.get("parameters"))
            .and_then(Value::as_array)
            .map(|parameters| {
                parameters
                    .iter()
                    .filter_map(|parameter| {
                        let name = parameter.get("name").and_then(Value::as_str)?;
                        let value = parameter.get("value").cloned().unwrap_or(Value::Null);
                        Some((name.to_string(), value))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub async fn cancel(&self) -> JenkinsResult<()> {
        self.context()
            .post(
                &format!("queue/item/{}/cancelQueue", self.id),
                None,
                &format!("cancelling queue item {}", self.id),
            )
            .await?;
        Ok(())
    }
}

impl Resource for QueueItem {
    fn kind(&self) -> ResourceKind {
        ResourceKind::QueueItem
    }

    fn identity(&self) -> String {
        self.id.to_string()
    }

    fn api_path(&self) -> String {
        format!("queue/item/{}/api/json", self.id)
    }

    fn state(&self) -> &ResourceState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ResourceState {
        &mut self.state
    }
}
