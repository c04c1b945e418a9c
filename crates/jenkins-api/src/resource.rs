//! Lazily materialised remote resources
//!
//! A resource handle is created from its identifying parameters and owns at
//! most one [`RemoteDocument`], the last successfully fetched snapshot.
//! [`Resource::refresh`] replaces that snapshot wholesale; every other
//! accessor is a pure read of it.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::context::ClientContext;
use crate::document::RemoteDocument;
use crate::error::{
    JenkinsError,
    JenkinsResult,
    ResourceKind,
};

/// Context reference plus the cached snapshot, embedded in every handle
#[derive(Debug, Clone)]
pub struct ResourceState {
    context: Arc<ClientContext>,
    document: Option<RemoteDocument>,
}

impl ResourceState {
    pub fn new(context: Arc<ClientContext>) -> Self {
        Self {
            context,
            document: None,
        }
    }

    pub fn with_document(context: Arc<ClientContext>, document: RemoteDocument) -> Self {
        Self {
            context,
            document: Some(document),
        }
    }

    pub fn context(&self) -> &Arc<ClientContext> {
        &self.context
    }

    pub fn document(&self) -> Option<&RemoteDocument> {
        self.document.as_ref()
    }

    pub(crate) fn replace(&mut self, document: RemoteDocument) {
        self.document = Some(document);
    }
}

#[async_trait]
pub trait Resource: Send + Sync {
    fn kind(&self) -> ResourceKind;

    /// Human readable identifier used in error messages
    fn identity(&self) -> String;

    /// Path of the JSON document, relative to the server root
    fn api_path(&self) -> String;

    fn api_query(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    fn state(&self) -> &ResourceState;

    fn state_mut(&mut self) -> &mut ResourceState;

    /// Re-fetches the backing document and replaces the cached snapshot.
    /// A 404 answer becomes [`JenkinsError::NotFound`].
    async fn refresh(&mut self) -> JenkinsResult<()> {
        let context = Arc::clone(self.state().context());
        let kind = self.kind();
        let identity = self.identity();
        let label = format!("{kind} {identity}");

        let document = context
            .get_document(&self.api_path(), &self.api_query(), &label)
            .await
            .map_err(|err| match err {
                JenkinsError::HttpStatus { status: 404, .. } => JenkinsError::NotFound {
                    kind,
                    name: identity.clone(),
                },
                other => other,
            })?;

        self.state_mut().replace(document);
        Ok(())
    }

    /// Field of the cached snapshot; never performs I/O
    fn get(&self, field: &str) -> Option<&Value> {
        self.document().and_then(|document| document.get(field))
    }

    fn document(&self) -> Option<&RemoteDocument> {
        self.state().document()
    }

    fn is_loaded(&self) -> bool {
        self.state().document().is_some()
    }

    fn context(&self) -> &Arc<ClientContext> {
        self.state().context()
    }
}

/// Builds a handle and performs its first refresh
pub(crate) async fn fetched<R: Resource>(mut resource: R) -> JenkinsResult<R> {
    resource.refresh().await?;
    Ok(resource)
}
