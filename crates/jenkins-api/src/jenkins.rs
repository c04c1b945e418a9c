//! Root client

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::config::ClientConfig;
use crate::context::{
    encode_job_path,
    encode_segment,
    ClientContext,
    Credentials,
};
use crate::document::RemoteDocument;
use crate::error::{
    JenkinsError,
    JenkinsResult,
};
use crate::items::{
    self,
    Build,
    BuildSelector,
    Executor,
    Job,
    LaunchOutcome,
    Node,
    Queue,
    QueueItem,
    TestReport,
    View,
    DEFAULT_BUILD_TREE,
};
use crate::resource::fetched;
use crate::transport::{
    HttpOptions,
    HttpTransport,
    Method,
    RequestBody,
    Transport,
};

const ROOT_PATH: &str = "api/json";
const BUILDING_JOBS_TREE: &str = "jobs[name,url,color]";

pub struct JenkinsBuilder {
    base_url: String,
    credentials: Option<Credentials>,
    http: HttpOptions,
    transport: Option<Arc<dyn Transport>>,
    crumbs: bool,
}

impl JenkinsBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            credentials: None,
            http: HttpOptions::default(),
            transport: None,
            crumbs: false,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            base_url: config.server.url.clone(),
            credentials: config.credentials(),
            http: config.http_options(),
            transport: None,
            crumbs: config.server.crumbs,
        }
    }

    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(username, password));
        self
    }

    #[must_use]
    pub fn http_options(mut self, options: HttpOptions) -> Self {
        self.http = options;
        self
    }

    /// Replaces the reqwest transport, e.g. with a scripted one in tests
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Fetch a crumb in [`JenkinsBuilder::connect`]
    #[must_use]
    pub fn crumbs(mut self, enabled: bool) -> Self {
        self.crumbs = enabled;
        self
    }

    pub fn build(self) -> JenkinsResult<Jenkins> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(&self.http)?),
        };

        Ok(Jenkins {
            context: Arc::new(ClientContext::new(&self.base_url, self.credentials, transport)),
        })
    }

    /// Builds the client and, when requested, activates crumbs. A crumb
    /// that cannot be fetched leaves them disabled.
    pub async fn connect(self) -> JenkinsResult<Jenkins> {
        let crumbs = self.crumbs;
        let jenkins = self.build()?;
        if crumbs {
            jenkins.enable_crumbs().await;
        }
        Ok(jenkins)
    }
}

/// Entry point to a Jenkins server
///
/// Cloning is cheap; clones share the same context and crumb.
#[derive(Debug, Clone)]
pub struct Jenkins {
    context: Arc<ClientContext>,
}

impl Jenkins {
    /// Anonymous client over the default HTTP transport
    pub fn new(base_url: &str) -> JenkinsResult<Self> {
        JenkinsBuilder::new(base_url).build()
    }

    pub fn builder(base_url: impl Into<String>) -> JenkinsBuilder {
        JenkinsBuilder::new(base_url)
    }

    pub fn with_transport(
        base_url: &str, credentials: Option<Credentials>, transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            context: Arc::new(ClientContext::new(base_url, credentials, transport)),
        }
    }

    pub async fn from_config(config: &ClientConfig) -> JenkinsResult<Self> {
        JenkinsBuilder::from_config(config).connect().await
    }

    pub fn context(&self) -> &Arc<ClientContext> {
        &self.context
    }

    pub async fn enable_crumbs(&self) -> bool {
        self.context.enable_crumbs().await
    }

    pub async fn disable_crumbs(&self) {
        self.context.disable_crumbs().await
    }

    pub async fn crumbs_enabled(&self) -> bool {
        self.context.crumbs_enabled().await
    }

    /// True when the root document and the queue can both be read. A
    /// server that is still starting up answers the first but not the second.
    pub async fn is_available(&self) -> bool {
        if let Err(e) = self.info().await {
            tracing::debug!(error = %e, "Jenkins root document unavailable");
            return false;
        }
        match self.queue().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(error = %e, "Jenkins queue unavailable");
                false
            }
        }
    }

    /// Root `api/json` document
    pub async fn info(&self) -> JenkinsResult<RemoteDocument> {
        self.context.get_document(ROOT_PATH, &[], "jenkins").await
    }

    pub async fn all_job_names(&self) -> JenkinsResult<Vec<String>> {
        let info = self.info().await?;
        Ok(names_of(info.array("jobs")))
    }

    /// Fetches every top-level job, one request each
    pub async fn jobs(&self) -> JenkinsResult<Vec<Job>> {
        let mut jobs = Vec::new();
        for name in self.all_job_names().await? {
            jobs.push(self.job(&name).await?);
        }
        Ok(jobs)
    }

    pub async fn job(&self, name: &str) -> JenkinsResult<Job> {
        Job::fetch(Arc::clone(&self.context), name).await
    }

    /// Build restricted to [`DEFAULT_BUILD_TREE`]
    pub async fn build(&self, job: &str, number: u64) -> JenkinsResult<Build> {
        self.build_with_tree(job, BuildSelector::Number(number), Some(DEFAULT_BUILD_TREE))
            .await
    }

    /// `tree` of `None` fetches the complete document
    pub async fn build_with_tree(
        &self, job: &str, selector: BuildSelector, tree: Option<&str>,
    ) -> JenkinsResult<Build> {
        fetched(Build::unloaded(Arc::clone(&self.context), job, selector).with_tree(tree)).await
    }

    pub async fn last_build(&self, job: &str) -> JenkinsResult<Build> {
        fetched(Build::unloaded(
            Arc::clone(&self.context),
            job,
            BuildSelector::Last,
        ))
        .await
    }

    pub async fn queue(&self) -> JenkinsResult<Queue> {
        Queue::fetch(Arc::clone(&self.context)).await
    }

    pub async fn queue_item(&self, id: u64) -> JenkinsResult<QueueItem> {
        QueueItem::fetch(Arc::clone(&self.context), id).await
    }

    pub async fn views(&self) -> JenkinsResult<Vec<View>> {
        let info = self.info().await?;
        let mut views = Vec::new();
        for name in names_of(info.array("views")) {
            views.push(self.view(&name).await?);
        }
        Ok(views)
    }

    pub async fn view(&self, name: &str) -> JenkinsResult<View> {
        View::fetch(Arc::clone(&self.context), name).await
    }

    pub async fn primary_view(&self) -> JenkinsResult<Option<View>> {
        let info = self.info().await?;
        let Some(name) = info
            .get("primaryView")
            .and_then(|view| view.get("name"))
            .and_then(Value::as_str)
        else {
            return Ok(None);
        };
        self.view(name).await.map(Some)
    }

    pub async fn nodes(&self) -> JenkinsResult<Vec<Node>> {
        let mut nodes = Vec::new();
        for name in items::node_names(&self.context).await? {
            nodes.push(self.node(&name).await?);
        }
        Ok(nodes)
    }

    pub async fn node(&self, name: &str) -> JenkinsResult<Node> {
        Node::fetch(Arc::clone(&self.context), name).await
    }

    /// Executors of one node
    pub async fn executors(&self, node: &str) -> JenkinsResult<Vec<Executor>> {
        self.node(node).await?.executors().await
    }

    pub async fn executor(&self, node: &str, index: u32) -> JenkinsResult<Executor> {
        Executor::fetch(Arc::clone(&self.context), node, index).await
    }

    /// Creates a job from its `config.xml`. The server refuses duplicate
    /// names with a non-200 answer, reported as [`JenkinsError::InvalidArgument`].
    pub async fn create_job(&self, name: &str, xml: &str) -> JenkinsResult<()> {
        let response = self
            .context
            .send(
                Method::Post,
                "createItem",
                &[("name".to_string(), name.to_string())],
                Some(RequestBody::xml(xml)),
                &format!("creating job {name}"),
            )
            .await?;

        if response.status != 200 {
            tracing::debug!(job = %name, status = response.status, "Job creation refused");
            return Err(JenkinsError::InvalidArgument(format!("Job {name} already exists")));
        }

        tracing::info!(job = %name, "Created Jenkins job");
        Ok(())
    }

    pub async fn delete_job(&self, name: &str) -> JenkinsResult<()> {
        self.unloaded_job(name).delete().await
    }

    pub async fn enable_job(&self, name: &str) -> JenkinsResult<()> {
        self.unloaded_job(name).enable().await
    }

    pub async fn disable_job(&self, name: &str) -> JenkinsResult<()> {
        self.unloaded_job(name).disable().await
    }

    /// Queues a build of `name`; see [`Job::launch`]
    pub async fn launch_job(
        &self, name: &str, parameters: &[(String, String)],
    ) -> JenkinsResult<Option<u64>> {
        self.unloaded_job(name).launch(parameters).await
    }

    pub async fn launch_job_and_wait(
        &self, name: &str, parameters: &[(String, String)], timeout: Duration,
        poll_interval: Duration,
    ) -> JenkinsResult<LaunchOutcome> {
        self.job(name)
            .await?
            .launch_and_wait(parameters, timeout, poll_interval)
            .await
    }

    pub async fn job_config(&self, name: &str) -> JenkinsResult<String> {
        self.unloaded_job(name).config().await
    }

    pub async fn set_job_config(&self, name: &str, xml: &str) -> JenkinsResult<()> {
        self.unloaded_job(name).set_config(xml).await
    }

    pub async fn console_text(&self, job: &str, number: u64) -> JenkinsResult<String> {
        Build::unloaded(Arc::clone(&self.context), job, BuildSelector::Number(number))
            .console_text()
            .await
    }

    pub async fn test_report(&self, job: &str, number: u64) -> JenkinsResult<TestReport> {
        TestReport::fetch(Arc::clone(&self.context), job, &number.to_string()).await
    }

    pub async fn stop_executor(&self, executor: &Executor) -> JenkinsResult<()> {
        executor.stop().await
    }

    pub async fn cancel_queue_item(&self, id: u64) -> JenkinsResult<()> {
        QueueItem::unloaded(Arc::clone(&self.context), id).cancel().await
    }

    pub async fn toggle_offline_node(&self, name: &str) -> JenkinsResult<()> {
        Node::unloaded(Arc::clone(&self.context), name).toggle_offline().await
    }

    pub async fn delete_node(&self, name: &str) -> JenkinsResult<()> {
        Node::unloaded(Arc::clone(&self.context), name).delete().await
    }

    pub async fn node_configuration(&self, name: &str) -> JenkinsResult<String> {
        Node::unloaded(Arc::clone(&self.context), name)
            .configuration()
            .await
    }

    pub async fn find_executor_for_build(&self, build: &Build) -> JenkinsResult<Option<Executor>> {
        items::find_executor_for_build(&self.context, build).await
    }

    /// Jobs whose colour is animated, i.e. that have a build in progress
    pub async fn currently_building_jobs(&self) -> JenkinsResult<Vec<Job>> {
        let document = self
            .context
            .get_document(
                ROOT_PATH,
                &[("tree".to_string(), BUILDING_JOBS_TREE.to_string())],
                "currently building jobs",
            )
            .await?;

        let names: Vec<String> = document
            .array("jobs")
            .into_iter()
            .flatten()
            .filter(|job| {
                job.get("color")
                    .and_then(Value::as_str)
                    .is_some_and(|color| color.ends_with("_anime"))
            })
            .filter_map(|job| job.get("name").and_then(Value::as_str))
            .map(str::to_string)
            .collect();

        let mut jobs = Vec::with_capacity(names.len());
        for name in names {
            jobs.push(self.job(&name).await?);
        }
        Ok(jobs)
    }

    pub async fn last_builds_of_building_jobs(&self) -> JenkinsResult<Vec<Build>> {
        let mut builds = Vec::new();
        for job in self.currently_building_jobs().await? {
            if let Some(build) = job.last_build().await? {
                builds.push(build);
            }
        }
        Ok(builds)
    }

    /// Puts the server in quiet-down mode: no new builds start
    pub async fn prepare_shutdown(&self) -> JenkinsResult<()> {
        self.context.post("quietDown", None, "quiet down").await?;
        Ok(())
    }

    pub async fn cancel_prepare_shutdown(&self) -> JenkinsResult<()> {
        self.context
            .post("cancelQuietDown", None, "cancel quiet down")
            .await?;
        Ok(())
    }

    /// Raw GET of any endpoint relative to the base URL, for plugin APIs
    /// without a dedicated wrapper
    pub async fn execute(&self, uri: &str) -> JenkinsResult<String> {
        self.context.get_text(uri, &format!("calling {uri}")).await
    }

    /// Base URL, ending with `/`
    pub fn url(&self) -> &str {
        self.context.base_url()
    }

    pub fn job_url(&self, job: &str) -> String {
        format!("{}job/{}", self.url(), encode_job_path(job))
    }

    pub fn view_url(&self, view: &str) -> String {
        format!("{}view/{}", self.url(), encode_segment(view))
    }

    /// Job URL when `number` is `None`
    pub fn build_url(&self, job: &str, number: Option<u64>) -> String {
        match number {
            Some(number) => format!("{}/{number}", self.job_url(job)),
            None => self.job_url(job),
        }
    }

    fn unloaded_job(&self, name: &str) -> Job {
        Job::unloaded(Arc::clone(&self.context), name)
    }
}

fn names_of(entries: Option<&Vec<Value>>) -> Vec<String> {
    entries
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.get("name").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::crumb::CRUMB_ISSUER_PATH;
    use crate::error::ErrorKind;
    use crate::items::BuildResult;
    use crate::mock::{
        MockReply,
        MockTransport,
    };

    fn jenkins(mock: &Arc<MockTransport>) -> Jenkins {
        Jenkins::with_transport("http://ci.local", None, mock.clone())
    }

    fn root_document() -> MockReply {
        MockReply::json(json!({
            "mode": "NORMAL",
            "numExecutors": 2,
            "jobs": [
                { "name": "core", "color": "blue_anime" },
                { "name": "docs", "color": "blue" },
                { "name": "web", "color": "red_anime" }
            ],
            "views": [ { "name": "All" } ],
            "primaryView": { "name": "All" }
        }))
    }

    #[tokio::test]
    async fn test_create_job_on_existing_name_is_invalid_argument() {
        let mock = Arc::new(MockTransport::new());
        mock.on_post("createItem", MockReply::text(400, "A job already exists with the name core"));
        let jenkins = jenkins(&mock);

        let err = jenkins.create_job("core", "<project/>").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(err.to_string(), "Invalid argument: Job core already exists");

        let request = mock.last_request().unwrap();
        assert_eq!(request.url, "http://ci.local/createItem?name=core");
        assert_eq!(request.body, Some(RequestBody::xml("<project/>")));
    }

    #[tokio::test]
    async fn test_create_job_connection_failure_is_transport() {
        let mock = Arc::new(MockTransport::new());
        mock.on_post("createItem", MockReply::fail("connection reset"));

        let err = jenkins(&mock).create_job("core", "<project/>").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[tokio::test]
    async fn test_create_job_success() {
        let mock = Arc::new(MockTransport::new());
        mock.on_post("createItem", MockReply::status(200));
        jenkins(&mock).create_job("new job", "<project/>").await.unwrap();
        assert_eq!(
            mock.last_request().unwrap().url,
            "http://ci.local/createItem?name=new%20job"
        );
    }

    #[tokio::test]
    async fn test_is_available() {
        let mock = Arc::new(MockTransport::new());
        mock.on_get(ROOT_PATH, root_document());
        mock.on_get_sequence(
            "queue/api/json",
            vec![MockReply::status(503), MockReply::json(json!({ "items": [] }))],
        );
        let jenkins = jenkins(&mock);

        assert!(!jenkins.is_available().await);
        assert!(jenkins.is_available().await);

        let unreachable = Arc::new(MockTransport::new());
        unreachable.on_get(ROOT_PATH, MockReply::fail("connection refused"));
        assert!(!Jenkins::with_transport("http://ci.local", None, unreachable)
            .is_available()
            .await);
    }

    #[tokio::test]
    async fn test_listing_from_root_document() {
        let mock = Arc::new(MockTransport::new());
        mock.on_get(ROOT_PATH, root_document());
        mock.on_get("view/All/api/json", MockReply::json(json!({ "name": "All", "jobs": [] })));
        let jenkins = jenkins(&mock);

        assert_eq!(jenkins.all_job_names().await.unwrap(), vec!["core", "docs", "web"]);
        assert_eq!(jenkins.info().await.unwrap().str("mode"), Some("NORMAL"));

        let primary = jenkins.primary_view().await.unwrap().unwrap();
        assert_eq!(primary.name(), "All");
        assert_eq!(jenkins.views().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_primary_view_absent() {
        let mock = Arc::new(MockTransport::new());
        mock.on_get(ROOT_PATH, MockReply::json(json!({ "jobs": [] })));
        assert!(jenkins(&mock).primary_view().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_currently_building_jobs_and_their_last_builds() {
        let mock = Arc::new(MockTransport::new());
        mock.on_get(ROOT_PATH, root_document());
        mock.on_get(
            "job/core/api/json",
            MockReply::json(json!({ "name": "core", "lastBuild": { "number": 3 } })),
        );
        mock.on_get(
            "job/web/api/json",
            MockReply::json(json!({ "name": "web", "lastBuild": { "number": 11 } })),
        );
        mock.on_get(
            "job/core/3/api/json",
            MockReply::json(json!({ "number": 3, "building": true, "result": null })),
        );
        mock.on_get(
            "job/web/11/api/json",
            MockReply::json(json!({ "number": 11, "building": true })),
        );
        let jenkins = jenkins(&mock);

        let jobs = jenkins.currently_building_jobs().await.unwrap();
        let names: Vec<&str> = jobs.iter().map(Job::name).collect();
        assert_eq!(names, vec!["core", "web"]);
        assert!(mock.requests()[0].url.ends_with("api/json?tree=jobs%5Bname%2Curl%2Ccolor%5D"));

        let builds = jenkins.last_builds_of_building_jobs().await.unwrap();
        assert_eq!(builds.len(), 2);
        assert!(builds.iter().all(|b| b.result() == BuildResult::Running));
    }

    #[tokio::test]
    async fn test_build_uses_default_tree() {
        let mock = Arc::new(MockTransport::new());
        mock.on_get(
            "job/team/job/core/5/api/json",
            MockReply::json(json!({ "number": 5, "result": "UNSTABLE" })),
        );

        let build = jenkins(&mock).build("team/core", 5).await.unwrap();
        assert_eq!(build.result(), BuildResult::Unstable);
        let url = mock.last_request().unwrap().url;
        assert!(url.starts_with("http://ci.local/job/team/job/core/5/api/json?tree=actions"));
    }

    #[tokio::test]
    async fn test_quiet_down_and_execute() {
        let mock = Arc::new(MockTransport::new());
        mock.on_post("quietDown", MockReply::status(200));
        mock.on_post("cancelQuietDown", MockReply::status(200));
        mock.on_get("pluginManager/api/json", MockReply::text(200, "{\"plugins\":[]}"));
        let jenkins = jenkins(&mock);

        jenkins.prepare_shutdown().await.unwrap();
        jenkins.cancel_prepare_shutdown().await.unwrap();
        assert_eq!(
            jenkins.execute("pluginManager/api/json").await.unwrap(),
            "{\"plugins\":[]}"
        );
        assert_eq!(mock.requests_to(Method::Post, "quietDown").len(), 1);
        assert_eq!(mock.requests_to(Method::Post, "cancelQuietDown").len(), 1);
    }

    #[tokio::test]
    async fn test_builder_connect_enables_crumbs() {
        let mock = Arc::new(MockTransport::new());
        mock.on_get(
            CRUMB_ISSUER_PATH,
            MockReply::json(json!({ "crumb": "c0ffee", "crumbRequestField": "Jenkins-Crumb" })),
        );
        mock.on_post("job/core/disable", MockReply::status(200));

        let jenkins = Jenkins::builder("http://ci.local")
            .credentials("bot", "token")
            .transport(mock.clone())
            .crumbs(true)
            .connect()
            .await
            .unwrap();
        assert!(jenkins.crumbs_enabled().await);

        jenkins.disable_job("core").await.unwrap();
        let request = mock.last_request().unwrap();
        assert_eq!(request.header("Jenkins-Crumb"), Some("c0ffee"));
        assert!(request.header("Authorization").is_some());

        jenkins.disable_crumbs().await;
        assert!(!jenkins.crumbs_enabled().await);
    }

    #[tokio::test]
    async fn test_from_config_builds_http_client() {
        let config = ClientConfig::parse("[server]\nurl = \"http://ci.local:8080/jenkins\"\n").unwrap();
        let jenkins = Jenkins::from_config(&config).await.unwrap();
        assert_eq!(jenkins.url(), "http://ci.local:8080/jenkins/");
        assert!(!jenkins.crumbs_enabled().await);
    }

    #[test]
    fn test_url_helpers() {
        let mock = Arc::new(MockTransport::new());
        let jenkins = jenkins(&mock);

        assert_eq!(jenkins.url(), "http://ci.local/");
        assert_eq!(jenkins.job_url("team/core"), "http://ci.local/job/team/job/core");
        assert_eq!(jenkins.view_url("My View"), "http://ci.local/view/My%20View");
        assert_eq!(jenkins.build_url("core", Some(4)), "http://ci.local/job/core/4");
        assert_eq!(jenkins.build_url("core", None), "http://ci.local/job/core");
    }

    #[tokio::test]
    async fn test_node_operations_use_controller_alias() {
        let mock = Arc::new(MockTransport::new());
        mock.on_post("computer/(master)/toggleOffline", MockReply::status(200));
        mock.on_get("computer/(master)/config.xml", MockReply::text(200, "<computer/>"));
        let jenkins = jenkins(&mock);

        jenkins.toggle_offline_node("master").await.unwrap();
        assert_eq!(jenkins.node_configuration("master").await.unwrap(), "<computer/>");
        assert_eq!(
            mock.requests()[0].url,
            "http://ci.local/computer/%28master%29/toggleOffline"
        );
    }

    #[tokio::test]
    async fn test_test_report_and_console_text() {
        let mock = Arc::new(MockTransport::new());
        mock.on_get(
            "job/core/8/testReport/api/json",
            MockReply::json(json!({ "failCount": 1, "passCount": 2, "skipCount": 0, "suites": [] })),
        );
        mock.on_get("job/core/8/consoleText", MockReply::text(200, "Started by user bot"));
        let jenkins = jenkins(&mock);

        let report = jenkins.test_report("core", 8).await.unwrap();
        assert_eq!(report.fail_count(), Some(1));
        assert_eq!(report.build_number(), "8");
        assert_eq!(jenkins.console_text("core", 8).await.unwrap(), "Started by user bot");
    }

    #[tokio::test]
    async fn test_cancel_queue_item() {
        let mock = Arc::new(MockTransport::new());
        mock.on_post("queue/item/77/cancelQueue", MockReply::status(204));
        jenkins(&mock).cancel_queue_item(77).await.unwrap();
    }
}
