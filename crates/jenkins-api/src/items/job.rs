use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tokio::time::Instant;

use crate::context::{
    encode_job_path,
    ClientContext,
};
use crate::error::{
    JenkinsError,
    JenkinsResult,
    ResourceKind,
};
use crate::items::{
    Build,
    BuildSelector,
};
use crate::resource::{
    fetched,
    Resource,
    ResourceState,
};
use crate::transport::RequestBody;

pub const DEFAULT_LAUNCH_TIMEOUT: Duration = Duration::from_secs(86_400);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Declared build parameter of a job
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParameterDefinition {
    #[serde(rename = "_class")]
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(rename = "defaultParameterValue")]
    #[serde(default)]
    pub default_parameter_value: Option<DefaultValue>,
    #[serde(default)]
    pub choices: Option<Vec<String>>,
}

impl ParameterDefinition {
    pub fn default_value(&self) -> Option<&Value> {
        self.default_parameter_value
            .as_ref()
            .and_then(|d| d.value.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DefaultValue {
    #[serde(default)]
    pub value: Option<Value>,
}

/// Result of [`Job::launch_and_wait`]
#[derive(Debug)]
pub enum LaunchOutcome {
    /// A new build was requested. The handle is the job's last build when
    /// polling stopped, which may still be building if the timeout elapsed.
    Launched(Build),
    /// The job was already building; nothing was launched and the running
    /// build was followed to completion.
    AlreadyBuilding(Build),
}

impl LaunchOutcome {
    pub fn build(&self) -> &Build {
        match self {
            LaunchOutcome::Launched(build) | LaunchOutcome::AlreadyBuilding(build) => build,
        }
    }

    pub fn into_build(self) -> Build {
        match self {
            LaunchOutcome::Launched(build) | LaunchOutcome::AlreadyBuilding(build) => build,
        }
    }

    pub fn was_launched(&self) -> bool {
        matches!(self, LaunchOutcome::Launched(_))
    }
}

/// A job (folder paths such as `team/app` are accepted as names)
#[derive(Debug, Clone)]
pub struct Job {
    state: ResourceState,
    name: String,
}

impl Job {
    pub fn unloaded(context: Arc<ClientContext>, name: &str) -> Self {
        Self {
            state: ResourceState::new(context),
            name: name.to_string(),
        }
    }

    pub async fn fetch(context: Arc<ClientContext>, name: &str) -> JenkinsResult<Self> {
        fetched(Self::unloaded(context, name)).await
    }

    /// Name the handle was created with
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_name(&self) -> Option<&str> {
        self.document().and_then(|d| d.str("displayName"))
    }

    pub fn color(&self) -> Option<&str> {
        self.document().and_then(|d| d.str("color"))
    }

    pub fn is_buildable(&self) -> bool {
        self.document()
            .and_then(|d| d.bool("buildable"))
            .unwrap_or(false)
    }

    pub fn description(&self) -> Option<&str> {
        self.document().and_then(|d| d.str("description"))
    }

    pub fn url(&self) -> Option<&str> {
        self.document().and_then(|d| d.str("url"))
    }

    pub fn next_build_number(&self) -> Option<u64> {
        self.document().and_then(|d| d.u64("nextBuildNumber"))
    }

    pub fn build_numbers(&self) -> Vec<u64> {
        self.document()
            .and_then(|d| d.array("builds"))
            .map(|builds| {
                builds
                    .iter()
                    .filter_map(|build| build.get("number").and_then(Value::as_u64))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn last_build_number(&self) -> Option<u64> {
        self.permalink_number("lastBuild")
    }

    pub fn last_successful_build_number(&self) -> Option<u64> {
        self.permalink_number("lastSuccessfulBuild")
    }

    fn permalink_number(&self, field: &str) -> Option<u64> {
        self.get(field)?.get("number")?.as_u64()
    }

    /// Parameter definitions declared through either `actions` (older
    /// servers) or `property`
    pub fn parameter_definitions(&self) -> Vec<ParameterDefinition> {
        let Some(document) = self.document() else {
            return Vec::new();
        };

        ["actions", "property"]
            .iter()
            .filter_map(|field| document.array(field))
            .flatten()
            .filter_map(|entry| entry.get("parameterDefinitions").and_then(Value::as_array))
            .flatten()
            .filter_map(|definition| {
                serde_json::from_value::<ParameterDefinition>(definition.clone()).ok()
            })
            .collect()
    }

    pub async fn build(&self, number: u64) -> JenkinsResult<Build> {
        fetched(Build::unloaded(
            Arc::clone(self.context()),
            &self.name,
            BuildSelector::Number(number),
        ))
        .await
    }

    /// Fetches every build listed in the cached document
    pub async fn builds(&self) -> JenkinsResult<Vec<Build>> {
        let mut builds = Vec::new();
        for number in self.build_numbers() {
            builds.push(self.build(number).await?);
        }
        Ok(builds)
    }

    pub async fn last_build(&self) -> JenkinsResult<Option<Build>> {
        match self.last_build_number() {
            Some(number) => self.build(number).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn last_successful_build(&self) -> JenkinsResult<Option<Build>> {
        match self.last_successful_build_number() {
            Some(number) => self.build(number).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn is_currently_building(&self) -> JenkinsResult<bool> {
        Ok(self
            .last_build()
            .await?
            .map(|build| build.is_building())
            .unwrap_or(false))
    }

    /// Queues a build. Returns the queue item id when the server reports one
    /// in the `Location` header.
    pub async fn launch(&self, parameters: &[(String, String)]) -> JenkinsResult<Option<u64>> {
        let encoded = encode_job_path(&self.name);
        let (path, body) = if parameters.is_empty() {
            (format!("job/{encoded}/build"), None)
        } else {
            (
                format!("job/{encoded}/buildWithParameters"),
                Some(RequestBody::Form(parameters.to_vec())),
            )
        };

        let response = self
            .context()
            .post(&path, body, &format!("launching job {}", self.name))
            .await?;

        tracing::info!(job = %self.name, "Launched Jenkins job");
        Ok(response.header("location").and_then(queue_id_from_location))
    }

    /// Launches the job and polls its last build until a new build has
    /// finished or `timeout` elapses. The last build is read from the server
    /// first; if it is still building nothing is launched and that build is
    /// polled until it stops, without any timeout.
    pub async fn launch_and_wait(
        &self, parameters: &[(String, String)], timeout: Duration, poll_interval: Duration,
    ) -> JenkinsResult<LaunchOutcome> {
        let context = Arc::clone(self.context());
        let mut current = Build::unloaded(Arc::clone(&context), &self.name, BuildSelector::Last);
        refresh_tolerating_absence(&mut current).await?;

        if current.is_building() {
            tracing::debug!(job = %self.name, "Job already building, waiting for current build");
            let mut running = match current.number() {
                Some(number) => Build::unloaded(context, &self.name, BuildSelector::Number(number)),
                None => current,
            };
            loop {
                tokio::time::sleep(poll_interval).await;
                running.refresh().await?;
                if !running.is_building() {
                    break;
                }
            }
            return Ok(LaunchOutcome::AlreadyBuilding(running));
        }

        let previous = current.number().unwrap_or(0);
        let deadline = Instant::now() + timeout;
        self.launch(parameters).await?;

        let mut last = Build::unloaded(context, &self.name, BuildSelector::Last);
        refresh_tolerating_absence(&mut last).await?;

        while Instant::now() < deadline && still_waiting(&last, previous) {
            tokio::time::sleep(poll_interval).await;
            refresh_tolerating_absence(&mut last).await?;
        }

        Ok(LaunchOutcome::Launched(last))
    }

    pub async fn delete(&self) -> JenkinsResult<()> {
        self.post_action("doDelete", "deleting job").await
    }

    pub async fn enable(&self) -> JenkinsResult<()> {
        self.post_action("enable", "enabling job").await
    }

    pub async fn disable(&self) -> JenkinsResult<()> {
        self.post_action("disable", "disabling job").await
    }

    pub async fn config(&self) -> JenkinsResult<String> {
        self.context()
            .get_text(
                &format!("job/{}/config.xml", encode_job_path(&self.name)),
                &format!("configuration of job {}", self.name),
            )
            .await
    }

    pub async fn set_config(&self, xml: &str) -> JenkinsResult<()> {
        self.context()
            .post(
                &format!("job/{}/config.xml", encode_job_path(&self.name)),
                Some(RequestBody::xml(xml)),
                &format!("setting configuration of job {}", self.name),
            )
            .await?;
        Ok(())
    }

    async fn post_action(&self, action: &str, what: &str) -> JenkinsResult<()> {
        self.context()
            .post(
                &format!("job/{}/{action}", encode_job_path(&self.name)),
                None,
                &format!("{what} {}", self.name),
            )
            .await?;
        Ok(())
    }
}

impl Resource for Job {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Job
    }

    fn identity(&self) -> String {
        self.name.clone()
    }

    fn api_path(&self) -> String {
        format!("job/{}/api/json", encode_job_path(&self.name))
    }

    fn state(&self) -> &ResourceState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ResourceState {
        &mut self.state
    }
}

/// True until a build newer than `previous` exists and has stopped building
fn still_waiting(last: &Build, previous: u64) -> bool {
    match last.number() {
        Some(number) if number > previous => last.is_building(),
        _ => true,
    }
}

/// A job that has never run has no `lastBuild` until the queued build starts
async fn refresh_tolerating_absence(build: &mut Build) -> JenkinsResult<()> {
    match build.refresh().await {
        Err(JenkinsError::NotFound { .. }) => Ok(()),
        other => other,
    }
}

/// `http://ci/queue/item/42/` -> `42`
fn queue_id_from_location(location: &str) -> Option<u64> {
    let (_, rest) = location.split_once("/queue/item/")?;
    rest.trim_end_matches('/').parse().ok()
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

    const POLL: Duration = Duration::from_millis(1);

    fn context(mock: &Arc<MockTransport>) -> Arc<ClientContext> {
        Arc::new(ClientContext::new("http://ci.local", None, mock.clone()))
    }

    fn job_document(last_build: Option<u64>) -> Value {
        json!({
            "name": "core",
            "color": "blue",
            "buildable": true,
            "lastBuild": last_build.map(|n| json!({ "number": n })),
            "builds": last_build.map(|n| vec![json!({ "number": n })]).unwrap_or_default()
        })
    }

    fn build_document(number: u64, building: bool) -> MockReply {
        MockReply::json(json!({
            "number": number,
            "building": building,
            "result": if building { Value::Null } else { json!("SUCCESS") },
            "url": format!("http://ci.local/job/core/{number}/")
        }))
    }

    #[test]
    fn test_queue_id_from_location() {
        assert_eq!(queue_id_from_location("http://ci.local/queue/item/42/"), Some(42));
        assert_eq!(queue_id_from_location("http://ci.local/job/core/"), None);
    }

    #[tokio::test]
    async fn test_accessors() {
        let mock = Arc::new(MockTransport::new());
        mock.on_get(
            "job/core/api/json",
            MockReply::json(json!({
                "name": "core",
                "color": "red_anime",
                "buildable": true,
                "description": null,
                "builds": [ { "number": 3 }, { "number": 2 } ],
                "lastBuild": { "number": 3 },
                "lastSuccessfulBuild": null,
                "property": [
                    { "_class": "hudson.model.ParametersDefinitionProperty",
                      "parameterDefinitions": [
                        { "_class": "hudson.model.ChoiceParameterDefinition",
                          "name": "ENV",
                          "choices": ["dev", "prod"],
                          "defaultParameterValue": { "value": "dev" } }
                      ] }
                ]
            })),
        );

        let job = Job::fetch(context(&mock), "core").await.unwrap();
        assert_eq!(job.color(), Some("red_anime"));
        assert!(job.is_buildable());
        assert_eq!(job.description(), None);
        assert_eq!(job.build_numbers(), vec![3, 2]);
        assert_eq!(job.last_build_number(), Some(3));
        assert_eq!(job.last_successful_build_number(), None);

        let definitions = job.parameter_definitions();
        assert_eq!(definitions.len(), 1);
        assert_eq!(definitions[0].name, "ENV");
        assert_eq!(definitions[0].choices.as_deref(), Some(&["dev".to_string(), "prod".to_string()][..]));
        assert_eq!(definitions[0].default_value(), Some(&json!("dev")));
    }

    #[tokio::test]
    async fn test_launch_without_parameters_posts_build() {
        let mock = Arc::new(MockTransport::new());
        mock.on_post(
            "job/core/build",
            MockReply::status(201).with_header("Location", "http://ci.local/queue/item/9/"),
        );
        let job = Job::unloaded(context(&mock), "core");

        assert_eq!(job.launch(&[]).await.unwrap(), Some(9));
        let request = mock.last_request().unwrap();
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.url, "http://ci.local/job/core/build");
        assert_eq!(request.body, None);
    }

    #[tokio::test]
    async fn test_launch_with_parameters_posts_form() {
        let mock = Arc::new(MockTransport::new());
        mock.on_post("job/team/job/core/buildWithParameters", MockReply::status(201));
        let job = Job::unloaded(context(&mock), "team/core");
        let parameters = vec![("BRANCH".to_string(), "main".to_string())];

        assert_eq!(job.launch(&parameters).await.unwrap(), None);
        let request = mock.last_request().unwrap();
        assert_eq!(request.url, "http://ci.local/job/team/job/core/buildWithParameters");
        assert_eq!(request.body, Some(RequestBody::Form(parameters)));
    }

    #[tokio::test]
    async fn test_launch_and_wait_follows_new_build() {
        let mock = Arc::new(MockTransport::new());
        mock.on_get("job/core/api/json", MockReply::json(job_document(Some(4))));
        mock.on_post("job/core/build", MockReply::status(201));
        mock.on_get_sequence(
            "job/core/lastBuild/api/json",
            vec![
                build_document(4, false),
                build_document(5, true),
                build_document(5, true),
                build_document(5, false),
            ],
        );

        let job = Job::fetch(context(&mock), "core").await.unwrap();
        let outcome = job
            .launch_and_wait(&[], Duration::from_secs(30), POLL)
            .await
            .unwrap();

        assert!(outcome.was_launched());
        let build = outcome.build();
        assert_eq!(build.number(), Some(5));
        assert!(!build.is_building());
        assert_eq!(mock.requests_to(Method::Post, "job/core/build").len(), 1);
        assert_eq!(mock.requests_to(Method::Get, "job/core/lastBuild/api/json").len(), 4);
    }

    #[tokio::test]
    async fn test_launch_and_wait_on_unloaded_handle_skips_previous_build() {
        let mock = Arc::new(MockTransport::new());
        mock.on_post("job/core/build", MockReply::status(201));
        mock.on_get_sequence(
            "job/core/lastBuild/api/json",
            vec![
                build_document(4, false),
                build_document(4, false),
                build_document(5, true),
                build_document(5, false),
            ],
        );

        let job = Job::unloaded(context(&mock), "core");
        let outcome = job
            .launch_and_wait(&[], Duration::from_secs(30), POLL)
            .await
            .unwrap();

        assert!(outcome.was_launched());
        assert_eq!(outcome.build().number(), Some(5));
        assert!(!outcome.build().is_building());
        assert!(mock.requests_to(Method::Get, "job/core/api/json").is_empty());
    }

    #[tokio::test]
    async fn test_launch_and_wait_ignores_stale_snapshot() {
        let mock = Arc::new(MockTransport::new());
        mock.on_get("job/core/api/json", MockReply::json(job_document(Some(3))));
        mock.on_post("job/core/build", MockReply::status(201));
        mock.on_get_sequence(
            "job/core/lastBuild/api/json",
            vec![
                build_document(4, false),
                build_document(4, false),
                build_document(5, false),
            ],
        );

        let job = Job::fetch(context(&mock), "core").await.unwrap();
        assert_eq!(job.last_build_number(), Some(3));

        let outcome = job
            .launch_and_wait(&[], Duration::from_secs(30), POLL)
            .await
            .unwrap();

        assert!(outcome.was_launched());
        assert_eq!(outcome.build().number(), Some(5));
    }

    #[tokio::test]
    async fn test_launch_and_wait_when_already_building_ignores_timeout() {
        let mock = Arc::new(MockTransport::new());
        mock.on_get("job/core/api/json", MockReply::json(job_document(Some(7))));
        mock.on_get("job/core/lastBuild/api/json", build_document(8, true));
        mock.on_get_sequence(
            "job/core/8/api/json",
            vec![
                build_document(8, true),
                build_document(8, true),
                build_document(8, false),
            ],
        );

        let job = Job::fetch(context(&mock), "core").await.unwrap();
        let outcome = job.launch_and_wait(&[], Duration::ZERO, POLL).await.unwrap();

        match outcome {
            LaunchOutcome::AlreadyBuilding(build) => {
                assert_eq!(build.number(), Some(8));
                assert!(!build.is_building());
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(mock.requests_to(Method::Post, "job/core/build").is_empty());
        assert_eq!(mock.requests_to(Method::Get, "job/core/lastBuild/api/json").len(), 1);
        assert_eq!(mock.requests_to(Method::Get, "job/core/8/api/json").len(), 3);
    }

    #[tokio::test]
    async fn test_launch_and_wait_returns_on_timeout() {
        let mock = Arc::new(MockTransport::new());
        mock.on_get("job/core/api/json", MockReply::json(job_document(None)));
        mock.on_post("job/core/build", MockReply::status(201));

        let job = Job::fetch(context(&mock), "core").await.unwrap();
        let outcome = job
            .launch_and_wait(&[], Duration::from_millis(20), POLL)
            .await
            .unwrap();

        assert!(outcome.was_launched());
        assert!(!outcome.build().is_loaded());
    }

    #[tokio::test]
    async fn test_lifecycle_posts() {
        let mock = Arc::new(MockTransport::new());
        for action in ["doDelete", "enable", "disable", "config.xml"] {
            mock.on_post(&format!("job/core/{action}"), MockReply::status(200));
        }
        mock.on_get("job/core/config.xml", MockReply::text(200, "<project/>"));
        let job = Job::unloaded(context(&mock), "core");

        job.enable().await.unwrap();
        job.disable().await.unwrap();
        job.set_config("<project><disabled>true</disabled></project>").await.unwrap();
        assert_eq!(job.config().await.unwrap(), "<project/>");
        job.delete().await.unwrap();

        let config_post = mock.requests_to(Method::Post, "job/core/config.xml");
        assert!(matches!(
            &config_post[0].body,
            Some(RequestBody::Raw { content_type, .. }) if content_type == "text/xml"
        ));
    }

    #[tokio::test]
    async fn test_failed_post_surfaces_status() {
        let mock = Arc::new(MockTransport::new());
        mock.on_post("job/core/enable", MockReply::status(500));
        let job = Job::unloaded(context(&mock), "core");

        let err = job.enable().await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert!(err.to_string().contains("enabling job core"));
    }
}
