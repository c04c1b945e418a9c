use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::context::{
    encode_job_path,
    ClientContext,
};
use crate::document::millis_to_secs;
use crate::error::{
    JenkinsResult,
    ResourceKind,
};
use crate::items::{
    find_executor_for_build,
    Executor,
    TestReport,
};
use crate::resource::{
    Resource,
    ResourceState,
};
use crate::transport::RequestBody;

/// Fields requested by [`crate::Jenkins::build`] unless another tree is given
pub const DEFAULT_BUILD_TREE: &str = "actions[parameters[name,value,number,jobName]],result,building,duration,timestamp,number,url,estimatedDuration,builtOn,fullDisplayName";

/// Outcome of a build as reported by the `result` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildResult {
    Success,
    Failure,
    Unstable,
    Aborted,
    Waiting,
    /// Also used for any value the server reports that is not listed above,
    /// including the `null` result of an in-progress build
    Running,
}

impl BuildResult {
    pub fn classify(raw: Option<&Value>) -> Self {
        match raw.and_then(Value::as_str) {
            Some("SUCCESS") => BuildResult::Success,
            Some("FAILURE") => BuildResult::Failure,
            Some("UNSTABLE") => BuildResult::Unstable,
            Some("ABORTED") => BuildResult::Aborted,
            Some("WAITING") => BuildResult::Waiting,
            _ => BuildResult::Running,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BuildResult::Success => "SUCCESS",
            BuildResult::Failure => "FAILURE",
            BuildResult::Unstable => "UNSTABLE",
            BuildResult::Aborted => "ABORTED",
            BuildResult::Waiting => "WAITING",
            BuildResult::Running => "RUNNING",
        }
    }
}

impl fmt::Display for BuildResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildSelector {
    Number(u64),
    /// `lastBuild` permalink; the number is known once the document loads
    Last,
}

impl fmt::Display for BuildSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildSelector::Number(number) => write!(f, "{number}"),
            BuildSelector::Last => f.write_str("lastBuild"),
        }
    }
}

/// Value of one build parameter
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    Value(Value),
    /// Run parameter pointing at another build
    Run { number: i64, job_name: String },
}

/// One execution of a job
#[derive(Debug, Clone)]
pub struct Build {
    state: ResourceState,
    job_name: String,
    selector: BuildSelector,
    tree: Option<String>,
}

impl Build {
    pub fn unloaded(context: Arc<ClientContext>, job_name: &str, selector: BuildSelector) -> Self {
        Self {
            state: ResourceState::new(context),
            job_name: job_name.to_string(),
            selector,
            tree: None,
        }
    }

    /// Restricts the fetched document to the given `tree` expression
    #[must_use]
    pub fn with_tree(mut self, tree: Option<&str>) -> Self {
        self.tree = tree.map(str::to_string);
        self
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn selector(&self) -> BuildSelector {
        self.selector
    }

    /// Build number from the document, falling back to the selector
    pub fn number(&self) -> Option<u64> {
        self.document()
            .and_then(|d| d.u64("number"))
            .or(match self.selector {
                BuildSelector::Number(number) => Some(number),
                BuildSelector::Last => None,
            })
    }

    pub fn result(&self) -> BuildResult {
        BuildResult::classify(self.get("result"))
    }

    pub fn is_building(&self) -> bool {
        self.document()
            .and_then(|d| d.bool("building"))
            .unwrap_or(false)
    }

    pub fn url(&self) -> Option<&str> {
        self.document().and_then(|d| d.str("url"))
    }

    pub fn built_on(&self) -> Option<&str> {
        self.document().and_then(|d| d.str("builtOn"))
    }

    pub fn full_display_name(&self) -> Option<&str> {
        self.document().and_then(|d| d.str("fullDisplayName"))
    }

    /// Start time in whole seconds since the epoch
    pub fn timestamp(&self) -> Option<i64> {
        self.document().and_then(|d| d.millis_as_secs("timestamp"))
    }

    /// Duration in whole seconds. While Jenkins still reports `0` the
    /// elapsed time since [`Build::timestamp`] is returned instead.
    pub fn duration(&self) -> Option<i64> {
        let raw = self.get("duration")?;
        if raw.as_f64() == Some(0.0) {
            return self
                .timestamp()
                .map(|started| (chrono::Utc::now().timestamp() - started).max(0));
        }
        millis_to_secs(raw)
    }

    /// Server-side `estimatedDuration`, in fractional seconds
    pub fn reported_estimated_duration(&self) -> Option<f64> {
        self.document()
            .and_then(|d| d.f64("estimatedDuration"))
            .filter(|ms| *ms > 0.0)
            .map(|ms| ms / 1000.0)
    }

    /// Parameters of the first action that carries any
    pub fn input_parameters(&self) -> BTreeMap<String, ParameterValue> {
        let mut parameters = BTreeMap::new();
        let Some(actions) = self.document().and_then(|d| d.array("actions")) else {
            return parameters;
        };

        let Some(list) = actions
            .iter()
            .find_map(|action| action.get("parameters").and_then(Value::as_array))
        else {
            return parameters;
        };

        for parameter in list {
            let Some(name) = parameter.get("name").and_then(Value::as_str) else {
                continue;
            };
            if let Some(value) = parameter.get("value") {
                parameters.insert(name.to_string(), ParameterValue::Value(value.clone()));
            } else if let (Some(number), Some(job_name)) = (
                parameter.get("number").and_then(Value::as_i64),
                parameter.get("jobName").and_then(Value::as_str),
            ) {
                parameters.insert(
                    name.to_string(),
                    ParameterValue::Run {
                        number,
                        job_name: job_name.to_string(),
                    },
                );
            }
        }

        parameters
    }

    fn build_path(&self) -> String {
        format!("job/{}/{}", encode_job_path(&self.job_name), self.selector_segment())
    }

    fn selector_segment(&self) -> String {
        match (self.selector, self.number()) {
            (BuildSelector::Number(number), _) => number.to_string(),
            (BuildSelector::Last, Some(number)) => number.to_string(),
            (BuildSelector::Last, None) => "lastBuild".to_string(),
        }
    }

    /// Executor currently running this build. No request is made when the
    /// build is not building.
    pub async fn executor(&self) -> JenkinsResult<Option<Executor>> {
        find_executor_for_build(self.context(), self).await
    }

    /// Executor progress in percent, when the build is running somewhere
    pub async fn progress(&self) -> JenkinsResult<Option<i64>> {
        Ok(self.executor().await?.and_then(|executor| executor.progress()))
    }

    /// Reported estimate, or one derived from executor progress for servers
    /// that do not publish `estimatedDuration`
    pub async fn estimated_duration(&self) -> JenkinsResult<Option<f64>> {
        if let Some(estimate) = self.reported_estimated_duration() {
            return Ok(Some(estimate));
        }

        let (Some(progress), Some(started)) = (self.progress().await?, self.timestamp()) else {
            return Ok(None);
        };
        if progress <= 0 {
            return Ok(None);
        }

        let elapsed = (chrono::Utc::now().timestamp() - started) as f64;
        Ok(Some((elapsed / (progress as f64 / 100.0)).ceil()))
    }

    /// Seconds left according to [`Build::estimated_duration`], never negative
    pub async fn remaining_execution_time(&self) -> JenkinsResult<Option<f64>> {
        let Some(estimate) = self.estimated_duration().await? else {
            return Ok(None);
        };
        let elapsed = self
            .timestamp()
            .map(|started| (chrono::Utc::now().timestamp() - started) as f64)
            .unwrap_or(0.0);
        Ok(Some((estimate - elapsed).max(0.0)))
    }

    pub async fn console_text(&self) -> JenkinsResult<String> {
        let label = format!("console of build {}#{}", self.job_name, self.selector_segment());
        self.context()
            .get_text(&format!("{}/consoleText", self.build_path()), &label)
            .await
    }

    pub async fn test_report(&self) -> JenkinsResult<TestReport> {
        let number = self.selector_segment();
        TestReport::fetch(Arc::clone(self.context()), &self.job_name, &number).await
    }

    pub async fn set_description(&self, text: &str) -> JenkinsResult<()> {
        let label = format!("description of build {}#{}", self.job_name, self.selector_segment());
        self.context()
            .post(
                &format!("{}/submitDescription", self.build_path()),
                Some(RequestBody::Form(vec![(
                    "description".to_string(),
                    text.to_string(),
                )])),
                &label,
            )
            .await?;
        Ok(())
    }

    /// Aborts the build. Returns `false` without a request when it is not
    /// building.
    pub async fn stop(&self) -> JenkinsResult<bool> {
        if !self.is_building() {
            return Ok(false);
        }
        let label = format!("stop of build {}#{}", self.job_name, self.selector_segment());
        self.context()
            .post(&format!("{}/stop", self.build_path()), None, &label)
            .await?;
        Ok(true)
    }
}

impl Resource for Build {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Build
    }

    fn identity(&self) -> String {
        format!("{}#{}", self.job_name, self.selector)
    }

    fn api_path(&self) -> String {
        format!(
            "job/{}/{}/api/json",
            encode_job_path(&self.job_name),
            self.selector
        )
    }

    fn api_query(&self) -> Vec<(String, String)> {
        self.tree
            .iter()
            .map(|tree| ("tree".to_string(), tree.clone()))
            .collect()
    }

    fn state(&self) -> &ResourceState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ResourceState {
        &mut self.state
    }
}
