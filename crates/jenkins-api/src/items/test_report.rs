use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::context::{
    encode_job_path,
    ClientContext,
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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiteStatus {
    Passed,
    Failed,
}

impl SuiteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuiteStatus::Passed => "PASSED",
            SuiteStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for SuiteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregated test results of one build
#[derive(Debug, Clone)]
pub struct TestReport {
    state: ResourceState,
    job_name: String,
    build_number: String,
}

impl TestReport {
    pub fn unloaded(context: Arc<ClientContext>, job_name: &str, build_number: &str) -> Self {
        Self {
            state: ResourceState::new(context),
            job_name: job_name.to_string(),
            build_number: build_number.to_string(),
        }
    }

    pub async fn fetch(
        context: Arc<ClientContext>, job_name: &str, build_number: &str,
    ) -> JenkinsResult<Self> {
        fetched(Self::unloaded(context, job_name, build_number)).await
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn build_number(&self) -> &str {
        &self.build_number
    }

    /// Total duration in fractional seconds
    pub fn duration(&self) -> Option<f64> {
        self.document().and_then(|d| d.f64("duration"))
    }

    pub fn fail_count(&self) -> Option<u64> {
        self.document().and_then(|d| d.u64("failCount"))
    }

    pub fn pass_count(&self) -> Option<u64> {
        self.document().and_then(|d| d.u64("passCount"))
    }

    pub fn skip_count(&self) -> Option<u64> {
        self.document().and_then(|d| d.u64("skipCount"))
    }

    pub fn suites(&self) -> &[Value] {
        self.document()
            .and_then(|d| d.array("suites"))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn suite(&self, index: usize) -> Option<&Value> {
        self.suites().get(index)
    }

    /// `Failed` when any case of the suite reports `FAILED`
    pub fn suite_status(&self, index: usize) -> Option<SuiteStatus> {
        let suite = self.suite(index)?;
        let failed = suite
            .get("cases")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .any(|case| case.get("status").and_then(Value::as_str) == Some("FAILED"));

        Some(if failed {
            SuiteStatus::Failed
        } else {
            SuiteStatus::Passed
        })
    }

    /// The report re-serialised as compact JSON
    pub fn original_report(&self) -> Option<String> {
        self.document().map(|d| d.to_json_string())
    }
}

impl Resource for TestReport {
    fn kind(&self) -> ResourceKind {
        ResourceKind::TestReport
    }

    fn identity(&self) -> String {
        format!("{}#{}", self.job_name, self.build_number)
    }

    fn api_path(&self) -> String {
        format!(
            "job/{}/{}/testReport/api/json",
            encode_job_path(&self.job_name),
            self.build_number
        )
    }

    fn state(&self) -> &ResourceState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ResourceState {
        &mut self.state
    }
}
