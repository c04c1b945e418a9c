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
use crate::items::Job;
use crate::resource::{
    fetched,
    Resource,
    ResourceState,
};

/// A named grouping of jobs
#[derive(Debug, Clone)]
pub struct View {
    state: ResourceState,
    name: String,
}

impl View {
    pub fn unloaded(context: Arc<ClientContext>, name: &str) -> Self {
        Self {
            state: ResourceState::new(context),
            name: name.to_string(),
        }
    }

    pub async fn fetch(context: Arc<ClientContext>, name: &str) -> JenkinsResult<Self> {
        fetched(Self::unloaded(context, name)).await
    }

    pub fn name(&self) -> &str {
        self.document()
            .and_then(|d| d.str("name"))
            .unwrap_or(&self.name)
    }

    pub fn description(&self) -> Option<&str> {
        self.document().and_then(|d| d.str("description"))
    }

    pub fn url(&self) -> Option<&str> {
        self.document().and_then(|d| d.str("url"))
    }

    pub fn job_names(&self) -> Vec<&str> {
        self.member_jobs()
            .filter_map(|job| job.get("name").and_then(Value::as_str))
            .collect()
    }

    /// Fetches every member job
    pub async fn jobs(&self) -> JenkinsResult<Vec<Job>> {
        let mut jobs = Vec::new();
        for name in self.job_names() {
            jobs.push(Job::fetch(Arc::clone(self.context()), name).await?);
        }
        Ok(jobs)
    }

    /// Colour of the member job in the worst state, `blue` for an empty view.
    /// Colours Jenkins does not document win over every known one.
    pub fn color(&self) -> String {
        let mut color = "blue";
        for candidate in self
            .member_jobs()
            .filter_map(|job| job.get("color").and_then(Value::as_str))
        {
            if color_priority(candidate) > color_priority(color) {
                color = candidate;
            }
        }
        color.to_string()
    }

    fn member_jobs(&self) -> impl Iterator<Item = &Value> {
        self.document()
            .and_then(|d| d.array("jobs"))
            .into_iter()
            .flatten()
    }
}

impl Resource for View {
    fn kind(&self) -> ResourceKind {
        ResourceKind::View
    }

    fn identity(&self) -> String {
        self.name.clone()
    }

    fn api_path(&self) -> String {
        format!("view/{}/api/json", encode_segment(&self.name))
    }

    fn state(&self) -> &ResourceState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ResourceState {
        &mut self.state
    }
}

fn color_priority(color: &str) -> u32 {
    match color {
        "red_anime" => 11,
        "red" => 10,
        "yellow_anime" => 6,
        "yellow" => 5,
        "blue_anime" => 2,
        "blue" => 1,
        "disabled" => 0,
        _ => 999,
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

    fn context(mock: &Arc<MockTransport>) -> Arc<ClientContext> {
        Arc::new(ClientContext::new("http://ci.local", None, mock.clone()))
    }

    fn view_with_colors(mock: &Arc<MockTransport>, colors: &[&str]) {
        let jobs: Vec<Value> = colors
            .iter()
            .enumerate()
            .map(|(i, color)| json!({ "name": format!("job-{i}"), "color": color }))
            .collect();
        mock.on_get(
            "view/Nightly Builds/api/json",
            MockReply::json(json!({
                "name": "Nightly Builds",
                "description": "Everything that runs at night",
                "url": "http://ci.local/view/Nightly%20Builds/",
                "jobs": jobs
            })),
        );
    }

    #[tokio::test]
    async fn test_view_accessors() {
        let mock = Arc::new(MockTransport::new());
        view_with_colors(&mock, &["blue", "yellow"]);

        let view = View::fetch(context(&mock), "Nightly Builds").await.unwrap();
        assert_eq!(view.name(), "Nightly Builds");
        assert_eq!(view.description(), Some("Everything that runs at night"));
        assert_eq!(view.job_names(), vec!["job-0", "job-1"]);
        assert_eq!(
            mock.last_request().unwrap().url,
            "http://ci.local/view/Nightly%20Builds/api/json"
        );
    }

    #[tokio::test]
    async fn test_color_picks_worst_member() {
        for (colors, expected) in [
            (vec![], "blue"),
            (vec!["disabled"], "blue"),
            (vec!["blue", "yellow", "blue_anime"], "yellow"),
            (vec!["red", "yellow_anime", "red_anime"], "red_anime"),
            (vec!["red_anime", "notbuilt"], "notbuilt"),
        ] {
            let mock = Arc::new(MockTransport::new());
            view_with_colors(&mock, &colors);
            let view = View::fetch(context(&mock), "Nightly Builds").await.unwrap();
            assert_eq!(view.color(), expected, "colors {colors:?}");
        }
    }

    #[tokio::test]
    async fn test_jobs_fetches_each_member() {
        let mock = Arc::new(MockTransport::new());
        view_with_colors(&mock, &["blue"]);
        mock.on_get("job/job-0/api/json", MockReply::json(json!({ "name": "job-0" })));

        let view = View::fetch(context(&mock), "Nightly Builds").await.unwrap();
        let jobs = view.jobs().await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].name(), "job-0");
    }
}
