//! Scripted in-memory transport
//!
//! Gated behind `cfg(test)` or the `mock` Cargo feature. Routes are keyed by
//! method and path relative to the server root (query string ignored), and
//! every request is recorded for later inspection.

use std::collections::{
    HashMap,
    VecDeque,
};
use std::sync::{
    Mutex,
    MutexGuard,
};

use async_trait::async_trait;
use serde_json::Value;

use crate::transport::{
    ApiRequest,
    ConnectError,
    Method,
    RawResponse,
    Transport,
};

/// How the mock answers one request
#[derive(Debug, Clone)]
pub enum MockReply {
    Respond(RawResponse),
    /// Simulates a connection-level failure
    Fail(String),
}

impl MockReply {
    pub fn json(value: Value) -> Self {
        let mut response = RawResponse::new(200, value.to_string().into_bytes());
        response
            .headers
            .insert("content-type".to_string(), "application/json".to_string());
        MockReply::Respond(response)
    }

    pub fn text(status: u16, body: &str) -> Self {
        MockReply::Respond(RawResponse::new(status, body.as_bytes().to_vec()))
    }

    pub fn status(status: u16) -> Self {
        MockReply::Respond(RawResponse::new(status, Vec::new()))
    }

    pub fn fail(message: &str) -> Self {
        MockReply::Fail(message.to_string())
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let MockReply::Respond(response) = &mut self {
            response
                .headers
                .insert(name.to_ascii_lowercase(), value.to_string());
        }
        self
    }
}

/// Each route replays its queue in order and keeps repeating the last reply.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<MockReply>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, method: Method, path: &str, replies: Vec<MockReply>) {
        lock(&self.routes).insert((method, normalize(path)), replies.into());
    }

    pub fn on_get(&self, path: &str, reply: MockReply) {
        self.on(Method::Get, path, vec![reply]);
    }

    pub fn on_post(&self, path: &str, reply: MockReply) {
        self.on(Method::Post, path, vec![reply]);
    }

    pub fn on_get_sequence(&self, path: &str, replies: Vec<MockReply>) {
        self.on(Method::Get, path, replies);
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        lock(&self.requests).clone()
    }

    pub fn last_request(&self) -> Option<ApiRequest> {
        lock(&self.requests).last().cloned()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Requests whose path (without query) equals `path`
    pub fn requests_to(&self, method: Method, path: &str) -> Vec<ApiRequest> {
        let path = normalize(path);
        lock(&self.requests)
            .iter()
            .filter(|request| request.method == method && route_path(&request.url) == path)
            .cloned()
            .collect()
    }

    fn next_reply(&self, method: Method, path: &str) -> Option<MockReply> {
        let mut routes = lock(&self.routes);
        let queue = routes.get_mut(&(method, path.to_string()))?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: ApiRequest) -> Result<RawResponse, ConnectError> {
        let path = route_path(&request.url);
        let method = request.method;
        lock(&self.requests).push(request);

        match self.next_reply(method, &path) {
            Some(MockReply::Respond(response)) => Ok(response),
            Some(MockReply::Fail(message)) => Err(ConnectError::new(message)),
            None => Ok(RawResponse::new(404, b"Not Found".to_vec())),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn normalize(path: &str) -> String {
    path.split('?')
        .next()
        .unwrap_or_default()
        .trim_matches('/')
        .to_string()
}

/// `http://host:8080/jenkins/job/my%20app/api/json?tree=x` ->
/// `jenkins/job/my app/api/json`
fn route_path(url: &str) -> String {
    let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let path = normalize(
        without_scheme
            .split_once('/')
            .map(|(_, rest)| rest)
            .unwrap_or_default(),
    );
    match urlencoding::decode(&path) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => path,
    }
}
