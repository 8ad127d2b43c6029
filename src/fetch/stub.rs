//! In-memory [`HttpClient`] for unit tests.

use super::client::HttpClient;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use std::collections::VecDeque;
use std::sync::Mutex;

pub(crate) struct RecordedRequest {
    pub url: String,
    pub headers: HeaderMap,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }
}

/// Answers requests whose URL contains a registered pattern.
///
/// Responses registered for the same pattern are served in order; the last
/// one keeps being served once the queue is down to it. Unmatched URLs get
/// a 404.
pub(crate) struct StubClient {
    routes: Mutex<Vec<(String, VecDeque<(u16, String)>)>>,
    seen: Mutex<Vec<RecordedRequest>>,
}

impl StubClient {
    pub fn new() -> Self {
        Self {
            routes: Mutex::new(Vec::new()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn route(self, pattern: &str, status: u16, body: impl Into<String>) -> Self {
        {
            let mut routes = self.routes.lock().unwrap();
            let response = (status, body.into());
            match routes.iter_mut().find(|(p, _)| p == pattern) {
                Some((_, queue)) => queue.push_back(response),
                None => routes.push((pattern.to_string(), VecDeque::from([response]))),
            }
        }
        self
    }

    pub fn requests(&self) -> std::sync::MutexGuard<'_, Vec<RecordedRequest>> {
        self.seen.lock().unwrap()
    }
}

#[async_trait]
impl HttpClient for StubClient {
    async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        let url = req.url().to_string();

        let (status, body) = {
            let mut routes = self.routes.lock().unwrap();
            routes
                .iter_mut()
                .find(|(pattern, _)| url.contains(pattern.as_str()))
                .and_then(|(_, queue)| {
                    if queue.len() > 1 {
                        queue.pop_front()
                    } else {
                        queue.front().cloned()
                    }
                })
                .unwrap_or((404, String::new()))
        };

        self.seen.lock().unwrap().push(RecordedRequest {
            url,
            headers: req.headers().clone(),
        });

        let resp = http::Response::builder()
            .status(status)
            .body(body)
            .unwrap();
        Ok(reqwest::Response::from(resp))
    }
}
