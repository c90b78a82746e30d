//! Scripted transport for unit tests.

use crate::error::Result;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Replays queued results for long-poll and config requests.
///
/// When the long-poll queue is empty the request never completes, like a
/// server holding the connection open.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    polls: Mutex<VecDeque<Result<HttpResponse>>>,
    configs: Mutex<VecDeque<Result<HttpResponse>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_poll(&self, result: Result<HttpResponse>) -> &Self {
        self.polls.lock().unwrap().push_back(result);
        self
    }

    pub(crate) fn push_config(&self, result: Result<HttpResponse>) -> &Self {
        self.configs.lock().unwrap().push_back(result);
        self
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn poll_requests(&self) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.url.contains("/notifications/v2"))
            .collect()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get(&self, request: HttpRequest) -> Result<HttpResponse> {
        let is_poll = request.url.contains("/notifications/v2");
        self.requests.lock().unwrap().push(request);

        let next = if is_poll {
            self.polls.lock().unwrap().pop_front()
        } else {
            self.configs.lock().unwrap().pop_front()
        };

        match next {
            Some(result) => result,
            None if is_poll => std::future::pending().await,
            None => Ok(HttpResponse::new(404, "")),
        }
    }
}
