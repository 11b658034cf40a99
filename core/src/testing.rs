//! Deterministic transport for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::http::{HttpRequest, HttpResponse};
use crate::transport::Transport;

/// Replays queued responses in order and records every request. The last
/// queued response is repeated once the queue is down to one entry.
#[derive(Debug, Default)]
pub struct StubTransport {
    responses: Mutex<VecDeque<HttpResponse>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl StubTransport {
    pub fn new(responses: impl IntoIterator<Item = HttpResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::default(),
        }
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for StubTransport {
    fn request(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(request);
        let mut responses = self.responses.lock().unwrap();
        let next = if responses.len() > 1 {
            responses.pop_front()
        } else {
            responses.front().cloned()
        };
        next.ok_or_else(|| Error::Transport("no response queued".to_string()))
    }
}

pub fn response(status: u16, headers: &[(&str, &str)], body: &[u8]) -> HttpResponse {
    HttpResponse {
        status,
        headers: headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        body: body.to_vec(),
    }
}

pub fn json_response(status: u16, body: &str) -> HttpResponse {
    response(status, &[("content-type", "application/json")], body.as_bytes())
}
