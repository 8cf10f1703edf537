#![allow(dead_code)]

use novita::{NovitaClient, SyncConfig};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::{MockServer, Request, Respond, ResponseTemplate};

pub const TEST_API_KEY: &str = "test_api_key";

pub fn client_for(server: &MockServer) -> NovitaClient {
    NovitaClient::new_with_url(Some(TEST_API_KEY.to_string()), &server.uri()).unwrap()
}

pub fn anonymous_client_for(server: &MockServer) -> NovitaClient {
    NovitaClient::new_with_url(None, &server.uri()).unwrap()
}

/// A base URL nothing is listening on.
pub fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

/// Bridge settings that keep tests fast.
pub fn fast_sync() -> SyncConfig {
    SyncConfig::default().with_interval(Duration::from_millis(10))
}

/// Wraps `data` in a successful legacy envelope.
pub fn v2_ok(data: Value) -> Value {
    json!({ "code": 0, "msg": "", "data": data })
}

pub fn progress_body(status: i64, imgs: &[&str]) -> Value {
    v2_ok(json!({
        "status": status,
        "progress": if status == 2 { 1.0 } else { 0.5 },
        "eta_relative": 0,
        "imgs": imgs,
        "failed_reason": ""
    }))
}

/// Replies with each body in turn, repeating the last one once exhausted.
pub struct Sequence {
    bodies: Vec<Value>,
    calls: Arc<AtomicUsize>,
    delay: Option<Duration>,
}

impl Sequence {
    pub fn new(bodies: Vec<Value>) -> Self {
        Self {
            bodies,
            calls: Arc::new(AtomicUsize::new(0)),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl Respond for Sequence {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let body = &self.bodies[n.min(self.bodies.len() - 1)];
        let template = ResponseTemplate::new(200).set_body_json(body);
        match self.delay {
            Some(delay) => template.set_delay(delay),
            None => template,
        }
    }
}
