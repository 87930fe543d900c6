//! Canned-response transport for unit tests

use crate::transport::{Request, Response, Transport, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// `GET /egdb` body
pub const EGDB_INFO: &str = r#"{"db_name":"egdb","update_seq":"0-g1AAAABXeJzLYWBgYMpgTmEQTM4vTc5ISXLIyU9OzMnILy7JAUklMiTV____PyuRAY-iPBYgydAApP5D1GYBAJmvHGw","sizes":{"file":8488,"external":0,"active":0},"purge_seq":0,"other":{"data_size":0},"doc_del_count":0,"doc_count":0,"disk_size":8488,"disk_format_version":6,"data_size":0,"compact_running":false,"instance_start_time":"0"}"#;

pub const CREATED: &str =
    r#"{"ok":true,"id":"abcde12345","rev":"1-928ec193918889e122e7ad45cfd88e47"}"#;

pub const UPDATED: &str =
    r#"{"ok":true,"id":"abcde12345","rev":"2-74a0465bd6e3ea40a1a3752b93916762"}"#;

pub const CONFLICT: &str = r#"{"error":"conflict","reason":"Document update conflict."}"#;

pub const NOT_FOUND: &str = r#"{"error":"not_found","reason":"missing"}"#;

/// Replays queued responses in order and records every request
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<std::result::Result<Response, TransportError>>>,
    requests: Mutex<Vec<Request>>,
}

impl MockTransport {
    pub fn new(responses: Vec<(u16, &str)>) -> Arc<Self> {
        let mock = Self::default();
        for (status, body) in responses {
            mock.push(status, body);
        }
        Arc::new(mock)
    }

    pub fn push(&self, status: u16, body: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(Response::new(status, body)));
    }

    pub fn push_error(&self, err: TransportError) {
        self.responses.lock().unwrap().push_back(Err(err));
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Request {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no request was sent")
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: Request) -> std::result::Result<Response, TransportError> {
        let next = self.responses.lock().unwrap().pop_front();
        let description = format!("{} {}", request.method, request.path());
        self.requests.lock().unwrap().push(request);
        next.unwrap_or_else(|| panic!("no canned response left for {}", description))
    }
}
