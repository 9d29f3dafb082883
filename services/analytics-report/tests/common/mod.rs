#![allow(dead_code)]

pub mod mock_analytics;
pub mod mock_token;

use analytics_report::{
    create_app, AppState, ReportBackend, ReportError, ReportQuery, ReportService, Row,
    RunReportRequest, RunReportResponse, TokenSource,
};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

pub const TEST_PROPERTY_ID: &str = "391742241";

#[derive(Debug, Clone)]
pub enum StubReply {
    Rows(Vec<Row>),
    Fail(u16, String),
}

/// In-memory upstream that records every request it receives.
pub struct StubBackend {
    reply: Mutex<StubReply>,
    requests: Mutex<Vec<RunReportRequest>>,
}

impl StubBackend {
    pub fn new(reply: StubReply) -> Arc<Self> {
        Arc::new(Self {
            reply: Mutex::new(reply),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn set_reply(&self, reply: StubReply) {
        *self.reply.lock().unwrap() = reply;
    }

    pub fn get_requests(&self) -> Vec<RunReportRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReportBackend for StubBackend {
    async fn run_report(
        &self,
        request: &RunReportRequest,
    ) -> Result<RunReportResponse, ReportError> {
        self.requests.lock().unwrap().push(request.clone());
        match self.reply.lock().unwrap().clone() {
            StubReply::Rows(rows) => Ok(RunReportResponse {
                row_count: Some(rows.len() as i64),
                rows,
                ..Default::default()
            }),
            StubReply::Fail(status, message) => Err(ReportError::Upstream { status, message }),
        }
    }
}

pub struct StaticToken(pub String);

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String, ReportError> {
        Ok(self.0.clone())
    }
}

pub fn setup_test_app(backend: Arc<StubBackend>) -> axum::Router {
    let reports = ReportService::new(
        backend,
        TEST_PROPERTY_ID.to_string(),
        ReportQuery::default(),
    );
    create_app(AppState { reports })
}

pub fn sample_rows() -> Vec<Row> {
    vec![
        Row::new(["2024-01-01"], ["10", "5", "3"]),
        Row::new(["2024-01-02"], ["20", "8", "6"]),
    ]
}
