use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode, Uri},
    response::Json,
    Router,
};
use serde_json::{json, Value as JsonValue};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::time::{sleep, Duration};

#[derive(Debug, Clone)]
pub struct RecordedReportRequest {
    pub path: String,
    pub authorization: Option<String>,
    pub body: JsonValue,
}

#[derive(Clone)]
struct MockState {
    requests: Arc<Mutex<Vec<RecordedReportRequest>>>,
    response_status: Arc<Mutex<StatusCode>>,
    response_body: Arc<Mutex<String>>,
}

/// Stand-in for the Analytics Data API, served from an ephemeral local port.
pub struct MockAnalyticsApi {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedReportRequest>>>,
    response_status: Arc<Mutex<StatusCode>>,
    response_body: Arc<Mutex<String>>,
    _server_handle: tokio::task::JoinHandle<()>,
}

impl MockAnalyticsApi {
    pub async fn start() -> anyhow::Result<Self> {
        let requests: Arc<Mutex<Vec<RecordedReportRequest>>> = Arc::new(Mutex::new(Vec::new()));
        let response_status = Arc::new(Mutex::new(StatusCode::OK));
        let response_body = Arc::new(Mutex::new(
            json!({"kind": "analyticsData#runReport"}).to_string(),
        ));

        let state = MockState {
            requests: requests.clone(),
            response_status: response_status.clone(),
            response_body: response_body.clone(),
        };

        let app = Router::new().fallback(handle_report).with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();

        let server_handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        sleep(Duration::from_millis(50)).await;

        Ok(Self {
            base_url: format!("http://127.0.0.1:{}/v1beta", port),
            requests,
            response_status,
            response_body,
            _server_handle: server_handle,
        })
    }

    pub fn set_response(&self, status: StatusCode, body: impl Into<String>) {
        *self.response_status.lock().unwrap() = status;
        *self.response_body.lock().unwrap() = body.into();
    }

    pub fn get_requests(&self) -> Vec<RecordedReportRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn handle_report(
    State(state): State<MockState>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<JsonValue>,
) -> (StatusCode, [(&'static str, &'static str); 1], String) {
    state.requests.lock().unwrap().push(RecordedReportRequest {
        path: uri.path().to_string(),
        authorization: headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    });

    let status = *state.response_status.lock().unwrap();
    let body = state.response_body.lock().unwrap().clone();
    (status, [("content-type", "application/json")], body)
}
