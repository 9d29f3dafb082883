use axum::{extract::State, http::StatusCode, response::Json, routing::post, Form, Router};
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::time::{sleep, Duration};

#[derive(Clone)]
struct MockState {
    forms: Arc<Mutex<Vec<HashMap<String, String>>>>,
    fetches: Arc<AtomicUsize>,
    response_status: Arc<Mutex<StatusCode>>,
    expires_in: Arc<Mutex<i64>>,
}

/// Stand-in for the OAuth2 token endpoint. Issues `tok-1`, `tok-2`, ... in order.
pub struct MockTokenEndpoint {
    pub token_url: String,
    forms: Arc<Mutex<Vec<HashMap<String, String>>>>,
    fetches: Arc<AtomicUsize>,
    response_status: Arc<Mutex<StatusCode>>,
    expires_in: Arc<Mutex<i64>>,
    _server_handle: tokio::task::JoinHandle<()>,
}

impl MockTokenEndpoint {
    pub async fn start() -> anyhow::Result<Self> {
        let forms: Arc<Mutex<Vec<HashMap<String, String>>>> = Arc::new(Mutex::new(Vec::new()));
        let fetches = Arc::new(AtomicUsize::new(0));
        let response_status = Arc::new(Mutex::new(StatusCode::OK));
        let expires_in = Arc::new(Mutex::new(3600));

        let state = MockState {
            forms: forms.clone(),
            fetches: fetches.clone(),
            response_status: response_status.clone(),
            expires_in: expires_in.clone(),
        };

        let app = Router::new()
            .route("/token", post(handle_token))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();

        let server_handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        sleep(Duration::from_millis(50)).await;

        Ok(Self {
            token_url: format!("http://127.0.0.1:{}/token", port),
            forms,
            fetches,
            response_status,
            expires_in,
            _server_handle: server_handle,
        })
    }

    pub fn set_status(&self, status: StatusCode) {
        *self.response_status.lock().unwrap() = status;
    }

    pub fn set_expires_in(&self, seconds: i64) {
        *self.expires_in.lock().unwrap() = seconds;
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn get_forms(&self) -> Vec<HashMap<String, String>> {
        self.forms.lock().unwrap().clone()
    }
}

async fn handle_token(
    State(state): State<MockState>,
    Form(form): Form<HashMap<String, String>>,
) -> (StatusCode, Json<JsonValue>) {
    state.forms.lock().unwrap().push(form);
    // Slow enough that overlapping callers would each reach the endpoint.
    sleep(Duration::from_millis(100)).await;

    let status = *state.response_status.lock().unwrap();
    if !status.is_success() {
        return (
            status,
            Json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid JWT Signature."
            })),
        );
    }

    let n = state.fetches.fetch_add(1, Ordering::SeqCst) + 1;
    let expires_in = *state.expires_in.lock().unwrap();
    (
        StatusCode::OK,
        Json(json!({
            "access_token": format!("tok-{}", n),
            "expires_in": expires_in,
            "token_type": "Bearer"
        })),
    )
}
