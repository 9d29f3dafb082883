use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Local;
use tracing::{error, info, info_span, Instrument};

use crate::error::ReportError;
use crate::AppState;
use shared::generate_ulid;

/// `/` handler: POST runs the report, every other method gets an empty 502.
pub async fn report(State(state): State<AppState>, method: Method) -> Response {
    if method != Method::POST {
        return StatusCode::BAD_GATEWAY.into_response();
    }

    let request_id = generate_ulid();
    let span = info_span!("report_request", request_id = %request_id);

    async move {
        match render_report(&state).await {
            Ok(body) => {
                info!(bytes = body.len(), "Report served");
                (
                    StatusCode::OK,
                    [(header::CONTENT_TYPE, "application/json")],
                    body,
                )
                    .into_response()
            }
            Err(e) => {
                error!(kind = e.kind(), "Report request failed: {}", e);
                e.into_response()
            }
        }
    }
    .instrument(span)
    .await
}

async fn render_report(state: &AppState) -> Result<Vec<u8>, ReportError> {
    let today = Local::now().date_naive();
    let records = state.reports.fetch(today).await?;
    Ok(serde_json::to_vec(&records)?)
}
