use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::auth::TokenSource;
use crate::error::ReportError;
use crate::models::{RunReportRequest, RunReportResponse};
use crate::report::ReportBackend;
use shared::truncate_for_log;

const MAX_ERROR_BODY: usize = 512;

/// Builds the process-wide HTTP client shared by token minting and report calls.
pub fn build_http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .context("Failed to build HTTP client")
}

fn is_auth_error(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

/// Google Analytics Data API client.
#[derive(Clone)]
pub struct AnalyticsDataClient {
    client: Client,
    api_base: String,
    tokens: Arc<dyn TokenSource>,
}

impl AnalyticsDataClient {
    pub fn new(client: Client, api_base: &str, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    fn run_report_url(&self, property: &str) -> String {
        format!("{}/{}:runReport", self.api_base, property)
    }
}

#[async_trait]
impl ReportBackend for AnalyticsDataClient {
    async fn run_report(
        &self,
        request: &RunReportRequest,
    ) -> Result<RunReportResponse, ReportError> {
        let token = self.tokens.access_token().await?;
        let url = self.run_report_url(&request.property);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        debug!("Analytics Data API runReport response status: {}", status);

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = truncate_for_log(&error_text, MAX_ERROR_BODY).to_string();

            if is_auth_error(status) {
                return Err(ReportError::Credential(format!(
                    "Analytics Data API rejected credentials (HTTP {}): {}",
                    status, message
                )));
            }

            return Err(ReportError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let response_text = response.text().await?;

        serde_json::from_str(&response_text).map_err(|e| {
            ReportError::MalformedResponse(format!(
                "{}. Raw response: {}",
                e,
                truncate_for_log(&response_text, MAX_ERROR_BODY)
            ))
        })
    }
}
