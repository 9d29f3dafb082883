use axum::{routing::any, Router};
use tower::ServiceBuilder;

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod report;

pub use auth::{ServiceAccountAuth, TokenSource};
pub use client::AnalyticsDataClient;
pub use config::{Config, ReportQuery};
pub use error::ReportError;
pub use models::{ReportRecord, Row, RunReportRequest, RunReportResponse};
pub use report::{ReportBackend, ReportService};

#[derive(Clone)]
pub struct AppState {
    pub reports: ReportService,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", any(handlers::report))
        .fallback(handlers::report)
        .layer(ServiceBuilder::new().layer(middleware::trace_layer()))
        .with_state(state)
}
