use anyhow::Result;
use dotenvy::dotenv;
use shared::telemetry::{self, TelemetryConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};

use analytics_report::config::{Config, ANALYTICS_READONLY_SCOPE};
use analytics_report::{
    client, create_app, AnalyticsDataClient, AppState, ReportService, ServiceAccountAuth,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let telemetry_config = TelemetryConfig::from_env("analytics-report");
    telemetry::init_telemetry(telemetry_config)?;

    let config = Config::from_env()?;
    info!(
        "Starting analytics report server for properties/{}",
        config.analytics.property_id
    );

    let query = &config.analytics.query;
    if !query.unsurfaced_metrics().is_empty() {
        warn!(
            "Metrics {:?} are requested upstream but not included in the response",
            query.unsurfaced_metrics()
        );
    }

    let http_client = client::build_http_client(config.analytics.upstream_timeout)?;
    let auth = ServiceAccountAuth::from_file(
        http_client.clone(),
        &config.credentials_path,
        ANALYTICS_READONLY_SCOPE,
    )?;
    info!("Authenticating as {}", auth.client_email());

    let backend = AnalyticsDataClient::new(http_client, &config.analytics.api_base, Arc::new(auth));
    let reports = ReportService::new(
        Arc::new(backend),
        config.analytics.property_id.clone(),
        config.analytics.query.clone(),
    );

    let app = create_app(AppState { reports });

    let addr = SocketAddr::from((config.host, config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on {}", addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("HTTP server stopped: {:?}", e);
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
