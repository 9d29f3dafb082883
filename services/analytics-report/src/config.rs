use chrono::NaiveDate;
use std::env;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PROPERTY_ID: &str = "391742241";
pub const DEFAULT_CREDENTIALS_PATH: &str = "./service-account.json";
pub const DEFAULT_START_DATE: &str = "2023-01-21";
pub const DEFAULT_DIMENSION: &str = "day";
pub const DEFAULT_METRICS: &str = "totalUsers,averageSessionDuration,active7DayUsers";
pub const DEFAULT_API_BASE: &str = "https://analyticsdata.googleapis.com/v1beta";
pub const ANALYTICS_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/analytics.readonly";

/// Number of metric values each output record reads from a row.
pub const SURFACED_METRICS: usize = 2;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("HOST must be an IP address, got {0:?}")]
    InvalidHost(String),
    #[error("{name} must be a valid port number, got {value:?}")]
    InvalidPort { name: &'static str, value: String },
    #[error("ANALYTICS_PROPERTY_ID must be a non-empty numeric id, got {0:?}")]
    InvalidPropertyId(String),
    #[error("REPORT_START_DATE must be formatted as YYYY-MM-DD, got {0:?}")]
    InvalidStartDate(String),
    #[error("REPORT_DIMENSION must not be empty")]
    EmptyDimension,
    #[error("REPORT_METRICS must name at least 2 metrics, got {0}")]
    TooFewMetrics(usize),
    #[error("UPSTREAM_TIMEOUT_SECS must be a positive integer, got {0:?}")]
    InvalidTimeout(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub credentials_path: PathBuf,
    pub analytics: AnalyticsConfig,
}

#[derive(Debug, Clone)]
pub struct AnalyticsConfig {
    pub property_id: String,
    pub api_base: String,
    pub upstream_timeout: Duration,
    pub query: ReportQuery,
}

/// Shape of the report issued on every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportQuery {
    pub dimension: String,
    pub metrics: Vec<String>,
    pub start_date: NaiveDate,
}

impl ReportQuery {
    /// Metrics requested upstream that no output field reads.
    pub fn unsurfaced_metrics(&self) -> &[String] {
        self.metrics.get(SURFACED_METRICS..).unwrap_or(&[])
    }
}

impl Default for ReportQuery {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_DIMENSION.to_string(),
            metrics: split_metrics(DEFAULT_METRICS),
            start_date: NaiveDate::from_ymd_opt(2023, 1, 21).unwrap_or_default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds and validates the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let host_raw = var("HOST", "0.0.0.0");
        let host = host_raw
            .trim()
            .parse::<IpAddr>()
            .map_err(|_| ConfigError::InvalidHost(host_raw.clone()))?;

        let port_raw = var("PORT", "8080");
        let port = port_raw.trim().parse::<u16>().map_err(|_| ConfigError::InvalidPort {
            name: "PORT",
            value: port_raw.clone(),
        })?;

        let property_id = var("ANALYTICS_PROPERTY_ID", DEFAULT_PROPERTY_ID).trim().to_string();
        if property_id.is_empty() || !property_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::InvalidPropertyId(property_id));
        }

        let start_raw = var("REPORT_START_DATE", DEFAULT_START_DATE);
        let start_date = NaiveDate::parse_from_str(start_raw.trim(), "%Y-%m-%d")
            .map_err(|_| ConfigError::InvalidStartDate(start_raw.clone()))?;

        let dimension = var("REPORT_DIMENSION", DEFAULT_DIMENSION).trim().to_string();
        if dimension.is_empty() {
            return Err(ConfigError::EmptyDimension);
        }

        let metrics = split_metrics(&var("REPORT_METRICS", DEFAULT_METRICS));
        if metrics.len() < SURFACED_METRICS {
            return Err(ConfigError::TooFewMetrics(metrics.len()));
        }

        let timeout_raw = var("UPSTREAM_TIMEOUT_SECS", "30");
        let timeout_secs = timeout_raw
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or_else(|| ConfigError::InvalidTimeout(timeout_raw.clone()))?;

        Ok(Self {
            host,
            port,
            credentials_path: PathBuf::from(var(
                "GOOGLE_APPLICATION_CREDENTIALS",
                DEFAULT_CREDENTIALS_PATH,
            )),
            analytics: AnalyticsConfig {
                property_id,
                api_base: var("ANALYTICS_API_BASE", DEFAULT_API_BASE)
                    .trim_end_matches('/')
                    .to_string(),
                upstream_timeout: Duration::from_secs(timeout_secs),
                query: ReportQuery {
                    dimension,
                    metrics,
                    start_date,
                },
            },
        })
    }
}

fn split_metrics(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}
