use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::config::ReportQuery;
use crate::error::ReportError;
use crate::models::{
    DateRange, Dimension, Header, Metric, ReportRecord, Row, RunReportRequest, RunReportResponse,
    Value,
};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Executes `runReport` against some analytics backend.
#[async_trait]
pub trait ReportBackend: Send + Sync {
    async fn run_report(&self, request: &RunReportRequest)
        -> Result<RunReportResponse, ReportError>;
}

pub fn build_request(property_id: &str, query: &ReportQuery, today: NaiveDate) -> RunReportRequest {
    RunReportRequest {
        property: format!("properties/{}", property_id),
        dimensions: vec![Dimension {
            name: query.dimension.clone(),
        }],
        metrics: query
            .metrics
            .iter()
            .map(|name| Metric { name: name.clone() })
            .collect(),
        date_ranges: vec![DateRange {
            start_date: query.start_date.format(DATE_FORMAT).to_string(),
            end_date: today.format(DATE_FORMAT).to_string(),
        }],
    }
}

/// Maps each row to a record, one for one and in order.
///
/// Only dimension value 0 and metric values 0 and 1 are read; any further metric
/// values are ignored.
pub fn to_records(response: &RunReportResponse) -> Result<Vec<ReportRecord>, ReportError> {
    response
        .rows
        .iter()
        .enumerate()
        .map(|(index, row)| to_record(index, row))
        .collect()
}

fn to_record(index: usize, row: &Row) -> Result<ReportRecord, ReportError> {
    Ok(ReportRecord {
        dimension_value: value_at(&row.dimension_values, index, 0, "dimension")?,
        event_count: value_at(&row.metric_values, index, 0, "metric")?,
        active_users: value_at(&row.metric_values, index, 1, "metric")?,
    })
}

fn value_at(values: &[Value], row: usize, at: usize, what: &str) -> Result<String, ReportError> {
    values.get(at).map(|v| v.value.clone()).ok_or_else(|| {
        ReportError::MalformedResponse(format!(
            "row {} has no {} value at index {}",
            row, what, at
        ))
    })
}

fn header_names(headers: &[Header]) -> Vec<&str> {
    headers.iter().map(|h| h.name.as_str()).collect()
}

#[derive(Clone)]
pub struct ReportService {
    backend: Arc<dyn ReportBackend>,
    property_id: String,
    query: ReportQuery,
}

impl ReportService {
    pub fn new(backend: Arc<dyn ReportBackend>, property_id: String, query: ReportQuery) -> Self {
        Self {
            backend,
            property_id,
            query,
        }
    }

    pub async fn fetch(&self, today: NaiveDate) -> Result<Vec<ReportRecord>, ReportError> {
        let request = build_request(&self.property_id, &self.query, today);
        debug!(
            "Running report for {} from {} to {}",
            request.property, request.date_ranges[0].start_date, request.date_ranges[0].end_date
        );

        let start_time = Instant::now();
        let response = self.backend.run_report(&request).await?;
        let elapsed = start_time.elapsed();

        info!(
            elapsed_ms = elapsed.as_millis() as u64,
            rows = response.rows.len(),
            row_count = response.row_count.unwrap_or_default(),
            "Report query completed"
        );
        debug!(
            "Report columns: dimensions {:?}, metrics {:?}",
            header_names(&response.dimension_headers),
            header_names(&response.metric_headers)
        );

        to_records(&response)
    }
}
