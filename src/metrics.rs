use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ReportError, ReportResult};
use crate::models::{EngagementTime, MetricSnapshot};

/// Metric names in the order each report row returns them.
pub const METRIC_NAMES: [&str; 6] = [
    "userEngagementDuration",
    "totalUsers",
    "newUsers",
    "sessions",
    "screenPageViews",
    "eventCount",
];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub date_ranges: Vec<DateRange>,
    pub metrics: Vec<MetricName>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricName {
    pub name: String,
}

impl ReportRequest {
    pub fn for_range(start_date: String, end_date: String) -> Self {
        Self {
            date_ranges: vec![DateRange {
                start_date,
                end_date,
            }],
            metrics: METRIC_NAMES
                .iter()
                .map(|name| MetricName {
                    name: name.to_string(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    #[serde(default)]
    pub rows: Vec<ReportRow>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    #[serde(default)]
    pub metric_values: Vec<MetricValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricValue {
    pub value: Value,
}

/// Renders whole seconds as `"Ss"` under a minute and `"Mm Ss"` otherwise.
///
/// Input is rounded with `f64::round`, so halves round away from zero.
pub fn format_duration(seconds: f64) -> String {
    let rounded = if seconds.is_finite() && seconds > 0.0 {
        seconds.round() as u64
    } else {
        0
    };

    if rounded < 60 {
        format!("{rounded}s")
    } else {
        format!("{}m {}s", rounded / 60, rounded % 60)
    }
}

pub fn extract_snapshot(response: &ReportResponse) -> ReportResult<MetricSnapshot> {
    let row = response.rows.first().ok_or(ReportError::DataAbsent)?;
    if row.metric_values.len() < METRIC_NAMES.len() {
        return Err(ReportError::MalformedResponse(format!(
            "expected {} metric values, got {}",
            METRIC_NAMES.len(),
            row.metric_values.len()
        )));
    }

    let mut values = [0.0f64; 6];
    for (slot, (name, metric)) in values
        .iter_mut()
        .zip(METRIC_NAMES.iter().zip(row.metric_values.iter()))
    {
        *slot = parse_metric(name, &metric.value)?;
    }
    let [engagement, total_users, new_users, sessions, page_views, event_count] = values;

    let sessions = sessions.round() as u64;
    let average_engagement_time = if sessions > 0 {
        EngagementTime::Formatted(format_duration(engagement / sessions as f64))
    } else {
        EngagementTime::NoSessions
    };

    Ok(MetricSnapshot {
        total_users: total_users.round() as u64,
        new_users: new_users.round() as u64,
        sessions,
        page_views: page_views.round() as u64,
        event_count: event_count.round() as u64,
        average_engagement_time,
    })
}

fn parse_metric(name: &str, value: &Value) -> ReportResult<f64> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };

    match parsed {
        Some(number) if number.is_finite() && number >= 0.0 => Ok(number),
        _ => Err(ReportError::MalformedResponse(format!(
            "{name} has non-numeric value {value}"
        ))),
    }
}
