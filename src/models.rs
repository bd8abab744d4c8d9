use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};

use crate::error::ReportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    Week,
    Month,
}

impl fmt::Display for WindowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowKind::Week => write!(f, "previous week"),
            WindowKind::Month => write!(f, "last month"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    pub name: String,
    pub key_file: PathBuf,
    #[serde(deserialize_with = "property_id_from_any")]
    pub property_id: String,
}

fn property_id_from_any<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(value) => value,
        Raw::Number(value) => value.to_string(),
    })
}

/// Average engagement per session, or a marker when the window had no sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngagementTime {
    Formatted(String),
    NoSessions,
}

impl fmt::Display for EngagementTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngagementTime::Formatted(value) => f.write_str(value),
            EngagementTime::NoSessions => f.write_str("No sessions"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricSnapshot {
    pub total_users: u64,
    pub new_users: u64,
    pub sessions: u64,
    pub page_views: u64,
    pub event_count: u64,
    pub average_engagement_time: EngagementTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SiteReportRecord {
    pub site_name: String,
    pub total_users_month: u64,
    pub total_users: u64,
    pub new_users_month: u64,
    pub new_users: u64,
    pub sessions_month: u64,
    pub sessions: u64,
    pub page_views_month: u64,
    pub page_views: u64,
    pub event_count_month: u64,
    pub event_count: u64,
    pub average_engagement_time_month: EngagementTime,
    pub average_engagement_time: EngagementTime,
}

impl SiteReportRecord {
    pub fn merge(site_name: &str, week: MetricSnapshot, month: MetricSnapshot) -> Self {
        Self {
            site_name: site_name.to_string(),
            total_users_month: month.total_users,
            total_users: week.total_users,
            new_users_month: month.new_users,
            new_users: week.new_users,
            sessions_month: month.sessions,
            sessions: week.sessions,
            page_views_month: month.page_views,
            page_views: week.page_views,
            event_count_month: month.event_count,
            event_count: week.event_count,
            average_engagement_time_month: month.average_engagement_time,
            average_engagement_time: week.average_engagement_time,
        }
    }
}

/// A site that produced no record, with the window it failed on when the
/// failure happened after credentials were resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteFailure {
    pub site: String,
    pub window: Option<WindowKind>,
    pub error: ReportError,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub records: Vec<SiteReportRecord>,
    pub failures: Vec<SiteFailure>,
    pub output: PathBuf,
}
