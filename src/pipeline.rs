use chrono::{NaiveDate, Utc};
use tracing::{error, info, warn};

use crate::client::AnalyticsSource;
use crate::config::RunConfig;
use crate::error::ReportError;
use crate::metrics;
use crate::models::{
    MetricSnapshot, RunOutcome, SiteConfig, SiteFailure, SiteReportRecord, TimeWindow, WindowKind,
};
use crate::report;
use crate::windows;

async fn fetch_snapshot(
    source: &dyn AnalyticsSource,
    token: &str,
    site: &SiteConfig,
    kind: WindowKind,
    window: TimeWindow,
) -> Result<MetricSnapshot, SiteFailure> {
    let fetched = source
        .run_report(token, &site.property_id, window)
        .await
        .and_then(|response| metrics::extract_snapshot(&response));

    match fetched {
        Ok(snapshot) => {
            info!(
                site = %site.name,
                window = %kind,
                start = %window.start_date,
                end = %window.end_date,
                "fetched metrics"
            );
            Ok(snapshot)
        }
        Err(e) => {
            if e == ReportError::DataAbsent {
                warn!(site = %site.name, window = %kind, "no data for window");
            } else {
                error!(site = %site.name, window = %kind, error = %e, "failed to fetch metrics");
            }
            Err(SiteFailure {
                site: site.name.clone(),
                window: Some(kind),
                error: e,
            })
        }
    }
}

/// Resolves credentials and both windows for one site. Any failure yields no record.
pub async fn collect_site(
    source: &dyn AnalyticsSource,
    site: &SiteConfig,
    today: NaiveDate,
) -> Result<SiteReportRecord, SiteFailure> {
    let token = match source.access_token(site).await {
        Ok(token) => {
            info!(site = %site.name, "access token obtained");
            token
        }
        Err(e) => {
            error!(site = %site.name, error = %e, "failed to obtain access token");
            return Err(SiteFailure {
                site: site.name.clone(),
                window: None,
                error: e,
            });
        }
    };

    let (week, month) = windows::report_windows(today);
    let week_snapshot = fetch_snapshot(source, &token, site, WindowKind::Week, week).await?;
    let month_snapshot = fetch_snapshot(source, &token, site, WindowKind::Month, month).await?;

    Ok(SiteReportRecord::merge(
        &site.name,
        week_snapshot,
        month_snapshot,
    ))
}

pub async fn run(
    config: RunConfig,
    source: &dyn AnalyticsSource,
    today: NaiveDate,
) -> anyhow::Result<RunOutcome> {
    info!(started_at = %Utc::now(), sites = config.sites.len(), "report run started");

    let mut records = Vec::new();
    let mut failures = Vec::new();
    for site in &config.sites {
        match collect_site(source, site, today).await {
            Ok(record) => records.push(record),
            Err(failure) => failures.push(failure),
        }
    }

    if records.is_empty() {
        error!(failed = failures.len(), "no valid results, report not written");
        info!(finished_at = %Utc::now(), "report run finished");
        return Err(ReportError::NoValidResults(failures).into());
    }

    report::write_report(&config.output, &records)?;
    info!(
        path = %config.output.display(),
        rows = records.len(),
        "report written"
    );
    info!(finished_at = %Utc::now(), "report run finished");

    Ok(RunOutcome {
        records,
        failures,
        output: config.output,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::json;
    use temp_dir::TempDir;

    use super::*;
    use crate::error::ReportResult;
    use crate::metrics::ReportResponse;
    use crate::models::EngagementTime;

    #[derive(Default)]
    struct FakeSource {
        rejected_sites: Vec<String>,
        reports: HashMap<(String, NaiveDate), ReportResult<ReportResponse>>,
    }

    impl FakeSource {
        fn with_report(mut self, property: &str, start: NaiveDate, values: [u64; 6]) -> Self {
            let metric_values: Vec<_> = values
                .iter()
                .map(|v| json!({ "value": v.to_string() }))
                .collect();
            let response = serde_json::from_value(json!({ "rows": [{ "metricValues": metric_values }] }))
                .unwrap();
            self.reports.insert((property.to_string(), start), Ok(response));
            self
        }

        fn with_error(mut self, property: &str, start: NaiveDate, error: ReportError) -> Self {
            self.reports.insert((property.to_string(), start), Err(error));
            self
        }
    }

    #[async_trait]
    impl AnalyticsSource for FakeSource {
        async fn access_token(&self, site: &SiteConfig) -> ReportResult<String> {
            if self.rejected_sites.contains(&site.name) {
                Err(ReportError::Credential("key rejected".to_string()))
            } else {
                Ok(format!("token-{}", site.property_id))
            }
        }

        async fn run_report(
            &self,
            token: &str,
            property_id: &str,
            window: TimeWindow,
        ) -> ReportResult<ReportResponse> {
            assert_eq!(token, format!("token-{property_id}"));
            self.reports
                .get(&(property_id.to_string(), window.start_date))
                .cloned()
                .unwrap_or_else(|| Ok(ReportResponse::default()))
        }
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Installs a thread-local subscriber writing into memory for the guard's lifetime.
    fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        (logs, tracing::subscriber::set_default(subscriber))
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn site(name: &str, property_id: &str) -> SiteConfig {
        SiteConfig {
            name: name.to_string(),
            key_file: PathBuf::from(format!("{name}.json")),
            property_id: property_id.to_string(),
        }
    }

    // 2024-01-17 (Wednesday): week 2024-01-07..13, month 2023-12-01..31
    fn today() -> NaiveDate {
        date(2024, 1, 17)
    }

    #[tokio::test]
    async fn merges_week_and_month_snapshots() {
        let source = FakeSource::default()
            .with_report("1", date(2024, 1, 7), [5000, 90, 40, 100, 300, 1200])
            .with_report("1", date(2023, 12, 1), [24000, 350, 120, 400, 1300, 5100]);

        let record = collect_site(&source, &site("Main", "1"), today())
            .await
            .unwrap();
        assert_eq!(record.site_name, "Main");
        assert_eq!(record.total_users, 90);
        assert_eq!(record.total_users_month, 350);
        assert_eq!(record.sessions, 100);
        assert_eq!(record.sessions_month, 400);
        assert_eq!(
            record.average_engagement_time,
            EngagementTime::Formatted("50s".to_string())
        );
        assert_eq!(
            record.average_engagement_time_month,
            EngagementTime::Formatted("1m 0s".to_string())
        );
    }

    #[tokio::test]
    async fn month_failure_drops_the_whole_site() {
        let source = FakeSource::default()
            .with_report("1", date(2024, 1, 7), [5000, 90, 40, 100, 300, 1200])
            .with_error(
                "1",
                date(2023, 12, 1),
                ReportError::Transport("status 503".to_string()),
            );

        let (logs, _guard) = capture_logs();
        let failure = collect_site(&source, &site("Main", "1"), today())
            .await
            .unwrap_err();
        assert_eq!(failure.site, "Main");
        assert_eq!(failure.window, Some(WindowKind::Month));
        assert!(matches!(failure.error, ReportError::Transport(_)));

        let logged = logs.contents();
        let line = logged
            .lines()
            .find(|line| line.contains("failed to fetch metrics"))
            .unwrap();
        assert!(line.contains("ERROR"));
        assert!(line.contains("site=Main"));
        assert!(line.contains("window=last month"));
        assert!(line.contains("status 503"));
    }

    #[tokio::test]
    async fn empty_week_is_data_absent() {
        let source = FakeSource::default()
            .with_report("1", date(2023, 12, 1), [1, 1, 1, 1, 1, 1]);

        let failure = collect_site(&source, &site("Main", "1"), today())
            .await
            .unwrap_err();
        assert_eq!(failure.window, Some(WindowKind::Week));
        assert_eq!(failure.error, ReportError::DataAbsent);
    }

    #[tokio::test]
    async fn credential_failure_skips_only_that_site() {
        let dir = TempDir::new().unwrap();
        let output = dir.child("report.csv");
        let source = FakeSource {
            rejected_sites: vec!["Blog".to_string()],
            ..FakeSource::default()
        }
        .with_report("1", date(2024, 1, 7), [5000, 90, 40, 100, 300, 1200])
        .with_report("1", date(2023, 12, 1), [24000, 350, 120, 400, 1300, 5100]);

        let config = RunConfig {
            sites: vec![site("Main", "1"), site("Blog", "2")],
            output: output.clone(),
            log_file: dir.child("run.log"),
        };

        let (logs, _guard) = capture_logs();
        let outcome = run(config, &source, today()).await.unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].site_name, "Main");
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].site, "Blog");
        assert_eq!(outcome.failures[0].window, None);
        assert!(matches!(outcome.failures[0].error, ReportError::Credential(_)));

        let mut reader = csv::Reader::from_path(&output).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][0], "Main");
        assert_eq!(&rows[0][11], "1m 0s");
        assert_eq!(&rows[0][12], "50s");

        let logged = logs.contents();
        let line = logged
            .lines()
            .find(|line| line.contains("failed to obtain access token"))
            .unwrap();
        assert!(line.contains("ERROR"));
        assert!(line.contains("site=Blog"));
        assert!(!logged.contains("site=Main error="));
        assert!(logged.contains("report written"));
    }

    #[tokio::test]
    async fn all_failures_write_nothing() {
        let dir = TempDir::new().unwrap();
        let output = dir.child("report.csv");
        let source = FakeSource {
            rejected_sites: vec!["Main".to_string()],
            ..FakeSource::default()
        };
        let config = RunConfig {
            sites: vec![site("Main", "1")],
            output: output.clone(),
            log_file: dir.child("run.log"),
        };

        let err = run(config, &source, today()).await.unwrap_err();
        match err.downcast_ref::<ReportError>() {
            Some(ReportError::NoValidResults(failures)) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].site, "Main");
                assert!(matches!(failures[0].error, ReportError::Credential(_)));
            }
            other => panic!("expected NoValidResults, got {other:?}"),
        }
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn no_sites_is_no_valid_results() {
        let dir = TempDir::new().unwrap();
        let config = RunConfig {
            sites: Vec::new(),
            output: dir.child("report.csv"),
            log_file: dir.child("run.log"),
        };

        let err = run(config, &FakeSource::default(), today()).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<ReportError>(),
            Some(&ReportError::NoValidResults(Vec::new()))
        );
    }
}
