use std::borrow::Cow;
use std::io::Write;
use std::path::Path;

use anyhow::Context;

use crate::models::SiteReportRecord;

pub const HEADERS: [&str; 13] = [
    "Website",
    "Users (Last Month)",
    "Users (Previous Week)",
    "New Users (Last Month)",
    "New Users (Previous Week)",
    "Sessions (Last Month)",
    "Sessions (Previous Week)",
    "Page Views (Last Month)",
    "Page Views (Previous Week)",
    "Event Count (Last Month)",
    "Event Count (Previous Week)",
    "Average Engagement Time (Last Month)",
    "Average Engagement Time (Previous Week)",
];

/// Quotes cells a spreadsheet would otherwise evaluate as a formula.
fn sanitize_cell(val: &str) -> Cow<'_, str> {
    if val.starts_with(['=', '+', '-', '@', '\t', '\r']) {
        Cow::Owned(format!("'{val}"))
    } else {
        Cow::Borrowed(val)
    }
}

fn row_cells(record: &SiteReportRecord) -> [String; 13] {
    [
        sanitize_cell(&record.site_name).into_owned(),
        record.total_users_month.to_string(),
        record.total_users.to_string(),
        record.new_users_month.to_string(),
        record.new_users.to_string(),
        record.sessions_month.to_string(),
        record.sessions.to_string(),
        record.page_views_month.to_string(),
        record.page_views.to_string(),
        record.event_count_month.to_string(),
        record.event_count.to_string(),
        record.average_engagement_time_month.to_string(),
        record.average_engagement_time.to_string(),
    ]
}

pub fn render<W: Write>(writer: W, records: &[SiteReportRecord]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(HEADERS)
        .context("failed to write report header")?;

    for record in records {
        wtr.write_record(row_cells(record))
            .with_context(|| format!("failed to write row for {}", record.site_name))?;
    }

    wtr.flush().context("failed to flush report")?;
    Ok(())
}

pub fn write_report(path: &Path, records: &[SiteReportRecord]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    render(file, records)
}
