use chrono::{Datelike, Duration, NaiveDate, Utc};

use crate::models::TimeWindow;

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Most recently completed Sunday..Saturday span before the week containing `today`.
pub fn previous_week(today: NaiveDate) -> TimeWindow {
    let days_since_sunday = today.weekday().num_days_from_sunday() as i64;
    let last_saturday = today - Duration::days(days_since_sunday + 1);
    let last_sunday = last_saturday - Duration::days(6);

    TimeWindow {
        start_date: last_sunday,
        end_date: last_saturday,
    }
}

/// Full calendar month before the month containing `today`.
pub fn previous_month(today: NaiveDate) -> TimeWindow {
    let first_this_month = today - Duration::days(today.day0() as i64);
    let last_day_last_month = first_this_month - Duration::days(1);
    let first_day_last_month = last_day_last_month - Duration::days(last_day_last_month.day0() as i64);

    TimeWindow {
        start_date: first_day_last_month,
        end_date: last_day_last_month,
    }
}

pub fn report_windows(today: NaiveDate) -> (TimeWindow, TimeWindow) {
    (previous_week(today), previous_month(today))
}
