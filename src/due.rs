//! Due-date shorthand parsing for quick task capture.
//!
//! Three forms are understood: a bare number of days from now, `MM-DD`, and
//! `MM-DD-HH:MM`. Anything else means "no due date".

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveTime, TimeZone};

pub fn parse_due_date(input: &str) -> Option<DateTime<Local>> {
    parse_due_date_at(input, Local::now())
}

pub(crate) fn parse_due_date_at(input: &str, now: DateTime<Local>) -> Option<DateTime<Local>> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    // Bare number: that many days from now.
    if let Ok(days) = input.parse::<i64>() {
        return now.checked_add_signed(Duration::days(days));
    }

    let parts: Vec<&str> = input.split('-').collect();
    match parts.as_slice() {
        [month, day] => {
            let date = month_day(month, day, now.year())?;
            let candidate = at_midnight(date)?;
            // A date already behind us this year means next year.
            if candidate < now {
                at_midnight(month_day(month, day, now.year() + 1)?)
            } else {
                Some(candidate)
            }
        }
        [month, day, time] => {
            let date = month_day(month, day, now.year())?;
            let (hours, minutes) = time.split_once(':')?;
            if hours.len() != 2 || minutes.len() != 2 {
                return None;
            }
            let time = NaiveTime::from_hms_opt(hours.parse().ok()?, minutes.parse().ok()?, 0)?;
            Local.from_local_datetime(&date.and_time(time)).earliest()
        }
        _ => None,
    }
}

fn month_day(month: &str, day: &str, year: i32) -> Option<NaiveDate> {
    if month.len() != 2 || day.len() != 2 {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month.parse().ok()?, day.parse().ok()?)
}

fn at_midnight(date: NaiveDate) -> Option<DateTime<Local>> {
    Local
        .from_local_datetime(&date.and_hms_opt(0, 0, 0)?)
        .earliest()
}

/// Compact rendering for result rows, e.g. "Sep 3".
pub fn format_short(due: &DateTime<Local>) -> String {
    due.format("%b %-d").to_string()
}
