//! Time-bucketed activity series
//!
//! Buckets finished sessions into chart series:
//! - weekly: Monday-to-Sunday weeks covering a calendar month
//! - monthly: the twelve months of a year, normalized per week
//!
//! Sessions are bucketed by their UTC calendar date.

use crate::activity_index::session_load;
use crate::config::EngineConfig;
use crate::error::ScoreError;
use crate::types::{MonthBucket, SessionRecord, WeekBucket};
use chrono::{Datelike, Days, NaiveDate};

fn out_of_range(date: NaiveDate) -> ScoreError {
    ScoreError::DateParseError(format!("date range around {date} is not representable"))
}

fn add_days(date: NaiveDate, days: u64) -> Result<NaiveDate, ScoreError> {
    date.checked_add_days(Days::new(days)).ok_or_else(|| out_of_range(date))
}

fn sub_days(date: NaiveDate, days: u64) -> Result<NaiveDate, ScoreError> {
    date.checked_sub_days(Days::new(days)).ok_or_else(|| out_of_range(date))
}

fn first_of_month(year: i32, month: u32) -> Result<NaiveDate, ScoreError> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| ScoreError::DateParseError(format!("invalid month {year}-{month:02}")))
}

fn last_of_month(first: NaiveDate) -> Result<NaiveDate, ScoreError> {
    let (year, month) = if first.month() == 12 {
        (first.year() + 1, 1)
    } else {
        (first.year(), first.month() + 1)
    };
    sub_days(first_of_month(year, month)?, 1)
}

/// Number of days in a calendar month
pub fn days_in_month(year: i32, month: u32) -> Result<u32, ScoreError> {
    let first = first_of_month(year, month)?;
    Ok(last_of_month(first)?.day())
}

/// Weekly series with the default configuration
pub fn bucket_by_iso_week(
    sessions: &[SessionRecord],
    year: i32,
    month: u32,
) -> Result<Vec<WeekBucket>, ScoreError> {
    bucket_by_iso_week_with(sessions, year, month, &EngineConfig::default())
}

/// Weekly series for a month.
///
/// Weeks run from the Monday on or before the 1st to the Sunday on or after
/// the last day of the month; one bucket per week, ascending.
pub fn bucket_by_iso_week_with(
    sessions: &[SessionRecord],
    year: i32,
    month: u32,
    config: &EngineConfig,
) -> Result<Vec<WeekBucket>, ScoreError> {
    let first = first_of_month(year, month)?;
    let last = last_of_month(first)?;

    let start = sub_days(first, first.weekday().num_days_from_monday() as u64)?;
    let end = add_days(last, 6 - last.weekday().num_days_from_monday() as u64)?;

    let mut buckets = Vec::new();
    let mut week_start = start;
    while week_start <= end {
        let week_end = add_days(week_start, 6)?;
        let load: f64 = sessions
            .iter()
            .filter(|s| s.is_finished())
            .filter(|s| {
                let day = s.date.date_naive();
                day >= week_start && day <= week_end
            })
            .map(session_load)
            .sum();

        buckets.push(WeekBucket {
            week_start,
            week_end,
            activity_index: config.clamp_index(load),
        });
        if week_end == end {
            break;
        }
        week_start = add_days(week_start, 7)?;
    }
    Ok(buckets)
}

/// Monthly series with the default configuration
pub fn bucket_by_month_of_year(
    sessions: &[SessionRecord],
    year: i32,
    today: NaiveDate,
) -> Result<Vec<MonthBucket>, ScoreError> {
    bucket_by_month_of_year_with(sessions, year, today, &EngineConfig::default())
}

/// Monthly series for a year, always twelve entries January to December.
///
/// Each month's weighted minutes are divided by its number of weeks. The
/// month containing `today` only counts the days elapsed so far, so an
/// in-progress month is not penalized.
pub fn bucket_by_month_of_year_with(
    sessions: &[SessionRecord],
    year: i32,
    today: NaiveDate,
    config: &EngineConfig,
) -> Result<Vec<MonthBucket>, ScoreError> {
    let mut totals = [0.0f64; 12];
    for session in sessions.iter().filter(|s| s.is_finished()) {
        let day = session.date.date_naive();
        if day.year() == year {
            totals[day.month0() as usize] += session_load(session);
        }
    }

    let mut buckets = Vec::with_capacity(12);
    for (month0, total) in totals.iter().enumerate() {
        let month = month0 as u32 + 1;
        let days = if today.year() == year && today.month() == month {
            today.day()
        } else {
            days_in_month(year, month)?
        };
        let weeks = days as f64 / 7.0;
        let normalized = if weeks > 0.0 { total / weeks } else { 0.0 };

        buckets.push(MonthBucket {
            month: format!("{year:04}-{month:02}"),
            activity_index: config.clamp_index(normalized),
        });
    }
    Ok(buckets)
}
