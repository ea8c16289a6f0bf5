//! Derives the actionable job codes from the queue rows.
//!
//! Row 0 is always the header. Rows shorter than the time column are not
//! jobs. Codes come back in row order and are not deduplicated here.

use crate::job::{cell, input_col, JobRecord};
use chrono::{DateTime, Duration, Local};

fn candidate_rows<'a>(
    rows: &'a [Vec<String>],
    channel: &'a str,
) -> impl Iterator<Item = JobRecord> + 'a {
    rows.iter()
        .skip(1)
        .filter(|row| row.len() > input_col::TIME)
        .map(|row| JobRecord::from_row(row))
        .filter(move |job| job.channel_code == channel && job.is_ready() && !job.code.is_empty())
}

/// Codes scheduled later today for `channel`.
///
/// Jobs whose instant has already passed are missed, not retried.
pub fn due_today(rows: &[Vec<String>], channel: &str, now: DateTime<Local>) -> Vec<String> {
    let now = now.naive_local();
    candidate_rows(rows, channel)
        .filter(|job| match job.scheduled_at() {
            Some(at) => at.date() == now.date() && at > now,
            None => false,
        })
        .map(|job| job.code)
        .collect()
}

/// Codes scheduled for tomorrow, for pre-staging only.
pub fn due_tomorrow(rows: &[Vec<String>], channel: &str, now: DateTime<Local>) -> Vec<String> {
    let tomorrow = now.date_naive() + Duration::days(1);
    candidate_rows(rows, channel)
        .filter(|job| job.date() == Some(tomorrow))
        .map(|job| job.code)
        .collect()
}

/// First data row whose code matches.
pub fn find_row_by_code<'a>(rows: &'a [Vec<String>], code: &str) -> Option<&'a Vec<String>> {
    rows.iter()
        .skip(1)
        .find(|row| !row.is_empty() && cell(row, input_col::CODE) == code)
}

/// Codes whose status column reads posted, in any case.
pub fn posted_codes(rows: &[Vec<String>]) -> Vec<String> {
    rows.iter()
        .skip(1)
        .map(|row| JobRecord::from_row(row))
        .filter(|job| !job.code.is_empty() && job.is_posted())
        .map(|job| job.code)
        .collect()
}
