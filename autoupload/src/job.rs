//! Queue row layout and the typed job record parsed from it.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

pub const INPUT_SHEET: &str = "INPUT";
pub const SOURCE_SHEET: &str = "NGUON";

/// Status sentinel marking a row as approved for scheduling.
pub const STATUS_READY: &str = "EDIT XONG";
/// Value written back once a job has been scheduled.
pub const STATUS_POSTED: &str = "ĐÃ ĐĂNG";

/// Zero-based column indices of the INPUT sheet.
pub mod input_col {
    pub const CODE: usize = 0;
    pub const CHANNEL: usize = 34;
    pub const STATUS: usize = 47;
    pub const TITLE: usize = 53;
    pub const DESCRIPTION: usize = 54;
    pub const LINKS: [usize; 4] = [55, 56, 57, 58];
    pub const DATE: usize = 60;
    pub const TIME: usize = 61;
}

/// Zero-based column indices of the NGUON sheet.
pub mod source_col {
    pub const CODE: usize = 6;
    pub const STATUS: usize = 12;
}

/// Trimmed cell text, empty when the row is too short.
pub fn cell(row: &[String], idx: usize) -> &str {
    row.get(idx).map(|s| s.trim()).unwrap_or("")
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    ["%d/%m/%Y", "%Y-%m-%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    ["%H:%M:%S", "%H:%M"]
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(raw, fmt).ok())
}

/// One INPUT row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub code: String,
    pub channel_code: String,
    pub status: String,
    pub title: String,
    pub description: String,
    /// Non-empty links in column order.
    pub links: Vec<String>,
    /// Raw cell text, pasted into the schedule form as-is.
    pub scheduled_date: String,
    pub scheduled_time: String,
}

impl JobRecord {
    pub fn from_row(row: &[String]) -> Self {
        Self {
            code: cell(row, input_col::CODE).to_string(),
            channel_code: cell(row, input_col::CHANNEL).to_string(),
            status: cell(row, input_col::STATUS).to_string(),
            title: cell(row, input_col::TITLE).to_string(),
            description: cell(row, input_col::DESCRIPTION).to_string(),
            links: input_col::LINKS
                .iter()
                .map(|&idx| cell(row, idx))
                .filter(|link| !link.is_empty())
                .map(str::to_string)
                .collect(),
            scheduled_date: cell(row, input_col::DATE).to_string(),
            scheduled_time: cell(row, input_col::TIME).to_string(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == STATUS_READY
    }

    pub fn is_posted(&self) -> bool {
        self.status.to_uppercase() == STATUS_POSTED
    }

    pub fn date(&self) -> Option<NaiveDate> {
        parse_date(&self.scheduled_date)
    }

    /// The combined publish instant, when both cells parse.
    pub fn scheduled_at(&self) -> Option<NaiveDateTime> {
        Some(self.date()?.and_time(parse_time(&self.scheduled_time)?))
    }
}
