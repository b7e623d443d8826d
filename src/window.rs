use crate::error::ConfigError;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::fmt;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// The reporting period. Both bounds are exclusive: an instant exactly on
/// `start` or `end` is outside the window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    /// Builds a window from two `YYYY-MM-DD` dates, each taken as midnight UTC.
    pub fn parse(start: &str, end: &str) -> Result<Self, ConfigError> {
        let start_at = parse_date(start)?;
        let end_at = parse_date(end)?;
        Self::new(start_at, end_at).ok_or_else(|| ConfigError::WindowTooShort {
            start: start.to_string(),
            end: end.to_string(),
        })
    }

    /// Returns `None` unless `end - start` is at least one day.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (end - start >= Duration::days(1)).then_some(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at > self.start && at < self.end
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}..{}",
            self.start.format(DATE_FORMAT),
            self.end.format(DATE_FORMAT)
        )
    }
}

fn parse_date(value: &str) -> Result<DateTime<Utc>, ConfigError> {
    // chrono accepts unpadded fields, so enforce the exact shape first.
    let well_formed = value.len() == 10
        && value.char_indices().all(|(i, c)| match i {
            4 | 7 => c == '-',
            _ => c.is_ascii_digit(),
        });
    if !well_formed {
        return Err(ConfigError::InvalidFormat {
            value: value.to_string(),
        });
    }

    let date =
        NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|source| ConfigError::InvalidDate {
            value: value.to_string(),
            source,
        })?;

    Ok(date.and_time(chrono::NaiveTime::MIN).and_utc())
}
