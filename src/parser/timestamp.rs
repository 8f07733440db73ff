use chrono::{DateTime, Datelike, NaiveDateTime, TimeZone, Timelike, Utc};
use std::fmt;
use thiserror::Error;

/// Layout of the leading field written by the MariaDB audit plugin.
const AUDIT_PLUGIN_FORMAT: &str = "%Y%m%d %H:%M:%S";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimestampError {
    #[error("expected at least 2 comma-separated fields")]
    MissingFields,

    #[error("timestamp field is not valid UTF-8")]
    Encoding,

    #[error("unrecognized timestamp '{0}'")]
    Unrecognized(String),

    #[error("timestamp {0} is out of range")]
    OutOfRange(i64),
}

/// Hour-granularity grouping key. Compared by value only, no calendar arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HourBucket {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
}

impl HourBucket {
    pub fn new(year: i32, month: u32, day: u32, hour: u32) -> Self {
        Self {
            year,
            month,
            day,
            hour,
        }
    }

    pub fn from_datetime(dt: &DateTime<Utc>) -> Self {
        Self::new(dt.year(), dt.month(), dt.day(), dt.hour())
    }

    /// Hive-style partition path, e.g. `year=2020/month=07/day=14/hour=07`.
    pub fn partition_path(&self) -> String {
        format!(
            "year={:04}/month={:02}/day={:02}/hour={:02}",
            self.year, self.month, self.day, self.hour
        )
    }
}

impl fmt::Display for HourBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}",
            self.year, self.month, self.day, self.hour
        )
    }
}

/// Extracts the hour bucket of an audit log line from its first comma-separated field.
///
/// The field is either microseconds since the Unix epoch (Aurora/RDS MySQL audit log) or the
/// `YYYYMMDD HH:MM:SS` form of the MariaDB audit plugin. Both are interpreted as UTC.
pub fn extract_bucket(line: &[u8]) -> Result<HourBucket, TimestampError> {
    let mut fields = line.splitn(2, |b| *b == b',');
    let first = fields.next().unwrap_or_default();
    if fields.next().is_none() {
        return Err(TimestampError::MissingFields);
    }

    let value = std::str::from_utf8(first)
        .map_err(|_| TimestampError::Encoding)?
        .trim();

    let datetime = if let Ok(micros) = value.parse::<i64>() {
        parse_epoch_micros(micros)?
    } else {
        NaiveDateTime::parse_from_str(value, AUDIT_PLUGIN_FORMAT)
            .map(|ndt| Utc.from_utc_datetime(&ndt))
            .map_err(|_| TimestampError::Unrecognized(value.to_string()))?
    };

    Ok(HourBucket::from_datetime(&datetime))
}

fn parse_epoch_micros(micros: i64) -> Result<DateTime<Utc>, TimestampError> {
    let seconds = micros.div_euclid(1_000_000);
    Utc.timestamp_opt(seconds, 0)
        .single()
        .ok_or(TimestampError::OutOfRange(micros))
}
