use super::timestamp::{extract_bucket, HourBucket, TimestampError};
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("malformed log line {line_number}: {source}")]
pub struct MalformedLineError {
    pub line_number: usize,
    #[source]
    pub source: TimestampError,
}

/// A contiguous run of same-hour lines from one downloaded log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub bucket: HourBucket,
    /// Newline-terminated lines, concatenated in file order.
    pub raw_lines: Bytes,
    /// Watermark of the log file this record was cut from.
    pub source_file_timestamp: i64,
}

#[cfg(test)]
impl LogRecord {
    fn line_count(&self) -> usize {
        self.raw_lines.iter().filter(|b| **b == b'\n').count()
    }
}

/// Splits a downloaded log file into hour records.
///
/// Blank lines are skipped. A new record starts whenever the hour bucket changes; lines are not
/// re-sorted. Any line without a parseable leading timestamp field fails the whole file.
pub fn group_entries(
    data: &[u8],
    source_file_timestamp: i64,
) -> Result<Vec<LogRecord>, MalformedLineError> {
    let state = data
        .split(|b| *b == b'\n')
        .enumerate()
        .map(|(i, line)| (i + 1, line.strip_suffix(b"\r").unwrap_or(line)))
        .filter(|(_, line)| !line.is_empty())
        .try_fold(
            GroupState::new(source_file_timestamp),
            |state, (line_number, line)| {
                let bucket = extract_bucket(line)
                    .map_err(|source| MalformedLineError { line_number, source })?;
                Ok::<_, MalformedLineError>(state.push(bucket, line))
            },
        )?;

    Ok(state.finish())
}

struct GroupState {
    source_file_timestamp: i64,
    current: Option<(HourBucket, Vec<u8>)>,
    emitted: Vec<LogRecord>,
}

impl GroupState {
    fn new(source_file_timestamp: i64) -> Self {
        Self {
            source_file_timestamp,
            current: None,
            emitted: Vec::new(),
        }
    }

    fn push(mut self, bucket: HourBucket, line: &[u8]) -> Self {
        if let Some((current_bucket, buffer)) = self.current.as_mut() {
            if *current_bucket == bucket {
                buffer.extend_from_slice(line);
                buffer.push(b'\n');
                return self;
            }
        }

        self.flush();
        let mut buffer = Vec::with_capacity(line.len() + 1);
        buffer.extend_from_slice(line);
        buffer.push(b'\n');
        self.current = Some((bucket, buffer));
        self
    }

    fn flush(&mut self) {
        if let Some((bucket, buffer)) = self.current.take() {
            self.emitted.push(LogRecord {
                bucket,
                raw_lines: Bytes::from(buffer),
                source_file_timestamp: self.source_file_timestamp,
            });
        }
    }

    fn finish(mut self) -> Vec<LogRecord> {
        self.flush();
        self.emitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGFILE_TS: i64 = 1595332052000;

    fn line_at_hour(hour: u32, query: &str) -> String {
        // 2020-07-14 00:00:00 UTC
        let micros = 1594684800_i64 * 1_000_000 + hour as i64 * 3_600_000_000 + 5_000_000;
        format!(
            "{},ip-172-27-1-97,admin,10.120.182.212,33303,161152,QUERY,rdslogstest,'{}',0",
            micros, query
        )
    }

    #[test]
    fn test_single_line() {
        let line = line_at_hour(7, "SELECT 1");
        let records = group_entries(line.as_bytes(), LOGFILE_TS).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].bucket, HourBucket::new(2020, 7, 14, 7));
        assert_eq!(records[0].raw_lines, Bytes::from(format!("{}\n", line)));
        assert_eq!(records[0].source_file_timestamp, LOGFILE_TS);
    }

    #[test]
    fn test_splits_on_bucket_change() {
        let lines: Vec<String> = [7, 7, 8, 8, 9]
            .iter()
            .enumerate()
            .map(|(i, h)| line_at_hour(*h, &format!("SELECT {}", i)))
            .collect();
        let data = lines.join("\n");

        let records = group_entries(data.as_bytes(), LOGFILE_TS).unwrap();

        let hours: Vec<u32> = records.iter().map(|r| r.bucket.hour).collect();
        assert_eq!(hours, vec![7, 8, 9]);
        assert_eq!(
            records[0].raw_lines,
            Bytes::from(format!("{}\n{}\n", lines[0], lines[1]))
        );
        assert_eq!(records[1].line_count(), 2);
        assert_eq!(records[2].raw_lines, Bytes::from(format!("{}\n", lines[4])));
        assert!(records.iter().all(|r| r.source_file_timestamp == LOGFILE_TS));
    }

    #[test]
    fn test_returning_hour_opens_new_record() {
        let data = [
            line_at_hour(7, "a"),
            line_at_hour(8, "b"),
            line_at_hour(7, "c"),
        ]
        .join("\n");

        let records = group_entries(data.as_bytes(), LOGFILE_TS).unwrap();
        let hours: Vec<u32> = records.iter().map(|r| r.bucket.hour).collect();
        assert_eq!(hours, vec![7, 8, 7]);
    }

    #[test]
    fn test_blank_lines_neither_open_nor_close_records() {
        let data = format!(
            "\n{}\n\n\r\n{}\n\n",
            line_at_hour(10, "a"),
            line_at_hour(10, "b")
        );

        let records = group_entries(data.as_bytes(), LOGFILE_TS).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].line_count(), 2);
        assert_eq!(
            records[0].raw_lines,
            Bytes::from(format!("{}\n{}\n", line_at_hour(10, "a"), line_at_hour(10, "b")))
        );
    }

    #[test]
    fn test_crlf_line_endings_normalized() {
        let data = format!("{}\r\n{}\r\n", line_at_hour(3, "a"), line_at_hour(3, "b"));
        let records = group_entries(data.as_bytes(), LOGFILE_TS).unwrap();

        assert_eq!(records.len(), 1);
        assert!(!records[0].raw_lines.contains(&b'\r'));
    }

    #[test]
    fn test_empty_input_yields_no_records() {
        assert!(group_entries(b"", LOGFILE_TS).unwrap().is_empty());
        assert!(group_entries(b"\n\n\n", LOGFILE_TS).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_line_fails_whole_parse() {
        let data = format!(
            "{}\n{}\nnot-a-csv-line\n{}",
            line_at_hour(7, "a"),
            line_at_hour(8, "b"),
            line_at_hour(9, "c")
        );

        let err = group_entries(data.as_bytes(), LOGFILE_TS).unwrap_err();
        assert_eq!(err.line_number, 3);
        assert_eq!(err.source, TimestampError::MissingFields);
    }

    #[test]
    fn test_regrouping_is_deterministic() {
        let data = [
            line_at_hour(1, "a"),
            line_at_hour(1, "b"),
            line_at_hour(2, "c"),
        ]
        .join("\n");

        let first = group_entries(data.as_bytes(), LOGFILE_TS).unwrap();
        let second = group_entries(data.as_bytes(), LOGFILE_TS).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_audit_plugin_lines() {
        let data = "20200714 10:30:02,ip-172-27-1-97,admin,10.120.182.212,33303,0,CONNECT,rdslogstest,,0
20200714 10:30:03,ip-172-27-1-97,rdsadmin,localhost,26,161155,QUERY,mysql,'SELECT 1',0
20200714 11:30:04,ip-172-27-1-97,admin,10.120.182.212,33304,0,CONNECT,rdslogstest,,0
20200714 12:30:03,ip-172-27-1-97,rdsadmin,localhost,26,161171,QUERY,mysql,'SELECT 1',0
";
        let records = group_entries(data.as_bytes(), LOGFILE_TS).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].bucket, HourBucket::new(2020, 7, 14, 10));
        assert_eq!(records[0].line_count(), 2);
        assert_eq!(
            records[2].raw_lines,
            Bytes::from_static(
                b"20200714 12:30:03,ip-172-27-1-97,rdsadmin,localhost,26,161171,QUERY,mysql,'SELECT 1',0\n"
            )
        );
    }
}
