use crate::remote::{LogSource, RemoteError};
use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use std::fmt;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("error getting db log files: {0}")]
    RemoteList(#[source] RemoteError),

    #[error(
        "no log file with prefix '{prefix}' found after {attempts} attempts, number of log files: {total}"
    )]
    NoMatchingFiles {
        prefix: String,
        attempts: u32,
        total: usize,
    },
}

/// One entry of the instance's log file listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFile {
    pub name: String,
    pub size_bytes: i64,
    /// Milliseconds since the Unix epoch.
    pub last_written: i64,
}

impl LogFile {
    pub fn new(name: impl Into<String>, size_bytes: i64, last_written: i64) -> Self {
        Self {
            name: name.into(),
            size_bytes,
            last_written,
        }
    }

    /// Rotated files are closed and carry a numeric suffix, e.g. `audit/server_audit.log.3`.
    /// The active file (no suffix) is still being appended to.
    pub fn is_rotated(&self) -> bool {
        static ROTATED: OnceLock<Regex> = OnceLock::new();
        ROTATED
            .get_or_init(|| Regex::new(r"\.log\.\d+$").expect("static regex"))
            .is_match(&self.name)
    }

    pub fn last_written_time(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.last_written).single()
    }
}

impl fmt::Display for LogFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let date = self
            .last_written_time()
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| self.last_written.to_string());
        write!(f, "{} (date: {}, size: {})", self.name, date, self.size_bytes)
    }
}

/// Picks the oldest rotated file written strictly after `watermark`.
/// Ties on `last_written` are broken by name.
pub fn select_next(candidates: &[LogFile], watermark: i64) -> Option<LogFile> {
    candidates
        .iter()
        .filter(|f| f.last_written > watermark && f.is_rotated())
        .min_by(|a, b| {
            a.last_written
                .cmp(&b.last_written)
                .then_with(|| a.name.cmp(&b.name))
        })
        .cloned()
}

/// Lists the audit log family of an instance.
pub struct LogCatalog {
    source: Arc<dyn LogSource>,
    file_prefix: String,
    listing_retries: u32,
}

impl LogCatalog {
    pub fn new(source: Arc<dyn LogSource>, file_prefix: impl Into<String>, listing_retries: u32) -> Self {
        Self {
            source,
            file_prefix: file_prefix.into(),
            listing_retries,
        }
    }

    /// Lists the files matching the configured prefix.
    ///
    /// The listing API occasionally returns an empty result. An empty filtered listing is retried
    /// up to `listing_retries` more times before it is reported as [`CatalogError::NoMatchingFiles`].
    /// Remote errors are returned immediately.
    pub async fn list_candidates(&self, source_id: &str) -> Result<Vec<LogFile>, CatalogError> {
        let mut retries_remaining = self.listing_retries;

        loop {
            let files = self
                .source
                .list_log_files(source_id)
                .await
                .map_err(CatalogError::RemoteList)?;
            let total = files.len();

            let matching: Vec<LogFile> = files
                .into_iter()
                .filter(|f| f.name.starts_with(&self.file_prefix))
                .collect();

            if !matching.is_empty() {
                return Ok(matching);
            }

            if retries_remaining == 0 {
                return Err(CatalogError::NoMatchingFiles {
                    prefix: self.file_prefix.clone(),
                    attempts: self.listing_retries + 1,
                    total,
                });
            }
            retries_remaining -= 1;

            debug!(
                instance = %source_id,
                prefix = %self.file_prefix,
                total = total,
                retries = retries_remaining,
                "No matching log files listed, retrying"
            );
        }
    }

    /// Lists and selects in one step. `None` means nothing newer than `watermark` is rotated yet.
    pub async fn next_newer_than(
        &self,
        source_id: &str,
        watermark: i64,
    ) -> Result<Option<LogFile>, CatalogError> {
        let candidates = self.list_candidates(source_id).await?;
        Ok(select_next(&candidates, watermark))
    }
}
