use crate::catalog::{CatalogError, LogCatalog, LogFile};
use crate::remote::{LogSource, LogStream, RemoteError};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("could not get current log file: {0}")]
    Catalog(#[from] CatalogError),

    #[error("could not get log data for {file}: {source}")]
    Download {
        file: String,
        #[source]
        source: RemoteError,
    },

    #[error("file {file} was rotated while getting the logs, gave up after {attempts} attempts")]
    RotationRaceExhausted { file: String, attempts: u32 },

    #[error("could not read response from log data for {file}: {source}")]
    Read {
        file: String,
        #[source]
        source: RemoteError,
    },
}

/// Complete body of one rotated log file.
#[derive(Debug, Clone)]
pub struct DownloadedLog {
    pub file: LogFile,
    pub body: Bytes,
}

impl DownloadedLog {
    /// Watermark to advance to once this file is persisted.
    pub fn watermark(&self) -> i64 {
        self.file.last_written
    }
}

enum Attempt {
    Complete(DownloadedLog),
    Rotated { file: String, now: Option<String> },
    ReadFailed { file: String, source: RemoteError },
}

/// Downloads the next log file after a watermark, retrying when the file is rotated away while
/// the download is in flight.
///
/// Rotation races and body read failures draw from the same retry budget. Read failures wait
/// `read_retry_backoff` before the next attempt; rotation races retry immediately.
pub struct RotationSafeDownloader {
    catalog: LogCatalog,
    source: Arc<dyn LogSource>,
    max_retries: u32,
    read_retry_backoff: Duration,
}

impl RotationSafeDownloader {
    pub fn new(
        catalog: LogCatalog,
        source: Arc<dyn LogSource>,
        max_retries: u32,
        read_retry_backoff: Duration,
    ) -> Self {
        Self {
            catalog,
            source,
            max_retries,
            read_retry_backoff,
        }
    }

    /// Returns `None` when no rotated file newer than `watermark` exists yet.
    pub async fn fetch(
        &self,
        source_id: &str,
        watermark: i64,
    ) -> Result<Option<DownloadedLog>, DownloadError> {
        let mut retries_remaining = self.max_retries;

        loop {
            let Some(candidate) = self.catalog.next_newer_than(source_id, watermark).await? else {
                debug!(instance = %source_id, logfile_timestamp = watermark, "No newer log file");
                return Ok(None);
            };

            match self.attempt(source_id, watermark, candidate).await? {
                Attempt::Complete(log) => return Ok(Some(log)),
                Attempt::Rotated { file, now } => {
                    if retries_remaining == 0 {
                        return Err(DownloadError::RotationRaceExhausted {
                            file,
                            attempts: self.max_retries + 1,
                        });
                    }
                    retries_remaining -= 1;
                    warn!(
                        instance = %source_id,
                        logfile_name = %file,
                        current_name = now.as_deref().unwrap_or("<none>"),
                        retries = retries_remaining,
                        "Log file was rotated during download, retrying"
                    );
                }
                Attempt::ReadFailed { file, source } => {
                    if retries_remaining == 0 {
                        return Err(DownloadError::Read { file, source });
                    }
                    retries_remaining -= 1;
                    warn!(
                        instance = %source_id,
                        logfile_timestamp = watermark,
                        retries = retries_remaining,
                        error = %source,
                        "Retrying because of error reading response body"
                    );
                    tokio::time::sleep(self.read_retry_backoff).await;
                }
            }
        }
    }

    async fn attempt(
        &self,
        source_id: &str,
        watermark: i64,
        candidate: LogFile,
    ) -> Result<Attempt, DownloadError> {
        info!(
            instance = %source_id,
            logfile_timestamp = watermark,
            logfile_name = %candidate.name,
            "Getting logs"
        );

        let stream = self
            .source
            .download(source_id, &candidate.name)
            .await
            .map_err(|source| DownloadError::Download {
                file: candidate.name.clone(),
                source,
            })?;

        // The listing is re-read before draining: if the selection moved, the stream may
        // belong to a file that has since been renamed.
        let current = self.catalog.next_newer_than(source_id, watermark).await?;
        if current.as_ref().map(|f| f.name.as_str()) != Some(candidate.name.as_str()) {
            return Ok(Attempt::Rotated {
                file: candidate.name,
                now: current.map(|f| f.name),
            });
        }

        match drain(stream).await {
            Ok(body) => {
                debug!(
                    logfile_name = %candidate.name,
                    bytes = body.len(),
                    "Log file downloaded"
                );
                Ok(Attempt::Complete(DownloadedLog {
                    file: candidate,
                    body,
                }))
            }
            Err(source) => Ok(Attempt::ReadFailed {
                file: candidate.name,
                source,
            }),
        }
    }
}

async fn drain(mut stream: LogStream) -> Result<Bytes, RemoteError> {
    let mut body = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        body.extend_from_slice(&chunk?);
    }
    Ok(body.freeze())
}
