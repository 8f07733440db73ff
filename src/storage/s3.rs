use super::traits::{OutputSink, StorageError};
use crate::parser::LogRecord;
use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::info;

/// Object key of a record:
/// `{prefix}/year=YYYY/month=MM/day=DD/hour=HH/{source_file_timestamp}.log`.
///
/// Downstream readers depend on this exact layout. The key has no per-record component, so a
/// file that returns to an hour it already left produces a second record with the same key, and
/// that write replaces the first.
pub fn object_key(prefix: &str, record: &LogRecord) -> String {
    format!(
        "{}/{}/{}.log",
        prefix,
        record.bucket.partition_path(),
        record.source_file_timestamp
    )
}

pub struct S3OutputSink {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3OutputSink {
    pub fn new(client: Client, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }
}

#[async_trait]
impl OutputSink for S3OutputSink {
    async fn write(&self, record: &LogRecord) -> Result<(), StorageError> {
        let key = object_key(&self.prefix, record);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(record.raw_lines.clone()))
            .send()
            .await
            .map_err(|e| {
                StorageError::S3(format!(
                    "failed to upload s3://{}/{}: {}",
                    self.bucket,
                    key,
                    DisplayErrorContext(&e)
                ))
            })?;

        info!(key = %key, "File uploaded to S3");
        Ok(())
    }
}
