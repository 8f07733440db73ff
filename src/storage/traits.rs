use crate::parser::LogRecord;
use crate::storage::checkpoint::Checkpoint;
use async_trait::async_trait;

/// Durable home of the per-source watermark. Last write wins.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Checkpoint>, StorageError>;
    async fn put(&self, checkpoint: &Checkpoint) -> Result<(), StorageError>;
}

/// Destination of hour records. Writing the same record twice must be harmless.
#[async_trait]
pub trait OutputSink: Send + Sync {
    async fn write(&self, record: &LogRecord) -> Result<(), StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("DynamoDB error: {0}")]
    DynamoDb(String),

    #[error("S3 error: {0}")]
    S3(String),

    #[error("malformed checkpoint item: {0}")]
    MalformedItem(String),
}
