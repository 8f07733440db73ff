use super::traits::{CheckpointStore, StorageError};
use std::sync::Arc;

pub type Result<T> = std::result::Result<T, StorageError>;

/// Last fully persisted log file of one (source, category) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub id: String,
    /// `last_written` of the last log file whose records were all persisted.
    pub log_file_timestamp: i64,
}

impl Checkpoint {
    pub fn new(id: impl Into<String>, log_file_timestamp: i64) -> Self {
        Self {
            id: id.into(),
            log_file_timestamp,
        }
    }

    pub fn id_for(source_id: &str, category: &str) -> String {
        format!("{}:{}", source_id, category)
    }
}

/// Loads and advances the checkpoint of a single source.
pub struct CheckpointManager {
    store: Arc<dyn CheckpointStore>,
    id: String,
}

impl CheckpointManager {
    pub fn new(store: Arc<dyn CheckpointStore>, source_id: &str, category: &str) -> Self {
        Self {
            store,
            id: Checkpoint::id_for(source_id, category),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the stored watermark, or 0 when this source has never been checkpointed.
    pub async fn load_watermark(&self) -> Result<i64> {
        tracing::info!(checkpoint_id = %self.id, "Loading checkpoint");

        match self.store.get(&self.id).await? {
            Some(checkpoint) => {
                tracing::info!(
                    checkpoint_id = %self.id,
                    logfile_timestamp = checkpoint.log_file_timestamp,
                    "Loaded checkpoint"
                );
                Ok(checkpoint.log_file_timestamp)
            }
            None => {
                tracing::info!(checkpoint_id = %self.id, "No checkpoint found, starting from the beginning");
                Ok(0)
            }
        }
    }

    pub async fn save(&self, log_file_timestamp: i64) -> Result<()> {
        tracing::info!(logfile_timestamp = log_file_timestamp, "StoreCheckpoint");
        self.store
            .put(&Checkpoint::new(self.id.clone(), log_file_timestamp))
            .await
    }
}
