//! In-process stores, used by `run --dry-run` and in tests.

use super::checkpoint::Checkpoint;
use super::s3::object_key;
use super::traits::{CheckpointStore, OutputSink, StorageError};
use crate::parser::LogRecord;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    checkpoints: Mutex<HashMap<String, i64>>,
}

impl MemoryCheckpointStore {
    pub fn with_checkpoint(id: impl Into<String>, log_file_timestamp: i64) -> Self {
        let store = Self::default();
        store
            .checkpoints
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.into(), log_file_timestamp);
        store
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn get(&self, id: &str) -> Result<Option<Checkpoint>, StorageError> {
        let checkpoints = self.checkpoints.lock().unwrap_or_else(|e| e.into_inner());
        Ok(checkpoints
            .get(id)
            .map(|ts| Checkpoint::new(id.to_string(), *ts)))
    }

    async fn put(&self, checkpoint: &Checkpoint) -> Result<(), StorageError> {
        self.checkpoints
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(checkpoint.id.clone(), checkpoint.log_file_timestamp);
        Ok(())
    }
}

/// Keeps written records keyed exactly as the S3 sink would key them.
#[derive(Debug)]
pub struct MemoryOutputSink {
    prefix: String,
    objects: Mutex<BTreeMap<String, Bytes>>,
    writes: Mutex<usize>,
}

impl MemoryOutputSink {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            objects: Mutex::new(BTreeMap::new()),
            writes: Mutex::new(0),
        }
    }

    /// Snapshot of stored objects, ordered by key.
    pub fn objects(&self) -> BTreeMap<String, Bytes> {
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of `write` calls, counting overwrites.
    pub fn write_count(&self) -> usize {
        *self.writes.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl OutputSink for MemoryOutputSink {
    async fn write(&self, record: &LogRecord) -> Result<(), StorageError> {
        let key = object_key(&self.prefix, record);
        tracing::debug!(key = %key, bytes = record.raw_lines.len(), "Record kept in memory");
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, record.raw_lines.clone());
        *self.writes.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(())
    }
}
