use crate::download::{DownloadError, RotationSafeDownloader};
use crate::parser::{group_entries, HourBucket, MalformedLineError};
use crate::remote::{RemoteError, SourceReadiness};
use crate::storage::{CheckpointManager, OutputSink, StorageError};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("source {source_id} is not available: {source}")]
    SourceUnavailable {
        source_id: String,
        #[source]
        source: RemoteError,
    },

    #[error("could not read checkpoint: {0}")]
    CheckpointRead(#[source] StorageError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error("could not parse log file {file}: {source}")]
    MalformedLine {
        file: String,
        #[source]
        source: MalformedLineError,
    },

    #[error("could not persist hour {bucket} of log file {file}: {source}")]
    Persist {
        file: String,
        bucket: HourBucket,
        #[source]
        source: StorageError,
    },

    #[error("could not store checkpoint {timestamp}: {source}")]
    CheckpointWrite {
        timestamp: i64,
        #[source]
        source: StorageError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    Idle,
    Validating,
    Ready,
    Harvesting,
    Draining,
    Done,
    Failed,
}

impl fmt::Display for ProcessorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessorState::Idle => "idle",
            ProcessorState::Validating => "validating",
            ProcessorState::Ready => "ready",
            ProcessorState::Harvesting => "harvesting",
            ProcessorState::Draining => "draining",
            ProcessorState::Done => "done",
            ProcessorState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub records_processed: usize,
    pub files_processed: usize,
    /// Watermark the run finished at; equal to the loaded checkpoint when nothing was new.
    pub watermark: i64,
}

/// Drives one harvesting run for a single source: validate, load the checkpoint, then download,
/// group and persist files until no newer rotated file remains.
///
/// The checkpoint only advances after every record of a file has been written.
pub struct Processor {
    source_id: String,
    readiness: Arc<dyn SourceReadiness>,
    downloader: RotationSafeDownloader,
    checkpoints: CheckpointManager,
    sink: Arc<dyn OutputSink>,
    state: ProcessorState,
}

impl Processor {
    pub fn new(
        source_id: impl Into<String>,
        readiness: Arc<dyn SourceReadiness>,
        downloader: RotationSafeDownloader,
        checkpoints: CheckpointManager,
        sink: Arc<dyn OutputSink>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            readiness,
            downloader,
            checkpoints,
            sink,
            state: ProcessorState::Idle,
        }
    }

    pub fn state(&self) -> ProcessorState {
        self.state
    }

    pub async fn run(&mut self) -> Result<RunSummary, RunError> {
        let result = self.harvest().await;
        match &result {
            Ok(_) => self.transition(ProcessorState::Done),
            Err(_) => self.transition(ProcessorState::Failed),
        }
        result
    }

    async fn harvest(&mut self) -> Result<RunSummary, RunError> {
        self.transition(ProcessorState::Validating);
        self.readiness
            .validate_and_prepare(&self.source_id)
            .await
            .map_err(|source| RunError::SourceUnavailable {
                source_id: self.source_id.clone(),
                source,
            })?;

        self.transition(ProcessorState::Ready);
        let mut watermark = self
            .checkpoints
            .load_watermark()
            .await
            .map_err(RunError::CheckpointRead)?;

        let mut summary = RunSummary {
            records_processed: 0,
            files_processed: 0,
            watermark,
        };

        loop {
            self.transition(ProcessorState::Harvesting);
            let Some(log) = self.downloader.fetch(&self.source_id, watermark).await? else {
                break;
            };

            self.transition(ProcessorState::Draining);
            watermark = log.watermark();

            let records = group_entries(&log.body, watermark).map_err(|source| {
                RunError::MalformedLine {
                    file: log.file.name.clone(),
                    source,
                }
            })?;

            for record in &records {
                self.sink
                    .write(record)
                    .await
                    .map_err(|source| RunError::Persist {
                        file: log.file.name.clone(),
                        bucket: record.bucket,
                        source,
                    })?;
            }

            self.checkpoints
                .save(watermark)
                .await
                .map_err(|source| RunError::CheckpointWrite {
                    timestamp: watermark,
                    source,
                })?;

            debug!(file = %log.file, records = records.len(), "Log file processed");
            summary.records_processed += records.len();
            summary.files_processed += 1;
            summary.watermark = watermark;
        }

        info!(
            instance = %self.source_id,
            processed_records = summary.records_processed,
            processed_files = summary.files_processed,
            logfile_timestamp = summary.watermark,
            "Processing logs is finished"
        );

        Ok(summary)
    }

    fn transition(&mut self, next: ProcessorState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "Processor state change");
            self.state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{LogCatalog, LogFile};
    use crate::parser::LogRecord;
    use crate::remote::{LogSource, LogStream};
    use crate::storage::checkpoint::Checkpoint;
    use crate::storage::memory::{MemoryCheckpointStore, MemoryOutputSink};
    use crate::storage::CheckpointStore;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::StreamExt;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const INSTANCE: &str = "orders-db";
    const HOUR_7: &str = "1594710325000000,ip-10-0-0-1,app,1,2,QUERY,orders,'SELECT 1',0\n";
    const HOUR_8: &str = "1594713925000000,ip-10-0-0-1,app,1,3,QUERY,orders,'SELECT 2',0\n";

    struct StaticSource {
        files: Vec<LogFile>,
        bodies: HashMap<String, &'static str>,
        ready: bool,
        downloads: AtomicUsize,
    }

    impl StaticSource {
        fn new(files: Vec<(&str, i64, &'static str)>) -> Self {
            Self {
                files: files
                    .iter()
                    .map(|(name, ts, body)| LogFile::new(*name, body.len() as i64, *ts))
                    .collect(),
                bodies: files
                    .into_iter()
                    .map(|(name, _, body)| (name.to_string(), body))
                    .collect(),
                ready: true,
                downloads: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SourceReadiness for StaticSource {
        async fn validate_and_prepare(&self, source_id: &str) -> Result<(), RemoteError> {
            if self.ready {
                Ok(())
            } else {
                Err(RemoteError::InstanceNotFound(source_id.to_string()))
            }
        }
    }

    #[async_trait]
    impl LogSource for StaticSource {
        async fn list_log_files(&self, _source_id: &str) -> Result<Vec<LogFile>, RemoteError> {
            Ok(self.files.clone())
        }

        async fn download(&self, _source_id: &str, file_name: &str) -> Result<LogStream, RemoteError> {
            self.downloads.fetch_add(1, Ordering::SeqCst);
            let body = self.bodies.get(file_name).copied().unwrap_or_default();
            Ok(futures::stream::iter(vec![Ok(Bytes::from_static(body.as_bytes()))]).boxed())
        }
    }

    struct FailingSink {
        fail_on_write: usize,
        writes: AtomicUsize,
    }

    #[async_trait]
    impl OutputSink for FailingSink {
        async fn write(&self, _record: &LogRecord) -> Result<(), StorageError> {
            let n = self.writes.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= self.fail_on_write {
                Err(StorageError::S3("access denied".to_string()))
            } else {
                Ok(())
            }
        }
    }

    struct ReadOnlyStore;

    #[async_trait]
    impl CheckpointStore for ReadOnlyStore {
        async fn get(&self, _id: &str) -> Result<Option<Checkpoint>, StorageError> {
            Ok(None)
        }

        async fn put(&self, _checkpoint: &Checkpoint) -> Result<(), StorageError> {
            Err(StorageError::DynamoDb("throughput exceeded".to_string()))
        }
    }

    struct UnreadableStore;

    #[async_trait]
    impl CheckpointStore for UnreadableStore {
        async fn get(&self, _id: &str) -> Result<Option<Checkpoint>, StorageError> {
            Err(StorageError::DynamoDb("table not found".to_string()))
        }

        async fn put(&self, _checkpoint: &Checkpoint) -> Result<(), StorageError> {
            Ok(())
        }
    }

    fn processor(
        source: Arc<StaticSource>,
        store: Arc<dyn CheckpointStore>,
        sink: Arc<dyn OutputSink>,
    ) -> Processor {
        let catalog = LogCatalog::new(source.clone(), "audit/server_audit.log", 1);
        let downloader =
            RotationSafeDownloader::new(catalog, source.clone(), 2, Duration::from_millis(1));
        let checkpoints = CheckpointManager::new(store, INSTANCE, "audit");
        Processor::new(INSTANCE, source, downloader, checkpoints, sink)
    }

    #[tokio::test]
    async fn test_run_processes_files_in_order() {
        let source = Arc::new(StaticSource::new(vec![
            ("audit/server_audit.log", 300, ""),
            ("audit/server_audit.log.2", 100, HOUR_7),
            ("audit/server_audit.log.1", 200, HOUR_8),
        ]));
        let store = Arc::new(MemoryCheckpointStore::default());
        let sink = Arc::new(MemoryOutputSink::new("orders-db/audit-logs"));

        let mut processor = processor(source, store.clone(), sink.clone());
        let summary = processor.run().await.unwrap();

        assert_eq!(
            summary,
            RunSummary {
                records_processed: 2,
                files_processed: 2,
                watermark: 200
            }
        );
        assert_eq!(processor.state(), ProcessorState::Done);
        assert_eq!(
            sink.objects().keys().cloned().collect::<Vec<_>>(),
            vec![
                "orders-db/audit-logs/year=2020/month=07/day=14/hour=07/100.log".to_string(),
                "orders-db/audit-logs/year=2020/month=07/day=14/hour=08/200.log".to_string(),
            ]
        );
        assert_eq!(
            store.get("orders-db:audit").await.unwrap(),
            Some(Checkpoint::new("orders-db:audit", 200))
        );
    }

    #[tokio::test]
    async fn test_unavailable_source_changes_nothing() {
        let mut source = StaticSource::new(vec![("audit/server_audit.log.1", 100, HOUR_7)]);
        source.ready = false;
        let store = Arc::new(MemoryCheckpointStore::default());
        let sink = Arc::new(MemoryOutputSink::new("p"));

        let mut processor = processor(Arc::new(source), store.clone(), sink.clone());
        let err = processor.run().await.unwrap_err();

        assert!(matches!(err, RunError::SourceUnavailable { .. }));
        assert_eq!(processor.state(), ProcessorState::Failed);
        assert_eq!(sink.write_count(), 0);
        assert_eq!(store.get("orders-db:audit").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_persist_failure_keeps_checkpoint() {
        let source = Arc::new(StaticSource::new(vec![(
            "audit/server_audit.log.1",
            100,
            "1594710325000000,a,b\n1594713925000000,a,b\n",
        )]));
        let store = Arc::new(MemoryCheckpointStore::with_checkpoint("orders-db:audit", 50));
        let sink = Arc::new(FailingSink {
            fail_on_write: 2,
            writes: AtomicUsize::new(0),
        });

        let err = processor(source, store.clone(), sink.clone())
            .run()
            .await
            .unwrap_err();

        match err {
            RunError::Persist { file, bucket, .. } => {
                assert_eq!(file, "audit/server_audit.log.1");
                assert_eq!(bucket, HourBucket::new(2020, 7, 14, 8));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(sink.writes.load(Ordering::SeqCst), 2);
        assert_eq!(
            store.get("orders-db:audit").await.unwrap(),
            Some(Checkpoint::new("orders-db:audit", 50))
        );
    }

    #[tokio::test]
    async fn test_checkpoint_write_failure_after_outputs() {
        let source = Arc::new(StaticSource::new(vec![(
            "audit/server_audit.log.1",
            100,
            HOUR_7,
        )]));
        let sink = Arc::new(MemoryOutputSink::new("p"));

        let err = processor(source, Arc::new(ReadOnlyStore), sink.clone())
            .run()
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RunError::CheckpointWrite { timestamp: 100, .. }
        ));
        assert_eq!(sink.write_count(), 1);
    }

    #[tokio::test]
    async fn test_malformed_file_writes_nothing() {
        let source = Arc::new(StaticSource::new(vec![(
            "audit/server_audit.log.1",
            100,
            "1594710325000000,a,b\nnot-a-log-line\n",
        )]));
        let store = Arc::new(MemoryCheckpointStore::default());
        let sink = Arc::new(MemoryOutputSink::new("p"));

        let err = processor(source, store.clone(), sink.clone())
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, RunError::MalformedLine { .. }));
        assert_eq!(sink.write_count(), 0);
        assert_eq!(store.get("orders-db:audit").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_file_still_advances_checkpoint() {
        let source = Arc::new(StaticSource::new(vec![(
            "audit/server_audit.log.1",
            100,
            "",
        )]));
        let store = Arc::new(MemoryCheckpointStore::default());
        let sink = Arc::new(MemoryOutputSink::new("p"));

        let summary = processor(source, store.clone(), sink.clone())
            .run()
            .await
            .unwrap();

        assert_eq!(summary.records_processed, 0);
        assert_eq!(summary.files_processed, 1);
        assert_eq!(sink.write_count(), 0);
        assert_eq!(
            store.get("orders-db:audit").await.unwrap(),
            Some(Checkpoint::new("orders-db:audit", 100))
        );
    }

    #[tokio::test]
    async fn test_checkpoint_read_failure_stops_before_harvesting() {
        let source = Arc::new(StaticSource::new(vec![(
            "audit/server_audit.log.1",
            100,
            HOUR_7,
        )]));
        let sink = Arc::new(MemoryOutputSink::new("p"));

        let mut processor = processor(source.clone(), Arc::new(UnreadableStore), sink.clone());
        let err = processor.run().await.unwrap_err();

        assert!(matches!(
            err,
            RunError::CheckpointRead(StorageError::DynamoDb(_))
        ));
        assert_eq!(processor.state(), ProcessorState::Failed);
        assert_eq!(sink.write_count(), 0);
        assert_eq!(source.downloads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_repeated_hour_in_one_file_overwrites_earlier_record() {
        let source = Arc::new(StaticSource::new(vec![(
            "audit/server_audit.log.1",
            100,
            "1594710325000000,first,7\n1594713925000000,only,8\n1594710326000000,second,7\n",
        )]));
        let store = Arc::new(MemoryCheckpointStore::default());
        let sink = Arc::new(MemoryOutputSink::new("p"));

        let summary = processor(source, store, sink.clone()).run().await.unwrap();

        assert_eq!(summary.records_processed, 3);
        assert_eq!(sink.write_count(), 3);
        let objects = sink.objects();
        assert_eq!(objects.len(), 2);
        assert_eq!(
            objects.get("p/year=2020/month=07/day=14/hour=07/100.log"),
            Some(&Bytes::from_static(b"1594710326000000,second,7\n"))
        );
    }
}
