pub mod checkpoint;
pub mod dynamodb;
pub mod memory;
pub mod s3;
pub mod traits;

pub use checkpoint::{Checkpoint, CheckpointManager};
pub use traits::{CheckpointStore, OutputSink, StorageError};
