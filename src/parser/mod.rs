pub mod grouper;
pub mod timestamp;

pub use grouper::{group_entries, LogRecord, MalformedLineError};
pub use timestamp::{extract_bucket, HourBucket, TimestampError};
