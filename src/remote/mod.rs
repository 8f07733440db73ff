pub mod http;
pub mod rds;
pub mod traits;

pub use rds::{Dialect, RdsLogSource};
pub use traits::{LogSource, LogStream, RemoteError, SourceReadiness};
