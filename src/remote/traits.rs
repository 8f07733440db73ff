use crate::catalog::LogFile;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

/// Body of a log file download, yielded chunk by chunk.
pub type LogStream = BoxStream<'static, Result<Bytes, RemoteError>>;

#[async_trait]
pub trait SourceReadiness: Send + Sync {
    /// Confirms the instance exists and is of a supported kind.
    async fn validate_and_prepare(&self, source_id: &str) -> Result<(), RemoteError>;
}

#[async_trait]
pub trait LogSource: Send + Sync {
    /// All log files of the instance, pages already flattened.
    async fn list_log_files(&self, source_id: &str) -> Result<Vec<LogFile>, RemoteError>;

    /// Opens the complete body of one log file. Non-success responses are errors.
    async fn download(&self, source_id: &str, file_name: &str) -> Result<LogStream, RemoteError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("AWS API error: {0}")]
    Api(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("could not download log file {file}, status code is {status}")]
    Status { file: String, status: u16 },

    #[error("AWS client setup failed: {0}")]
    Setup(String),

    #[error("could not sign request: {0}")]
    Signing(String),

    #[error("could not find db instance: {0}")]
    InstanceNotFound(String),

    #[error("unsupported engine {0}")]
    UnsupportedEngine(String),

    #[error("error reading response body: {0}")]
    Read(String),
}
