use super::http::SignedHttpClient;
use super::traits::{LogSource, LogStream, RemoteError, SourceReadiness};
use crate::catalog::LogFile;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_rds::error::DisplayErrorContext;
use aws_sdk_rds::Client;
use futures::StreamExt;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};

/// SQL dialect of the validated instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    Postgres,
}

impl Dialect {
    /// Maps an RDS engine name to its dialect. Unsupported engines yield `None`.
    pub fn for_engine(engine: &str) -> Option<Self> {
        match engine {
            "mariadb" => Some(Dialect::MySql),
            "postgres" => Some(Dialect::Postgres),
            _ => None,
        }
    }
}

/// RDS instance as a log source: the SDK for describing, the REST endpoint for complete downloads.
pub struct RdsLogSource {
    client: Client,
    http: SignedHttpClient,
    base_url: String,
    dialect: Mutex<Option<Dialect>>,
}

impl RdsLogSource {
    /// `endpoint` overrides `https://rds.{region}.amazonaws.com` for downloads.
    pub fn new(
        sdk_config: &SdkConfig,
        endpoint: Option<&str>,
        download_timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let region = sdk_config
            .region()
            .map(|r| r.to_string())
            .ok_or_else(|| RemoteError::Setup("no AWS region configured".to_string()))?;
        let credentials = sdk_config
            .credentials_provider()
            .ok_or_else(|| RemoteError::Setup("no AWS credentials provider".to_string()))?;

        let base_url = match endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://rds.{}.amazonaws.com", region),
        };

        Ok(Self {
            client: Client::new(sdk_config),
            http: SignedHttpClient::new(credentials, region, "rds", download_timeout)?,
            base_url,
            dialect: Mutex::new(None),
        })
    }

    /// Dialect recorded by the last successful validation.
    pub fn dialect(&self) -> Option<Dialect> {
        *self.dialect.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn download_url(&self, source_id: &str, file_name: &str) -> String {
        download_url(&self.base_url, source_id, file_name)
    }
}

fn download_url(base_url: &str, source_id: &str, file_name: &str) -> String {
    format!(
        "{}/v13/downloadCompleteLogFile/{}/{}",
        base_url, source_id, file_name
    )
}

#[async_trait]
impl SourceReadiness for RdsLogSource {
    async fn validate_and_prepare(&self, source_id: &str) -> Result<(), RemoteError> {
        let output = self
            .client
            .describe_db_instances()
            .db_instance_identifier(source_id)
            .max_records(20)
            .send()
            .await
            .map_err(|e| {
                RemoteError::Api(format!(
                    "could not describe db instance: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        let instance = output
            .db_instances()
            .first()
            .ok_or_else(|| RemoteError::InstanceNotFound(source_id.to_string()))?;

        let engine = instance.engine().unwrap_or_default();
        let dialect = Dialect::for_engine(engine)
            .ok_or_else(|| RemoteError::UnsupportedEngine(engine.to_string()))?;

        *self.dialect.lock().unwrap_or_else(|e| e.into_inner()) = Some(dialect);
        info!(instance = %source_id, engine = %engine, dialect = ?dialect, "RDS instance validated");

        Ok(())
    }
}

#[async_trait]
impl LogSource for RdsLogSource {
    async fn list_log_files(&self, source_id: &str) -> Result<Vec<LogFile>, RemoteError> {
        let mut pages = self
            .client
            .describe_db_log_files()
            .db_instance_identifier(source_id)
            .into_paginator()
            .send();

        let mut files = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| {
                RemoteError::Api(format!(
                    "error getting db log files: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

            for details in page.describe_db_log_files() {
                let Some(name) = details.log_file_name() else {
                    continue;
                };
                files.push(LogFile::new(
                    name,
                    details.size().unwrap_or_default(),
                    details.last_written().unwrap_or_default(),
                ));
            }
        }

        debug!(instance = %source_id, count = files.len(), "Listed db log files");
        Ok(files)
    }

    async fn download(&self, source_id: &str, file_name: &str) -> Result<LogStream, RemoteError> {
        let url = self.download_url(source_id, file_name);
        let response = self.http.get(&url).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Status {
                file: file_name.to_string(),
                status: status.as_u16(),
            });
        }

        debug!(status = status.as_u16(), url = %url, "Download request completed");

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| RemoteError::Read(e.to_string())))
            .boxed())
    }
}
