use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    pub aws: AwsConfig,
    pub checkpoint: CheckpointConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub harvest: HarvestConfig,
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

impl Config {
    /// Key prefix for the hour records. Defaults to `{instance}/audit-logs`.
    pub fn output_prefix(&self) -> String {
        match &self.output.prefix {
            Some(prefix) => prefix.trim_end_matches('/').to_string(),
            None => format!("{}/audit-logs", self.source.instance_identifier),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub instance_identifier: String,
    #[serde(default = "default_log_file_prefix")]
    pub log_file_prefix: String,
    #[serde(default = "default_category")]
    pub category: String,
}

fn default_log_file_prefix() -> String {
    "audit/server_audit.log".to_string()
}

fn default_category() -> String {
    "audit".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    pub region: String,
    /// Custom endpoint URL, e.g. for LocalStack.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub profile: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    pub table_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub bucket: String,
    #[serde(default)]
    pub prefix: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Shared budget for rotation races and body read failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Extra listing attempts when the filtered listing comes back empty.
    #[serde(default = "default_listing_retries")]
    pub listing_retries: u32,
    #[serde(default = "default_read_retry_backoff", with = "humantime_serde")]
    pub read_retry_backoff: Duration,
    #[serde(default = "default_download_timeout", with = "humantime_serde")]
    pub download_timeout: Duration,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            listing_retries: default_listing_retries(),
            read_retry_backoff: default_read_retry_backoff(),
            download_timeout: default_download_timeout(),
        }
    }
}

fn default_max_retries() -> u32 {
    5
}

fn default_listing_retries() -> u32 {
    5
}

fn default_read_retry_backoff() -> Duration {
    Duration::from_secs(1)
}

fn default_download_timeout() -> Duration {
    Duration::from_secs(300)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}
