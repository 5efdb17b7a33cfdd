use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    #[serde(default)]
    pub timestamp: TimestampConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    pub sink: SinkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub path: PathBuf,
    #[serde(default = "default_read_start")]
    pub start: ReadStart,
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
}

fn default_read_start() -> ReadStart {
    ReadStart::End
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(500)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadStart {
    Beginning,
    End,
}

/// How the bracketed access-log timestamp is turned into an instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampConfig {
    #[serde(default = "default_timestamp_format")]
    pub format: String,
    /// IANA zone the wall-clock text is interpreted in.
    #[serde(default = "default_zone")]
    pub zone: String,
    /// When set, the literal offset in the text wins over `zone`.
    #[serde(default)]
    pub honor_offset: bool,
}

impl Default for TimestampConfig {
    fn default() -> Self {
        Self {
            format: default_timestamp_format(),
            zone: default_zone(),
            honor_offset: false,
        }
    }
}

fn default_timestamp_format() -> String {
    "%d/%b/%Y:%H:%M:%S %z".to_string()
}

fn default_zone() -> String {
    "Asia/Shanghai".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_queue_capacity")]
    pub raw_queue_capacity: usize,
    #[serde(default = "default_queue_capacity")]
    pub record_queue_capacity: usize,
    #[serde(default = "default_workers")]
    pub parser_workers: usize,
    #[serde(default = "default_workers")]
    pub writer_workers: usize,
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub run_for: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            raw_queue_capacity: default_queue_capacity(),
            record_queue_capacity: default_queue_capacity(),
            parser_workers: default_workers(),
            writer_workers: default_workers(),
            run_for: None,
        }
    }
}

fn default_queue_capacity() -> usize {
    200
}

fn default_workers() -> usize {
    4
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// `endpoint@username@password@namespace@precision`
    pub dsn: String,
    #[serde(default = "default_measurement")]
    pub measurement: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_flush_interval", with = "humantime_serde")]
    pub flush_interval: Duration,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(default)]
    pub on_write_failure: WriteFailureConfig,
}

fn default_measurement() -> String {
    "nginx_log".to_string()
}

fn default_batch_size() -> usize {
    100
}

fn default_flush_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_timeout() -> Duration {
    Duration::from_secs(5)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteFailureConfig {
    #[serde(default = "default_failure_policy")]
    pub policy: WriteFailurePolicy,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff", with = "humantime_serde")]
    pub initial_backoff: Duration,
    #[serde(default = "default_max_backoff", with = "humantime_serde")]
    pub max_backoff: Duration,
}

impl Default for WriteFailureConfig {
    fn default() -> Self {
        Self {
            policy: default_failure_policy(),
            max_attempts: default_max_attempts(),
            initial_backoff: default_initial_backoff(),
            max_backoff: default_max_backoff(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteFailurePolicy {
    /// Retry the batch with exponential backoff, then drop it and keep going.
    Retry,
    /// Terminate the writer on the first failed write.
    Stop,
}

fn default_failure_policy() -> WriteFailurePolicy {
    WriteFailurePolicy::Retry
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff() -> Duration {
    Duration::from_millis(200)
}

fn default_max_backoff() -> Duration {
    Duration::from_secs(10)
}
