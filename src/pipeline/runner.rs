use crate::config::types::{SinkConfig, WriteFailureConfig, WriteFailurePolicy};
use crate::parser::{AccessLogParser, Record};
use crate::pipeline::channel::{SharedReceiver, Sender};
use crate::pipeline::stats::PipelineStats;
use crate::sink::{Batch, BatchSettings, Sink, SinkError};
use crate::source::RawLine;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Errors that end a pipeline worker.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("record queue closed with no writers left")]
    ChannelSend,

    #[error("sink write failed: {0}")]
    Sink(#[from] SinkError),
}

/// Run one parser worker.
///
/// Pulls raw lines until the queue is closed and drained. Lines that do not
/// parse are logged and dropped; they never stop the worker.
pub async fn run_parser(
    worker_id: usize,
    input: SharedReceiver<RawLine>,
    output: Sender<Record>,
    parser: Arc<AccessLogParser>,
    stats: Arc<PipelineStats>,
) -> Result<(), WorkerError> {
    info!(worker_id, "Parser worker started");

    while let Some(line) = input.recv().await {
        match parser.parse(line.as_bytes()) {
            Ok(record) => {
                stats.record_parsed();
                if output.send(record).await.is_err() {
                    warn!(worker_id, "Record queue closed, parser worker stopping");
                    return Err(WorkerError::ChannelSend);
                }
            }
            Err(e) => {
                stats.record_rejected();
                warn!(
                    worker_id,
                    error = %e,
                    line = %String::from_utf8_lossy(line.as_bytes()),
                    "Discarding unparseable line"
                );
            }
        }
    }

    info!(worker_id, "Raw line queue drained, parser worker stopping");
    Ok(())
}

/// Batching and failure handling for a writer worker.
#[derive(Debug, Clone)]
pub struct WriterSettings {
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub on_failure: WriteFailureConfig,
}

impl From<&SinkConfig> for WriterSettings {
    fn from(config: &SinkConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            flush_interval: config.flush_interval,
            on_failure: config.on_write_failure.clone(),
        }
    }
}

/// Run one sink writer worker.
///
/// Collects records into batches of up to `batch_size`, flushing early when
/// `flush_interval` passes with a partial batch and once more when the queue
/// closes. Under [`WriteFailurePolicy::Stop`] the first failed write ends the
/// worker with an error.
pub async fn run_writer(
    worker_id: usize,
    input: SharedReceiver<Record>,
    sink: Arc<dyn Sink>,
    batch_settings: Arc<BatchSettings>,
    settings: WriterSettings,
    shutdown: CancellationToken,
    stats: Arc<PipelineStats>,
) -> Result<(), WorkerError> {
    let mut pending: Vec<Record> = Vec::with_capacity(settings.batch_size.min(1024));
    let mut flush_interval = tokio::time::interval(settings.flush_interval);
    flush_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(worker_id, batch_size = settings.batch_size, "Sink writer started");

    loop {
        tokio::select! {
            received = input.recv() => {
                match received {
                    Some(record) => {
                        pending.push(record);
                        if pending.len() >= settings.batch_size {
                            flush(worker_id, &mut pending, &*sink, &batch_settings, &settings, &shutdown, &stats).await?;
                        }
                    }
                    None => {
                        info!(worker_id, "Record queue drained, flushing remaining records");
                        break;
                    }
                }
            }

            _ = flush_interval.tick() => {
                if !pending.is_empty() {
                    debug!(worker_id, count = pending.len(), "Flushing partial batch on interval");
                    flush(worker_id, &mut pending, &*sink, &batch_settings, &settings, &shutdown, &stats).await?;
                }
            }
        }
    }

    if !pending.is_empty() {
        flush(worker_id, &mut pending, &*sink, &batch_settings, &settings, &shutdown, &stats).await?;
    }

    info!(worker_id, "Sink writer shutdown complete");
    Ok(())
}

async fn flush(
    worker_id: usize,
    pending: &mut Vec<Record>,
    sink: &dyn Sink,
    batch_settings: &BatchSettings,
    settings: &WriterSettings,
    shutdown: &CancellationToken,
    stats: &PipelineStats,
) -> Result<(), WorkerError> {
    let batch = Batch::from_records(batch_settings, pending);
    pending.clear();

    let result = match settings.on_failure.policy {
        WriteFailurePolicy::Stop => sink.write(&batch).await,
        WriteFailurePolicy::Retry => {
            write_with_retry(worker_id, sink, &batch, &settings.on_failure, shutdown).await
        }
    };

    match result {
        Ok(()) => {
            stats.record_batch_written(batch.len());
            debug!(worker_id, points = batch.len(), "Batch written");
            Ok(())
        }
        Err(e) => {
            stats.record_batch_failed();
            match settings.on_failure.policy {
                WriteFailurePolicy::Stop => {
                    error!(worker_id, error = %e, points = batch.len(), "Sink write failed, writer stopping");
                    Err(e.into())
                }
                WriteFailurePolicy::Retry => {
                    error!(worker_id, error = %e, points = batch.len(), "Dropping batch after failed write");
                    Ok(())
                }
            }
        }
    }
}

/// Attempt a write up to `max_attempts` times with exponential backoff.
///
/// Non-retryable errors and shutdown during a backoff end the attempts early.
pub(crate) async fn write_with_retry(
    worker_id: usize,
    sink: &dyn Sink,
    batch: &Batch,
    policy: &WriteFailureConfig,
    shutdown: &CancellationToken,
) -> Result<(), SinkError> {
    let mut backoff = policy.initial_backoff;
    let mut attempt = 1;

    loop {
        let err = match sink.write(batch).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };

        if attempt >= policy.max_attempts || !err.is_retryable() {
            return Err(err);
        }

        warn!(
            worker_id,
            attempt,
            max_attempts = policy.max_attempts,
            backoff_ms = backoff.as_millis() as u64,
            error = %err,
            "Sink write failed, retrying"
        );

        tokio::select! {
            _ = shutdown.cancelled() => {
                warn!(worker_id, "Shutdown during backoff, abandoning batch");
                return Err(err);
            }
            _ = sleep(backoff) => {}
        }

        backoff = (backoff * 2).min(policy.max_backoff);
        attempt += 1;
    }
}
