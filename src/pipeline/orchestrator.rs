use crate::config::parse::{validate_config, ConfigError};
use crate::config::types::Config;
use crate::parser::{AccessLogParser, Record, TimestampError};
use crate::pipeline::channel::create_channel;
use crate::pipeline::runner::{run_parser, run_writer, WorkerError, WriterSettings};
use crate::pipeline::stats::{PipelineStats, StatsSnapshot};
use crate::sink::{BatchSettings, DescriptorError, InfluxSink, Sink, SinkDescriptor, SinkError};
use crate::source::{RawLine, Tailer, TailerError};
use futures::future::join_all;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),

    #[error("timestamp settings: {0}")]
    Timestamp(#[from] TimestampError),

    #[error("sink descriptor: {0}")]
    Descriptor(#[from] DescriptorError),

    #[error("failed to build sink client: {0}")]
    SinkClient(#[from] SinkError),

    #[error("expected {expected} sinks for the writer pool, got {actual}")]
    SinkCount { expected: usize, actual: usize },

    #[error("tailer failed: {0}")]
    Tailer(#[from] TailerError),
}

/// Tailer → parser pool → writer pool, connected by two bounded queues.
pub struct Pipeline {
    config: Config,
    parser: Arc<AccessLogParser>,
    sinks: Vec<Arc<dyn Sink>>,
    batch_settings: Arc<BatchSettings>,
    stats: Arc<PipelineStats>,
}

impl Pipeline {
    /// Build a pipeline writing to InfluxDB, one HTTP client per writer.
    pub fn new(config: Config) -> Result<Self, PipelineError> {
        validate_config(&config)?;
        let descriptor = SinkDescriptor::parse(&config.sink.dsn)?;
        let sinks = (0..config.pipeline.writer_workers)
            .map(|_| {
                InfluxSink::new(&descriptor, config.sink.timeout)
                    .map(|sink| Arc::new(sink) as Arc<dyn Sink>)
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            endpoint = %descriptor.endpoint,
            db = %descriptor.namespace,
            precision = %descriptor.precision,
            writers = sinks.len(),
            "Sink clients ready"
        );

        Self::with_sinks(config, sinks)
    }

    /// Build a pipeline where every writer shares `sink`.
    pub fn with_sink(config: Config, sink: Arc<dyn Sink>) -> Result<Self, PipelineError> {
        let sinks = vec![sink; config.pipeline.writer_workers];
        Self::with_sinks(config, sinks)
    }

    /// Build a pipeline with one sink per writer worker.
    pub fn with_sinks(
        config: Config,
        sinks: Vec<Arc<dyn Sink>>,
    ) -> Result<Self, PipelineError> {
        // Config fields are public, so re-check whatever the caller built
        validate_config(&config)?;

        if sinks.len() != config.pipeline.writer_workers {
            return Err(PipelineError::SinkCount {
                expected: config.pipeline.writer_workers,
                actual: sinks.len(),
            });
        }

        let descriptor = SinkDescriptor::parse(&config.sink.dsn)?;
        let parser = AccessLogParser::from_config(&config.timestamp)?;

        Ok(Self {
            batch_settings: Arc::new(BatchSettings::new(&config.sink.measurement, &descriptor)),
            parser: Arc::new(parser),
            sinks,
            stats: Arc::new(PipelineStats::default()),
            config,
        })
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        Arc::clone(&self.stats)
    }

    /// Open the source and spawn every task.
    ///
    /// Returns once the tailer is positioned, so anything appended after this
    /// returns will be picked up. Cancelling `shutdown` stops the tailer; the
    /// parser and writer pools then drain their queues and exit.
    pub async fn start(self, shutdown: CancellationToken) -> Result<PipelineHandle, PipelineError> {
        let tailer = Tailer::open(&self.config.source).await?;
        let pipeline = &self.config.pipeline;

        let (raw_tx, raw_rx) = create_channel::<RawLine>(pipeline.raw_queue_capacity);
        let (record_tx, record_rx) = create_channel::<Record>(pipeline.record_queue_capacity);

        info!(
            parser_workers = pipeline.parser_workers,
            writer_workers = pipeline.writer_workers,
            raw_queue_capacity = pipeline.raw_queue_capacity,
            record_queue_capacity = pipeline.record_queue_capacity,
            "Starting pipeline"
        );

        let tailer_task = tokio::spawn(tailer.run(raw_tx, shutdown.clone(), self.stats.clone()));

        let parser_tasks = (0..pipeline.parser_workers)
            .map(|worker_id| {
                tokio::spawn(run_parser(
                    worker_id,
                    raw_rx.clone(),
                    record_tx.clone(),
                    self.parser.clone(),
                    self.stats.clone(),
                ))
            })
            .collect();

        let writer_settings = WriterSettings::from(&self.config.sink);
        let writer_tasks = self
            .sinks
            .into_iter()
            .enumerate()
            .map(|(worker_id, sink)| {
                tokio::spawn(run_writer(
                    worker_id,
                    record_rx.clone(),
                    sink,
                    self.batch_settings.clone(),
                    writer_settings.clone(),
                    shutdown.clone(),
                    self.stats.clone(),
                ))
            })
            .collect();

        // Queue lifetimes must be owned by the workers alone
        drop(raw_rx);
        drop(record_tx);
        drop(record_rx);

        Ok(PipelineHandle {
            tailer_task,
            parser_tasks,
            writer_tasks,
            stats: self.stats,
        })
    }

    /// Start the pipeline and wait for it to finish.
    pub async fn run(self, shutdown: CancellationToken) -> Result<StatsSnapshot, PipelineError> {
        self.start(shutdown).await?.wait().await
    }
}

/// Running pipeline tasks.
pub struct PipelineHandle {
    tailer_task: JoinHandle<Result<(), TailerError>>,
    parser_tasks: Vec<JoinHandle<Result<(), WorkerError>>>,
    writer_tasks: Vec<JoinHandle<Result<(), WorkerError>>>,
    stats: Arc<PipelineStats>,
}

impl PipelineHandle {
    pub fn stats(&self) -> Arc<PipelineStats> {
        Arc::clone(&self.stats)
    }

    /// Wait for every task in shutdown order: tailer, parsers, writers.
    ///
    /// A tailer failure is returned after the pools have drained; worker
    /// failures are only logged.
    pub async fn wait(self) -> Result<StatsSnapshot, PipelineError> {
        let tailer_result = match self.tailer_task.await {
            Ok(Ok(())) => {
                info!("Tailer task completed");
                Ok(())
            }
            Ok(Err(e)) => {
                error!(error = %e, "Tailer task failed, no further lines will be read");
                Err(PipelineError::Tailer(e))
            }
            Err(e) => {
                error!(error = %e, "Tailer task join error");
                Ok(())
            }
        };

        log_pool_outcome("Parser", join_all(self.parser_tasks).await);
        log_pool_outcome("Writer", join_all(self.writer_tasks).await);

        let snapshot = self.stats.snapshot();
        info!(
            lines_read = snapshot.lines_read,
            records_parsed = snapshot.records_parsed,
            lines_rejected = snapshot.lines_rejected,
            records_written = snapshot.records_written,
            batches_written = snapshot.batches_written,
            batches_failed = snapshot.batches_failed,
            "Pipeline shutdown complete"
        );

        tailer_result.map(|()| snapshot)
    }
}

fn log_pool_outcome(
    pool: &str,
    results: Vec<Result<Result<(), WorkerError>, tokio::task::JoinError>>,
) {
    for (worker_id, result) in results.into_iter().enumerate() {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(pool, worker_id, error = %e, "Worker terminated with error"),
            Err(e) => error!(pool, worker_id, error = %e, "Worker join error"),
        }
    }
}
